//! # Motoshop Client
//!
//! Client core of the Motoshop shop-management app.
//!
//! ## Components
//!
//! - **Resource lifecycles**: every network operation on a resource kind
//!   (category, motorcycle, service, address, order, fuel entry) runs
//!   through one engine, [`lifecycle::LifecycleReducer`], that moves an
//!   independent `Idle → Pending → Succeeded | Failed` lifecycle per
//!   operation slot.
//! - **Address resolution**: [`address::AddressResolver`] fills in region,
//!   province, city and barangay names for address records from a
//!   four-level directory.
//!
//! State lives in a [`motoshop_runtime::Store`] over [`shop::ShopState`];
//! views read snapshots and subscribe to the store's action broadcast.
//!
//! ## Example
//!
//! ```ignore
//! use motoshop_client::{HttpResourceApi, ShopAction, ShopEnvironment, ShopReducer, ShopState};
//! use motoshop_client::resources::ResourceAction;
//! use motoshop_runtime::Store;
//!
//! let api = Arc::new(HttpResourceApi::new(&config.api)?);
//! let store = Store::new(ShopState::default(), ShopReducer::new(), ShopEnvironment::new(api, None));
//!
//! let handle = store.send(ShopAction::Motorcycles(ResourceAction::owned())).await?;
//! handle.wait().await;
//!
//! let snapshot = store.state(|s| s.motorcycles.owned.snapshot()).await;
//! ```

pub mod address;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod resource;
pub mod resources;
pub mod shop;
pub mod transport;

pub use address::{AddressDirectory, AddressRecord, AddressResolver, HttpDirectory, StaticDirectory};
pub use config::Config;
pub use error::{ApiError, ConfigError};
pub use lifecycle::{Lifecycle, LifecycleSnapshot, SettlePolicy, Status};
pub use resource::{Entity, Operation, RequestBody, ResourceKind};
pub use shop::{ProfileSummary, ShopAction, ShopEnvironment, ShopReducer, ShopState};
pub use transport::{HttpResourceApi, ResourceApi};
