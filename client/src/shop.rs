//! Shop-level state
//!
//! [`ShopState`] holds the lifecycles of every resource kind. Addresses get
//! one extra lifecycle (marking the default address) and the resolved copy
//! of the user's addresses, refreshed each time the owned listing succeeds.

use crate::address::{AddressRecord, AddressResolver};
use crate::lifecycle::{LifecycleAction, LifecycleReducer, LifecycleState, ResourceEnvironment, SettlePolicy};
use crate::resource::{Entity, Operation, ResourceKind};
use crate::resources::{ResourceAction, ResourceReducer, ResourceState};
use crate::transport::ResourceApi;
use motoshop_core::composition::{CombinedReducer, combine_reducers, scope_reducer};
use motoshop_core::{Effect, Reducer, SmallVec, async_effect};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Address lifecycles plus resolution results
#[derive(Clone, Debug, PartialEq)]
pub struct AddressState {
    /// The per-operation lifecycles
    pub records: ResourceState<AddressRecord>,
    /// Marking an address as the default
    pub set_default: LifecycleState<bool>,
    /// Last owned listing with names filled in
    pub resolved: Vec<AddressRecord>,
    /// Owned-listing generation of the resolution batch in flight
    pub resolving: Option<u64>,
}

impl Default for AddressState {
    fn default() -> Self {
        Self::with_settle_policy(SettlePolicy::default())
    }
}

impl AddressState {
    /// Idle lifecycles sharing one settle policy
    #[must_use]
    pub const fn with_settle_policy(policy: SettlePolicy) -> Self {
        Self {
            records: ResourceState::with_settle_policy(policy),
            set_default: LifecycleState::new(policy),
            resolved: Vec::new(),
            resolving: None,
        }
    }

    /// Whether a resolution batch is running
    #[must_use]
    pub const fn is_resolving(&self) -> bool {
        self.resolving.is_some()
    }
}

/// Inputs to the address state
#[derive(Clone, Debug, PartialEq)]
pub enum AddressAction {
    /// Per-operation lifecycles
    Records(ResourceAction<AddressRecord>),
    /// Default-address lifecycle
    SetDefault(LifecycleAction<bool>),
    /// A resolution batch finished
    Resolved {
        /// Owned-listing generation the batch was started for
        generation: u64,
        /// Records with names filled in, in listing order
        records: Vec<AddressRecord>,
    },
}

impl AddressAction {
    /// Mark `id` as the user's default address
    ///
    /// The server owns the one-default rule, so records are not touched
    /// locally; refresh with the owned listing afterwards.
    #[must_use]
    pub fn set_default(id: impl Into<String>) -> Self {
        Self::SetDefault(LifecycleAction::Execute(Operation::SetDefault { id: id.into() }))
    }
}

impl From<ResourceAction<AddressRecord>> for AddressAction {
    fn from(action: ResourceAction<AddressRecord>) -> Self {
        Self::Records(action)
    }
}

/// Collaborators of the address reducer
#[derive(Clone)]
pub struct AddressEnvironment {
    /// Backend transport
    pub resources: ResourceEnvironment,
    /// Name resolution; `None` keeps listings unresolved
    pub resolver: Option<AddressResolver>,
}

/// Address lifecycles plus resolution after each owned listing
pub struct AddressReducer {
    records: ResourceReducer<AddressRecord>,
    set_default: LifecycleReducer<bool>,
}

impl AddressReducer {
    /// New reducer
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: ResourceReducer::new(ResourceKind::Address),
            set_default: LifecycleReducer::new(ResourceKind::Address),
        }
    }
}

impl Default for AddressReducer {
    fn default() -> Self {
        Self::new()
    }
}

impl Reducer for AddressReducer {
    type State = AddressState;
    type Action = AddressAction;
    type Environment = AddressEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            AddressAction::Records(action) => {
                // Checked before the lifecycle applies it
                let listed = match &action {
                    ResourceAction::Owned(LifecycleAction::Succeeded { generation, payload })
                        if state.records.owned.accepts(*generation) =>
                    {
                        Some((*generation, payload.clone()))
                    },
                    _ => None,
                };
                let touches_owned = matches!(action, ResourceAction::Owned(_));
                let owned_reset = matches!(action, ResourceAction::Owned(LifecycleAction::Reset));
                if matches!(action, ResourceAction::ClearErrors) {
                    state.set_default.lifecycle = std::mem::take(&mut state.set_default.lifecycle).clear_error();
                }

                let mut effects: SmallVec<[Effect<AddressAction>; 4]> = self
                    .records
                    .reduce(&mut state.records, action, &env.resources)
                    .into_iter()
                    .map(|effect| effect.map(AddressAction::Records))
                    .collect();

                if owned_reset {
                    state.resolved.clear();
                }
                // A refresh, failure or reset leaves the running batch nothing to apply to
                let abandoned = touches_owned && state.records.owned.payload().is_none();
                if let Some(stale) = state.resolving.take_if(|_| abandoned) {
                    tracing::debug!(generation = stale, "Abandoned address resolution");
                }

                if let Some((generation, records)) = listed {
                    match &env.resolver {
                        Some(resolver) => {
                            tracing::debug!(generation, records = records.len(), "Resolving addresses");
                            state.resolving = Some(generation);
                            let resolver = resolver.clone();
                            effects.push(async_effect! {
                                let records = resolver.resolve(records).await;
                                Some(AddressAction::Resolved { generation, records })
                            });
                        },
                        None => {
                            state.resolving = None;
                            state.resolved = records;
                        },
                    }
                }

                effects
            },

            AddressAction::SetDefault(action) => self
                .set_default
                .reduce(&mut state.set_default, action, &env.resources)
                .into_iter()
                .map(|effect| effect.map(AddressAction::SetDefault))
                .collect(),

            AddressAction::Resolved { generation, records } => {
                let owned = &state.records.owned;
                if state.resolving == Some(generation) && owned.payload().is_some() {
                    let unresolved = records.iter().filter(|record| !record.is_fully_resolved()).count();
                    tracing::info!(generation, records = records.len(), unresolved, "Addresses resolved");
                    state.resolved = records;
                    state.resolving = None;
                } else {
                    tracing::debug!(
                        generation,
                        issued = owned.issued,
                        running = ?state.resolving,
                        "Dropped stale resolution"
                    );
                }
                SmallVec::new()
            },
        }
    }
}

/// Every lifecycle of the shop client
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ShopState {
    /// Categories
    pub categories: ResourceState<Entity>,
    /// Motorcycles
    pub motorcycles: ResourceState<Entity>,
    /// Services
    pub services: ResourceState<Entity>,
    /// Addresses
    pub addresses: AddressState,
    /// Orders
    pub orders: ResourceState<Entity>,
    /// Fuel log entries
    pub fuel: ResourceState<Entity>,
}

impl ShopState {
    /// Idle state where every lifecycle uses `policy`
    #[must_use]
    pub const fn with_settle_policy(policy: SettlePolicy) -> Self {
        Self {
            categories: ResourceState::with_settle_policy(policy),
            motorcycles: ResourceState::with_settle_policy(policy),
            services: ResourceState::with_settle_policy(policy),
            addresses: AddressState::with_settle_policy(policy),
            orders: ResourceState::with_settle_policy(policy),
            fuel: ResourceState::with_settle_policy(policy),
        }
    }

    /// Totals shown on the user's profile, from the owned listings
    ///
    /// Listings that have not succeeded count as empty.
    #[must_use]
    pub fn profile_summary(&self) -> ProfileSummary {
        ProfileSummary {
            addresses: self
                .addresses
                .records
                .owned
                .payload()
                .map_or(0, Vec::len),
            motorcycles: owned(&self.motorcycles).len(),
            fuel_total_cost: sum_field(owned(&self.fuel), "totalCost"),
            orders_total_price: sum_field(owned(&self.orders), "totalPrice"),
        }
    }
}

/// Profile page totals
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSummary {
    /// Number of saved addresses
    pub addresses: usize,
    /// Number of registered motorcycles
    pub motorcycles: usize,
    /// Sum of fuel entry costs
    pub fuel_total_cost: f64,
    /// Sum of order totals
    pub orders_total_price: f64,
}

fn owned(state: &ResourceState<Entity>) -> &[Entity] {
    state.owned.payload().map_or(&[], Vec::as_slice)
}

/// Sum a numeric field; numeric strings count, anything else is skipped
fn sum_field(entities: &[Entity], field: &str) -> f64 {
    entities
        .iter()
        .filter_map(|entity| match entity.get(field)? {
            Value::Number(number) => number.as_f64(),
            Value::String(text) => text.trim().parse().ok(),
            _ => None,
        })
        .sum()
}

/// Inputs to the shop state, routed by resource kind
#[derive(Clone, Debug, PartialEq)]
pub enum ShopAction {
    /// Category lifecycles
    Categories(ResourceAction<Entity>),
    /// Motorcycle lifecycles
    Motorcycles(ResourceAction<Entity>),
    /// Service lifecycles
    Services(ResourceAction<Entity>),
    /// Address lifecycles and resolution
    Addresses(AddressAction),
    /// Order lifecycles
    Orders(ResourceAction<Entity>),
    /// Fuel log lifecycles
    Fuel(ResourceAction<Entity>),
}

/// Collaborators of the shop reducer
#[derive(Clone)]
pub struct ShopEnvironment {
    /// Backend transport for entity resources
    pub api: ResourceEnvironment,
    /// Backend transport plus resolver for addresses
    pub addresses: AddressEnvironment,
}

impl ShopEnvironment {
    /// Environment over `api`, resolving addresses with `resolver` if given
    #[must_use]
    pub fn new(api: Arc<dyn ResourceApi>, resolver: Option<AddressResolver>) -> Self {
        let api = ResourceEnvironment::new(api);
        Self {
            addresses: AddressEnvironment {
                resources: api.clone(),
                resolver,
            },
            api,
        }
    }
}

/// Root reducer of the shop client
pub struct ShopReducer {
    children: CombinedReducer<ShopState, ShopAction, ShopEnvironment>,
}

impl ShopReducer {
    /// New reducer
    #[must_use]
    pub fn new() -> Self {
        let children = combine_reducers(vec![
            Box::new(scope_reducer(
                ResourceReducer::<Entity>::new(ResourceKind::Category),
                |state: &mut ShopState| &mut state.categories,
                |env: &ShopEnvironment| &env.api,
                |action: ShopAction| match action {
                    ShopAction::Categories(action) => Some(action),
                    _ => None,
                },
                ShopAction::Categories,
            )),
            Box::new(scope_reducer(
                ResourceReducer::<Entity>::new(ResourceKind::Motorcycle),
                |state: &mut ShopState| &mut state.motorcycles,
                |env: &ShopEnvironment| &env.api,
                |action: ShopAction| match action {
                    ShopAction::Motorcycles(action) => Some(action),
                    _ => None,
                },
                ShopAction::Motorcycles,
            )),
            Box::new(scope_reducer(
                ResourceReducer::<Entity>::new(ResourceKind::Service),
                |state: &mut ShopState| &mut state.services,
                |env: &ShopEnvironment| &env.api,
                |action: ShopAction| match action {
                    ShopAction::Services(action) => Some(action),
                    _ => None,
                },
                ShopAction::Services,
            )),
            Box::new(scope_reducer(
                AddressReducer::new(),
                |state: &mut ShopState| &mut state.addresses,
                |env: &ShopEnvironment| &env.addresses,
                |action: ShopAction| match action {
                    ShopAction::Addresses(action) => Some(action),
                    _ => None,
                },
                ShopAction::Addresses,
            )),
            Box::new(scope_reducer(
                ResourceReducer::<Entity>::new(ResourceKind::Order),
                |state: &mut ShopState| &mut state.orders,
                |env: &ShopEnvironment| &env.api,
                |action: ShopAction| match action {
                    ShopAction::Orders(action) => Some(action),
                    _ => None,
                },
                ShopAction::Orders,
            )),
            Box::new(scope_reducer(
                ResourceReducer::<Entity>::new(ResourceKind::FuelEntry),
                |state: &mut ShopState| &mut state.fuel,
                |env: &ShopEnvironment| &env.api,
                |action: ShopAction| match action {
                    ShopAction::Fuel(action) => Some(action),
                    _ => None,
                },
                ShopAction::Fuel,
            )),
        ]);

        Self { children }
    }
}

impl Default for ShopReducer {
    fn default() -> Self {
        Self::new()
    }
}

impl Reducer for ShopReducer {
    type State = ShopState;
    type Action = ShopAction;
    type Environment = ShopEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        self.children.reduce(state, action, env)
    }
}
