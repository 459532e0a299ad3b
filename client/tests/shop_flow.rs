//! Profile loading through the store, addresses resolved on arrival.

#![allow(clippy::unwrap_used)] // Tests can unwrap

use async_trait::async_trait;
use motoshop_client::address::{AddressResolver, DirectoryEntry, StaticDirectory};
use motoshop_client::lifecycle::{SettlePolicy, Status};
use motoshop_client::resources::{ResourceAction, Slot};
use motoshop_client::shop::AddressAction;
use motoshop_client::transport::ApiRequest;
use motoshop_client::{ApiError, ResourceApi, ShopAction, ShopEnvironment, ShopReducer, ShopState};
use motoshop_runtime::Store;
use motoshop_testing::helpers::init_test_tracing;
use reqwest::Method;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Canned envelopes keyed by method and path
#[derive(Default)]
struct Backend {
    routes: HashMap<(Method, String), Result<Value, ApiError>>,
    calls: Mutex<Vec<String>>,
}

impl Backend {
    fn route(mut self, method: Method, path: &str, reply: Result<Value, ApiError>) -> Self {
        self.routes.insert((method, path.to_string()), reply);
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResourceApi for Backend {
    async fn call(&self, request: ApiRequest) -> Result<Value, ApiError> {
        self.calls.lock().unwrap().push(format!("{} {}", request.method, request.path));
        self.routes
            .get(&(request.method, request.path))
            .cloned()
            .unwrap_or_else(|| {
                Err(ApiError::Rejected {
                    status: 404,
                    message: String::new(),
                })
            })
    }
}

fn directory() -> StaticDirectory {
    StaticDirectory::new(
        vec![DirectoryEntry::new("01", "Ilocos Region (Region I)", None)],
        vec![DirectoryEntry::new("0128", "Ilocos Norte", Some("01"))],
        vec![DirectoryEntry::new("012801", "Adams", Some("0128"))],
        vec![DirectoryEntry::new("012801001", "Adams (Pob.)", Some("012801"))],
    )
}

fn backend() -> Backend {
    Backend::default()
        .route(
            Method::GET,
            "/api/v1/list-address",
            Ok(json!({
                "success": true,
                "userAddresses": [
                    { "_id": "a1", "region": "01", "province": "0128", "city": "012801", "barangay": "012801001", "isDefault": true },
                    { "_id": "a2", "region": "01", "province": "0128", "city": "012801", "barangay": "999" }
                ]
            })),
        )
        .route(
            Method::GET,
            "/api/v1/list-motorcycle",
            Ok(json!({ "userMotorcycles": [{ "_id": "m1", "plateNumber": "ABC 123" }] })),
        )
        .route(
            Method::GET,
            "/api/v1/list-fuel",
            Ok(json!({ "userFuel": [{ "_id": "f1", "totalCost": 500 }, { "_id": "f2", "totalCost": 250.25 }] })),
        )
        .route(
            Method::GET,
            "/api/v1/orders/me",
            Err(ApiError::Rejected {
                status: 401,
                message: "Login first to access this resource".to_string(),
            }),
        )
        .route(Method::PUT, "/api/v1/address/default/a2", Ok(json!({ "success": true })))
}

type ShopStore = Store<ShopState, ShopAction, ShopEnvironment, ShopReducer>;

fn store(api: Arc<Backend>, resolver: Option<AddressResolver>) -> ShopStore {
    Store::new(
        ShopState::with_settle_policy(SettlePolicy::LatestIssued),
        ShopReducer::new(),
        ShopEnvironment::new(api, resolver),
    )
}

async fn load_profile(store: &ShopStore) {
    let mut handles = Vec::new();
    for action in [
        ShopAction::Addresses(AddressAction::Records(ResourceAction::owned())),
        ShopAction::Motorcycles(ResourceAction::owned()),
        ShopAction::Fuel(ResourceAction::owned()),
        ShopAction::Orders(ResourceAction::owned()),
    ] {
        handles.push(store.send(action).await.unwrap());
    }
    for mut handle in handles {
        handle.wait().await;
    }
}

#[tokio::test]
async fn test_profile_loads_and_resolves_addresses() {
    init_test_tracing();
    let api = Arc::new(backend());
    let resolver = AddressResolver::new(Arc::new(directory()), Some(2));
    let store = store(Arc::clone(&api), Some(resolver));

    load_profile(&store).await;

    let state = store.state(|s| s.clone()).await;

    assert_eq!(state.addresses.records.owned.status(), Status::Succeeded);
    assert!(!state.addresses.is_resolving());
    let resolved = &state.addresses.resolved;
    assert_eq!(resolved.len(), 2);
    assert_eq!(resolved[0].id, "a1");
    assert!(resolved[0].is_fully_resolved());
    assert!(resolved[0].is_default);
    assert_eq!(resolved[1].city_name.as_deref(), Some("Adams"));
    assert_eq!(resolved[1].barangay_name, None);

    assert_eq!(state.motorcycles.owned.payload().unwrap().len(), 1);
    assert_eq!(state.orders.owned.error(), Some("Login first to access this resource"));

    let summary = state.profile_summary();
    assert_eq!(summary.addresses, 2);
    assert_eq!(summary.motorcycles, 1);
    assert!((summary.fuel_total_cost - 750.25).abs() < f64::EPSILON);
    assert!(summary.orders_total_price.abs() < f64::EPSILON);

    assert_eq!(api.calls().len(), 4);
}

#[tokio::test]
async fn test_without_directory_addresses_stay_unresolved() {
    let store = store(Arc::new(backend()), None);

    load_profile(&store).await;

    let resolved = store.state(|s| s.addresses.resolved.clone()).await;
    assert_eq!(resolved.len(), 2);
    assert!(resolved.iter().all(|record| record.region_name.is_none()));
}

#[tokio::test]
async fn test_set_default_then_refresh() {
    let api = Arc::new(backend());
    let store = store(Arc::clone(&api), None);

    let mut handle = store
        .send(ShopAction::Addresses(AddressAction::set_default("a2")))
        .await
        .unwrap();
    handle.wait().await;

    let (status, payload) = store
        .state(|s| (s.addresses.set_default.status(), s.addresses.set_default.payload().copied()))
        .await;
    assert_eq!(status, Status::Succeeded);
    assert_eq!(payload, Some(true));
    assert_eq!(api.calls(), vec!["PUT /api/v1/address/default/a2".to_string()]);

    // Unsupported operations fail without reaching the backend
    let mut handle = store
        .send(ShopAction::Addresses(AddressAction::Records(ResourceAction::list())))
        .await
        .unwrap();
    handle.wait().await;
    assert_eq!(
        store.state(|s| s.addresses.records.list.error().map(str::to_string)).await.as_deref(),
        Some("address does not support list")
    );
    assert_eq!(api.calls().len(), 1);
}

#[tokio::test]
async fn test_reset_clears_resolved_addresses() {
    let resolver = AddressResolver::new(Arc::new(directory()), None);
    let store = store(Arc::new(backend()), Some(resolver));

    load_profile(&store).await;
    assert_eq!(store.state(|s| s.addresses.resolved.len()).await, 2);

    let _ = store
        .send(ShopAction::Addresses(AddressAction::Records(ResourceAction::reset(Slot::Owned))))
        .await
        .unwrap();

    let (status, resolved) = store
        .state(|s| (s.addresses.records.owned.status(), s.addresses.resolved.len()))
        .await;
    assert_eq!(status, Status::Idle);
    assert_eq!(resolved, 0);
}

#[tokio::test]
async fn test_record_without_codes_does_not_fail_listing() {
    let api = Arc::new(Backend::default().route(
        Method::GET,
        "/api/v1/list-address",
        Ok(json!({
            "success": true,
            "userAddresses": [
                { "_id": "a1", "region": "01", "province": "0128", "city": "012801", "barangay": "012801001" },
                { "_id": "a2", "region": "01", "province": "0128", "city": "012801" },
                { "_id": "a3", "region": "01", "province": null, "city": "012801", "barangay": "012801001" }
            ]
        })),
    ));
    let resolver = AddressResolver::new(Arc::new(directory()), Some(2));
    let store = store(api, Some(resolver));

    let mut handle = store
        .send(ShopAction::Addresses(AddressAction::Records(ResourceAction::owned())))
        .await
        .unwrap();
    handle.wait().await;

    let state = store.state(|s| s.addresses.clone()).await;
    assert_eq!(state.records.owned.status(), Status::Succeeded);
    assert_eq!(state.resolved.len(), 3);

    assert!(state.resolved[0].is_fully_resolved());

    assert_eq!(state.resolved[1].city_name.as_deref(), Some("Adams"));
    assert_eq!(state.resolved[1].barangay_name, None);

    // Without a province code neither the province nor its cities can be looked up
    assert_eq!(state.resolved[2].region_name.as_deref(), Some("Ilocos Region (Region I)"));
    assert_eq!(state.resolved[2].province_name, None);
    assert_eq!(state.resolved[2].city_name, None);
    assert_eq!(state.resolved[2].barangay_name.as_deref(), Some("Adams (Pob.)"));
}
