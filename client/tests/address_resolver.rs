//! Address resolution against in-memory, failing, slow and HTTP directories.

#![allow(clippy::unwrap_used)] // Tests can unwrap

use async_trait::async_trait;
use motoshop_client::address::{AddressDirectory, AddressRecord, AddressResolver, DirectoryEntry, HttpDirectory, StaticDirectory};
use motoshop_client::ApiError;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn ilocos() -> StaticDirectory {
    StaticDirectory::new(
        vec![
            DirectoryEntry::new("01", "Ilocos Region (Region I)", None),
            DirectoryEntry::new("03", "Central Luzon (Region III)", None),
        ],
        vec![
            DirectoryEntry::new("0128", "Ilocos Norte", Some("01")),
            DirectoryEntry::new("0314", "Bulacan", Some("03")),
        ],
        vec![
            DirectoryEntry::new("012801", "Adams", Some("0128")),
            DirectoryEntry::new("031410", "Malolos", Some("0314")),
        ],
        vec![
            DirectoryEntry::new("012801001", "Adams (Pob.)", Some("012801")),
            DirectoryEntry::new("031410017", "Longos", Some("031410")),
        ],
    )
}

fn adams(id: &str) -> AddressRecord {
    AddressRecord::new(id, "01", "0128", "012801", "012801001")
}

fn malolos(id: &str) -> AddressRecord {
    AddressRecord::new(id, "03", "0314", "031410", "031410017")
}

#[tokio::test]
async fn test_all_four_levels_resolve() {
    let resolver = AddressResolver::new(Arc::new(ilocos()), None);

    let resolved = resolver.resolve(vec![adams("a1")]).await;

    let record = &resolved[0];
    assert_eq!(record.region_name.as_deref(), Some("Ilocos Region (Region I)"));
    assert_eq!(record.province_name.as_deref(), Some("Ilocos Norte"));
    assert_eq!(record.city_name.as_deref(), Some("Adams"));
    assert_eq!(record.barangay_name.as_deref(), Some("Adams (Pob.)"));
    // Codes are untouched
    assert_eq!(record.barangay, "012801001");
}

#[tokio::test]
async fn test_unknown_barangay_leaves_only_that_name_absent() {
    let resolver = AddressResolver::new(Arc::new(ilocos()), Some(4));

    let mut stale = adams("stale");
    stale.barangay = "012801999".to_string();
    let resolved = resolver.resolve(vec![stale, malolos("ok")]).await;

    assert_eq!(resolved[0].region_name.as_deref(), Some("Ilocos Region (Region I)"));
    assert_eq!(resolved[0].province_name.as_deref(), Some("Ilocos Norte"));
    assert_eq!(resolved[0].city_name.as_deref(), Some("Adams"));
    assert_eq!(resolved[0].barangay_name, None);

    assert!(resolved[1].is_fully_resolved());
    assert_eq!(resolved[1].barangay_name.as_deref(), Some("Longos"));
}

#[tokio::test]
async fn test_code_under_wrong_parent_is_not_found() {
    let resolver = AddressResolver::new(Arc::new(ilocos()), None);

    // Bulacan exists, but not under region 01
    let mut mixed = adams("mixed");
    mixed.province = "0314".to_string();
    let resolved = resolver.resolve(vec![mixed]).await;

    assert_eq!(resolved[0].province_name, None);
    assert_eq!(resolved[0].region_name.as_deref(), Some("Ilocos Region (Region I)"));
    // Deeper levels only need codes, so the chain carries on
    assert_eq!(resolved[0].city_name, None);
}

#[tokio::test]
async fn test_empty_batch() {
    let resolver = AddressResolver::new(Arc::new(ilocos()), Some(2));
    assert!(resolver.resolve(Vec::new()).await.is_empty());
}

/// Fails every province lookup
struct ProvincesDown(StaticDirectory);

#[async_trait]
impl AddressDirectory for ProvincesDown {
    async fn regions(&self) -> Result<Vec<DirectoryEntry>, ApiError> {
        self.0.regions().await
    }

    async fn provinces(&self, _region_code: &str) -> Result<Vec<DirectoryEntry>, ApiError> {
        Err(ApiError::Network("connection reset".to_string()))
    }

    async fn cities(&self, province_code: &str) -> Result<Vec<DirectoryEntry>, ApiError> {
        self.0.cities(province_code).await
    }

    async fn barangays(&self, city_code: &str) -> Result<Vec<DirectoryEntry>, ApiError> {
        self.0.barangays(city_code).await
    }
}

#[tokio::test]
async fn test_failing_level_degrades_to_absent_name() {
    let resolver = AddressResolver::new(Arc::new(ProvincesDown(ilocos())), None);

    let resolved = resolver.resolve(vec![adams("a1"), malolos("a2")]).await;

    for record in &resolved {
        assert!(record.region_name.is_some());
        assert_eq!(record.province_name, None);
        assert!(record.city_name.is_some());
        assert!(record.barangay_name.is_some());
    }
}

/// Counts the queries that reach the directory
struct Counting {
    inner: StaticDirectory,
    queries: AtomicUsize,
}

#[async_trait]
impl AddressDirectory for Counting {
    async fn regions(&self) -> Result<Vec<DirectoryEntry>, ApiError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.inner.regions().await
    }

    async fn provinces(&self, region_code: &str) -> Result<Vec<DirectoryEntry>, ApiError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.inner.provinces(region_code).await
    }

    async fn cities(&self, province_code: &str) -> Result<Vec<DirectoryEntry>, ApiError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.inner.cities(province_code).await
    }

    async fn barangays(&self, city_code: &str) -> Result<Vec<DirectoryEntry>, ApiError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.inner.barangays(city_code).await
    }
}

#[tokio::test]
async fn test_blank_codes_are_not_queried() {
    let directory = Arc::new(Counting {
        inner: ilocos(),
        queries: AtomicUsize::new(0),
    });
    let resolver = AddressResolver::new(Arc::clone(&directory) as Arc<dyn AddressDirectory>, None);

    let mut no_barangay = adams("a1");
    no_barangay.barangay = String::new();
    let resolved = resolver.resolve(vec![no_barangay]).await;

    assert_eq!(resolved[0].city_name.as_deref(), Some("Adams"));
    assert_eq!(resolved[0].barangay_name, None);
    assert_eq!(directory.queries.load(Ordering::SeqCst), 3);

    let blank = AddressRecord::new("a2", "", "", "", "");
    let resolved = resolver.resolve(vec![blank]).await;

    assert_eq!(resolved[0].region_name, None);
    assert_eq!(resolved[0].barangay_name, None);
    assert_eq!(directory.queries.load(Ordering::SeqCst), 3);
}

/// Slow directory that records how many chains overlap
struct Slow {
    inner: StaticDirectory,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl Slow {
    async fn regions_slowly(&self, delay: Duration) -> Vec<DirectoryEntry> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.inner.regions().await.unwrap()
    }
}

#[async_trait]
impl AddressDirectory for Slow {
    async fn regions(&self) -> Result<Vec<DirectoryEntry>, ApiError> {
        Ok(self.regions_slowly(Duration::from_millis(20)).await)
    }

    async fn provinces(&self, region_code: &str) -> Result<Vec<DirectoryEntry>, ApiError> {
        self.inner.provinces(region_code).await
    }

    async fn cities(&self, province_code: &str) -> Result<Vec<DirectoryEntry>, ApiError> {
        self.inner.cities(province_code).await
    }

    async fn barangays(&self, city_code: &str) -> Result<Vec<DirectoryEntry>, ApiError> {
        self.inner.barangays(city_code).await
    }
}

fn slow() -> Arc<Slow> {
    Arc::new(Slow {
        inner: ilocos(),
        in_flight: AtomicUsize::new(0),
        peak: AtomicUsize::new(0),
    })
}

fn batch() -> Vec<AddressRecord> {
    (0..6)
        .map(|i| if i % 2 == 0 { adams(&format!("a{i}")) } else { malolos(&format!("a{i}")) })
        .collect()
}

#[tokio::test]
async fn test_bounded_concurrency_preserves_order() {
    let directory = slow();
    let resolver = AddressResolver::new(Arc::clone(&directory) as Arc<dyn AddressDirectory>, Some(2));

    let resolved = resolver.resolve(batch()).await;

    let ids: Vec<_> = resolved.iter().map(|record| record.id.as_str()).collect();
    assert_eq!(ids, ["a0", "a1", "a2", "a3", "a4", "a5"]);
    assert!(resolved.iter().all(AddressRecord::is_fully_resolved));
    assert!(directory.peak.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn test_unbounded_starts_every_chain() {
    let directory = slow();
    let resolver = AddressResolver::new(Arc::clone(&directory) as Arc<dyn AddressDirectory>, None);

    let resolved = resolver.resolve(batch()).await;

    assert_eq!(resolved.len(), 6);
    assert_eq!(resolved[5].id, "a5");
    assert_eq!(directory.peak.load(Ordering::SeqCst), 6);
}

#[tokio::test]
async fn test_http_directory_chain() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/regions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "region_code": "01", "region_name": "Ilocos Region (Region I)", "psgc_code": "010000000" }
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/provinces"))
        .and(query_param("region_code", "01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "province_code": "0128", "province_name": "Ilocos Norte", "region_code": "01" }
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cities"))
        .and(query_param("province_code", "0128"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "code": "012801", "name": "Adams", "parent": "0128" }
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/barangays"))
        .and(query_param("city_code", "012801"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({ "message": "Directory maintenance" })))
        .mount(&server)
        .await;

    let directory = HttpDirectory::new(&server.uri(), Duration::from_secs(5)).unwrap();
    let barangays = directory.barangays("012801").await;
    assert_eq!(
        barangays.unwrap_err(),
        ApiError::Rejected {
            status: 503,
            message: "Directory maintenance".to_string(),
        }
    );

    let resolver = AddressResolver::new(Arc::new(directory), Some(1));
    let resolved = resolver.resolve(vec![adams("a1")]).await;

    assert_eq!(resolved[0].region_name.as_deref(), Some("Ilocos Region (Region I)"));
    assert_eq!(resolved[0].province_name.as_deref(), Some("Ilocos Norte"));
    assert_eq!(resolved[0].city_name.as_deref(), Some("Adams"));
    assert_eq!(resolved[0].barangay_name, None);
}

#[tokio::test]
async fn test_static_directory_loads_dataset_files() {
    let dir = std::env::temp_dir().join(format!("motoshop-directory-{}", std::process::id()));
    tokio::fs::create_dir_all(&dir).await.unwrap();

    let files = [
        (
            "region.json",
            json!([{ "id": 1, "psgc_code": "010000000", "region_name": "Ilocos Region (Region I)", "region_code": "01" }]),
        ),
        (
            "province.json",
            json!([{ "province_code": "0128", "province_name": "Ilocos Norte", "psgc_code": "012800000", "region_code": "01" }]),
        ),
        (
            "city.json",
            json!([{ "city_code": "012801", "city_name": "Adams", "province_code": "0128", "psgc_code": "012801000", "region_desc": "01" }]),
        ),
        (
            "barangay.json",
            json!([{ "brgy_code": "012801001", "brgy_name": "Adams (Pob.)", "city_code": "012801", "province_code": "0128", "region_code": "01" }]),
        ),
    ];
    for (name, contents) in files {
        tokio::fs::write(dir.join(name), contents.to_string()).await.unwrap();
    }

    let directory = StaticDirectory::load(&dir).await.unwrap();
    assert_eq!(directory.counts(), [1, 1, 1, 1]);

    let resolved = AddressResolver::new(Arc::new(directory), None)
        .resolve(vec![adams("a1")])
        .await;
    assert!(resolved[0].is_fully_resolved());

    tokio::fs::remove_file(dir.join("barangay.json")).await.unwrap();
    assert!(StaticDirectory::load(&dir).await.is_err());

    tokio::fs::remove_dir_all(&dir).await.unwrap();
}
