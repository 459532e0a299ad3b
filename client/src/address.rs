//! Address records and their resolution against the administrative directory
//!
//! An address stores four codes (region, province, city, barangay). Views
//! want names, which come from a four-level directory where each level is
//! queried with the parent level's code. [`AddressResolver`] fills in the
//! names for a batch of records; lookups that fail or find nothing leave
//! the name absent and never affect other levels or records.

use crate::error::{ApiError, extract_error_message};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use futures::future::join_all;
use motoshop_runtime::metrics::ResolverMetrics;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// A user's delivery address
///
/// The `*_name` fields are never read from the server; only the resolver
/// fills them in.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressRecord {
    /// Server-assigned id
    #[serde(rename = "_id")]
    pub id: String,
    /// Region code; blank when the server sent none
    #[serde(default, deserialize_with = "code_or_blank")]
    pub region: String,
    /// Province code
    #[serde(default, deserialize_with = "code_or_blank")]
    pub province: String,
    /// City or municipality code
    #[serde(default, deserialize_with = "code_or_blank")]
    pub city: String,
    /// Barangay code
    #[serde(default, deserialize_with = "code_or_blank")]
    pub barangay: String,
    /// Street line
    #[serde(default)]
    pub address: String,
    /// Postal code
    #[serde(default)]
    pub postal_code: String,
    /// Whether this is the user's default address
    #[serde(default)]
    pub is_default: bool,
    /// Creation time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Resolved region name
    #[serde(default, skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub region_name: Option<String>,
    /// Resolved province name
    #[serde(default, skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub province_name: Option<String>,
    /// Resolved city name
    #[serde(default, skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub city_name: Option<String>,
    /// Resolved barangay name
    #[serde(default, skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub barangay_name: Option<String>,
}

/// `null` reads as a blank code
fn code_or_blank<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl AddressRecord {
    /// Record with the given codes and nothing else
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        region: impl Into<String>,
        province: impl Into<String>,
        city: impl Into<String>,
        barangay: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            region: region.into(),
            province: province.into(),
            city: city.into(),
            barangay: barangay.into(),
            address: String::new(),
            postal_code: String::new(),
            is_default: false,
            created_at: None,
            region_name: None,
            province_name: None,
            city_name: None,
            barangay_name: None,
        }
    }

    /// Whether every level has a resolved name
    #[must_use]
    pub const fn is_fully_resolved(&self) -> bool {
        self.region_name.is_some()
            && self.province_name.is_some()
            && self.city_name.is_some()
            && self.barangay_name.is_some()
    }
}

/// One level of the administrative hierarchy
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DirectoryLevel {
    /// Regions (top level)
    Region,
    /// Provinces of a region
    Province,
    /// Cities and municipalities of a province
    City,
    /// Barangays of a city
    Barangay,
}

impl DirectoryLevel {
    /// Lowercase name
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Region => "region",
            Self::Province => "province",
            Self::City => "city",
            Self::Barangay => "barangay",
        }
    }
}

impl fmt::Display for DirectoryLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One `{code, name}` pair of the directory
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawEntry")]
pub struct DirectoryEntry {
    /// Code of this entry
    pub code: String,
    /// Human-readable name
    pub name: String,
    /// Code of the parent entry (absent for regions)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

impl DirectoryEntry {
    /// Create an entry
    #[must_use]
    pub fn new(code: impl Into<String>, name: impl Into<String>, parent: Option<&str>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            parent: parent.map(str::to_string),
        }
    }
}

/// Wire shape of a directory entry
///
/// Accepts plain `{code, name, parent}` as well as the Philippine address
/// dataset rows, where the keys depend on the level (`brgy_code`,
/// `brgy_name`, `city_code`, ...).
#[derive(Deserialize)]
struct RawEntry {
    code: Option<String>,
    name: Option<String>,
    parent: Option<String>,
    region_code: Option<String>,
    region_name: Option<String>,
    province_code: Option<String>,
    province_name: Option<String>,
    city_code: Option<String>,
    city_name: Option<String>,
    brgy_code: Option<String>,
    brgy_name: Option<String>,
}

impl TryFrom<RawEntry> for DirectoryEntry {
    type Error = String;

    fn try_from(raw: RawEntry) -> Result<Self, Self::Error> {
        // Most specific level first: a barangay row also carries its city code
        let (code, name, parent) = if raw.brgy_code.is_some() {
            (raw.brgy_code, raw.brgy_name, raw.city_code)
        } else if raw.city_code.is_some() {
            (raw.city_code, raw.city_name, raw.province_code)
        } else if raw.province_code.is_some() {
            (raw.province_code, raw.province_name, raw.region_code)
        } else {
            (raw.region_code, raw.region_name, None)
        };

        let code = raw.code.or(code).ok_or("directory entry has no code")?;
        let name = raw.name.or(name).ok_or("directory entry has no name")?;

        Ok(Self {
            code,
            name,
            parent: raw.parent.or(parent),
        })
    }
}

/// The four-level administrative directory
#[async_trait]
pub trait AddressDirectory: Send + Sync {
    /// All regions
    async fn regions(&self) -> Result<Vec<DirectoryEntry>, ApiError>;

    /// Provinces of a region
    async fn provinces(&self, region_code: &str) -> Result<Vec<DirectoryEntry>, ApiError>;

    /// Cities and municipalities of a province
    async fn cities(&self, province_code: &str) -> Result<Vec<DirectoryEntry>, ApiError>;

    /// Barangays of a city
    async fn barangays(&self, city_code: &str) -> Result<Vec<DirectoryEntry>, ApiError>;
}

/// [`AddressDirectory`] served over HTTP
///
/// `GET {base}/regions`, `{base}/provinces?region_code=..`,
/// `{base}/cities?province_code=..`, `{base}/barangays?city_code=..`, each
/// answering with a JSON array of entries.
#[derive(Clone)]
pub struct HttpDirectory {
    client: Client,
    base_url: String,
}

impl HttpDirectory {
    /// Directory rooted at `base_url`
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Network`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    #[tracing::instrument(skip(self))]
    async fn fetch(&self, segment: &str, filter: Option<(&str, &str)>) -> Result<Vec<DirectoryEntry>, ApiError> {
        let mut request = self.client.get(format!("{}/{segment}", self.base_url));
        if let Some(filter) = filter {
            request = request.query(&[filter]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(ApiError::Rejected {
                status: status.as_u16(),
                message: extract_error_message(&text).unwrap_or_default(),
            });
        }

        serde_json::from_str(&text).map_err(|e| ApiError::MalformedResponse(e.to_string()))
    }
}

#[async_trait]
impl AddressDirectory for HttpDirectory {
    async fn regions(&self) -> Result<Vec<DirectoryEntry>, ApiError> {
        self.fetch("regions", None).await
    }

    async fn provinces(&self, region_code: &str) -> Result<Vec<DirectoryEntry>, ApiError> {
        self.fetch("provinces", Some(("region_code", region_code))).await
    }

    async fn cities(&self, province_code: &str) -> Result<Vec<DirectoryEntry>, ApiError> {
        self.fetch("cities", Some(("province_code", province_code))).await
    }

    async fn barangays(&self, city_code: &str) -> Result<Vec<DirectoryEntry>, ApiError> {
        self.fetch("barangays", Some(("city_code", city_code))).await
    }
}

/// Failure loading a directory dataset from disk
#[derive(Debug, Error)]
pub enum DirectoryLoadError {
    /// File could not be read
    #[error("Failed to read {path}: {source}")]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// File is not a JSON array of entries
    #[error("Failed to parse {path}: {source}")]
    Parse {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },
}

/// In-memory [`AddressDirectory`]
#[derive(Clone, Debug, Default)]
pub struct StaticDirectory {
    regions: Vec<DirectoryEntry>,
    provinces: Vec<DirectoryEntry>,
    cities: Vec<DirectoryEntry>,
    barangays: Vec<DirectoryEntry>,
}

impl StaticDirectory {
    /// Directory over the given entries
    #[must_use]
    pub const fn new(
        regions: Vec<DirectoryEntry>,
        provinces: Vec<DirectoryEntry>,
        cities: Vec<DirectoryEntry>,
        barangays: Vec<DirectoryEntry>,
    ) -> Self {
        Self {
            regions,
            provinces,
            cities,
            barangays,
        }
    }

    /// Load `region.json`, `province.json`, `city.json` and `barangay.json`
    /// from `dir`
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryLoadError`] if a file is missing or malformed.
    pub async fn load(dir: &Path) -> Result<Self, DirectoryLoadError> {
        Ok(Self {
            regions: load_entries(&dir.join("region.json")).await?,
            provinces: load_entries(&dir.join("province.json")).await?,
            cities: load_entries(&dir.join("city.json")).await?,
            barangays: load_entries(&dir.join("barangay.json")).await?,
        })
    }

    /// Number of entries per level: regions, provinces, cities, barangays
    #[must_use]
    pub fn counts(&self) -> [usize; 4] {
        [
            self.regions.len(),
            self.provinces.len(),
            self.cities.len(),
            self.barangays.len(),
        ]
    }

    /// Whether no entries are loaded at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts().iter().all(|count| *count == 0)
    }
}

async fn load_entries(path: &Path) -> Result<Vec<DirectoryEntry>, DirectoryLoadError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| DirectoryLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;

    serde_json::from_slice(&bytes).map_err(|source| DirectoryLoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn children_of(entries: &[DirectoryEntry], parent: &str) -> Vec<DirectoryEntry> {
    entries
        .iter()
        .filter(|entry| entry.parent.as_deref() == Some(parent))
        .cloned()
        .collect()
}

#[async_trait]
impl AddressDirectory for StaticDirectory {
    async fn regions(&self) -> Result<Vec<DirectoryEntry>, ApiError> {
        Ok(self.regions.clone())
    }

    async fn provinces(&self, region_code: &str) -> Result<Vec<DirectoryEntry>, ApiError> {
        Ok(children_of(&self.provinces, region_code))
    }

    async fn cities(&self, province_code: &str) -> Result<Vec<DirectoryEntry>, ApiError> {
        Ok(children_of(&self.cities, province_code))
    }

    async fn barangays(&self, city_code: &str) -> Result<Vec<DirectoryEntry>, ApiError> {
        Ok(children_of(&self.barangays, city_code))
    }
}

/// Fills in the resolved-name fields of address records
#[derive(Clone)]
pub struct AddressResolver {
    directory: Arc<dyn AddressDirectory>,
    concurrency: Option<usize>,
}

impl AddressResolver {
    /// Resolver over `directory` with at most `concurrency` records in flight
    ///
    /// `None` or `Some(0)` resolves every record at once.
    #[must_use]
    pub fn new(directory: Arc<dyn AddressDirectory>, concurrency: Option<usize>) -> Self {
        Self {
            directory,
            concurrency: concurrency.filter(|limit| *limit > 0),
        }
    }

    /// Limit on records resolved at the same time
    #[must_use]
    pub const fn concurrency(&self) -> Option<usize> {
        self.concurrency
    }

    /// Resolve a batch; output order matches input order
    ///
    /// Each record runs the region, province, city, barangay chain. A level
    /// that errors or has no matching code leaves its name absent.
    #[tracing::instrument(skip_all, fields(records = records.len(), concurrency = ?self.concurrency))]
    pub async fn resolve(&self, records: Vec<AddressRecord>) -> Vec<AddressRecord> {
        let started = Instant::now();
        let chains = records.into_iter().map(|record| self.resolve_record(record));

        let resolved: Vec<AddressRecord> = match self.concurrency {
            Some(limit) => futures::stream::iter(chains).buffered(limit).collect().await,
            None => join_all(chains).await,
        };

        ResolverMetrics::record_batch(started.elapsed());
        resolved
    }

    async fn resolve_record(&self, mut record: AddressRecord) -> AddressRecord {
        let directory = self.directory.as_ref();

        let region_name = if blank(DirectoryLevel::Region, &[&record.region]) {
            None
        } else {
            lookup(DirectoryLevel::Region, directory.regions(), &record.region).await
        };
        let province_name = if blank(DirectoryLevel::Province, &[&record.region, &record.province]) {
            None
        } else {
            lookup(
                DirectoryLevel::Province,
                directory.provinces(&record.region),
                &record.province,
            )
            .await
        };
        let city_name = if blank(DirectoryLevel::City, &[&record.province, &record.city]) {
            None
        } else {
            lookup(DirectoryLevel::City, directory.cities(&record.province), &record.city).await
        };
        let barangay_name = if blank(DirectoryLevel::Barangay, &[&record.city, &record.barangay]) {
            None
        } else {
            lookup(
                DirectoryLevel::Barangay,
                directory.barangays(&record.city),
                &record.barangay,
            )
            .await
        };

        record.region_name = region_name;
        record.province_name = province_name;
        record.city_name = city_name;
        record.barangay_name = barangay_name;
        record
    }
}

/// A level whose own or parent code is blank is not queried
fn blank(level: DirectoryLevel, codes: &[&str]) -> bool {
    let blank = codes.iter().any(|code| code.trim().is_empty());
    if blank {
        ResolverMetrics::record_lookup(level.name(), "missing");
        tracing::debug!(%level, "Blank code, directory not queried");
    }
    blank
}

/// Await one level's query and pick the entry with `code`
async fn lookup<F>(level: DirectoryLevel, query: F, code: &str) -> Option<String>
where
    F: Future<Output = Result<Vec<DirectoryEntry>, ApiError>>,
{
    match query.await {
        Ok(entries) => {
            let name = entries
                .into_iter()
                .find(|entry| entry.code == code)
                .map(|entry| entry.name);

            if name.is_some() {
                ResolverMetrics::record_lookup(level.name(), "found");
            } else {
                ResolverMetrics::record_lookup(level.name(), "missing");
                tracing::debug!(%level, code, "No directory entry for code");
            }
            name
        },
        Err(error) => {
            ResolverMetrics::record_lookup(level.name(), "error");
            tracing::warn!(%level, code, %error, "Directory lookup failed");
            None
        },
    }
}
