//! Prometheus metrics for observability and monitoring.
//!
//! This module provides metric collection for the client runtime:
//! - Store commands and reducer execution
//! - Effect execution
//! - Network operation settlement (per resource)
//! - Address directory lookups
//!
//! # Example
//!
//! ```rust,no_run
//! use motoshop_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new();
//! server.start()?;
//!
//! // ... run the client ...
//!
//! if let Some(rendered) = server.render() {
//!     println!("{rendered}");
//! }
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;
use thiserror::Error;

// Re-export metrics macros for use in other modules
pub use metrics::{counter, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus metrics recorder.
///
/// Installs the global recorder and renders the collected metrics in the
/// Prometheus text format.
#[derive(Default)]
pub struct MetricsServer {
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a metrics server that has not been started yet.
    #[must_use]
    pub const fn new() -> Self {
        Self { handle: None }
    }

    /// Register metric descriptions and install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns error if metrics exporter cannot be built or installed.
    ///
    /// # Note
    ///
    /// If a metrics recorder is already installed (e.g., in tests), this
    /// logs a warning and succeeds without a handle.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[
                    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
                ],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!("Metrics recorder installed");
                Ok(())
            },
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            },
        }
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if the recorder was not installed by this server.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
fn register_metrics() {
    // Store Metrics
    describe_counter!("store.commands.total", "Total number of actions sent to stores");
    describe_histogram!(
        "store.reducer.duration_seconds",
        "Time taken to execute reducers"
    );
    describe_counter!(
        "store.effects.executed",
        "Total number of effects executed, by effect type"
    );
    describe_counter!(
        "store.shutdown.rejected_actions",
        "Actions rejected because the store was shutting down"
    );

    // Lifecycle Metrics
    describe_counter!(
        "lifecycle.requests.total",
        "Network operations started, by resource and operation"
    );
    describe_counter!(
        "lifecycle.settled.total",
        "Network operations settled, by resource, operation and outcome"
    );
    describe_counter!(
        "lifecycle.stale.total",
        "Settlements dropped because a newer request was issued"
    );
    describe_histogram!(
        "lifecycle.request.duration_seconds",
        "Time taken by network operations"
    );

    // Address Resolution Metrics
    describe_counter!(
        "resolver.lookups.total",
        "Directory lookups, by level and outcome"
    );
    describe_histogram!(
        "resolver.batch.duration_seconds",
        "Time taken to resolve a batch of address records"
    );
}

/// Network operation metrics recorder.
pub struct LifecycleMetrics;

impl LifecycleMetrics {
    /// Record that an operation was started.
    pub fn record_request(resource: &'static str, operation: &'static str) {
        counter!("lifecycle.requests.total", "resource" => resource, "operation" => operation)
            .increment(1);
    }

    /// Record the settlement of an operation.
    pub fn record_settled(
        resource: &'static str,
        operation: &'static str,
        outcome: &'static str,
        duration: Duration,
    ) {
        counter!(
            "lifecycle.settled.total",
            "resource" => resource,
            "operation" => operation,
            "outcome" => outcome
        )
        .increment(1);
        histogram!("lifecycle.request.duration_seconds", "resource" => resource)
            .record(duration.as_secs_f64());
    }

    /// Record a settlement that was superseded by a newer request.
    pub fn record_stale(resource: &'static str, operation: &'static str) {
        counter!("lifecycle.stale.total", "resource" => resource, "operation" => operation)
            .increment(1);
    }
}

/// Address resolution metrics recorder.
pub struct ResolverMetrics;

impl ResolverMetrics {
    /// Record one directory lookup.
    ///
    /// `outcome` is `found`, `missing` or `error`.
    pub fn record_lookup(level: &'static str, outcome: &'static str) {
        counter!("resolver.lookups.total", "level" => level, "outcome" => outcome).increment(1);
    }

    /// Record a completed batch resolution.
    pub fn record_batch(duration: Duration) {
        histogram!("resolver.batch.duration_seconds").record(duration.as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_server_creation() {
        let server = MetricsServer::new();
        assert!(server.handle().is_none());
        assert!(server.render().is_none());
    }

    #[test]
    fn test_metrics_server_render() -> Result<(), MetricsError> {
        let mut server = MetricsServer::new();
        server.start()?;

        LifecycleMetrics::record_request("motorcycle", "create");
        LifecycleMetrics::record_settled(
            "motorcycle",
            "create",
            "failed",
            Duration::from_millis(40),
        );
        ResolverMetrics::record_lookup("region", "found");

        // If another test installed the recorder first, handle is None.
        // Metrics are still recorded globally.
        if let Some(rendered) = server.render() {
            assert!(rendered.contains("lifecycle_settled_total"));
            assert!(rendered.contains("resolver_lookups_total"));
        }
        Ok(())
    }
}
