//! Motoshop profile loader
//!
//! Loads the signed-in user's addresses, motorcycles, fuel log and orders
//! the way the profile page does, then prints every lifecycle snapshot and
//! the profile totals as JSON.
//!
//! Configuration comes from the environment (and `.env`), see
//! [`motoshop_client::config`].

use anyhow::Context;
use motoshop_client::address::{AddressDirectory, AddressResolver, HttpDirectory, StaticDirectory};
use motoshop_client::config::{Config, DEFAULT_LOG_FILTER};
use motoshop_client::resources::ResourceAction;
use motoshop_client::shop::AddressAction;
use motoshop_client::{HttpResourceApi, ShopAction, ShopEnvironment, ShopReducer, ShopState};
use motoshop_runtime::Store;
use motoshop_runtime::metrics::MetricsServer;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let config = Config::from_env().context("Invalid configuration")?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_new(&config.log_filter)
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(api = %config.api.base_url, policy = config.lifecycle.settle_policy.name(), "Starting Motoshop profile loader");

    let metrics = if config.print_metrics {
        let mut server = MetricsServer::new();
        server.start()?;
        Some(server)
    } else {
        None
    };

    let api = Arc::new(HttpResourceApi::new(&config.api)?);
    let resolver = build_resolver(&config).await?;
    if resolver.is_none() {
        info!("No address directory configured, addresses stay unresolved");
    }

    let store = Store::new(
        ShopState::with_settle_policy(config.lifecycle.settle_policy),
        ShopReducer::new(),
        ShopEnvironment::new(api, resolver),
    );

    let mut handles = Vec::new();
    for action in [
        ShopAction::Addresses(AddressAction::Records(ResourceAction::owned())),
        ShopAction::Motorcycles(ResourceAction::owned()),
        ShopAction::Fuel(ResourceAction::owned()),
        ShopAction::Orders(ResourceAction::owned()),
    ] {
        handles.push(store.send(action).await?);
    }
    for mut handle in handles {
        handle.wait().await;
    }

    let report = store
        .state(|s| {
            serde_json::json!({
                "addresses": s.addresses.records.owned.snapshot(),
                "resolvedAddresses": s.addresses.resolved,
                "motorcycles": s.motorcycles.owned.snapshot(),
                "fuel": s.fuel.owned.snapshot(),
                "orders": s.orders.owned.snapshot(),
                "profile": s.profile_summary(),
            })
        })
        .await;

    println!("{}", serde_json::to_string_pretty(&report)?);

    if let Some(rendered) = metrics.as_ref().and_then(MetricsServer::render) {
        println!("{rendered}");
    }

    store.shutdown(Duration::from_secs(5)).await?;
    info!("Done");

    Ok(())
}

/// HTTP directory when a URL is configured, static dataset when a data
/// folder is, otherwise nothing
async fn build_resolver(config: &Config) -> anyhow::Result<Option<AddressResolver>> {
    let directory: Arc<dyn AddressDirectory> = if let Some(url) = &config.directory.base_url {
        info!(url = %url, "Resolving addresses over HTTP");
        Arc::new(HttpDirectory::new(url, config.api.request_timeout)?)
    } else if let Some(dir) = &config.directory.data_dir {
        let directory = StaticDirectory::load(dir)
            .await
            .with_context(|| format!("Failed to load address directory from {}", dir.display()))?;
        let [regions, provinces, cities, barangays] = directory.counts();
        info!(regions, provinces, cities, barangays, "Loaded address directory");
        Arc::new(directory)
    } else {
        return Ok(None);
    };

    Ok(Some(AddressResolver::new(directory, config.directory.resolve_concurrency)))
}
