//! Wiring from configuration to the HTTP adapters and the reconciler.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sheet_sync_config::Config;
use sheet_sync_http::{RestEventStore, SheetBackendClient};
use sheet_sync_reconciler::{Reconciler, SystemClock};
use tracing::info;

pub fn event_store(config: &Config) -> Result<Arc<RestEventStore>> {
    let url = config.store_url()?;
    let key = config.store_key()?;
    let store = RestEventStore::new(url.as_str(), key, config.request_timeout())
        .context("failed to build event store client")?;
    Ok(Arc::new(store))
}

pub fn sheet_client(config: &Config) -> Result<Arc<SheetBackendClient>> {
    let url = config.sheets_url()?;
    let client = SheetBackendClient::new(
        url.as_str(),
        config.sheets_token.clone(),
        config.request_timeout(),
    )
    .context("failed to build sheet backend client")?;
    Ok(Arc::new(client))
}

/// Build and start a reconciler over the HTTP adapters.
pub fn start_reconciler(config: &Config) -> Result<Reconciler> {
    let reconciler_config = config.reconciler.to_reconciler_config();
    info!(
        max_attempts = reconciler_config.retry.max_attempts,
        drain_cap = reconciler_config.drain_cap,
        "Starting reconciler"
    );

    let reconciler = Reconciler::new(
        reconciler_config,
        event_store(config)?,
        sheet_client(config)?,
        Arc::new(SystemClock),
    );
    reconciler.start()?;
    Ok(reconciler)
}

/// Wait for the backlog to drain, bounded by `timeout`.
///
/// While the backend reports unhealthy the reconciler keeps tasks queued, so
/// an unbounded wait could hang.
pub async fn wait_idle(reconciler: &Reconciler, timeout: Duration) -> Result<()> {
    tokio::time::timeout(timeout, reconciler.wait_idle())
        .await
        .with_context(|| format!("backlog did not drain within {}s", timeout.as_secs()))
}
