use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use rail_order::ExpiryReaper;

/// Runs the reaper on its own task until `shutdown` flips to true.
pub fn start_expiry_worker(
    reaper: Arc<ExpiryReaper>,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    info!(interval_seconds = interval.as_secs(), "Starting expiry worker");
    tokio::spawn(async move { reaper.run(interval, shutdown).await })
}
