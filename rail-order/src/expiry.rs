use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use rail_core::repository::OrderStore;
use rail_core::CoreResult;

const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

/// Cancels PENDING orders that outlived `ttl`, through the same store path as
/// a user cancellation so their seat slots are released the same way.
pub struct ExpiryReaper {
    orders: Arc<dyn OrderStore>,
    ttl: chrono::Duration,
}

impl ExpiryReaper {
    pub fn new(orders: Arc<dyn OrderStore>, ttl: chrono::Duration) -> Self {
        Self { orders, ttl }
    }

    /// One pass. Returns how many orders this pass cancelled; orders paid or
    /// cancelled concurrently are skipped.
    pub async fn sweep(&self, now: DateTime<Utc>) -> CoreResult<usize> {
        let cutoff = now - self.ttl;
        let expired = self.orders.list_expired_pending(cutoff).await?;

        let mut cancelled = 0;
        for order_id in expired {
            match self.orders.cancel_pending(order_id).await {
                Ok(true) => {
                    cancelled += 1;
                    info!(order_id, "Expired order cancelled");
                }
                Ok(false) => debug!(order_id, "Order settled before expiry"),
                Err(e) => warn!(order_id, error = %e, "Failed to cancel expired order"),
            }
        }
        Ok(cancelled)
    }

    /// Sweeps every `interval` until `shutdown` flips to true or its sender is dropped.
    pub async fn run(&self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval.max(MIN_SWEEP_INTERVAL));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(ttl_minutes = self.ttl.num_minutes(), "Expiry reaper started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.sweep(Utc::now()).await {
                        Ok(0) => {}
                        Ok(n) => info!(cancelled = n, "Expiry sweep finished"),
                        Err(e) => error!(error = %e, "Expiry sweep failed"),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Expiry reaper stopped");
    }
}
