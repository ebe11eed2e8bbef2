//! Background requeue of tasks whose worker vanished mid-claim.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::store::Database;

/// Periodically move expired `in_progress` tasks back to `pending`.
///
/// `claim_oldest_pending` requeues lazily as well, so this only keeps the
/// visible task state honest between claims. Exits once `shutdown` flips to
/// `true` or its sender is dropped.
pub fn spawn_lease_sweeper(
    store: Arc<dyn Database>,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = store.requeue_expired(Utc::now()).await {
                        warn!(error = %e, "Lease sweep failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!("Lease sweeper stopping");
                        break;
                    }
                }
            }
        }
    })
}
