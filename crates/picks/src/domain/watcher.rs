use std::{sync::Arc, time::Duration};

use log::{error, info};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use super::Reconciler;

/// Runs a feed sync cycle every `sync_interval` until cancelled
pub struct SyncWatcher {
    reconciler: Arc<Reconciler>,
    sync_interval: Duration,
    cancel_token: CancellationToken,
}

impl SyncWatcher {
    pub fn new(
        reconciler: Arc<Reconciler>,
        cancel_token: CancellationToken,
        sync_interval: Duration,
    ) -> Self {
        Self {
            reconciler,
            sync_interval,
            cancel_token,
        }
    }

    pub async fn watch(&self) -> Result<(), anyhow::Error> {
        info!("Starting feed sync watcher");

        loop {
            if self.cancel_token.is_cancelled() {
                info!("Feed sync watcher received cancellation");
                break;
            }

            // A failed cycle is retried on the next tick, nothing in it is fatal
            if let Err(e) = self.reconciler.sync_cycle().await {
                error!("Feed sync error: {}", e);
            }

            tokio::select! {
                _ = sleep(self.sync_interval) => continue,
                _ = self.cancel_token.cancelled() => {
                    info!("Feed sync watcher cancelled during sleep");
                    break;
                }
            }
        }

        Ok(())
    }
}
