use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use vitrina_core::{AppError, ReaperConfig};
use vitrina_db::UploadRecordStore;
use vitrina_storage::ObjectStorage;

use super::bounded;

/// Result of one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub orphaned: usize,
    pub objects_deleted: usize,
    pub delete_failures: usize,
    pub batches: usize,
}

/// Reclaims upload intents whose confirm deadline passed.
///
/// Stateless: several instances may sweep at once, the store hands each one a disjoint
/// set of rows. Only `Pending` records are ever touched.
pub struct ExpiryReaper {
    store: Arc<dyn UploadRecordStore>,
    storage: Arc<dyn ObjectStorage>,
    config: ReaperConfig,
    storage_timeout: Duration,
}

/// Running reaper loop
pub struct ReaperHandle {
    shutdown_tx: mpsc::Sender<()>,
    join: JoinHandle<()>,
}

impl ReaperHandle {
    /// Stop the loop after the current sweep and wait for it to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Err(e) = self.join.await {
            tracing::error!(error = %e, "Expiry reaper task ended abnormally");
        }
    }
}

impl ExpiryReaper {
    pub fn new(
        store: Arc<dyn UploadRecordStore>,
        storage: Arc<dyn ObjectStorage>,
        config: ReaperConfig,
        storage_timeout: Duration,
    ) -> Self {
        Self {
            store,
            storage,
            config,
            storage_timeout,
        }
    }

    /// Claim and orphan every expired `Pending` record, batch by batch.
    #[tracing::instrument(skip(self), fields(reaper.batch_size = self.config.batch_size))]
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport, AppError> {
        let mut report = SweepReport::default();
        let batch_size = self.config.batch_size.max(1);

        loop {
            let claimed = self.store.claim_expired(now, batch_size).await?;
            report.batches += 1;
            report.orphaned += claimed.len();

            if self.config.delete_objects {
                for record in &claimed {
                    match bounded(
                        self.storage_timeout,
                        "delete",
                        self.storage.delete(&record.storage_key),
                    )
                    .await
                    {
                        Ok(()) => report.objects_deleted += 1,
                        Err(e) => {
                            report.delete_failures += 1;
                            tracing::warn!(
                                error = %e,
                                record_id = %record.id,
                                storage_key = %record.storage_key,
                                "Failed to delete orphaned object"
                            );
                        }
                    }
                }
            }

            if claimed.len() < batch_size as usize {
                break;
            }
        }

        if report.orphaned > 0 {
            tracing::info!(
                orphaned = report.orphaned,
                objects_deleted = report.objects_deleted,
                delete_failures = report.delete_failures,
                batches = report.batches,
                "Expiry sweep completed"
            );
        } else {
            tracing::debug!("Expiry sweep found nothing to reclaim");
        }

        Ok(report)
    }

    /// Start the background sweep loop on the configured interval.
    pub fn start(self: Arc<Self>) -> ReaperHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let period = self.config.interval;

        let join = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            tracing::info!(interval_secs = period.as_secs(), "Expiry reaper started");

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = self.sweep(Utc::now()).await {
                            tracing::error!(error = %e, "Expiry sweep failed");
                        }
                    }
                    _ = shutdown_rx.recv() => break,
                }
            }

            tracing::info!("Expiry reaper stopped");
        });

        ReaperHandle { shutdown_tx, join }
    }
}
