use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::db::repository;
use crate::error::AppError;
use crate::services::sync_service::{SyncReport, SyncService};
use crate::todoist::TodoistApi;

/// Periodic reconciliation. Re-reads the interval from settings each cycle
/// so a settings change takes effect without a restart.
pub struct SyncScheduler {
    db: SqlitePool,
    todoist: Arc<dyn TodoistApi>,
    sync_lock: Arc<Mutex<()>>,
}

impl SyncScheduler {
    pub fn new(db: SqlitePool, todoist: Arc<dyn TodoistApi>, sync_lock: Arc<Mutex<()>>) -> Self {
        Self {
            db,
            todoist,
            sync_lock,
        }
    }

    pub async fn start(self) {
        info!("Starting auto-sync scheduler");

        loop {
            let minutes = match repository::get_settings(&self.db).await {
                Ok(s) => s.scrape_interval_minutes.max(1) as u64,
                Err(e) => {
                    warn!("Could not read settings, using hourly interval: {}", e);
                    60
                }
            };
            tokio::time::sleep(Duration::from_secs(minutes * 60)).await;

            match self.run_sync().await {
                Ok(report) => {
                    info!(
                        "Auto-sync completed - added: {}, updated: {}, errors: {}",
                        report.added.len(),
                        report.updated.len(),
                        report.errors.len()
                    );
                }
                Err(e) => {
                    // A failed cycle never kills the loop.
                    warn!("Auto-sync failed: {:?}", e);
                }
            }
        }
    }

    async fn run_sync(&self) -> Result<SyncReport, AppError> {
        // Wait for any manual run to finish rather than interleaving.
        let _guard = self.sync_lock.lock().await;
        let service = SyncService::new(self.db.clone(), self.todoist.clone());
        service.reconcile().await
    }
}
