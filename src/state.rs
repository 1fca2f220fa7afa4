use std::sync::Arc;

use sqlx::SqlitePool;
use tokio::sync::Mutex;

use crate::todoist::TodoistApi;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub todoist: Arc<dyn TodoistApi>,
    /// At most one reconciliation run in flight; merge and reconcile both
    /// read-modify-write the store, so runs must never interleave.
    pub sync_lock: Arc<Mutex<()>>,
}
