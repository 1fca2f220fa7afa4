pub mod scheduler;
pub mod sync_service;

pub use scheduler::SyncScheduler;
pub use sync_service::{SkippedReport, SyncError, SyncReport, SyncService, SyncSummary};
