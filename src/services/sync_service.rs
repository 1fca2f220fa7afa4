//! The reconciliation engine: classifies every active assignment against
//! remote state and issues the minimum set of remote writes.
//!
//! One run never aborts on a per-record failure; each record gets its
//! attempt and failures land in the report. Only an unusable credential or
//! an unusable project short-circuits the run as a whole.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::dates;
use crate::db::repository;
use crate::error::AppError;
use crate::models::{Assignment, AssignmentStatus, DateMode};
use crate::todoist::dto::Task;
use crate::todoist::{TodoistApi, format};

pub struct SyncService {
    db: SqlitePool,
    todoist: Arc<dyn TodoistApi>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub added: Vec<String>,
    pub updated: Vec<String>,
    pub skipped: SkippedReport,
    pub errors: Vec<SyncError>,
    pub summary: SyncSummary,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedReport {
    /// Completed locally; the remote API is never consulted for these.
    pub local: Vec<String>,
    /// Completed on the Todoist side; not resurrected.
    pub todoist_completed: Vec<String>,
    /// Exists remotely and nothing differs; no write issued.
    pub no_changes: Vec<String>,
    /// Previously synced but gone from both remote listings; not recreated.
    pub orphaned: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncError {
    pub title: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncSummary {
    pub total: usize,
    pub processed: usize,
    pub failed: usize,
}

enum RecordOutcome {
    Added,
    Updated,
    NoChanges,
    RemoteCompleted,
    Orphaned,
}

impl SyncService {
    pub fn new(db: SqlitePool, todoist: Arc<dyn TodoistApi>) -> Self {
        Self { db, todoist }
    }

    pub async fn reconcile(&self) -> Result<SyncReport, AppError> {
        let settings = repository::get_settings(&self.db).await?;
        let records = repository::fetch_assignments(&self.db).await?;

        let mut report = SyncReport::default();
        report.summary.total = records.len();

        let token = settings.todoist_token.trim().to_string();
        if token.is_empty() {
            report.errors.push(SyncError {
                title: "Sync".to_string(),
                reason: "Todoist token not configured".to_string(),
            });
            report.summary.failed = report.summary.total;
            self.finish(&report).await?;
            return Ok(report);
        }

        // Completed-local records are set aside before any remote call.
        // Skip, never auto-close.
        let (completed_local, candidates): (Vec<_>, Vec<_>) = records
            .into_iter()
            .partition(|a| a.status.is_completed());
        for a in &completed_local {
            report.skipped.local.push(a.title.clone());
        }

        let project_id = match self
            .todoist
            .get_or_create_project(&settings.project_name, &token)
            .await
        {
            Ok(id) => id,
            Err(e) => {
                report.errors.push(SyncError {
                    title: "Sync".to_string(),
                    reason: format!("Project '{}' unavailable: {}", settings.project_name, e),
                });
                report.summary.failed = report.summary.total;
                self.finish(&report).await?;
                return Ok(report);
            }
        };

        // Both listings are fetched once per run. A transient listing
        // failure is treated as an empty listing; the ledger keeps that
        // from turning into a duplicate-creation storm.
        let active_tasks = self
            .todoist
            .list_active_tasks(&project_id, &token)
            .await
            .unwrap_or_else(|e| {
                warn!("active task listing failed: {}", e);
                Vec::new()
            });
        let completed_tasks = self
            .todoist
            .list_completed_tasks(&project_id, &token)
            .await
            .unwrap_or_else(|e| {
                warn!("completed task listing failed: {}", e);
                Vec::new()
            });

        let active_map = linkage_map(&active_tasks);
        let completed_map = linkage_map(&completed_tasks);
        let ledger: HashMap<String, String> = repository::fetch_ledger(&self.db)
            .await?
            .into_iter()
            .map(|e| (e.assignment_id, e.remote_task_id))
            .collect();

        let today = Local::now().date_naive();
        let now = Utc::now().to_rfc3339();

        for record in &candidates {
            let outcome = self
                .sync_record(
                    record,
                    &project_id,
                    &token,
                    settings.date_mode,
                    &active_map,
                    &completed_map,
                    &ledger,
                    today,
                    &now,
                )
                .await;
            match outcome {
                Ok(RecordOutcome::Added) => report.added.push(record.title.clone()),
                Ok(RecordOutcome::Updated) => report.updated.push(record.title.clone()),
                Ok(RecordOutcome::NoChanges) => {
                    report.skipped.no_changes.push(record.title.clone())
                }
                Ok(RecordOutcome::RemoteCompleted) => {
                    report.skipped.todoist_completed.push(record.title.clone())
                }
                Ok(RecordOutcome::Orphaned) => {
                    report.skipped.orphaned.push(record.title.clone())
                }
                Err(e) => {
                    report.summary.failed += 1;
                    report.errors.push(SyncError {
                        title: record.title.clone(),
                        reason: e,
                    });
                }
            }
        }

        report.summary.processed = report.summary.total - report.summary.failed;
        self.finish(&report).await?;
        info!(
            "Sync completed - added: {}, updated: {}, skipped: {}, errors: {}",
            report.added.len(),
            report.updated.len(),
            report.skipped.local.len()
                + report.skipped.todoist_completed.len()
                + report.skipped.no_changes.len()
                + report.skipped.orphaned.len(),
            report.errors.len()
        );
        Ok(report)
    }

    /// Classify one record and apply its outcome. Remote failures come back
    /// as the per-record error reason; store failures are store failures.
    #[allow(clippy::too_many_arguments)]
    async fn sync_record(
        &self,
        record: &Assignment,
        project_id: &str,
        token: &str,
        date_mode: DateMode,
        active_map: &HashMap<String, String>,
        completed_map: &HashMap<String, String>,
        ledger: &HashMap<String, String>,
        today: NaiveDate,
        now: &str,
    ) -> Result<RecordOutcome, String> {
        if let Some(remote_id) = active_map.get(&record.id) {
            let target = dates::compute_target_date(record, date_mode, today);
            let payload = format::build_task_payload(record, project_id, target);

            let task = self
                .todoist
                .get_task(remote_id, token)
                .await
                .map_err(|e| e.to_string())?;

            let content_differs = task.content.trim().to_lowercase()
                != payload.content.trim().to_lowercase();
            let remote_due = task.due.as_ref().map(|d| d.date.clone());
            let due_differs = remote_due != payload.due_date;
            if !content_differs && !due_differs {
                return Ok(RecordOutcome::NoChanges);
            }

            self.todoist
                .update_task(remote_id, &payload, token)
                .await
                .map_err(|e| e.to_string())?;
            self.record_push(&record.id, remote_id, now).await?;
            return Ok(RecordOutcome::Updated);
        }

        if completed_map.contains_key(&record.id) {
            // Remote side finished it; pull the status down, never reopen.
            repository::update_status(&self.db, &record.id, AssignmentStatus::Completed, now)
                .await
                .map_err(|e| e.to_string())?;
            return Ok(RecordOutcome::RemoteCompleted);
        }

        if ledger.contains_key(&record.id) {
            return Ok(RecordOutcome::Orphaned);
        }

        let target = dates::compute_target_date(record, date_mode, today);
        let payload = format::build_task_payload(record, project_id, target);
        let task = self
            .todoist
            .create_task(&payload, token)
            .await
            .map_err(|e| e.to_string())?;
        self.record_push(&record.id, &task.id, now).await?;
        Ok(RecordOutcome::Added)
    }

    async fn record_push(
        &self,
        assignment_id: &str,
        remote_task_id: &str,
        now: &str,
    ) -> Result<(), String> {
        repository::update_remote_link(&self.db, assignment_id, remote_task_id, now)
            .await
            .map_err(|e| e.to_string())?;
        repository::upsert_ledger_entry(&self.db, assignment_id, remote_task_id, now)
            .await
            .map_err(|e| e.to_string())?;
        Ok(())
    }

    async fn finish(&self, report: &SyncReport) -> Result<(), AppError> {
        let now = Utc::now().to_rfc3339();
        repository::set_meta(&self.db, repository::META_LAST_SYNC_AT, &now).await?;
        let json = serde_json::to_string(report)
            .map_err(|_| AppError::InternalServerError)?;
        repository::set_meta(&self.db, repository::META_LAST_SYNC_RESULT, &json).await?;
        Ok(())
    }
}

/// Embedded local id -> remote task id, for every task whose description
/// carries a decodable linkage.
fn linkage_map(tasks: &[Task]) -> HashMap<String, String> {
    tasks
        .iter()
        .filter_map(|t| {
            format::decode_linkage(&t.description).map(|local_id| (local_id, t.id.clone()))
        })
        .collect()
}
