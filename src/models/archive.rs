use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::assignment::{ActivityType, Assignment, AssignmentStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "kebab-case")]
#[sqlx(rename_all = "kebab-case")]
pub enum ArchiveReason {
    CompletedAged,
    Manual,
}

/// An assignment moved out of the active store. Carries the full record so a
/// restore loses nothing. An id is either active or archived, never both.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ArchiveEntry {
    pub id: String,
    pub title: String,
    pub raw_title: String,
    pub course: String,
    pub course_code: String,
    pub activity_type: ActivityType,
    pub due_date: Option<String>,
    pub opening_date: Option<String>,
    pub status: AssignmentStatus,
    pub origin_url: String,
    pub source: String,
    pub added_at: String,
    pub last_updated_at: String,
    pub remote_task_id: Option<String>,
    pub last_synced_at: Option<String>,
    pub archived_at: String,
    pub archive_reason: ArchiveReason,
    pub completion_date: Option<String>,
}

impl ArchiveEntry {
    pub fn from_assignment(a: Assignment, reason: ArchiveReason, archived_at: String) -> Self {
        let completion_date = if a.status.is_completed() {
            Some(a.last_updated_at.clone())
        } else {
            None
        };
        ArchiveEntry {
            id: a.id,
            title: a.title,
            raw_title: a.raw_title,
            course: a.course,
            course_code: a.course_code,
            activity_type: a.activity_type,
            due_date: a.due_date,
            opening_date: a.opening_date,
            status: a.status,
            origin_url: a.origin_url,
            source: a.source,
            added_at: a.added_at,
            last_updated_at: a.last_updated_at,
            remote_task_id: a.remote_task_id,
            last_synced_at: a.last_synced_at,
            archived_at,
            archive_reason: reason,
            completion_date,
        }
    }

    /// The record as it was before archival, for restore.
    pub fn into_assignment(self) -> Assignment {
        Assignment {
            id: self.id,
            title: self.title,
            raw_title: self.raw_title,
            course: self.course,
            course_code: self.course_code,
            activity_type: self.activity_type,
            due_date: self.due_date,
            opening_date: self.opening_date,
            status: self.status,
            origin_url: self.origin_url,
            source: self.source,
            added_at: self.added_at,
            last_updated_at: self.last_updated_at,
            remote_task_id: self.remote_task_id,
            last_synced_at: self.last_synced_at,
        }
    }
}
