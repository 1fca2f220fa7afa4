use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Activity kind detected by the scraper. `Unknown` covers module types we
/// have no mapping for; new records default to `Assignment`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ActivityType {
    #[serde(alias = "assign")]
    Assignment,
    Quiz,
    QuizLink,
    LessonLink,
    Forum,
    Unknown,
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ActivityType::Assignment => "assignment",
            ActivityType::Quiz => "quiz",
            ActivityType::QuizLink => "quiz_link",
            ActivityType::LessonLink => "lesson_link",
            ActivityType::Forum => "forum",
            ActivityType::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Submission lifecycle as observed on the LMS. `Completed` is terminal:
/// a completed record is never pushed to the remote service again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
pub enum AssignmentStatus {
    Pending,
    Submitted,
    Graded,
    Draft,
    Feedback,
    Completed,
}

impl AssignmentStatus {
    pub fn is_completed(self) -> bool {
        matches!(self, AssignmentStatus::Completed)
    }
}

/// Due-date strategy for the remote task (see `dates`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum DateMode {
    Smart,
    Exact,
}

/// A durable assignment record. `id` is derived from the origin URL and is
/// the join key to the sync ledger and the remote task's embedded linkage.
/// Dates are kept as the raw scraped text; `None` means the scraper found
/// nothing, which is distinct from an unparseable string.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Assignment {
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
}

/// One freshly observed assignment as reported by the scraping collaborator.
/// Everything but `title` and `url` is optional: the scraper may not know a
/// field, and status in particular can arrive in a later batch once the
/// submission page has been inspected. Merging only overwrites fields that
/// are present here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservedAssignment {
    pub title: String,
    #[serde(default)]
    pub raw_title: Option<String>,
    #[serde(default)]
    pub course: Option<String>,
    pub url: String,
    #[serde(default)]
    pub due_date_text: Option<String>,
    #[serde(default)]
    pub opening_date_text: Option<String>,
    #[serde(default)]
    pub activity_type: Option<ActivityType>,
    #[serde(default)]
    pub status: Option<AssignmentStatus>,
}

/// Runtime settings, single row in the store.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Settings {
    pub todoist_token: String,
    pub project_name: String,
    pub scrape_interval_minutes: i64,
    pub date_mode: DateMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSettingsRequest {
    pub todoist_token: Option<String>,
    pub project_name: Option<String>,
    pub scrape_interval_minutes: Option<i64>,
    pub date_mode: Option<DateMode>,
}

/// Sync ledger row: which local ids have been pushed, and as what task.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LedgerEntry {
    pub assignment_id: String,
    pub remote_task_id: String,
    pub synced_at: String,
}
