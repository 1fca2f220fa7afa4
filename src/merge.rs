//! Folds freshly observed assignments into the stored set.
//!
//! The merge is keyed by the derived id. An observation only overwrites the
//! fields it actually provides; everything else is retained, so a scrape
//! that failed to see a date cannot erase one we already know. Status is
//! the one exception to observed-wins: `Completed` is terminal and a later
//! scrape cannot resurrect the record.

use std::collections::HashMap;

use chrono::Utc;
use sqlx::SqlitePool;

use crate::db::repository;
use crate::error::AppError;
use crate::models::{ActivityType, Assignment, AssignmentStatus, ObservedAssignment};
use crate::scrape;

#[derive(Debug)]
pub struct MergeOutcome {
    pub records: Vec<Assignment>,
    pub merged: usize,
    pub created: usize,
    pub dropped: usize,
}

/// Pure merge over an in-memory record set. Safe to re-run with the same
/// batch: the result converges up to `last_updated_at`.
pub fn merge_records(
    existing: Vec<Assignment>,
    batch: &[ObservedAssignment],
    now: &str,
) -> MergeOutcome {
    let mut records = existing;
    let mut index: HashMap<String, usize> = records
        .iter()
        .enumerate()
        .map(|(i, a)| (a.id.clone(), i))
        .collect();

    let mut merged = 0;
    let mut created = 0;
    let mut dropped = 0;

    for item in batch {
        let Some(id) = scrape::derive_task_id(&item.url) else {
            dropped += 1;
            continue;
        };

        match index.get(&id) {
            Some(&i) => {
                apply_observation(&mut records[i], item, now);
                merged += 1;
            }
            None => {
                records.push(new_record(id.clone(), item, now));
                index.insert(id, records.len() - 1);
                created += 1;
            }
        }
    }

    MergeOutcome {
        records,
        merged,
        created,
        dropped,
    }
}

fn apply_observation(record: &mut Assignment, item: &ObservedAssignment, now: &str) {
    record.title = item.title.clone();
    if let Some(raw) = &item.raw_title {
        record.raw_title = raw.clone();
    }
    if let Some(course) = &item.course {
        record.course = course.clone();
        record.course_code = scrape::extract_course_code(course);
    }
    record.origin_url = item.url.clone();
    if item.due_date_text.is_some() {
        record.due_date = scrape::sanitize_date(item.due_date_text.as_deref());
    }
    if item.opening_date_text.is_some() {
        record.opening_date = scrape::sanitize_date(item.opening_date_text.as_deref());
    }
    if let Some(activity_type) = item.activity_type {
        record.activity_type = activity_type;
    }
    if let Some(status) = item.status {
        if !record.status.is_completed() || status.is_completed() {
            record.status = status;
        }
    }
    record.last_updated_at = now.to_string();
}

fn new_record(id: String, item: &ObservedAssignment, now: &str) -> Assignment {
    let course = item.course.clone().unwrap_or_default();
    Assignment {
        id,
        title: item.title.clone(),
        raw_title: item.raw_title.clone().unwrap_or_else(|| item.title.clone()),
        course_code: scrape::extract_course_code(&course),
        course,
        activity_type: item.activity_type.unwrap_or(ActivityType::Assignment),
        due_date: scrape::sanitize_date(item.due_date_text.as_deref()),
        opening_date: scrape::sanitize_date(item.opening_date_text.as_deref()),
        status: item.status.unwrap_or(AssignmentStatus::Pending),
        origin_url: item.url.clone(),
        source: "scrape".to_string(),
        added_at: now.to_string(),
        last_updated_at: now.to_string(),
        remote_task_id: None,
        last_synced_at: None,
    }
}

/// Merge a batch into the store and record `last_merge_at`.
///
/// Observations whose id currently sits in the archive are dropped: the
/// user (or retention) moved them out of the active set deliberately, and
/// an id must never be active and archived at once.
pub async fn merge_and_store(
    db: &SqlitePool,
    batch: &[ObservedAssignment],
) -> Result<MergeOutcome, AppError> {
    let now = Utc::now().to_rfc3339();

    let archived_ids = repository::fetch_archive_ids(db).await?;
    let (batch, archived_dropped): (Vec<_>, Vec<_>) = batch
        .iter()
        .cloned()
        .partition(|item| match scrape::derive_task_id(&item.url) {
            Some(id) => !archived_ids.contains(&id),
            None => true,
        });

    let existing = repository::fetch_assignments(db).await?;
    let mut outcome = merge_records(existing, &batch, &now);
    outcome.dropped += archived_dropped.len();

    for record in &outcome.records {
        repository::upsert_assignment(db, record).await?;
    }
    repository::set_meta(db, repository::META_LAST_MERGE_AT, &now).await?;

    Ok(outcome)
}
