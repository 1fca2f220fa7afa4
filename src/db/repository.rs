//! SQLite-backed Local Store: assignments, archive, sync ledger, settings
//! and sync bookkeeping. All access goes through these functions; nothing
//! else in the crate touches SQL.

use chrono::{Duration, Utc};
use sqlx::SqlitePool;

use crate::models::{
    ArchiveEntry, ArchiveReason, Assignment, AssignmentStatus, LedgerEntry, Settings,
    UpdateSettingsRequest,
};

pub const META_LAST_MERGE_AT: &str = "last_merge_at";
pub const META_LAST_SYNC_AT: &str = "last_sync_at";
pub const META_LAST_SYNC_RESULT: &str = "last_sync_result";
pub const META_ARCHIVE_LAST_CLEANUP_AT: &str = "archive_last_cleanup_at";

const ASSIGNMENT_COLUMNS: &str = "id, title, raw_title, course, course_code, activity_type, \
     due_date, opening_date, status, origin_url, source, added_at, last_updated_at, \
     remote_task_id, last_synced_at";

// -- assignments --------------------------------------------------------

pub async fn fetch_assignments(db: &SqlitePool) -> Result<Vec<Assignment>, sqlx::Error> {
    sqlx::query_as::<_, Assignment>(&format!(
        "SELECT {ASSIGNMENT_COLUMNS} FROM assignments ORDER BY added_at, id"
    ))
    .fetch_all(db)
    .await
}

pub async fn find_assignment(
    db: &SqlitePool,
    id: &str,
) -> Result<Option<Assignment>, sqlx::Error> {
    sqlx::query_as::<_, Assignment>(&format!(
        "SELECT {ASSIGNMENT_COLUMNS} FROM assignments WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(db)
    .await
}

pub async fn upsert_assignment(db: &SqlitePool, a: &Assignment) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO assignments
            (id, title, raw_title, course, course_code, activity_type, due_date,
            opening_date, status, origin_url, source, added_at, last_updated_at,
            remote_task_id, last_synced_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            title = excluded.title,
            raw_title = excluded.raw_title,
            course = excluded.course,
            course_code = excluded.course_code,
            activity_type = excluded.activity_type,
            due_date = excluded.due_date,
            opening_date = excluded.opening_date,
            status = excluded.status,
            origin_url = excluded.origin_url,
            source = excluded.source,
            last_updated_at = excluded.last_updated_at,
            remote_task_id = excluded.remote_task_id,
            last_synced_at = excluded.last_synced_at
        "#,
    )
    .bind(&a.id)
    .bind(&a.title)
    .bind(&a.raw_title)
    .bind(&a.course)
    .bind(&a.course_code)
    .bind(a.activity_type)
    .bind(&a.due_date)
    .bind(&a.opening_date)
    .bind(a.status)
    .bind(&a.origin_url)
    .bind(&a.source)
    .bind(&a.added_at)
    .bind(&a.last_updated_at)
    .bind(&a.remote_task_id)
    .bind(&a.last_synced_at)
    .execute(db)
    .await?;
    Ok(())
}

/// Record a successful push: remote task id plus sync timestamp.
pub async fn update_remote_link(
    db: &SqlitePool,
    id: &str,
    remote_task_id: &str,
    synced_at: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE assignments SET remote_task_id = ?, last_synced_at = ? WHERE id = ?")
        .bind(remote_task_id)
        .bind(synced_at)
        .bind(id)
        .execute(db)
        .await?;
    Ok(())
}

pub async fn update_status(
    db: &SqlitePool,
    id: &str,
    status: AssignmentStatus,
    now: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE assignments SET status = ?, last_updated_at = ? WHERE id = ?")
        .bind(status)
        .bind(now)
        .bind(id)
        .execute(db)
        .await?;
    Ok(())
}

// -- archive ------------------------------------------------------------

const ARCHIVE_COLUMNS: &str = "id, title, raw_title, course, course_code, activity_type, \
     due_date, opening_date, status, origin_url, source, added_at, last_updated_at, \
     remote_task_id, last_synced_at, archived_at, archive_reason, completion_date";

pub async fn fetch_archive(db: &SqlitePool) -> Result<Vec<ArchiveEntry>, sqlx::Error> {
    sqlx::query_as::<_, ArchiveEntry>(&format!(
        "SELECT {ARCHIVE_COLUMNS} FROM archive ORDER BY archived_at DESC, id"
    ))
    .fetch_all(db)
    .await
}

pub async fn fetch_archive_ids(db: &SqlitePool) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>("SELECT id FROM archive")
        .fetch_all(db)
        .await
}

/// Move one active record into the archive. The delete and insert share a
/// transaction so an id can never be in both tables.
pub async fn archive_assignment(
    db: &SqlitePool,
    id: &str,
    reason: ArchiveReason,
) -> Result<Option<ArchiveEntry>, sqlx::Error> {
    let Some(assignment) = find_assignment(db, id).await? else {
        return Ok(None);
    };
    let entry = ArchiveEntry::from_assignment(assignment, reason, Utc::now().to_rfc3339());

    let mut tx = db.begin().await?;
    sqlx::query("DELETE FROM assignments WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query(
        r#"
        INSERT INTO archive
            (id, title, raw_title, course, course_code, activity_type, due_date,
            opening_date, status, origin_url, source, added_at, last_updated_at,
            remote_task_id, last_synced_at, archived_at, archive_reason, completion_date)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&entry.id)
    .bind(&entry.title)
    .bind(&entry.raw_title)
    .bind(&entry.course)
    .bind(&entry.course_code)
    .bind(entry.activity_type)
    .bind(&entry.due_date)
    .bind(&entry.opening_date)
    .bind(entry.status)
    .bind(&entry.origin_url)
    .bind(&entry.source)
    .bind(&entry.added_at)
    .bind(&entry.last_updated_at)
    .bind(&entry.remote_task_id)
    .bind(&entry.last_synced_at)
    .bind(&entry.archived_at)
    .bind(entry.archive_reason)
    .bind(&entry.completion_date)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    Ok(Some(entry))
}

/// Move completed records older than the retention window to the archive.
/// Returns (remaining active, newly archived).
pub async fn archive_completed(
    db: &SqlitePool,
    retention_days: i64,
) -> Result<(usize, usize), sqlx::Error> {
    let cutoff = (Utc::now() - Duration::days(retention_days)).to_rfc3339();
    let aged: Vec<String> = sqlx::query_scalar(
        "SELECT id FROM assignments WHERE status = 'completed' AND last_updated_at < ?",
    )
    .bind(&cutoff)
    .fetch_all(db)
    .await?;

    let mut archived = 0;
    for id in &aged {
        if archive_assignment(db, id, ArchiveReason::CompletedAged)
            .await?
            .is_some()
        {
            archived += 1;
        }
    }
    set_meta(db, META_ARCHIVE_LAST_CLEANUP_AT, &Utc::now().to_rfc3339()).await?;

    let active: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM assignments")
        .fetch_one(db)
        .await?;
    Ok((active as usize, archived))
}

/// Move an archived record back to the active store.
pub async fn restore_archived(
    db: &SqlitePool,
    id: &str,
) -> Result<Option<Assignment>, sqlx::Error> {
    let Some(entry) = sqlx::query_as::<_, ArchiveEntry>(&format!(
        "SELECT {ARCHIVE_COLUMNS} FROM archive WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(db)
    .await?
    else {
        return Ok(None);
    };

    let assignment = entry.into_assignment();
    let mut tx = db.begin().await?;
    sqlx::query("DELETE FROM archive WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query(
        r#"
        INSERT INTO assignments
            (id, title, raw_title, course, course_code, activity_type, due_date,
            opening_date, status, origin_url, source, added_at, last_updated_at,
            remote_task_id, last_synced_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&assignment.id)
    .bind(&assignment.title)
    .bind(&assignment.raw_title)
    .bind(&assignment.course)
    .bind(&assignment.course_code)
    .bind(assignment.activity_type)
    .bind(&assignment.due_date)
    .bind(&assignment.opening_date)
    .bind(assignment.status)
    .bind(&assignment.origin_url)
    .bind(&assignment.source)
    .bind(&assignment.added_at)
    .bind(&assignment.last_updated_at)
    .bind(&assignment.remote_task_id)
    .bind(&assignment.last_synced_at)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    Ok(Some(assignment))
}

/// Hard delete from the archive. The only hard delete exposed anywhere.
pub async fn delete_archived(db: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM archive WHERE id = ?")
        .bind(id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}

// -- sync ledger --------------------------------------------------------

pub async fn fetch_ledger(db: &SqlitePool) -> Result<Vec<LedgerEntry>, sqlx::Error> {
    sqlx::query_as::<_, LedgerEntry>(
        "SELECT assignment_id, remote_task_id, synced_at FROM sync_ledger",
    )
    .fetch_all(db)
    .await
}

pub async fn upsert_ledger_entry(
    db: &SqlitePool,
    assignment_id: &str,
    remote_task_id: &str,
    synced_at: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO sync_ledger (assignment_id, remote_task_id, synced_at)
        VALUES (?, ?, ?)
        ON CONFLICT(assignment_id) DO UPDATE SET
            remote_task_id = excluded.remote_task_id,
            synced_at = excluded.synced_at
        "#,
    )
    .bind(assignment_id)
    .bind(remote_task_id)
    .bind(synced_at)
    .execute(db)
    .await?;
    Ok(())
}

// -- settings -----------------------------------------------------------

pub async fn get_settings(db: &SqlitePool) -> Result<Settings, sqlx::Error> {
    sqlx::query_as::<_, Settings>(
        "SELECT todoist_token, project_name, scrape_interval_minutes, date_mode \
         FROM settings WHERE id = 1",
    )
    .fetch_one(db)
    .await
}

pub async fn update_settings(
    db: &SqlitePool,
    req: UpdateSettingsRequest,
) -> Result<Settings, sqlx::Error> {
    let mut current = get_settings(db).await?;
    if let Some(token) = req.todoist_token {
        current.todoist_token = token.trim().to_string();
    }
    if let Some(name) = req.project_name {
        let name = name.trim();
        if !name.is_empty() {
            current.project_name = name.to_string();
        }
    }
    if let Some(minutes) = req.scrape_interval_minutes {
        current.scrape_interval_minutes = minutes.clamp(5, 1440);
    }
    if let Some(mode) = req.date_mode {
        current.date_mode = mode;
    }

    sqlx::query(
        "UPDATE settings SET todoist_token = ?, project_name = ?, \
         scrape_interval_minutes = ?, date_mode = ? WHERE id = 1",
    )
    .bind(&current.todoist_token)
    .bind(&current.project_name)
    .bind(current.scrape_interval_minutes)
    .bind(current.date_mode)
    .execute(db)
    .await?;

    Ok(current)
}

// -- meta ---------------------------------------------------------------

pub async fn get_meta(db: &SqlitePool, key: &str) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>("SELECT value FROM meta WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await
}

pub async fn set_meta(db: &SqlitePool, key: &str, value: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO meta (key, value) VALUES (?, ?) \
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    )
    .bind(key)
    .bind(value)
    .execute(db)
    .await?;
    Ok(())
}

/// Hard reset: active store, archive, ledger and sync bookkeeping. Settings
/// survive so a reset does not log the user out of their remote account.
pub async fn clear_all(db: &SqlitePool) -> Result<(), sqlx::Error> {
    let mut tx = db.begin().await?;
    sqlx::query("DELETE FROM assignments").execute(&mut *tx).await?;
    sqlx::query("DELETE FROM archive").execute(&mut *tx).await?;
    sqlx::query("DELETE FROM sync_ledger").execute(&mut *tx).await?;
    sqlx::query("DELETE FROM meta").execute(&mut *tx).await?;
    tx.commit().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ActivityType;

    async fn setup_test_db() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:")
            .await
            .expect("Failed to create test db");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run migrations");

        pool
    }

    fn assignment(id: &str, status: AssignmentStatus) -> Assignment {
        Assignment {
            id: id.to_string(),
            title: format!("Assignment {id}"),
            raw_title: format!("Assignment {id}"),
            course: "Data Structures (CSDC111)".to_string(),
            course_code: "CSDC111".to_string(),
            activity_type: ActivityType::Assignment,
            due_date: Some("2025-09-01".to_string()),
            opening_date: None,
            status,
            origin_url: format!("https://lms.example.edu/mod/assign/view.php?id={id}"),
            source: "scrape".to_string(),
            added_at: "2025-08-01T00:00:00+00:00".to_string(),
            last_updated_at: "2025-08-01T00:00:00+00:00".to_string(),
            remote_task_id: None,
            last_synced_at: None,
        }
    }

    #[tokio::test]
    async fn upsert_inserts_then_updates() {
        let pool = setup_test_db().await;
        let mut a = assignment("1", AssignmentStatus::Pending);
        upsert_assignment(&pool, &a).await.expect("insert");

        a.title = "Renamed".to_string();
        upsert_assignment(&pool, &a).await.expect("update");

        let all = fetch_assignments(&pool).await.expect("fetch");
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].title, "Renamed");
        assert_eq!(all[0].status, AssignmentStatus::Pending);
    }

    #[tokio::test]
    async fn archive_and_restore_keep_the_id_exclusive() {
        let pool = setup_test_db().await;
        upsert_assignment(&pool, &assignment("1", AssignmentStatus::Completed))
            .await
            .expect("insert");

        let entry = archive_assignment(&pool, "1", ArchiveReason::Manual)
            .await
            .expect("archive")
            .expect("entry");
        assert_eq!(entry.archive_reason, ArchiveReason::Manual);
        assert!(entry.completion_date.is_some());
        assert!(fetch_assignments(&pool).await.unwrap().is_empty());
        assert_eq!(fetch_archive_ids(&pool).await.unwrap(), vec!["1".to_string()]);

        let restored = restore_archived(&pool, "1")
            .await
            .expect("restore")
            .expect("assignment");
        assert_eq!(restored.id, "1");
        assert!(fetch_archive_ids(&pool).await.unwrap().is_empty());
        assert_eq!(fetch_assignments(&pool).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn archive_completed_respects_retention() {
        let pool = setup_test_db().await;
        // Old completed record: eligible.
        upsert_assignment(&pool, &assignment("1", AssignmentStatus::Completed))
            .await
            .expect("insert");
        // Fresh completed record: retained.
        let mut fresh = assignment("2", AssignmentStatus::Completed);
        fresh.last_updated_at = Utc::now().to_rfc3339();
        upsert_assignment(&pool, &fresh).await.expect("insert");
        // Pending record: never archived by retention.
        upsert_assignment(&pool, &assignment("3", AssignmentStatus::Pending))
            .await
            .expect("insert");

        let (active, archived) = archive_completed(&pool, 30).await.expect("cleanup");
        assert_eq!(archived, 1);
        assert_eq!(active, 2);
        assert_eq!(fetch_archive_ids(&pool).await.unwrap(), vec!["1".to_string()]);
    }

    #[tokio::test]
    async fn delete_archived_is_the_only_hard_delete() {
        let pool = setup_test_db().await;
        upsert_assignment(&pool, &assignment("1", AssignmentStatus::Completed))
            .await
            .expect("insert");
        archive_assignment(&pool, "1", ArchiveReason::Manual)
            .await
            .expect("archive");

        assert!(delete_archived(&pool, "1").await.expect("delete"));
        assert!(!delete_archived(&pool, "1").await.expect("idempotent"));
        assert!(fetch_archive(&pool).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn ledger_upsert_overwrites() {
        let pool = setup_test_db().await;
        upsert_ledger_entry(&pool, "42", "t-1", "2025-09-01T00:00:00+00:00")
            .await
            .expect("insert");
        upsert_ledger_entry(&pool, "42", "t-2", "2025-09-02T00:00:00+00:00")
            .await
            .expect("update");

        let ledger = fetch_ledger(&pool).await.expect("fetch");
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].remote_task_id, "t-2");
    }

    #[tokio::test]
    async fn settings_update_clamps_interval() {
        let pool = setup_test_db().await;
        let s = update_settings(
            &pool,
            UpdateSettingsRequest {
                todoist_token: Some("tok".to_string()),
                project_name: Some("  My Project  ".to_string()),
                scrape_interval_minutes: Some(2),
                date_mode: Some(crate::models::DateMode::Exact),
            },
        )
        .await
        .expect("update");

        assert_eq!(s.todoist_token, "tok");
        assert_eq!(s.project_name, "My Project");
        assert_eq!(s.scrape_interval_minutes, 5);
        assert_eq!(s.date_mode, crate::models::DateMode::Exact);
    }

    #[tokio::test]
    async fn clear_all_wipes_store_but_not_settings() {
        let pool = setup_test_db().await;
        upsert_assignment(&pool, &assignment("1", AssignmentStatus::Pending))
            .await
            .expect("insert");
        upsert_ledger_entry(&pool, "1", "t-1", "now").await.expect("ledger");
        set_meta(&pool, META_LAST_SYNC_AT, "now").await.expect("meta");
        update_settings(
            &pool,
            UpdateSettingsRequest {
                todoist_token: Some("tok".to_string()),
                project_name: None,
                scrape_interval_minutes: None,
                date_mode: None,
            },
        )
        .await
        .expect("settings");

        clear_all(&pool).await.expect("clear");

        assert!(fetch_assignments(&pool).await.unwrap().is_empty());
        assert!(fetch_ledger(&pool).await.unwrap().is_empty());
        assert_eq!(get_meta(&pool, META_LAST_SYNC_AT).await.unwrap(), None);
        assert_eq!(get_settings(&pool).await.unwrap().todoist_token, "tok");
    }
}
