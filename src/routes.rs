use axum::Json;
use axum::extract::{Path, State};
use axum::routing::{delete, get, post};
use axum::{Router, http::StatusCode};
use serde::{Deserialize, Serialize};

use crate::db::repository;
use crate::error::AppError;
use crate::merge;
use crate::models::{
    ArchiveEntry, ArchiveReason, Assignment, DateMode, ObservedAssignment,
    UpdateSettingsRequest,
};
use crate::services::{SyncReport, SyncService};
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/scrape", post(scrape_and_merge))
        .route("/sync", post(sync_now))
        .route("/credential/test", post(test_credential))
        .route("/assignments", get(list_assignments))
        .route("/assignments/{id}/archive", post(archive_one))
        .route("/archive", get(list_archive))
        .route("/archive/cleanup", post(cleanup_archive))
        .route("/archive/{id}/restore", post(restore_one))
        .route("/archive/{id}", delete(delete_archived_entry))
        .route("/status", get(status))
        .route("/settings", get(show_settings).put(save_settings))
        .route("/all", delete(reset_all))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    sqlx::query("select 1").execute(&state.db).await?;
    Ok(StatusCode::OK)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MergeResponse {
    pub merged: usize,
    pub created: usize,
    pub dropped: usize,
    pub total: usize,
}

async fn scrape_and_merge(
    State(state): State<AppState>,
    Json(batch): Json<Vec<ObservedAssignment>>,
) -> Result<Json<MergeResponse>, AppError> {
    let outcome = merge::merge_and_store(&state.db, &batch).await?;
    Ok(Json(MergeResponse {
        merged: outcome.merged,
        created: outcome.created,
        dropped: outcome.dropped,
        total: outcome.records.len(),
    }))
}

async fn sync_now(State(state): State<AppState>) -> Result<Json<SyncReport>, AppError> {
    let _guard = state
        .sync_lock
        .try_lock()
        .map_err(|_| AppError::SyncInProgress)?;
    let service = SyncService::new(state.db.clone(), state.todoist.clone());
    let report = service.reconcile().await?;
    Ok(Json(report))
}

#[derive(Debug, Deserialize)]
pub struct CredentialRequest {
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CredentialResponse {
    pub ok: bool,
}

async fn test_credential(
    State(state): State<AppState>,
    Json(req): Json<CredentialRequest>,
) -> Json<CredentialResponse> {
    let token = req.token.trim();
    let ok = !token.is_empty() && state.todoist.test_connection(token).await;
    Json(CredentialResponse { ok })
}

async fn list_assignments(
    State(state): State<AppState>,
) -> Result<Json<Vec<Assignment>>, AppError> {
    let assignments = repository::fetch_assignments(&state.db).await?;
    Ok(Json(assignments))
}

async fn archive_one(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ArchiveEntry>, AppError> {
    let entry = repository::archive_assignment(&state.db, &id, ArchiveReason::Manual)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(entry))
}

async fn list_archive(
    State(state): State<AppState>,
) -> Result<Json<Vec<ArchiveEntry>>, AppError> {
    let entries = repository::fetch_archive(&state.db).await?;
    Ok(Json(entries))
}

fn default_retention_days() -> i64 {
    30
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupRequest {
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupResponse {
    pub active_count: usize,
    pub archived_count: usize,
}

async fn cleanup_archive(
    State(state): State<AppState>,
    Json(req): Json<CleanupRequest>,
) -> Result<Json<CleanupResponse>, AppError> {
    if req.retention_days < 0 {
        return Err(AppError::BadRequest(
            "retentionDays must not be negative".to_string(),
        ));
    }
    let (active_count, archived_count) =
        repository::archive_completed(&state.db, req.retention_days).await?;
    Ok(Json(CleanupResponse {
        active_count,
        archived_count,
    }))
}

async fn restore_one(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Assignment>, AppError> {
    let assignment = repository::restore_archived(&state.db, &id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(assignment))
}

async fn delete_archived_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    if repository::delete_archived(&state.db, &id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound)
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub active_count: usize,
    pub archived_count: usize,
    pub last_merge_at: Option<String>,
    pub last_sync_at: Option<String>,
    pub last_sync_result: Option<serde_json::Value>,
}

async fn status(State(state): State<AppState>) -> Result<Json<StatusResponse>, AppError> {
    let active_count = repository::fetch_assignments(&state.db).await?.len();
    let archived_count = repository::fetch_archive_ids(&state.db).await?.len();
    let last_merge_at = repository::get_meta(&state.db, repository::META_LAST_MERGE_AT).await?;
    let last_sync_at = repository::get_meta(&state.db, repository::META_LAST_SYNC_AT).await?;
    let last_sync_result = repository::get_meta(&state.db, repository::META_LAST_SYNC_RESULT)
        .await?
        .and_then(|raw| serde_json::from_str(&raw).ok());
    Ok(Json(StatusResponse {
        active_count,
        archived_count,
        last_merge_at,
        last_sync_at,
        last_sync_result,
    }))
}

/// Settings as shown to clients: the token itself never leaves the store.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsView {
    pub token_set: bool,
    pub project_name: String,
    pub scrape_interval_minutes: i64,
    pub date_mode: DateMode,
}

async fn show_settings(State(state): State<AppState>) -> Result<Json<SettingsView>, AppError> {
    let s = repository::get_settings(&state.db).await?;
    Ok(Json(SettingsView {
        token_set: !s.todoist_token.is_empty(),
        project_name: s.project_name,
        scrape_interval_minutes: s.scrape_interval_minutes,
        date_mode: s.date_mode,
    }))
}

async fn save_settings(
    State(state): State<AppState>,
    Json(req): Json<UpdateSettingsRequest>,
) -> Result<Json<SettingsView>, AppError> {
    let s = repository::update_settings(&state.db, req).await?;
    Ok(Json(SettingsView {
        token_set: !s.todoist_token.is_empty(),
        project_name: s.project_name,
        scrape_interval_minutes: s.scrape_interval_minutes,
        date_mode: s.date_mode,
    }))
}

async fn reset_all(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    repository::clear_all(&state.db).await?;
    Ok(StatusCode::NO_CONTENT)
}
