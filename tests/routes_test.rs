use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use sqlx::SqlitePool;
use tokio::sync::Mutex;
use tower::ServiceExt;

use taskbridge::routes::router;
use taskbridge::state::AppState;
use taskbridge::todoist::{NoopTodoistClient, TodoistApi};

async fn setup_app() -> Router {
    let pool = SqlitePool::connect("sqlite::memory:")
        .await
        .expect("Failed to create test db");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    let todoist: Arc<dyn TodoistApi> = Arc::new(NoopTodoistClient);
    router(AppState {
        db: pool,
        todoist,
        sync_lock: Arc::new(Mutex::new(())),
    })
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn scrape_batch() -> Value {
    json!([{
        "title": "Quiz 1",
        "course": "Data Structures (CSDC111)",
        "url": "https://lms.example.edu/mod/quiz/view.php?id=42",
        "dueDateText": "2025-09-01",
        "status": "Pending"
    }])
}

#[tokio::test]
async fn health_is_ok() {
    let app = setup_app().await;
    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn scrape_merges_and_lists() {
    let app = setup_app().await;

    let response = app
        .clone()
        .oneshot(post_json("/scrape", scrape_batch()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["created"], 1);
    assert_eq!(body["total"], 1);

    let response = app.oneshot(get("/assignments")).await.unwrap();
    let body = json_body(response).await;
    assert_eq!(body[0]["id"], "42");
    assert_eq!(body[0]["course_code"], "CSDC111");
}

#[tokio::test]
async fn credential_test_rejects_an_empty_token() {
    let app = setup_app().await;

    let response = app
        .clone()
        .oneshot(post_json("/credential/test", json!({"token": "  "})))
        .await
        .unwrap();
    assert_eq!(json_body(response).await["ok"], false);

    let response = app
        .oneshot(post_json("/credential/test", json!({"token": "tok"})))
        .await
        .unwrap();
    assert_eq!(json_body(response).await["ok"], true);
}

#[tokio::test]
async fn settings_never_echo_the_token() {
    let app = setup_app().await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/settings")
                .header("content-type", "application/json")
                .body(Body::from(
                    serde_json::to_vec(&json!({
                        "todoistToken": "secret-token",
                        "projectName": "School Assignments",
                        "scrapeIntervalMinutes": 2
                    }))
                    .unwrap(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["tokenSet"], true);
    // interval clamped to the floor
    assert_eq!(body["scrapeIntervalMinutes"], 5);
    assert!(!body.to_string().contains("secret-token"));

    let response = app.oneshot(get("/settings")).await.unwrap();
    let body = json_body(response).await;
    assert_eq!(body["tokenSet"], true);
    assert!(!body.to_string().contains("secret-token"));
}

#[tokio::test]
async fn sync_reports_through_the_status_readout() {
    let app = setup_app().await;

    app.clone()
        .oneshot(post_json("/scrape", scrape_batch()))
        .await
        .unwrap();
    app.clone()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/settings")
                .header("content-type", "application/json")
                .body(Body::from(
                    serde_json::to_vec(&json!({"todoistToken": "tok"})).unwrap(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    let response = app.clone().oneshot(post_json("/sync", json!({}))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let report = json_body(response).await;
    assert_eq!(report["added"][0], "Quiz 1");

    let response = app.oneshot(get("/status")).await.unwrap();
    let body = json_body(response).await;
    assert_eq!(body["activeCount"], 1);
    assert!(body["lastSyncAt"].is_string());
    assert_eq!(body["lastSyncResult"]["added"][0], "Quiz 1");
}

#[tokio::test]
async fn archive_lifecycle_over_http() {
    let app = setup_app().await;
    app.clone()
        .oneshot(post_json("/scrape", scrape_batch()))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(post_json("/assignments/42/archive", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["archive_reason"], "manual");

    let response = app.clone().oneshot(get("/archive")).await.unwrap();
    assert_eq!(json_body(response).await.as_array().unwrap().len(), 1);
    let response = app.clone().oneshot(get("/assignments")).await.unwrap();
    assert!(json_body(response).await.as_array().unwrap().is_empty());

    let response = app
        .clone()
        .oneshot(post_json("/archive/42/restore", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Restored, so the archive no longer has it to delete.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/archive/42")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn hard_reset_clears_the_store() {
    let app = setup_app().await;
    app.clone()
        .oneshot(post_json("/scrape", scrape_batch()))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/all")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app.oneshot(get("/assignments")).await.unwrap();
    assert!(json_body(response).await.as_array().unwrap().is_empty());
}
