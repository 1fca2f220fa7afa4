//! Live Todoist API tests. These talk to the real service and need a
//! TODOIST_TOKEN in the environment.

use taskbridge::models::{ActivityType, Assignment, AssignmentStatus};
use taskbridge::todoist::format::{build_task_payload, decode_linkage};
use taskbridge::todoist::{TodoistApi, TodoistHttpClient};

fn token() -> String {
    dotenvy::dotenv().ok();
    std::env::var("TODOIST_TOKEN").expect("TODOIST_TOKEN is not set")
}

fn sample_assignment(id: &str) -> Assignment {
    Assignment {
        id: id.to_string(),
        title: format!("Integration Test Assignment {id}"),
        raw_title: format!("Integration Test Assignment {id}"),
        course: "Integration Testing (TEST101)".to_string(),
        course_code: "TEST101".to_string(),
        activity_type: ActivityType::Assignment,
        due_date: Some("2030-01-15".to_string()),
        opening_date: None,
        status: AssignmentStatus::Pending,
        origin_url: format!("https://lms.example.edu/mod/assign/view.php?id={id}"),
        source: "scrape".to_string(),
        added_at: chrono::Utc::now().to_rfc3339(),
        last_updated_at: chrono::Utc::now().to_rfc3339(),
        remote_task_id: None,
        last_synced_at: None,
    }
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored --test-threads=1
async fn test_connection_with_real_token() {
    let token = token();
    let client = TodoistHttpClient::new().expect("Failed to build client");
    assert!(client.test_connection(&token).await, "Token rejected");
    assert!(
        !client.test_connection("definitely-not-a-token").await,
        "Bad token accepted"
    );
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored --test-threads=1
async fn test_project_lookup_is_idempotent() {
    let token = token();
    let client = TodoistHttpClient::new().expect("Failed to build client");

    let first = client
        .get_or_create_project("Taskbridge Integration", &token)
        .await
        .expect("Failed to get or create project");
    let second = client
        .get_or_create_project("Taskbridge Integration", &token)
        .await
        .expect("Failed to look up project");
    assert_eq!(first, second, "Same name resolved to different projects");
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored --test-threads=1
async fn test_task_roundtrip_with_linkage() {
    let token = token();
    let client = TodoistHttpClient::new().expect("Failed to build client");

    let project_id = client
        .get_or_create_project("Taskbridge Integration", &token)
        .await
        .expect("Failed to get or create project");

    let local_id = format!("{}", chrono::Utc::now().timestamp());
    let assignment = sample_assignment(&local_id);
    let payload = build_task_payload(&assignment, &project_id, None);

    let created = client
        .create_task(&payload, &token)
        .await
        .expect("Failed to create task");
    println!("Created task {}", created.id);

    // The linkage must survive the trip through the Todoist description.
    let fetched = client
        .get_task(&created.id, &token)
        .await
        .expect("Failed to fetch task");
    assert_eq!(decode_linkage(&fetched.description), Some(local_id.clone()));

    let active = client
        .list_active_tasks(&project_id, &token)
        .await
        .expect("Failed to list tasks");
    assert!(
        active
            .iter()
            .any(|t| decode_linkage(&t.description) == Some(local_id.clone())),
        "Created task not in the active listing"
    );

    client
        .close_task(&created.id, &token)
        .await
        .expect("Failed to close task");
    let completed = client
        .list_completed_tasks(&project_id, &token)
        .await
        .expect("Failed to list completed tasks");
    assert!(
        completed
            .iter()
            .any(|t| decode_linkage(&t.description) == Some(local_id.clone())),
        "Closed task not in the completed listing"
    );

    client
        .delete_task(&created.id, &token)
        .await
        .expect("Failed to delete task");
}
