use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub due: Option<Due>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub project_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Due {
    pub date: String,
    #[serde(default)]
    pub is_recurring: bool,
}

/// Body for task create/update. Built once by `format::build_task_payload`
/// so the HTTP client stays a dumb pipe.
#[derive(Debug, Clone, Serialize)]
pub struct TaskPayload {
    pub content: String,
    pub description: String,
    pub project_id: String,
    pub priority: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateProjectRequest {
    pub name: String,
    pub color: String,
}

/// The REST task listing omits completed tasks entirely; those come from
/// the sync completed/get_all endpoint, whose items look like this with
/// `annotate_items=true`.
#[derive(Debug, Deserialize)]
pub struct CompletedItemsResponse {
    pub items: Vec<CompletedItem>,
}

#[derive(Debug, Deserialize)]
pub struct CompletedItem {
    pub task_id: String,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub item_object: Option<CompletedItemObject>,
}

#[derive(Debug, Deserialize)]
pub struct CompletedItemObject {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub description: String,
}
