pub mod dto;
pub mod format;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;
use tracing::warn;

use dto::{CompletedItemsResponse, CreateProjectRequest, Project, Task, TaskPayload};

const REST_BASE: &str = "https://api.todoist.com/rest/v2";
const SYNC_BASE: &str = "https://api.todoist.com/sync/v9";

/// Typed failure surface for remote calls. Callers decide whether a failure
/// is a per-record sync error or aborts the run.
#[derive(Debug, Error)]
pub enum TodoistError {
    #[error("todoist request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("todoist api error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("project '{0}' not found and could not be created")]
    ProjectUnavailable(String),
}

/// Stateless operations against the Todoist API, parametrized by an opaque
/// bearer token per call. Mirrors what the reconciliation engine needs and
/// nothing more.
#[async_trait]
pub trait TodoistApi: Send + Sync {
    async fn test_connection(&self, token: &str) -> bool;
    async fn get_or_create_project(&self, name: &str, token: &str)
        -> Result<String, TodoistError>;
    async fn list_active_tasks(
        &self,
        project_id: &str,
        token: &str,
    ) -> Result<Vec<Task>, TodoistError>;
    async fn list_completed_tasks(
        &self,
        project_id: &str,
        token: &str,
    ) -> Result<Vec<Task>, TodoistError>;
    async fn get_task(&self, task_id: &str, token: &str) -> Result<Task, TodoistError>;
    async fn create_task(
        &self,
        payload: &TaskPayload,
        token: &str,
    ) -> Result<Task, TodoistError>;
    async fn update_task(
        &self,
        task_id: &str,
        payload: &TaskPayload,
        token: &str,
    ) -> Result<Task, TodoistError>;
    async fn close_task(&self, task_id: &str, token: &str) -> Result<(), TodoistError>;
    async fn reopen_task(&self, task_id: &str, token: &str) -> Result<(), TodoistError>;
    async fn delete_task(&self, task_id: &str, token: &str) -> Result<(), TodoistError>;
}

pub struct TodoistHttpClient {
    client: Client,
}

impl TodoistHttpClient {
    pub fn new() -> Result<Self, TodoistError> {
        let client = Client::builder().build()?;
        Ok(Self { client })
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, TodoistError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(TodoistError::Api { status, body })
    }

    async fn list_projects(&self, token: &str) -> Result<Vec<Project>, TodoistError> {
        let response = self
            .client
            .get(format!("{REST_BASE}/projects"))
            .bearer_auth(token)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }
}

#[async_trait]
impl TodoistApi for TodoistHttpClient {
    async fn test_connection(&self, token: &str) -> bool {
        self.list_projects(token).await.is_ok()
    }

    async fn get_or_create_project(
        &self,
        name: &str,
        token: &str,
    ) -> Result<String, TodoistError> {
        // A failed listing is treated as "not found": creation is attempted
        // and the provider's duplicate-name rejection, if any, surfaces as
        // the client error.
        match self.list_projects(token).await {
            Ok(projects) => {
                if let Some(found) = projects.into_iter().find(|p| p.name == name) {
                    return Ok(found.id);
                }
            }
            Err(e) => warn!("project listing failed, attempting creation: {}", e),
        }

        let response = self
            .client
            .post(format!("{REST_BASE}/projects"))
            .bearer_auth(token)
            .json(&CreateProjectRequest {
                name: name.to_string(),
                color: "blue".to_string(),
            })
            .send()
            .await?;
        let project: Project = Self::check(response).await?.json().await?;
        Ok(project.id)
    }

    async fn list_active_tasks(
        &self,
        project_id: &str,
        token: &str,
    ) -> Result<Vec<Task>, TodoistError> {
        let response = self
            .client
            .get(format!("{REST_BASE}/tasks"))
            .query(&[("project_id", project_id)])
            .bearer_auth(token)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn list_completed_tasks(
        &self,
        project_id: &str,
        token: &str,
    ) -> Result<Vec<Task>, TodoistError> {
        // The REST listing never returns completed tasks; the sync endpoint
        // does, annotated with the full item so the linkage survives.
        let response = self
            .client
            .get(format!("{SYNC_BASE}/completed/get_all"))
            .query(&[("project_id", project_id), ("annotate_items", "true")])
            .bearer_auth(token)
            .send()
            .await?;
        let completed: CompletedItemsResponse = Self::check(response).await?.json().await?;
        let tasks = completed
            .items
            .into_iter()
            .filter_map(|item| {
                let object = item.item_object?;
                Some(Task {
                    id: object.id,
                    content: object.content,
                    description: object.description,
                    due: None,
                    labels: Vec::new(),
                    project_id: None,
                })
            })
            .collect();
        Ok(tasks)
    }

    async fn get_task(&self, task_id: &str, token: &str) -> Result<Task, TodoistError> {
        let response = self
            .client
            .get(format!("{REST_BASE}/tasks/{task_id}"))
            .bearer_auth(token)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn create_task(
        &self,
        payload: &TaskPayload,
        token: &str,
    ) -> Result<Task, TodoistError> {
        let response = self
            .client
            .post(format!("{REST_BASE}/tasks"))
            .bearer_auth(token)
            .json(payload)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn update_task(
        &self,
        task_id: &str,
        payload: &TaskPayload,
        token: &str,
    ) -> Result<Task, TodoistError> {
        let response = self
            .client
            .post(format!("{REST_BASE}/tasks/{task_id}"))
            .bearer_auth(token)
            .json(payload)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn close_task(&self, task_id: &str, token: &str) -> Result<(), TodoistError> {
        let response = self
            .client
            .post(format!("{REST_BASE}/tasks/{task_id}/close"))
            .bearer_auth(token)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn reopen_task(&self, task_id: &str, token: &str) -> Result<(), TodoistError> {
        let response = self
            .client
            .post(format!("{REST_BASE}/tasks/{task_id}/reopen"))
            .bearer_auth(token)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn delete_task(&self, task_id: &str, token: &str) -> Result<(), TodoistError> {
        let response = self
            .client
            .delete(format!("{REST_BASE}/tasks/{task_id}"))
            .bearer_auth(token)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}

/// Inert client for boot without a configured token and for scheduler tests.
pub struct NoopTodoistClient;

#[async_trait]
impl TodoistApi for NoopTodoistClient {
    async fn test_connection(&self, _token: &str) -> bool {
        true
    }

    async fn get_or_create_project(
        &self,
        _name: &str,
        _token: &str,
    ) -> Result<String, TodoistError> {
        Ok("noop".to_string())
    }

    async fn list_active_tasks(
        &self,
        _project_id: &str,
        _token: &str,
    ) -> Result<Vec<Task>, TodoistError> {
        Ok(Vec::new())
    }

    async fn list_completed_tasks(
        &self,
        _project_id: &str,
        _token: &str,
    ) -> Result<Vec<Task>, TodoistError> {
        Ok(Vec::new())
    }

    async fn get_task(&self, task_id: &str, _token: &str) -> Result<Task, TodoistError> {
        Ok(Task {
            id: task_id.to_string(),
            content: String::new(),
            description: String::new(),
            due: None,
            labels: Vec::new(),
            project_id: None,
        })
    }

    async fn create_task(
        &self,
        payload: &TaskPayload,
        _token: &str,
    ) -> Result<Task, TodoistError> {
        Ok(Task {
            id: "noop".to_string(),
            content: payload.content.clone(),
            description: payload.description.clone(),
            due: None,
            labels: payload.labels.clone(),
            project_id: Some(payload.project_id.clone()),
        })
    }

    async fn update_task(
        &self,
        task_id: &str,
        payload: &TaskPayload,
        _token: &str,
    ) -> Result<Task, TodoistError> {
        Ok(Task {
            id: task_id.to_string(),
            content: payload.content.clone(),
            description: payload.description.clone(),
            due: None,
            labels: payload.labels.clone(),
            project_id: Some(payload.project_id.clone()),
        })
    }

    async fn close_task(&self, _task_id: &str, _token: &str) -> Result<(), TodoistError> {
        Ok(())
    }

    async fn reopen_task(&self, _task_id: &str, _token: &str) -> Result<(), TodoistError> {
        Ok(())
    }

    async fn delete_task(&self, _task_id: &str, _token: &str) -> Result<(), TodoistError> {
        Ok(())
    }
}
