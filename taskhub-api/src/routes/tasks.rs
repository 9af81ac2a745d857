/// Task endpoints
///
/// All routes require a bearer token and only ever touch the caller's own
/// tasks.
///
/// # Endpoints
///
/// - `POST /tasks` - Create a task (status starts as `pending`)
/// - `GET /tasks?status=...` - List the caller's tasks, oldest first
/// - `GET /tasks/:id` - One task
/// - `PUT /tasks/:id` - Overwrite the supplied fields
/// - `DELETE /tasks/:id` - Remove a task

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{deserialize_some, ValidatedJson},
    routes::auth::MessageResponse,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use taskhub_shared::{
    auth::middleware::AuthContext,
    models::task::{Task, TaskChanges, TaskStatus},
    services::tasks::{TaskInput, TASK_NOT_FOUND},
};
use uuid::Uuid;
use validator::{Validate, ValidationError};

const INVALID_STATUS: &str =
    "The selected status is invalid. Valid options are: pending, in progress, completed";

fn valid_status(status: &str) -> Result<(), ValidationError> {
    if status.parse::<TaskStatus>().is_ok() {
        return Ok(());
    }
    let mut err = ValidationError::new("in");
    err.message = Some(Cow::Borrowed(INVALID_STATUS));
    Err(err)
}

fn title_present(title: &str) -> Result<(), ValidationError> {
    if !title.trim().is_empty() {
        return Ok(());
    }
    let mut err = ValidationError::new("required");
    err.message = Some(Cow::Borrowed("The title is required."));
    Err(err)
}

#[derive(Debug, Deserialize, Validate)]
pub struct StoreTaskRequest {
    #[validate(
        required(message = "The title is required."),
        custom(function = "title_present"),
        length(max = 255, message = "The title may not be greater than 255 characters.")
    )]
    pub title: Option<String>,

    pub description: Option<String>,

    /// Required and checked, but the stored status always starts as pending
    #[validate(
        required(message = "The status is required."),
        custom(function = "valid_status")
    )]
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateTaskRequest {
    #[validate(
        custom(function = "title_present"),
        length(max = 255, message = "The title may not be greater than 255 characters.")
    )]
    pub title: Option<String>,

    /// Absent leaves the description alone, `null` clears it
    #[serde(default, deserialize_with = "deserialize_some")]
    pub description: Option<Option<String>>,

    #[validate(custom(function = "valid_status"))]
    pub status: Option<String>,
}

impl UpdateTaskRequest {
    fn into_changes(self) -> TaskChanges {
        TaskChanges {
            title: self.title,
            description: self.description,
            status: self.status.and_then(|s| s.parse().ok()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListTasksParams {
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TaskResponse {
    pub task: Task,
}

#[derive(Debug, Serialize)]
pub struct TaskListResponse {
    pub tasks: Vec<Task>,
}

/// Any id that is not a UUID cannot name a task
fn task_id(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| ApiError::NotFound(TASK_NOT_FOUND.to_string()))
}

/// Create a task
///
/// ```text
/// POST /tasks
/// {"title": "Write report", "description": "Q3", "status": "pending"}
/// ```
///
/// `201 {"task": {...}}`
pub async fn store_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ValidatedJson(req): ValidatedJson<StoreTaskRequest>,
) -> ApiResult<(StatusCode, Json<TaskResponse>)> {
    let task = state
        .tasks
        .store(
            &auth,
            TaskInput {
                title: req.title.unwrap_or_default(),
                description: req.description,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(TaskResponse { task })))
}

/// List tasks
///
/// `400 Tasks not found.` when nothing matches.
pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(params): Query<ListTasksParams>,
) -> ApiResult<Json<TaskListResponse>> {
    let tasks = state.tasks.get(&auth, params.status.as_deref()).await?;
    Ok(Json(TaskListResponse { tasks }))
}

pub async fn show_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<TaskResponse>> {
    let task = state.tasks.show(&auth, task_id(&id)?).await?;
    Ok(Json(TaskResponse { task }))
}

/// Update a task
///
/// Responds with a confirmation message only, not the updated task.
pub async fn update_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
    ValidatedJson(req): ValidatedJson<UpdateTaskRequest>,
) -> ApiResult<Json<MessageResponse>> {
    state
        .tasks
        .update(&auth, task_id(&id)?, req.into_changes())
        .await?;

    Ok(MessageResponse::new("Task updated successfully."))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    state.tasks.delete(&auth, task_id(&id)?).await?;
    Ok(MessageResponse::new("Task deleted successfully."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_request_messages() {
        let req = StoreTaskRequest {
            title: Some("x".repeat(256)),
            description: None,
            status: Some("done".to_string()),
        };
        let errors = req.validate().unwrap_err();
        let fields = errors.field_errors();

        assert_eq!(
            fields["title"][0].message.as_deref(),
            Some("The title may not be greater than 255 characters.")
        );
        assert_eq!(fields["status"][0].message.as_deref(), Some(INVALID_STATUS));
    }

    #[test]
    fn test_store_request_required_fields() {
        let req = StoreTaskRequest {
            title: None,
            description: None,
            status: None,
        };
        let errors = req.validate().unwrap_err();
        let fields = errors.field_errors();

        assert_eq!(fields["title"][0].message.as_deref(), Some("The title is required."));
        assert_eq!(fields["status"][0].message.as_deref(), Some("The status is required."));
    }

    #[test]
    fn test_update_request_is_all_optional() {
        assert!(UpdateTaskRequest::default().validate().is_ok());

        let bad = UpdateTaskRequest {
            status: Some("archived".to_string()),
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_update_request_into_changes() {
        let req: UpdateTaskRequest =
            serde_json::from_str(r#"{"description": null, "status": "in progress"}"#).unwrap();
        let changes = req.into_changes();

        assert_eq!(changes.title, None);
        assert_eq!(changes.description, Some(None));
        assert_eq!(changes.status, Some(TaskStatus::InProgress));
    }

    #[test]
    fn test_task_id() {
        let id = Uuid::new_v4();
        assert_eq!(task_id(&id.to_string()).unwrap(), id);
        assert!(matches!(task_id("42"), Err(ApiError::NotFound(_))));
    }
}
