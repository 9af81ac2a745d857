/// Task service
///
/// Every operation is scoped to the calling user: lookups by id always
/// include `user_id`, so another user's task is indistinguishable from a
/// missing one.

use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::{ServiceError, ServiceResult};
use crate::auth::middleware::AuthContext;
use crate::models::task::{NewTask, Task, TaskChanges, TaskStatus};
use crate::repository::query::{Conditions, Sort};
use crate::repository::Repository;

pub const TASK_NOT_FOUND: &str = "Task not found.";
pub const TASKS_NOT_FOUND: &str = "Tasks not found.";

/// Fields accepted when creating a task
#[derive(Debug, Clone)]
pub struct TaskInput {
    pub title: String,
    pub description: Option<String>,
}

#[derive(Clone)]
pub struct TaskService {
    tasks: Arc<dyn Repository<Task>>,
}

impl TaskService {
    pub fn new(tasks: Arc<dyn Repository<Task>>) -> Self {
        Self { tasks }
    }

    fn owned(ctx: &AuthContext, id: Uuid) -> Conditions {
        Conditions::new().with("id", id).with("user_id", ctx.user.id)
    }

    async fn find_owned(&self, ctx: &AuthContext, id: Uuid) -> ServiceResult<Task> {
        self.tasks
            .get_one(Self::owned(ctx, id), Sort::asc("created_at"))
            .await?
            .ok_or(ServiceError::NotFound(TASK_NOT_FOUND))
    }

    /// Creates a pending task owned by the caller
    pub async fn store(&self, ctx: &AuthContext, input: TaskInput) -> ServiceResult<Task> {
        let task = self
            .tasks
            .create(
                NewTask {
                    title: input.title,
                    description: input.description,
                    status: TaskStatus::Pending,
                    user_id: ctx.user.id,
                }
                .into(),
            )
            .await?;

        info!(task_id = %task.id, user_id = %ctx.user.id, "Task created");
        Ok(task)
    }

    /// Lists the caller's tasks, oldest first
    ///
    /// `status` is matched verbatim; an empty string means no filter. An
    /// empty result is an error.
    pub async fn get(&self, ctx: &AuthContext, status: Option<&str>) -> ServiceResult<Vec<Task>> {
        let mut filters = Conditions::new().with("user_id", ctx.user.id);
        if let Some(status) = status.filter(|s| !s.is_empty()) {
            filters.push("status", status);
        }

        let tasks = self.tasks.get(filters, Sort::asc("created_at")).await?;
        if tasks.is_empty() {
            return Err(ServiceError::EmptyResult(TASKS_NOT_FOUND));
        }
        Ok(tasks)
    }

    pub async fn show(&self, ctx: &AuthContext, id: Uuid) -> ServiceResult<Task> {
        self.find_owned(ctx, id).await
    }

    /// Writes the supplied fields; the updated task is not returned
    pub async fn update(&self, ctx: &AuthContext, id: Uuid, changes: TaskChanges) -> ServiceResult<()> {
        let task = self.find_owned(ctx, id).await?;

        if !changes.is_empty() {
            self.tasks
                .update(Self::owned(ctx, task.id), changes.into())
                .await?;
        }

        info!(task_id = %task.id, user_id = %ctx.user.id, "Task updated");
        Ok(())
    }

    pub async fn delete(&self, ctx: &AuthContext, id: Uuid) -> ServiceResult<()> {
        let task = self.find_owned(ctx, id).await?;
        self.tasks.delete(Self::owned(ctx, task.id)).await?;

        info!(task_id = %task.id, user_id = %ctx.user.id, "Task deleted");
        Ok(())
    }
}
