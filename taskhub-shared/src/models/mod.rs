/// Database models for TaskHub
///
/// Each model implements [`Entity`](crate::repository::entity::Entity) and
/// is read and written through a [`Repository`](crate::repository::Repository).
///
/// # Models
///
/// - `user`: registered accounts
/// - `task`: per-user tasks
/// - `access_token`: issued bearer tokens
///
/// # Example
///
/// ```no_run
/// use taskhub_shared::models::task::{NewTask, Task, TaskStatus};
/// use taskhub_shared::repository::{postgres::PgRepository, Repository};
/// use taskhub_shared::db::pool::{create_pool, DatabaseConfig};
/// use uuid::Uuid;
///
/// # async fn example(owner: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
/// let tasks = PgRepository::<Task>::new(pool);
///
/// let task = tasks
///     .create(NewTask {
///         title: "Write report".to_string(),
///         description: None,
///         status: TaskStatus::Pending,
///         user_id: owner,
///     }.into())
///     .await?;
/// # Ok(())
/// # }
/// ```

pub mod access_token;
pub mod task;
pub mod user;
