/// Application services
///
/// Services hold the business rules and talk to storage only through
/// `Arc<dyn Repository<_>>`, so the same service runs against PostgreSQL
/// or the in-memory store.
///
/// - [`auth`]: registration, login, logout, password change, token resolution
/// - [`tasks`]: per-user task CRUD

pub mod auth;
pub mod tasks;

use crate::auth::password::PasswordError;
use crate::repository::RepositoryError;

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Unknown email or wrong password at login
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Current password did not match on password change
    #[error("The current password is incorrect.")]
    IncorrectPassword,

    /// Missing, malformed, revoked or expired bearer token
    #[error("Unauthenticated.")]
    Unauthenticated,

    #[error("{0}")]
    NotFound(&'static str),

    /// Listing produced no rows
    #[error("{0}")]
    EmptyResult(&'static str),

    /// A unique constraint rejected the write
    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error(transparent)]
    Repository(RepositoryError),
}

impl From<RepositoryError> for ServiceError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::UniqueViolation(constraint) => {
                ServiceError::Conflict(conflict_message(&constraint))
            }
            other => ServiceError::Repository(other),
        }
    }
}

fn conflict_message(constraint: &str) -> String {
    match constraint {
        "users_email_key" => "The email has already been taken.".to_string(),
        other => format!("Duplicate value violates {}", other),
    }
}
