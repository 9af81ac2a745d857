/// API route handlers, one module per resource
///
/// - `health`: liveness and storage check
/// - `auth`: register, login, logout, change-password, profile
/// - `tasks`: the caller's task CRUD

pub mod auth;
pub mod health;
pub mod tasks;
