//! # TaskHub Shared Library
//!
//! Domain types, persistence and business logic used by the TaskHub API.
//!
//! ## Module Organization
//!
//! - `models`: persisted entities (users, tasks, access tokens)
//! - `repository`: generic `Repository<E>` trait with PostgreSQL and in-memory backends
//! - `auth`: password hashing, bearer tokens, authentication middleware
//! - `services`: authentication and task services
//! - `db`: connection pool and migrations

pub mod auth;
pub mod db;
pub mod models;
pub mod repository;
pub mod services;

/// Current version of the TaskHub shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
