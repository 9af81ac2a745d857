/// User model
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name VARCHAR(255) NOT NULL,
///     email VARCHAR(255) NOT NULL UNIQUE,
///     password_hash VARCHAR(255) NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use taskhub_shared::models::user::{NewUser, User};
/// use taskhub_shared::repository::{memory::{MemoryRepository, MemoryStore}, Repository};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let users = MemoryRepository::<User>::new(MemoryStore::new());
///
/// let user = users
///     .create(NewUser {
///         name: "Jane Doe".to_string(),
///         email: "jane@example.com".to_string(),
///         password_hash: "$argon2id$...".to_string(),
///     }.into())
///     .await?;
/// println!("Created user: {}", user.id);
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::access_token::TOKEN_COLUMNS;
use super::task::TASK_COLUMNS;
use crate::repository::entity::{Entity, RelationDef, RelationKind};
use crate::repository::query::Record;

pub(crate) const USER_COLUMNS: &[&str] = &[
    "id",
    "name",
    "email",
    "password_hash",
    "created_at",
    "updated_at",
];

static USER_RELATIONS: [RelationDef; 2] = [
    RelationDef {
        name: "tasks",
        table: "tasks",
        kind: RelationKind::HasMany,
        local_key: "id",
        foreign_key: "user_id",
        columns: TASK_COLUMNS,
        hidden: &[],
        relations: <super::task::Task as Entity>::relations,
    },
    RelationDef {
        name: "tokens",
        table: "access_tokens",
        kind: RelationKind::HasMany,
        local_key: "id",
        foreign_key: "user_id",
        columns: TOKEN_COLUMNS,
        hidden: &["token_hash"],
        relations: <super::access_token::AccessToken as Entity>::relations,
    },
];

/// A registered account
///
/// The password hash is loaded with the row but never serialized.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,

    /// Display name
    pub name: String,

    /// Login identifier, unique across all users
    pub email: String,

    /// Argon2id PHC string
    #[serde(skip_serializing)]
    pub password_hash: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for User {
    const TABLE: &'static str = "users";
    const COLUMNS: &'static [&'static str] = USER_COLUMNS;
    const UNIQUE: &'static [&'static str] = &["email"];
    const HIDDEN: &'static [&'static str] = &["password_hash"];

    fn relations() -> &'static [RelationDef] {
        &USER_RELATIONS
    }
}

/// Input for creating a user
///
/// `password_hash` must already be hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

impl From<NewUser> for Record {
    fn from(user: NewUser) -> Self {
        Record::new()
            .with("name", user.name)
            .with("email", user.email)
            .with("password_hash", user.password_hash)
    }
}
