/// Personal access token model
///
/// One row per issued bearer token. Only the SHA-256 of the token secret
/// is stored; the plaintext is shown once at login.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE access_tokens (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     name VARCHAR(255) NOT NULL,
///     token_hash CHAR(64) NOT NULL UNIQUE,
///     last_used_at TIMESTAMPTZ,
///     expires_at TIMESTAMPTZ,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::user::USER_COLUMNS;
use crate::repository::entity::{Entity, RelationDef, RelationKind};
use crate::repository::query::Record;

pub(crate) const TOKEN_COLUMNS: &[&str] = &[
    "id",
    "user_id",
    "name",
    "token_hash",
    "last_used_at",
    "expires_at",
    "created_at",
    "updated_at",
];

static TOKEN_RELATIONS: [RelationDef; 1] = [RelationDef {
    name: "user",
    table: "users",
    kind: RelationKind::BelongsTo,
    local_key: "user_id",
    foreign_key: "id",
    columns: USER_COLUMNS,
    hidden: &["password_hash"],
    relations: <super::user::User as Entity>::relations,
}];

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AccessToken {
    pub id: Uuid,
    pub user_id: Uuid,

    /// Label, the owner's email at issue time
    pub name: String,

    /// Hex SHA-256 of the token secret
    #[serde(skip_serializing)]
    pub token_hash: String,

    pub last_used_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn is_expired(&self) -> bool {
        self.expires_at.map_or(false, |at| at <= Utc::now())
    }
}

impl Entity for AccessToken {
    const TABLE: &'static str = "access_tokens";
    const COLUMNS: &'static [&'static str] = TOKEN_COLUMNS;
    const UNIQUE: &'static [&'static str] = &["token_hash"];
    const HIDDEN: &'static [&'static str] = &["token_hash"];

    fn relations() -> &'static [RelationDef] {
        &TOKEN_RELATIONS
    }
}

#[derive(Debug, Clone)]
pub struct NewAccessToken {
    pub user_id: Uuid,
    pub name: String,
    pub token_hash: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<NewAccessToken> for Record {
    fn from(token: NewAccessToken) -> Self {
        Record::new()
            .with("user_id", token.user_id)
            .with("name", token.name)
            .with("token_hash", token.token_hash)
            .with("expires_at", token.expires_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn token(expires_at: Option<DateTime<Utc>>) -> AccessToken {
        AccessToken {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name: "jane@example.com".to_string(),
            token_hash: "0".repeat(64),
            last_used_at: None,
            expires_at,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_expiry() {
        assert!(!token(None).is_expired());
        assert!(!token(Some(Utc::now() + Duration::minutes(5))).is_expired());
        assert!(token(Some(Utc::now() - Duration::minutes(5))).is_expired());
    }

    #[test]
    fn test_hash_not_serialized() {
        let json = serde_json::to_value(token(None)).unwrap();
        assert!(json.get("token_hash").is_none());
    }
}
