/// Authentication service
///
/// Owns the user and access-token repositories. Passwords are hashed with
/// Argon2id on the blocking pool; bearer tokens are opaque
/// `{token_id}|{secret}` strings whose secret is stored only as SHA-256.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use taskhub_shared::models::{access_token::AccessToken, user::User};
/// use taskhub_shared::repository::memory::{MemoryRepository, MemoryStore};
/// use taskhub_shared::services::auth::AuthService;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = MemoryStore::new();
/// let auth = AuthService::new(
///     Arc::new(MemoryRepository::<User>::new(store.clone())),
///     Arc::new(MemoryRepository::<AccessToken>::new(store)),
/// );
///
/// auth.register("Jane", "jane@example.com", "secret123").await?;
/// let token = auth.login("jane@example.com", "secret123").await?;
/// let ctx = auth.authenticate(&token).await?;
/// assert_eq!(ctx.user.email, "jane@example.com");
/// # Ok(())
/// # }
/// ```

use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{ServiceError, ServiceResult};
use crate::auth::middleware::AuthContext;
use crate::auth::password::{hash_password_blocking, verify_password_blocking};
use crate::auth::token::{format_token, generate_secret, hash_secret, parse_token, verify_secret};
use crate::models::access_token::{AccessToken, NewAccessToken};
use crate::models::user::{NewUser, User};
use crate::repository::query::{Conditions, Record, Sort};
use crate::repository::Repository;

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn Repository<User>>,
    tokens: Arc<dyn Repository<AccessToken>>,
    token_ttl: Option<Duration>,
}

impl AuthService {
    pub fn new(users: Arc<dyn Repository<User>>, tokens: Arc<dyn Repository<AccessToken>>) -> Self {
        Self {
            users,
            tokens,
            token_ttl: None,
        }
    }

    /// Issued tokens expire after `ttl`; `None` keeps them valid until logout
    pub fn with_token_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.token_ttl = ttl;
        self
    }

    /// Verifies the underlying store is reachable
    pub async fn ping(&self) -> ServiceResult<()> {
        Ok(self.users.ping().await?)
    }

    /// Creates an account
    ///
    /// Duplicate emails are rejected by the unique constraint and surface
    /// as [`ServiceError::Conflict`].
    pub async fn register(&self, name: &str, email: &str, password: &str) -> ServiceResult<User> {
        let password_hash = hash_password_blocking(password.to_string()).await?;

        let user = self
            .users
            .create(
                NewUser {
                    name: name.to_string(),
                    email: email.to_string(),
                    password_hash,
                }
                .into(),
            )
            .await?;

        info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    /// Checks credentials and issues a new bearer token
    pub async fn login(&self, email: &str, password: &str) -> ServiceResult<String> {
        let user = self
            .users
            .get_one(Conditions::new().with("email", email), Sort::asc("created_at"))
            .await?;

        let Some(user) = user else {
            debug!("Login for unknown email");
            return Err(ServiceError::InvalidCredentials);
        };

        if !verify_password_blocking(password.to_string(), user.password_hash.clone()).await? {
            warn!(user_id = %user.id, "Login with wrong password");
            return Err(ServiceError::InvalidCredentials);
        }

        let secret = generate_secret();
        let token = self
            .tokens
            .create(
                NewAccessToken {
                    user_id: user.id,
                    name: user.email.clone(),
                    token_hash: hash_secret(&secret),
                    expires_at: self.token_ttl.map(|ttl| Utc::now() + ttl),
                }
                .into(),
            )
            .await?;

        info!(user_id = %user.id, token_id = %token.id, "Access token issued");
        Ok(format_token(token.id, &secret))
    }

    /// Resolves a bearer token into the caller's identity
    ///
    /// Records `last_used_at` on the token.
    pub async fn authenticate(&self, bearer: &str) -> ServiceResult<AuthContext> {
        let (token_id, secret) = parse_token(bearer).ok_or(ServiceError::Unauthenticated)?;

        let token = self
            .tokens
            .find(token_id)
            .await?
            .ok_or(ServiceError::Unauthenticated)?;

        if !verify_secret(secret, &token.token_hash) {
            warn!(token_id = %token_id, "Bearer secret mismatch");
            return Err(ServiceError::Unauthenticated);
        }

        if token.is_expired() {
            debug!(token_id = %token_id, "Expired token presented");
            return Err(ServiceError::Unauthenticated);
        }

        let user = self
            .users
            .find(token.user_id)
            .await?
            .ok_or(ServiceError::Unauthenticated)?;

        self.tokens
            .update_by_id(token.id, Record::new().with("last_used_at", Utc::now()))
            .await?;

        Ok(AuthContext {
            user,
            token_id: token.id,
        })
    }

    /// Revokes the token the caller authenticated with
    pub async fn logout(&self, ctx: &AuthContext) -> ServiceResult<()> {
        self.tokens.delete_by_id(ctx.token_id).await?;
        info!(user_id = %ctx.user.id, token_id = %ctx.token_id, "Access token revoked");
        Ok(())
    }

    pub async fn change_password(
        &self,
        ctx: &AuthContext,
        current_password: &str,
        new_password: &str,
    ) -> ServiceResult<()> {
        let user = self
            .users
            .find(ctx.user.id)
            .await?
            .ok_or(ServiceError::Unauthenticated)?;

        if !verify_password_blocking(current_password.to_string(), user.password_hash).await? {
            return Err(ServiceError::IncorrectPassword);
        }

        let password_hash = hash_password_blocking(new_password.to_string()).await?;
        self.users
            .update_by_id(user.id, Record::new().with("password_hash", password_hash))
            .await?;

        info!(user_id = %user.id, "Password changed");
        Ok(())
    }

    pub fn profile(&self, ctx: &AuthContext) -> User {
        ctx.user.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::memory::{MemoryRepository, MemoryStore};

    fn service() -> AuthService {
        let store = MemoryStore::new();
        AuthService::new(
            Arc::new(MemoryRepository::<User>::new(store.clone())),
            Arc::new(MemoryRepository::<AccessToken>::new(store)),
        )
    }

    #[tokio::test]
    async fn test_register_hashes_password() {
        let auth = service();
        let user = auth.register("Jane", "jane@example.com", "secret123").await.unwrap();

        assert_eq!(user.name, "Jane");
        assert!(user.password_hash.starts_with("$argon2id$"));
        assert_ne!(user.password_hash, "secret123");
    }

    #[tokio::test]
    async fn test_register_duplicate_email_conflicts() {
        let auth = service();
        auth.register("Jane", "jane@example.com", "secret123").await.unwrap();

        let err = auth
            .register("Other", "jane@example.com", "secret456")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_login_and_authenticate() {
        let auth = service();
        let user = auth.register("Jane", "jane@example.com", "secret123").await.unwrap();

        let token = auth.login("jane@example.com", "secret123").await.unwrap();
        let ctx = auth.authenticate(&token).await.unwrap();

        assert_eq!(ctx.user.id, user.id);
        assert_eq!(auth.profile(&ctx).email, "jane@example.com");
    }

    #[tokio::test]
    async fn test_login_rejects_bad_credentials() {
        let auth = service();
        auth.register("Jane", "jane@example.com", "secret123").await.unwrap();

        assert!(matches!(
            auth.login("jane@example.com", "wrong-password").await,
            Err(ServiceError::InvalidCredentials)
        ));
        assert!(matches!(
            auth.login("nobody@example.com", "secret123").await,
            Err(ServiceError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_authenticate_rejects_tampered_tokens() {
        let auth = service();
        auth.register("Jane", "jane@example.com", "secret123").await.unwrap();
        let token = auth.login("jane@example.com", "secret123").await.unwrap();

        let (id, _) = parse_token(&token).unwrap();
        let forged = format_token(id, &generate_secret());

        assert!(matches!(auth.authenticate(&forged).await, Err(ServiceError::Unauthenticated)));
        assert!(matches!(auth.authenticate("garbage").await, Err(ServiceError::Unauthenticated)));
    }

    #[tokio::test]
    async fn test_logout_revokes_only_current_token() {
        let auth = service();
        auth.register("Jane", "jane@example.com", "secret123").await.unwrap();
        let first = auth.login("jane@example.com", "secret123").await.unwrap();
        let second = auth.login("jane@example.com", "secret123").await.unwrap();

        let ctx = auth.authenticate(&first).await.unwrap();
        auth.logout(&ctx).await.unwrap();

        assert!(matches!(auth.authenticate(&first).await, Err(ServiceError::Unauthenticated)));
        assert!(auth.authenticate(&second).await.is_ok());
    }

    #[tokio::test]
    async fn test_expired_token_is_rejected() {
        let auth = service().with_token_ttl(Some(Duration::seconds(-1)));
        auth.register("Jane", "jane@example.com", "secret123").await.unwrap();
        let token = auth.login("jane@example.com", "secret123").await.unwrap();

        assert!(matches!(auth.authenticate(&token).await, Err(ServiceError::Unauthenticated)));
    }

    #[tokio::test]
    async fn test_change_password() {
        let auth = service();
        auth.register("Jane", "jane@example.com", "secret123").await.unwrap();
        let token = auth.login("jane@example.com", "secret123").await.unwrap();
        let ctx = auth.authenticate(&token).await.unwrap();

        assert!(matches!(
            auth.change_password(&ctx, "not-it", "newsecret1").await,
            Err(ServiceError::IncorrectPassword)
        ));

        auth.change_password(&ctx, "secret123", "newsecret1").await.unwrap();

        assert!(auth.login("jane@example.com", "secret123").await.is_err());
        assert!(auth.login("jane@example.com", "newsecret1").await.is_ok());
    }
}
