/// Bearer-token authentication middleware for Axum
///
/// Reads `Authorization: Bearer {token_id}|{secret}`, resolves it through
/// [`AuthService::authenticate`] and stores the resulting [`AuthContext`]
/// in the request extensions. Requests without a valid token never reach
/// the handler.
///
/// # Example
///
/// ```no_run
/// use axum::{middleware, routing::get, Extension, Router};
/// use taskhub_shared::auth::middleware::{require_auth, AuthContext};
/// use taskhub_shared::services::auth::AuthService;
///
/// async fn whoami(Extension(auth): Extension<AuthContext>) -> String {
///     auth.user.email
/// }
///
/// fn router(auth: AuthService) -> Router {
///     Router::new()
///         .route("/whoami", get(whoami))
///         .layer(middleware::from_fn_with_state(auth, require_auth))
/// }
/// ```

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use uuid::Uuid;

use crate::models::user::User;
use crate::services::auth::AuthService;
use crate::services::ServiceError;

/// Identity of the authenticated caller
///
/// Extract with `Extension<AuthContext>`.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user: User,

    /// Access token used for this request
    pub token_id: Uuid,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing bearer token")]
    MissingCredentials,

    #[error("Expected Bearer token")]
    InvalidFormat,

    /// Token unknown, revoked, mismatched or expired
    #[error("Invalid token")]
    InvalidToken,

    #[error("Authentication failed: {0}")]
    Internal(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error, message) = match &self {
            AuthError::Internal(detail) => {
                tracing::error!(error = %detail, "Authentication backend failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
            _ => (StatusCode::UNAUTHORIZED, "unauthorized", "Unauthenticated.".to_string()),
        };

        let body = Json(json!({ "error": error, "message": message }));
        let mut response = (status, body).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, header::HeaderValue::from_static("Bearer"));
        }
        response
    }
}

/// Extracts the token from an `Authorization` header value
fn bearer_token(value: &str) -> Result<&str, AuthError> {
    let token = value
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidFormat)?
        .trim();
    if token.is_empty() {
        return Err(AuthError::MissingCredentials);
    }
    Ok(token)
}

/// Rejects requests without a valid bearer token
pub async fn require_auth(
    State(auth): State<AuthService>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let header_value = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingCredentials)?;

    let token = bearer_token(header_value)?;

    let context = auth.authenticate(token).await.map_err(|e| match e {
        ServiceError::Unauthenticated => AuthError::InvalidToken,
        other => AuthError::Internal(other.to_string()),
    })?;

    tracing::debug!(user_id = %context.user.id, "Request authenticated");
    req.extensions_mut().insert(context);

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token("Bearer abc|def").unwrap(), "abc|def");
        assert!(matches!(bearer_token("Basic abc"), Err(AuthError::InvalidFormat)));
        assert!(matches!(bearer_token("Bearer   "), Err(AuthError::MissingCredentials)));
    }

    #[test]
    fn test_auth_error_into_response() {
        let response = AuthError::MissingCredentials.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");

        let response = AuthError::InvalidToken.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = AuthError::Internal("db down".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
