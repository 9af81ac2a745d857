/// Authentication endpoints
///
/// # Endpoints
///
/// - `POST /register` - Register a new user
/// - `POST /login` - Exchange credentials for a bearer token
/// - `POST /logout` - Revoke the presented token
/// - `POST /change-password` - Replace the caller's password
/// - `GET /profile` - The caller's own record

use crate::{app::AppState, error::ApiResult, extract::ValidatedJson};
use axum::{extract::State, http::StatusCode, Extension, Json};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use taskhub_shared::{auth::middleware::AuthContext, models::user::User};
use validator::{Validate, ValidationError, ValidationErrors};

const MIN_PASSWORD_LENGTH: usize = 8;

fn rule(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Borrowed(message));
    err
}

fn name_present(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(rule("required", "The name field is required."));
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(
        required(message = "The name field is required."),
        custom(function = "name_present"),
        length(max = 255, message = "The name may not be greater than 255 characters.")
    )]
    pub name: Option<String>,

    #[validate(
        required(message = "The email field is required."),
        email(message = "The email must be a valid email address."),
        length(max = 255, message = "The email may not be greater than 255 characters.")
    )]
    pub email: Option<String>,

    #[validate(
        required(message = "The password field is required."),
        length(min = 8, message = "The password must be at least 8 characters.")
    )]
    pub password: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(
        required(message = "The email field is required."),
        email(message = "The email must be a valid email address.")
    )]
    pub email: Option<String>,

    #[validate(required(message = "The password field is required."))]
    pub password: Option<String>,
}

/// Rules are checked by hand: the confirmation compares two fields and is
/// reported under `new_password`
#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: Option<String>,
    pub new_password: Option<String>,
    pub new_password_confirmation: Option<String>,
}

impl Validate for ChangePasswordRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.current_password.is_none() {
            errors.add("current_password", rule("required", "The password is required."));
        }

        match &self.new_password {
            None => errors.add("new_password", rule("required", "The password is required.")),
            Some(password) => {
                if password.chars().count() < MIN_PASSWORD_LENGTH {
                    errors.add(
                        "new_password",
                        rule("length", "The password must be at least 8 characters."),
                    );
                }
                if self.new_password_confirmation.as_ref() != Some(password) {
                    errors.add(
                        "new_password",
                        rule("confirmed", "The password confirmation does not match."),
                    );
                }
            }
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

/// Register a new user
///
/// ```text
/// POST /register
/// {"name": "Jane Doe", "email": "jane@example.com", "password": "secret123"}
/// ```
///
/// `201 {"user": {...}}`; `422` on validation failure, `409` if the email
/// is taken.
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<UserResponse>)> {
    let user = state
        .auth
        .register(
            req.name.as_deref().unwrap_or_default(),
            req.email.as_deref().unwrap_or_default(),
            req.password.as_deref().unwrap_or_default(),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(UserResponse { user })))
}

/// Log in
///
/// ```text
/// POST /login
/// {"email": "jane@example.com", "password": "secret123"}
/// ```
///
/// `200 {"token": "{id}|{secret}"}`; `401 Invalid credentials` otherwise.
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let token = state
        .auth
        .login(
            req.email.as_deref().unwrap_or_default(),
            req.password.as_deref().unwrap_or_default(),
        )
        .await?;

    Ok(Json(TokenResponse { token }))
}

/// Revoke the token used for this request; other tokens stay valid
pub async fn logout(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<MessageResponse>> {
    state.auth.logout(&auth).await?;
    Ok(MessageResponse::new("Logged out successfully"))
}

/// Change password
///
/// ```text
/// POST /change-password
/// {"current_password": "...", "new_password": "...", "new_password_confirmation": "..."}
/// ```
///
/// `400` when the current password is wrong.
pub async fn change_password(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ValidatedJson(req): ValidatedJson<ChangePasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    state
        .auth
        .change_password(
            &auth,
            req.current_password.as_deref().unwrap_or_default(),
            req.new_password.as_deref().unwrap_or_default(),
        )
        .await?;

    Ok(MessageResponse::new("Password changed successfully"))
}

pub async fn profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Json<UserResponse> {
    Json(UserResponse {
        user: state.auth.profile(&auth),
    })
}
