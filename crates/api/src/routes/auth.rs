//! Session login routes.

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use super::ApiJson;
use crate::error::{AppError, clear_sentry_user, set_sentry_user};
use crate::middleware::{RequireUser, clear_current_user, set_current_user};
use crate::models::User;
use crate::services::{AuthError, AuthService};
use crate::state::AppState;

/// Registration form.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

/// Login form.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Create a customer account and log it in.
///
/// POST /api/auth/register
#[instrument(skip(state, session, form), fields(email = %form.email))]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    ApiJson(form): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let user = AuthService::new(state.pool())
        .register(&form.email, &form.password, &form.name)
        .await?;

    set_current_user(&session, &user)
        .await
        .map_err(AuthError::from)?;
    set_sentry_user(&user.id, Some(user.email.as_str()));

    Ok((StatusCode::CREATED, Json(user)))
}

/// Log in with email and password.
///
/// POST /api/auth/login
#[instrument(skip(state, session, form), fields(email = %form.email))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    ApiJson(form): ApiJson<LoginRequest>,
) -> Result<Json<User>, AppError> {
    let user = match AuthService::new(state.pool())
        .login(&form.email, &form.password)
        .await
    {
        Ok(user) => user,
        Err(AuthError::InvalidCredentials) => {
            tracing::warn!(target: "security", email = %form.email, "Failed login attempt");
            return Err(AuthError::InvalidCredentials.into());
        }
        Err(e) => return Err(e.into()),
    };

    set_current_user(&session, &user)
        .await
        .map_err(AuthError::from)?;
    set_sentry_user(&user.id, Some(user.email.as_str()));

    tracing::info!(user_id = %user.id, "User logged in");
    Ok(Json(user))
}

/// End the current session.
///
/// POST /api/auth/logout
#[instrument(skip(session))]
pub async fn logout(session: Session) -> Result<StatusCode, AppError> {
    clear_current_user(&session)
        .await
        .map_err(AuthError::from)?;
    clear_sentry_user();

    Ok(StatusCode::NO_CONTENT)
}

/// Current user profile.
///
/// GET /api/auth/me
pub async fn me(RequireUser(user): RequireUser) -> Json<User> {
    Json(user)
}
