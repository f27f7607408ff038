//! Authentication extractors.
//!
//! The session only carries the user's identity. Every authenticated
//! request re-reads the user record so role changes apply immediately.

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;

use crate::db::users::UserRepository;
use crate::error::{AppError, set_sentry_user};
use crate::models::{CurrentUser, User, session_keys};
use crate::state::AppState;

/// Extractor that requires a logged-in user.
///
/// Rejects with `unauthenticated` when there is no session, the session
/// holds no user, or the user no longer exists.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(RequireUser(user): RequireUser) -> String {
///     format!("Hello, {}!", user.name)
/// }
/// ```
pub struct RequireUser(pub User);

impl FromRequestParts<AppState> for RequireUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<Session>()
            .ok_or_else(|| AppError::Unauthorized("Login required".to_string()))?;

        let current: CurrentUser = session
            .get(session_keys::CURRENT_USER)
            .await
            .map_err(session_error)?
            .ok_or_else(|| AppError::Unauthorized("Login required".to_string()))?;

        let user = UserRepository::new(state.pool())
            .get_by_id(current.id)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Login required".to_string()))?;

        set_sentry_user(&user.id, Some(user.email.as_str()));

        Ok(Self(user))
    }
}

/// A session store failure is a server fault, not a missing login.
fn session_error(err: tower_sessions::session::Error) -> AppError {
    tracing::error!(error = %err, "Failed to load session");
    AppError::Internal(format!("session store error: {err}"))
}

/// Store the user's identity in the session.
///
/// The session ID is cycled first to prevent fixation.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user: &User,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session
        .insert(
            session_keys::CURRENT_USER,
            CurrentUser {
                id: user.id,
                email: user.email.clone(),
            },
        )
        .await
}

/// Remove the user from the session (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.flush().await
}
