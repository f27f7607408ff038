//! User role management commands.
//!
//! Users register through the API as customers; operators are promoted here.

use emporium_api::db::{RepositoryError, UserRepository};
use emporium_core::{Email, EmailError, UserRole};
use thiserror::Error;

use super::{ConnectError, connect};

/// Errors that can occur during user operations.
#[derive(Debug, Error)]
pub enum UserError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// Invalid email.
    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// No account with that email.
    #[error("No user with email: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Repository(RepositoryError),
}

/// Grant the admin role.
pub async fn promote(email: &str) -> Result<(), UserError> {
    set_role(email, UserRole::Admin).await
}

/// Revoke the admin role.
pub async fn demote(email: &str) -> Result<(), UserError> {
    set_role(email, UserRole::Customer).await
}

async fn set_role(email: &str, role: UserRole) -> Result<(), UserError> {
    let email = Email::parse(email)?;
    let pool = connect().await?;

    let user = UserRepository::new(&pool)
        .set_role(&email, role)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => UserError::NotFound(email.to_string()),
            other => UserError::Repository(other),
        })?;

    tracing::info!(user_id = %user.id, email = %user.email, role = %user.role, "Role updated");
    Ok(())
}
