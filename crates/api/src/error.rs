//! Unified error handling with Sentry integration.
//!
//! Every handler returns `Result<T, AppError>`. Errors render as
//! `{"error": {"code": "<kind>", "message": "<text>"}}`; server-side
//! failures are captured to Sentry before responding and never leak
//! database details.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::services::inventory::InventoryError;
use crate::services::orders::OrderError;

/// Client-visible error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Unauthenticated,
    InvalidArgument,
    NotFound,
    PermissionDenied,
    Internal,
    ResourceExhausted,
}

impl ErrorKind {
    /// Wire code for the error body.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::InvalidArgument => "invalid-argument",
            Self::NotFound => "not-found",
            Self::PermissionDenied => "permission-denied",
            Self::Internal => "internal",
            Self::ResourceExhausted => "resource-exhausted",
        }
    }

    /// Default HTTP status.
    #[must_use]
    pub const fn status(self) -> StatusCode {
        match self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::InvalidArgument => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::PermissionDenied => StatusCode::FORBIDDEN,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ResourceExhausted => StatusCode::TOO_MANY_REQUESTS,
        }
    }
}

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Order operation failed.
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    /// Stock adjustment failed.
    #[error("Inventory error: {0}")]
    Inventory(#[from] InventoryError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// User lacks the required role.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: ErrorDetail<'a>,
}

#[derive(Serialize)]
struct ErrorDetail<'a> {
    code: &'a str,
    message: String,
}

impl AppError {
    /// Client-visible category.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Database(RepositoryError::NotFound) | Self::NotFound(_) => ErrorKind::NotFound,
            Self::Database(_) | Self::Internal(_) => ErrorKind::Internal,
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => ErrorKind::Unauthenticated,
                AuthError::InvalidEmail(_)
                | AuthError::UserAlreadyExists
                | AuthError::WeakPassword(_)
                | AuthError::InvalidName(_) => ErrorKind::InvalidArgument,
                AuthError::Repository(_) | AuthError::PasswordHash | AuthError::Session(_) => {
                    ErrorKind::Internal
                }
            },
            Self::Order(err) => match err {
                OrderError::Validation(_)
                | OrderError::VariantRequired(_)
                | OrderError::NoVariants(_)
                | OrderError::Amount(_) => ErrorKind::InvalidArgument,
                OrderError::ProductNotFound(_)
                | OrderError::VariantNotFound { .. }
                | OrderError::OrderNotFound(_) => ErrorKind::NotFound,
                OrderError::Forbidden => ErrorKind::PermissionDenied,
                OrderError::InvalidSignature(_) => ErrorKind::Unauthenticated,
                OrderError::GatewayNotConfigured
                | OrderError::SignatureNotConfigured
                | OrderError::Gateway(_)
                | OrderError::Repository(_) => ErrorKind::Internal,
            },
            Self::Inventory(err) => match err {
                InventoryError::InvalidStock(_)
                | InventoryError::VariantRequired
                | InventoryError::NoVariants
                | InventoryError::VariantOutOfRange { .. } => ErrorKind::InvalidArgument,
                InventoryError::Forbidden => ErrorKind::PermissionDenied,
                InventoryError::ProductNotFound(_) => ErrorKind::NotFound,
                InventoryError::Repository(_) => ErrorKind::Internal,
            },
            Self::Unauthorized(_) => ErrorKind::Unauthenticated,
            Self::Forbidden(_) => ErrorKind::PermissionDenied,
            Self::BadRequest(_) => ErrorKind::InvalidArgument,
            Self::RateLimited => ErrorKind::ResourceExhausted,
        }
    }

    /// HTTP status for the response.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Order(OrderError::Gateway(_)) => StatusCode::BAD_GATEWAY,
            _ => self.kind().status(),
        }
    }

    /// Message for the response body.
    fn public_message(&self) -> String {
        match self {
            Self::Order(OrderError::Gateway(err)) => err.public_message(),
            Self::Order(err @ (OrderError::GatewayNotConfigured | OrderError::SignatureNotConfigured)) => {
                err.to_string()
            }
            Self::Auth(AuthError::InvalidEmail(_)) => "Invalid email address".to_string(),
            Self::Auth(AuthError::UserAlreadyExists) => {
                "An account with this email already exists".to_string()
            }
            Self::Auth(AuthError::WeakPassword(msg) | AuthError::InvalidName(msg)) => msg.clone(),
            Self::Auth(AuthError::InvalidCredentials) => "Invalid credentials".to_string(),
            Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::BadRequest(msg)
            | Self::NotFound(msg) => msg.clone(),
            Self::Order(err) if self.kind() != ErrorKind::Internal => err.to_string(),
            Self::Inventory(err) if self.kind() != ErrorKind::Internal => err.to_string(),
            Self::Database(RepositoryError::NotFound) => "Not found".to_string(),
            Self::RateLimited => "Too many requests".to_string(),
            // Don't expose internal error details to clients
            _ => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let kind = self.kind();

        // Capture server errors to Sentry
        if kind == ErrorKind::Internal {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: kind.code(),
                message: self.public_message(),
            },
        };

        (self.status(), Json(body)).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use emporium_core::{OrderId, OrderValidationError, ProductId};

    use super::*;
    use crate::gateway::{GatewayError, SignatureError};

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product-123".to_string());
        assert_eq!(err.to_string(), "Not found: product-123");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        fn get_status(err: AppError) -> StatusCode {
            err.into_response().status()
        }

        assert_eq!(get_status(AppError::NotFound("test".to_string())), StatusCode::NOT_FOUND);
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(get_status(AppError::Forbidden("test".to_string())), StatusCode::FORBIDDEN);
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(get_status(AppError::RateLimited), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_order_error_kinds() {
        let cases = [
            (
                OrderError::Validation(OrderValidationError::NoItems),
                ErrorKind::InvalidArgument,
            ),
            (OrderError::ProductNotFound(ProductId::new(9)), ErrorKind::NotFound),
            (
                OrderError::VariantNotFound {
                    product_id: ProductId::new(9),
                    index: 4,
                },
                ErrorKind::NotFound,
            ),
            (OrderError::VariantRequired(ProductId::new(9)), ErrorKind::InvalidArgument),
            (OrderError::OrderNotFound(OrderId::new("order_x")), ErrorKind::NotFound),
            (OrderError::Forbidden, ErrorKind::PermissionDenied),
            (
                OrderError::InvalidSignature(SignatureError::Mismatch),
                ErrorKind::Unauthenticated,
            ),
            (OrderError::SignatureNotConfigured, ErrorKind::Internal),
        ];

        for (err, kind) in cases {
            assert_eq!(AppError::from(err).kind(), kind);
        }
    }

    #[tokio::test]
    async fn test_error_body_shape() {
        let (status, body) =
            body_json(OrderError::Validation(OrderValidationError::NoItems).into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "invalid-argument");
        assert_eq!(body["error"]["message"], "order must contain at least one item");
    }

    #[tokio::test]
    async fn test_gateway_error_is_bad_gateway_with_gateway_text() {
        let err = OrderError::Gateway(GatewayError::Api {
            status: 400,
            code: "BAD_REQUEST_ERROR".to_owned(),
            message: "amount too small".to_owned(),
        });
        let (status, body) = body_json(err.into()).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"]["code"], "internal");
        assert!(body["error"]["message"].as_str().unwrap().contains("amount too small"));
    }

    #[tokio::test]
    async fn test_database_details_are_hidden() {
        let err = AppError::Database(RepositoryError::DataCorruption(
            "invalid email in database: secret-row".to_owned(),
        ));
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["message"], "Internal server error");
    }
}
