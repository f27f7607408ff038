//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::ApiConfig;
use crate::gateway::{GatewayClient, SignatureVerifier};
use crate::services::email::EmailService;

/// Error creating application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("invalid SMTP configuration: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ApiConfig,
    pool: PgPool,
    gateway: Option<GatewayClient>,
    signatures: Option<SignatureVerifier>,
    email: Option<EmailService>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// Gateway, signature and email components exist only when configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the SMTP settings are present but invalid.
    pub fn new(config: ApiConfig, pool: PgPool) -> Result<Self, StateError> {
        let gateway = config.gateway.as_ref().map(GatewayClient::new);
        let signatures = config.signature_secret.clone().map(SignatureVerifier::new);
        let email = config.email.as_ref().map(EmailService::new).transpose()?;

        if gateway.is_none() {
            tracing::warn!("Payment gateway not configured; order creation will fail");
        }
        if email.is_none() {
            tracing::info!("SMTP not configured; confirmation emails disabled");
        }

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                gateway,
                signatures,
                email,
            }),
        })
    }

    /// Get a reference to the API configuration.
    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Payment gateway client, if configured.
    #[must_use]
    pub fn gateway(&self) -> Option<&GatewayClient> {
        self.inner.gateway.as_ref()
    }

    /// Payment signature verifier, if configured.
    #[must_use]
    pub fn signatures(&self) -> Option<&SignatureVerifier> {
        self.inner.signatures.as_ref()
    }

    /// Email service, if configured.
    #[must_use]
    pub fn email(&self) -> Option<&EmailService> {
        self.inner.email.as_ref()
    }
}
