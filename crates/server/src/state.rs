//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::AppConfig;
use crate::services::EmailService;
use crate::stripe::StripeClient;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AppConfig,
    pool: PgPool,
    stripe: StripeClient,
    mailer: Option<EmailService>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// `mailer` is `None` when SMTP is not configured; order confirmations
    /// are then logged instead of sent.
    #[must_use]
    pub fn new(config: AppConfig, pool: PgPool, mailer: Option<EmailService>) -> Self {
        let stripe = StripeClient::new(config.stripe.clone());

        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                stripe,
                mailer,
            }),
        }
    }

    /// Get a reference to the application configuration.
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the Stripe API client.
    #[must_use]
    pub fn stripe(&self) -> &StripeClient {
        &self.inner.stripe
    }

    /// Get a reference to the email service, if SMTP is configured.
    #[must_use]
    pub fn mailer(&self) -> Option<&EmailService> {
        self.inner.mailer.as_ref()
    }
}
