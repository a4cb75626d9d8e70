pub mod backend;
pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;

use backend::{BackendClient, ClientFactory};
use config::env::{ConfigurationError, EnvResolver};
use config::Settings;
use service_core::error::AppError;
use service_core::middleware::rate_limit::{create_ip_rate_limiter, IpRateLimiter};
use services::email::EmailProvider;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub factory: ClientFactory,
    /// Built once at startup; the only handle shared between requests.
    privileged: Result<Arc<BackendClient>, ConfigurationError>,
    pub email: Arc<dyn EmailProvider>,
    pub signin_limiter: IpRateLimiter,
    pub contact_limiter: IpRateLimiter,
}

impl AppState {
    pub fn new(settings: Settings, factory: ClientFactory, email: Arc<dyn EmailProvider>) -> Self {
        let privileged = factory.privileged_client().map(Arc::new);
        if let Err(e) = &privileged {
            tracing::warn!(error = %e, "Privileged backend client unavailable");
        }

        let limits = &settings.rate_limit;
        let signin_limiter =
            create_ip_rate_limiter(limits.signin_attempts, limits.signin_window_seconds);
        let contact_limiter =
            create_ip_rate_limiter(limits.contact_attempts, limits.contact_window_seconds);

        Self {
            settings: Arc::new(settings),
            factory,
            privileged,
            email,
            signin_limiter,
            contact_limiter,
        }
    }

    pub fn resolver(&self) -> &EnvResolver {
        self.factory.resolver()
    }

    /// The process-wide privileged handle. Server-side handlers only.
    pub fn privileged(&self) -> Result<Arc<BackendClient>, AppError> {
        self.privileged
            .clone()
            .map_err(|e| AppError::ConfigError(anyhow::Error::new(e)))
    }
}
