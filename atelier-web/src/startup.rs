use crate::backend::ClientFactory;
use crate::config::env::EnvResolver;
use crate::config::{EmailProviderKind, Settings};
use crate::handlers::{
    app, auth, cron, customers, dashboard, debug, metrics, projects, public, webhooks,
};
use crate::middleware::session_cookies_middleware;
use crate::services::email::{EmailProvider, HttpEmailProvider, MockEmailProvider, SmtpProvider};
use crate::AppState;
use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    bot_detection::bot_detection_middleware,
    metrics::metrics_middleware,
    rate_limit::ip_rate_limit_middleware,
    security_headers::security_headers_middleware,
    tracing::{request_id_middleware, RequestId},
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

pub fn build_router(state: AppState) -> Router {
    let signin = Router::new()
        .route("/api/auth/signin", post(auth::sign_in))
        .layer(from_fn_with_state(
            state.signin_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let contact = Router::new()
        .route("/api/contact", post(public::contact))
        .layer(from_fn(bot_detection_middleware))
        .layer(from_fn_with_state(
            state.contact_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let mut router = Router::new()
        .route("/health", get(app::health_check))
        .route("/api/health", get(app::health_check))
        .route("/metrics", get(metrics::metrics))
        .route("/api/config/public", get(app::public_config))
        .route("/api/portfolio", get(public::portfolio))
        .route("/api/services", get(public::services))
        .route("/api/auth/signout", post(auth::sign_out))
        .route(
            "/api/projects",
            get(projects::list_projects).post(projects::create_project),
        )
        .route(
            "/api/projects/:id",
            get(projects::get_project)
                .patch(projects::update_project)
                .delete(projects::delete_project),
        )
        .route(
            "/api/dashboard/services",
            get(dashboard::list_services).post(dashboard::create_service),
        )
        .route(
            "/api/dashboard/services/:id",
            axum::routing::patch(dashboard::update_service).delete(dashboard::delete_service),
        )
        .route("/api/customers", get(customers::list_customers))
        .route(
            "/api/customers/:id",
            get(customers::get_customer).patch(customers::update_customer),
        )
        .route("/api/webhooks/email", post(webhooks::email_webhook))
        .route("/api/cron/keepalive", get(cron::keepalive))
        .merge(signin)
        .merge(contact);

    if state.settings.debug_routes {
        tracing::warn!("Debug routes enabled");
        router = router
            .route("/api/debug/env", get(debug::env_report))
            .route("/api/debug/connection", get(debug::connection))
            .route("/api/debug/session", get(debug::session))
            .route("/api/debug/tables/:table", get(debug::table));
    }

    router
        .layer(from_fn(session_cookies_middleware))
        .layer(from_fn(metrics_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .extensions()
                    .get::<RequestId>()
                    .map(RequestId::as_str)
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri().path(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}

/// Picks the configured delivery provider. Falls back to the mock when the
/// configured one cannot be built.
pub fn build_email_provider(settings: &Settings, resolver: &EnvResolver) -> Arc<dyn EmailProvider> {
    match settings.email.provider {
        EmailProviderKind::Mock => Arc::new(MockEmailProvider::new()),
        EmailProviderKind::Http => {
            let client = reqwest::Client::builder()
                .timeout(Duration::from_secs(settings.backend.timeout_seconds))
                .build();
            match client {
                Ok(client) => Arc::new(HttpEmailProvider::new(
                    &settings.email,
                    resolver.clone(),
                    client,
                )),
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        "Failed to build email HTTP client, using mock provider"
                    );
                    Arc::new(MockEmailProvider::new())
                }
            }
        }
        EmailProviderKind::Smtp => {
            let provider = settings
                .smtp
                .as_ref()
                .ok_or_else(|| "smtp section missing".to_string())
                .and_then(|smtp| {
                    SmtpProvider::new(smtp, &settings.email).map_err(|e| e.to_string())
                });
            match provider {
                Ok(provider) => Arc::new(provider),
                Err(e) => {
                    tracing::error!(error = %e, "SMTP provider unavailable, using mock provider");
                    Arc::new(MockEmailProvider::new())
                }
            }
        }
    }
}

/// Startup probe of the delivery provider. A failing provider only degrades
/// enquiry notifications, so it is reported rather than fatal.
pub async fn check_email_provider(provider: &dyn EmailProvider) -> bool {
    if !provider.is_enabled() {
        tracing::warn!("Email delivery disabled, notifications are logged only");
        return false;
    }

    match provider.health_check().await {
        Ok(()) => {
            tracing::info!("Email provider ready");
            true
        }
        Err(e) => {
            tracing::warn!(error = %e, "Email provider health check failed");
            false
        }
    }
}

pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Binds the listener and wires state. `email` overrides the configured provider.
    pub async fn build(
        settings: Settings,
        resolver: EnvResolver,
        email: Option<Arc<dyn EmailProvider>>,
    ) -> Result<Self, AppError> {
        let factory = ClientFactory::new(
            resolver.clone(),
            Duration::from_secs(settings.backend.timeout_seconds),
        )
        .map_err(|e| AppError::ConfigError(anyhow::anyhow!("Failed to build HTTP client: {}", e)))?;

        let email = email.unwrap_or_else(|| build_email_provider(&settings, &resolver));
        check_email_provider(email.as_ref()).await;
        let address = settings.server.address();
        let state = AppState::new(settings, factory, email);

        let listener = TcpListener::bind(&address).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", address, e);
            AppError::InternalError(anyhow::anyhow!("Failed to bind to address {}: {}", address, e))
        })?;
        let port = listener.local_addr()?.port();

        Ok(Self {
            port,
            listener,
            router: build_router(state),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> Result<(), AppError> {
        tracing::info!(port = self.port, "Listening");
        axum::serve(
            self.listener,
            self.router
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;

        tracing::info!("Service shutdown complete");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
