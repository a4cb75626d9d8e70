use crate::backend::BackendError;
use crate::config::env::{KeyScope, SITE_URL};
use crate::AppState;
use axum::{extract::State, response::IntoResponse, Json};
use secrecy::ExposeSecret;
use serde::Serialize;
use serde_json::json;
use service_core::error::AppError;

pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "atelier-web",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Everything a browser needs to build its own anonymous client.
#[derive(Debug, Serialize)]
pub struct PublicConfig {
    pub url: String,
    pub anon_key: String,
    pub site_url: Option<String>,
}

pub async fn public_config(State(state): State<AppState>) -> Result<Json<PublicConfig>, AppError> {
    let env = state
        .resolver()
        .resolve(KeyScope::Public)
        .map_err(BackendError::from)?;

    Ok(Json(PublicConfig {
        url: env.endpoint.to_string(),
        anon_key: env.public_key.expose_secret().clone(),
        site_url: state.resolver().require_url(SITE_URL).ok().map(String::from),
    }))
}
