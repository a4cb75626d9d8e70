use crate::backend::BackendError;
use crate::config::env::CRON_SECRET;
use crate::AppState;
use axum::{extract::State, http::header::AUTHORIZATION, http::HeaderMap, Json};
use secrecy::ExposeSecret;
use serde_json::{json, Value};
use service_core::error::AppError;
use service_core::utils::signature::secrets_match;

/// Scheduled ping that keeps the hosted database from idling.
pub async fn keepalive(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    let secret = state
        .resolver()
        .require(CRON_SECRET)
        .map_err(BackendError::from)?;

    let provided = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or_default();

    if !secrets_match(secret.expose_secret(), provided.trim()) {
        return Err(AppError::Unauthorized(anyhow::anyhow!("Invalid cron secret")));
    }

    let services = state.privileged()?.from("services").count().await?;

    tracing::info!(services, "Keepalive ran");
    Ok(Json(json!({ "ok": true, "services": services })))
}
