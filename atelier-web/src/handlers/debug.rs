//! Connection diagnostics. Mounted only when `debug_routes` is enabled.

use crate::backend::{CredentialKind, User};
use crate::config::env::EnvPresence;
use crate::middleware::ServerClient;
use crate::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use service_core::error::AppError;
use std::time::Instant;

/// Tables the diagnostics may sample. `projects` and `portfolio` are distinct tables.
pub const DEBUG_TABLES: [&str; 4] = ["projects", "portfolio", "services", "customers"];

const SAMPLE_ROWS: usize = 5;

pub async fn env_report(State(state): State<AppState>) -> Json<Vec<EnvPresence>> {
    Json(state.resolver().report())
}

#[derive(Debug, Serialize)]
pub struct ConnectionReport {
    pub connected: bool,
    pub endpoint: String,
    pub credential_kind: CredentialKind,
    pub latency_ms: u128,
    pub error_kind: Option<String>,
}

pub async fn connection(State(state): State<AppState>) -> Result<Json<ConnectionReport>, AppError> {
    let client = state.privileged()?;
    let snapshot = client.snapshot();

    let started = Instant::now();
    let result = client
        .from("services")
        .select("id")
        .limit(1)
        .fetch::<Value>()
        .await;
    let latency_ms = started.elapsed().as_millis();

    let error_kind = match &result {
        Ok(_) => None,
        Err(e) => {
            tracing::warn!(error = %e, "Backend connection check failed");
            Some(
                e.kind()
                    .and_then(|kind| serde_json::to_value(kind).ok())
                    .and_then(|v| v.as_str().map(str::to_string))
                    .unwrap_or_else(|| "configuration".to_string()),
            )
        }
    };

    Ok(Json(ConnectionReport {
        connected: result.is_ok(),
        endpoint: snapshot.endpoint,
        credential_kind: snapshot.credential_kind,
        latency_ms,
        error_kind,
    }))
}

#[derive(Debug, Serialize)]
pub struct SessionReport {
    pub cookie_present: bool,
    /// Unix seconds; after any refresh this request performed.
    pub expires_at: Option<i64>,
    pub user: Option<User>,
}

pub async fn session(ServerClient(client): ServerClient) -> Result<Json<SessionReport>, AppError> {
    let expires_at = client.session().await?.map(|s| s.expires_at);
    let user = client.auth().user().await?;
    Ok(Json(SessionReport {
        cookie_present: client.session_cookie_present(),
        expires_at,
        user,
    }))
}

#[derive(Debug, Serialize)]
pub struct TableReport {
    pub table: String,
    pub count: u64,
    pub sample: Vec<Value>,
}

pub async fn table(
    State(state): State<AppState>,
    Path(table): Path<String>,
) -> Result<Json<TableReport>, AppError> {
    if !DEBUG_TABLES.contains(&table.as_str()) {
        return Err(AppError::NotFound(anyhow::anyhow!("Unknown table")));
    }

    let client = state.privileged()?;
    let count = client.from(&table).count().await?;
    let sample = client
        .from(&table)
        .select("*")
        .limit(SAMPLE_ROWS)
        .fetch()
        .await?;

    Ok(Json(TableReport {
        table,
        count,
        sample,
    }))
}
