use crate::backend::BackendError;
use crate::config::env::{CRON_SECRET, SITE_URL};
use crate::models::WebhookPayload;
use crate::services::notify::{new_enquiry_email, EnquiryRecord};
use crate::AppState;
use axum::{body::Bytes, extract::State, http::HeaderMap, Json};
use secrecy::ExposeSecret;
use serde_json::{json, Value};
use service_core::error::AppError;
use service_core::utils::signature::verify_body_signature;

pub const SIGNATURE_HEADER: &str = "x-webhook-signature";

/// Database change webhook. New `customers` rows notify the studio owner by email.
#[tracing::instrument(skip_all)]
pub async fn email_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let secret = state
        .resolver()
        .require(CRON_SECRET)
        .map_err(BackendError::from)?;

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Missing webhook signature")))?;

    if !verify_body_signature(secret.expose_secret(), &body, signature)? {
        tracing::warn!("Rejected webhook with invalid signature");
        return Err(AppError::Unauthorized(anyhow::anyhow!(
            "Invalid webhook signature"
        )));
    }

    let payload: WebhookPayload = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Invalid webhook payload: {}", e)))?;

    if !payload.is_new_customer() {
        tracing::debug!(table = %payload.table, event = ?payload.event, "Ignoring webhook event");
        return Ok(Json(json!({ "handled": false })));
    }

    let record: EnquiryRecord = payload
        .record
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Insert event without record")))
        .and_then(|record| {
            serde_json::from_value(record).map_err(|e| {
                AppError::BadRequest(anyhow::anyhow!("Unexpected customer record: {}", e))
            })
        })?;

    let site_url = state.resolver().require_url(SITE_URL).ok();
    let message = new_enquiry_email(
        &record,
        &state.settings.email.notify_address,
        site_url.as_ref(),
    )
    .map_err(|e| AppError::InternalError(anyhow::anyhow!("Failed to render email: {}", e)))?;

    let response = state.email.send(&message).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to send enquiry notification");
        AppError::EmailError(e.to_string())
    })?;

    tracing::info!(
        customer_id = ?record.id,
        provider_id = ?response.provider_id,
        "Enquiry notification sent"
    );
    Ok(Json(json!({
        "handled": true,
        "provider_id": response.provider_id
    })))
}
