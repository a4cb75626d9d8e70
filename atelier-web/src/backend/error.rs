//! Closed error taxonomy for backend calls.
//!
//! The hosted backend answers failures with several loosely shaped JSON bodies
//! (REST errors carry `code`/`message`/`hint`/`details`, auth errors carry
//! `error`/`error_description` or `msg`). Everything is normalized here into a
//! [`RemoteCallError`] with a fixed [`RemoteErrorKind`] so handlers match on kinds,
//! never on payloads.

use crate::config::env::ConfigurationError;
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use service_core::error::AppError;
use thiserror::Error;

const MAX_MESSAGE_LEN: usize = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteErrorKind {
    Unauthorized,
    NotFound,
    Conflict,
    InvalidRequest,
    RateLimited,
    Unavailable,
    Unexpected,
}

#[derive(Debug, Clone, Error)]
#[error("backend call failed ({kind:?}, status {status:?}): {message}")]
pub struct RemoteCallError {
    pub kind: RemoteErrorKind,
    pub status: Option<u16>,
    pub message: String,
    pub code: Option<String>,
    pub hint: Option<String>,
    pub details: Option<String>,
}

impl RemoteCallError {
    fn new(kind: RemoteErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
            code: None,
            hint: None,
            details: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::NotFound, message)
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Unexpected, message)
    }

    /// Rejected locally before anything was sent.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::InvalidRequest, message)
    }

    /// Connection, timeout and body-read failures.
    pub fn transport(err: &reqwest::Error) -> Self {
        let mut error = Self::new(RemoteErrorKind::Unavailable, err.to_string());
        error.status = err.status().map(|s| s.as_u16());
        error
    }

    /// Normalize a non-success response.
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        let parsed: Option<Value> = serde_json::from_str(body).ok();
        let object = parsed.as_ref().and_then(Value::as_object);

        let string_field = |key: &str| -> Option<String> {
            object
                .and_then(|o| o.get(key))
                .and_then(Value::as_str)
                .map(str::to_string)
                .filter(|s| !s.is_empty())
        };

        let message = ["message", "msg", "error_description", "error"]
            .iter()
            .find_map(|key| string_field(key))
            .or_else(|| {
                let trimmed = body.trim();
                (!trimmed.is_empty() && object.is_none()).then(|| trimmed.to_string())
            })
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("unknown error")
                    .to_string()
            });

        let code = object
            .and_then(|o| o.get("error_code").or_else(|| o.get("code")))
            .and_then(|v| match v {
                Value::String(s) if !s.is_empty() => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .or_else(|| {
                // Auth errors put the machine code in `error` next to `error_description`.
                string_field("error_description").and_then(|_| string_field("error"))
            });

        let details = object.and_then(|o| o.get("details")).and_then(|v| match v {
            Value::Null => None,
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        });

        Self {
            kind: classify(status, code.as_deref()),
            status: Some(status.as_u16()),
            message: truncate(message),
            code,
            hint: string_field("hint"),
            details,
        }
    }
}

fn truncate(mut message: String) -> String {
    if message.len() > MAX_MESSAGE_LEN {
        let mut cut = MAX_MESSAGE_LEN;
        while !message.is_char_boundary(cut) {
            cut -= 1;
        }
        message.truncate(cut);
    }
    message
}

fn classify(status: StatusCode, code: Option<&str>) -> RemoteErrorKind {
    if let Some(code) = code {
        match code {
            "PGRST301" | "PGRST302" | "42501" | "bad_jwt" | "invalid_jwt" | "invalid_grant"
            | "session_not_found" | "refresh_token_not_found" | "refresh_token_already_used"
            | "invalid_credentials" => return RemoteErrorKind::Unauthorized,
            "PGRST116" | "PGRST205" | "42P01" | "user_not_found" => {
                return RemoteErrorKind::NotFound;
            }
            "23505" | "23503" | "user_already_exists" | "email_exists" => {
                return RemoteErrorKind::Conflict;
            }
            "over_request_rate_limit" | "over_email_send_rate_limit" => {
                return RemoteErrorKind::RateLimited;
            }
            c if c.starts_with("22") || c.starts_with("23") || c.starts_with("PGRST1") => {
                return RemoteErrorKind::InvalidRequest;
            }
            _ => {}
        }
    }

    match status.as_u16() {
        401 | 403 => RemoteErrorKind::Unauthorized,
        404 | 406 => RemoteErrorKind::NotFound,
        409 => RemoteErrorKind::Conflict,
        400 | 422 => RemoteErrorKind::InvalidRequest,
        429 => RemoteErrorKind::RateLimited,
        502..=504 => RemoteErrorKind::Unavailable,
        _ => RemoteErrorKind::Unexpected,
    }
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Remote(#[from] RemoteCallError),
}

impl BackendError {
    pub fn kind(&self) -> Option<RemoteErrorKind> {
        match self {
            BackendError::Configuration(_) => None,
            BackendError::Remote(err) => Some(err.kind),
        }
    }
}

impl From<BackendError> for AppError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Configuration(err) => AppError::ConfigError(anyhow::Error::new(err)),
            BackendError::Remote(err) => {
                tracing::error!(
                    kind = ?err.kind,
                    status = ?err.status,
                    code = ?err.code,
                    hint = ?err.hint,
                    details = ?err.details,
                    message = %err.message,
                    "Backend call failed"
                );

                match err.kind {
                    RemoteErrorKind::Unauthorized => {
                        AppError::Unauthorized(anyhow::anyhow!("Unauthorized"))
                    }
                    RemoteErrorKind::NotFound => AppError::NotFound(anyhow::anyhow!("Not found")),
                    RemoteErrorKind::Conflict => {
                        AppError::Conflict(anyhow::anyhow!("Resource already exists"))
                    }
                    RemoteErrorKind::InvalidRequest => {
                        AppError::BadRequest(anyhow::anyhow!("Invalid request"))
                    }
                    RemoteErrorKind::RateLimited
                    | RemoteErrorKind::Unavailable
                    | RemoteErrorKind::Unexpected => {
                        AppError::InternalError(anyhow::Error::new(err))
                    }
                }
            }
        }
    }
}
