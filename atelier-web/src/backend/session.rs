//! Auth session persisted in a browser cookie.

use super::auth::User;
use axum_extra::extract::cookie::{Cookie, SameSite};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fmt;

const COOKIE_VALUE_PREFIX: &str = "base64-";

/// Refresh this many seconds before the access token actually expires.
pub const REFRESH_MARGIN_SECS: i64 = 60;

/// Session cookies outlive access tokens; the refresh token is what keeps them useful.
const COOKIE_MAX_AGE_DAYS: i64 = 400;

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix seconds.
    pub expires_at: i64,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl Session {
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now.timestamp() + REFRESH_MARGIN_SECS
    }

    pub fn encode(&self) -> String {
        // Serializing three strings/ints into JSON cannot fail.
        let json = serde_json::to_vec(self).unwrap_or_default();
        format!("{}{}", COOKIE_VALUE_PREFIX, URL_SAFE_NO_PAD.encode(json))
    }

    pub fn decode(raw: &str) -> Option<Self> {
        let encoded = raw.strip_prefix(COOKIE_VALUE_PREFIX)?;
        let bytes = URL_SAFE_NO_PAD.decode(encoded).ok()?;
        let session: Session = serde_json::from_slice(&bytes).ok()?;

        (!session.access_token.is_empty()).then_some(session)
    }
}

/// Token grant response from the auth API.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub user: Option<User>,
}

impl TokenResponse {
    pub fn into_session(self, now: DateTime<Utc>) -> (Session, Option<User>) {
        let expires_at = self
            .expires_at
            .unwrap_or_else(|| now.timestamp() + self.expires_in.unwrap_or(3600));

        (
            Session {
                access_token: self.access_token,
                refresh_token: self.refresh_token,
                expires_at,
            },
            self.user,
        )
    }
}

/// `sb-<project-ref>-auth-token`, where the ref is the first label of the endpoint host.
pub fn cookie_name(endpoint: &Url) -> String {
    let project_ref = endpoint
        .host_str()
        .and_then(|host| host.split('.').next())
        .filter(|label| !label.is_empty())
        .unwrap_or("local");

    format!("sb-{}-auth-token", project_ref)
}

pub fn session_cookie(name: &str, session: &Session, secure: bool) -> Cookie<'static> {
    Cookie::build((name.to_string(), session.encode()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(time::Duration::days(COOKIE_MAX_AGE_DAYS))
        .build()
}

/// An already-expired cookie that makes the browser drop the session.
pub fn removal_cookie(name: &str, secure: bool) -> Cookie<'static> {
    Cookie::build((name.to_string(), String::new()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(time::Duration::ZERO)
        .expires(time::OffsetDateTime::UNIX_EPOCH)
        .build()
}
