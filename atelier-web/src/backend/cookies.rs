//! Request-scoped cookie access for backend handles.
//!
//! Reads come from the inbound request's `Cookie` header. Writes are buffered in
//! [`ResponseCookies`] and turned into `Set-Cookie` headers by the session cookie
//! middleware once the handler has produced its response. After that point the
//! buffer is committed and further writes are dropped.

use axum::http::HeaderMap;
use axum_extra::extract::cookie::{Cookie, CookieJar};
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("response already committed, cookie `{0}` was not written")]
pub struct SessionWriteError(pub String);

#[derive(Debug, Default)]
struct Pending {
    cookies: Vec<Cookie<'static>>,
    committed: bool,
}

/// Cookies to attach to the outgoing response of one request.
#[derive(Debug, Clone, Default)]
pub struct ResponseCookies {
    inner: Arc<Mutex<Pending>>,
}

impl ResponseCookies {
    pub fn new() -> Self {
        Self::default()
    }

    /// A buffer that rejects every write, for handles built outside the middleware.
    pub fn committed() -> Self {
        let cookies = Self::new();
        cookies.commit();
        cookies
    }

    /// Queue a cookie. A later cookie with the same name replaces an earlier one.
    pub fn push(&self, cookie: Cookie<'static>) -> Result<(), SessionWriteError> {
        let mut pending = self
            .inner
            .lock()
            .map_err(|_| SessionWriteError(cookie.name().to_string()))?;

        if pending.committed {
            return Err(SessionWriteError(cookie.name().to_string()));
        }

        pending.cookies.retain(|c| c.name() != cookie.name());
        pending.cookies.push(cookie);
        Ok(())
    }

    /// Mark the response as committed and take everything queued so far.
    pub fn commit(&self) -> Vec<Cookie<'static>> {
        let mut pending = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        pending.committed = true;
        std::mem::take(&mut pending.cookies)
    }

    pub fn is_committed(&self) -> bool {
        self.inner
            .lock()
            .map(|p| p.committed)
            .unwrap_or(true)
    }
}

/// Cookie accessor bound to one request/response pair.
#[derive(Debug, Clone)]
pub struct SessionCookies {
    incoming: CookieJar,
    outgoing: ResponseCookies,
}

impl SessionCookies {
    pub fn new(incoming: CookieJar, outgoing: ResponseCookies) -> Self {
        Self { incoming, outgoing }
    }

    pub fn from_headers(headers: &HeaderMap, outgoing: ResponseCookies) -> Self {
        Self::new(CookieJar::from_headers(headers), outgoing)
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.incoming.get(name).map(|c| c.value().to_string())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.incoming.get(name).is_some()
    }

    pub fn try_set(&self, cookie: Cookie<'static>) -> Result<(), SessionWriteError> {
        self.outgoing.push(cookie)
    }

    /// Best-effort write. A refreshed session that cannot be written is not worth
    /// failing the request over.
    pub fn set(&self, cookie: Cookie<'static>) {
        if let Err(e) = self.try_set(cookie) {
            tracing::debug!(error = %e, "Dropped session cookie write");
        }
    }
}
