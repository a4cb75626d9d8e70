//! The backend handle.
//!
//! A [`BackendClient`] is one connection context to the hosted backend: an
//! endpoint, a credential, and optionally the cookie session of the request it was
//! built for. Handles bound to a request are not `Clone`; each request builds its
//! own so session state never crosses requests.

use super::auth::{AuthApi, User};
use super::cookies::SessionCookies;
use super::error::{BackendError, RemoteCallError, RemoteErrorKind};
use super::query::TableQuery;
use super::session::{self, Session, TokenResponse};
use super::storage::StorageApi;
use chrono::Utc;
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::{Method, Url};
use secrecy::{ExposeSecret, Secret};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use service_core::observability::TracedClientExt;
use sha2::{Digest, Sha256};
use std::fmt;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
    /// Row-level security applies.
    Public,
    /// Bypasses row-level security.
    ServiceRole,
}

#[derive(Clone)]
pub struct Credential {
    kind: CredentialKind,
    key: Secret<String>,
}

impl Credential {
    pub fn new(kind: CredentialKind, key: Secret<String>) -> Self {
        Self { kind, key }
    }

    pub fn kind(&self) -> CredentialKind {
        self.kind
    }

    pub fn expose(&self) -> &str {
        self.key.expose_secret()
    }

    /// Short SHA-256 prefix that identifies the key without revealing it.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.key.expose_secret().as_bytes());
        hex::encode(&digest[..8])
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("kind", &self.kind)
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

/// Observable identity of a handle, safe to log and compare.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HandleSnapshot {
    pub endpoint: String,
    pub credential_kind: CredentialKind,
    pub credential_fingerprint: String,
    pub session_bound: bool,
}

#[derive(Default)]
struct SessionState {
    loaded: bool,
    session: Option<Session>,
    user: Option<User>,
}

/// Cookie-backed session of one request.
pub(crate) struct RequestSession {
    cookies: SessionCookies,
    cookie_name: String,
    secure: bool,
    state: Mutex<SessionState>,
}

impl RequestSession {
    pub(crate) fn new(cookies: SessionCookies, cookie_name: String, secure: bool) -> Self {
        Self {
            cookies,
            cookie_name,
            secure,
            state: Mutex::new(SessionState::default()),
        }
    }

    fn read_cookie(&self) -> Option<Session> {
        let raw = self.cookies.get(&self.cookie_name)?;
        let decoded = Session::decode(&raw);
        if decoded.is_none() {
            tracing::debug!(cookie = %self.cookie_name, "Discarding unreadable session cookie");
            self.clear_cookie();
        }
        decoded
    }

    fn store_cookie(&self, session: &Session) {
        self.cookies.set(session::session_cookie(
            &self.cookie_name,
            session,
            self.secure,
        ));
    }

    fn clear_cookie(&self) {
        self.cookies
            .set(session::removal_cookie(&self.cookie_name, self.secure));
    }
}

/// Which bearer token a call carries.
pub(crate) enum Authorization {
    /// The handle's own key.
    Credential,
    /// The session access token when there is one, the key otherwise.
    Session,
    Token(String),
}

pub struct BackendClient {
    http: reqwest::Client,
    endpoint: Url,
    credential: Credential,
    session: Option<RequestSession>,
    request_id: Option<String>,
}

impl fmt::Debug for BackendClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("credential", &self.credential)
            .field("session_bound", &self.session.is_some())
            .finish()
    }
}

impl BackendClient {
    pub(crate) fn new(
        http: reqwest::Client,
        mut endpoint: Url,
        credential: Credential,
        session: Option<RequestSession>,
    ) -> Self {
        // Relative joins need a trailing slash on the base path.
        if !endpoint.path().ends_with('/') {
            let path = format!("{}/", endpoint.path());
            endpoint.set_path(&path);
        }

        Self {
            http,
            endpoint,
            credential,
            session,
            request_id: None,
        }
    }

    /// Forward this correlation ID on every call made through the handle.
    pub fn with_request_id(mut self, request_id: Option<String>) -> Self {
        self.request_id = request_id;
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn snapshot(&self) -> HandleSnapshot {
        HandleSnapshot {
            endpoint: self.endpoint.to_string(),
            credential_kind: self.credential.kind(),
            credential_fingerprint: self.credential.fingerprint(),
            session_bound: self.session.is_some(),
        }
    }

    /// Whether the inbound request carried a session cookie at all.
    pub fn session_cookie_present(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.cookies.contains(&s.cookie_name))
    }

    /// The request's session, refreshed when close to expiry. `None` when anonymous.
    pub async fn session(&self) -> Result<Option<Session>, BackendError> {
        self.current_session().await
    }

    pub fn from(&self, table: &str) -> TableQuery<'_> {
        TableQuery::new(self, table)
    }

    pub fn auth(&self) -> AuthApi<'_> {
        AuthApi::new(self)
    }

    pub fn storage(&self) -> StorageApi<'_> {
        StorageApi::new(self)
    }

    /// Call a database function.
    pub async fn rpc<A, T>(&self, function: &str, args: &A) -> Result<T, BackendError>
    where
        A: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(&["rest", "v1", "rpc", function]);
        let body = to_body(args)?;
        let response = self
            .send(Method::POST, url, Vec::new(), Some(body), Authorization::Session, "rpc")
            .await?;
        decode(response).await
    }

    pub(crate) fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Send one request and turn a non-success status into a [`RemoteCallError`].
    pub(crate) async fn send(
        &self,
        method: Method,
        url: Url,
        headers: Vec<(HeaderName, HeaderValue)>,
        body: Option<Value>,
        authorization: Authorization,
        surface: &'static str,
    ) -> Result<reqwest::Response, BackendError> {
        let bearer = match authorization {
            Authorization::Credential => self.credential.expose().to_string(),
            Authorization::Session => match Box::pin(self.current_session()).await? {
                Some(session) => session.access_token,
                None => self.credential.expose().to_string(),
            },
            Authorization::Token(token) => token,
        };

        tracing::debug!(%method, path = url.path(), surface, "Calling backend");

        let mut request = self
            .http
            .traced(method, url.as_str())
            .header(HeaderName::from_static("apikey"), self.credential.expose())
            .bearer_auth(bearer)
            .request_id(self.request_id.as_deref());
        for (name, value) in headers {
            request = request.header(name, value);
        }
        if let Some(body) = &body {
            request = request.json(body);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                record_call(surface, "transport_error");
                return Err(RemoteCallError::transport(&e).into());
            }
        };

        let status = response.status();
        record_call(surface, status.as_str().to_string());

        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let error = RemoteCallError::from_response(status, &text);
        tracing::debug!(
            kind = ?error.kind,
            status = status.as_u16(),
            code = ?error.code,
            "Backend call returned an error"
        );
        Err(error.into())
    }

    /// The session of the bound request, refreshed if it is about to expire.
    ///
    /// A missing or unreadable cookie is an anonymous request, not an error. A
    /// refresh token the backend rejects clears the cookie and also yields `None`.
    pub(crate) async fn current_session(&self) -> Result<Option<Session>, BackendError> {
        let Some(request_session) = &self.session else {
            return Ok(None);
        };

        let mut state = request_session.state.lock().await;
        if !state.loaded {
            state.session = request_session.read_cookie();
            state.loaded = true;
        }

        let Some(current) = state.session.clone() else {
            return Ok(None);
        };
        if !current.needs_refresh(Utc::now()) {
            return Ok(Some(current));
        }

        match self.refresh_grant(&current.refresh_token).await {
            Ok(tokens) => {
                let (refreshed, user) = tokens.into_session(Utc::now());
                request_session.store_cookie(&refreshed);
                state.session = Some(refreshed.clone());
                if user.is_some() {
                    state.user = user;
                }
                tracing::debug!("Refreshed backend session");
                Ok(Some(refreshed))
            }
            Err(BackendError::Remote(err))
                if matches!(
                    err.kind,
                    RemoteErrorKind::Unauthorized | RemoteErrorKind::InvalidRequest
                ) =>
            {
                tracing::info!(code = ?err.code, "Session refresh rejected, signing out");
                request_session.clear_cookie();
                state.session = None;
                state.user = None;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn refresh_grant(&self, refresh_token: &str) -> Result<TokenResponse, BackendError> {
        let mut url = self.url(&["auth", "v1", "token"]);
        url.query_pairs_mut()
            .append_pair("grant_type", "refresh_token");

        let response = self
            .send(
                Method::POST,
                url,
                Vec::new(),
                Some(serde_json::json!({ "refresh_token": refresh_token })),
                Authorization::Credential,
                "auth",
            )
            .await?;
        decode(response).await
    }

    /// Cached user of the bound session, if already fetched.
    pub(crate) async fn cached_user(&self) -> Option<User> {
        let request_session = self.session.as_ref()?;
        request_session.state.lock().await.user.clone()
    }

    pub(crate) async fn remember_user(&self, user: &User) {
        if let Some(request_session) = &self.session {
            request_session.state.lock().await.user = Some(user.clone());
        }
    }

    /// Adopt a freshly granted session and persist it to the cookie.
    pub(crate) async fn establish_session(&self, session: Session, user: Option<User>) {
        if let Some(request_session) = &self.session {
            request_session.store_cookie(&session);
            let mut state = request_session.state.lock().await;
            state.loaded = true;
            state.session = Some(session);
            state.user = user;
        }
    }

    /// Forget the session and expire the cookie. Returns the access token it held.
    pub(crate) async fn end_session(&self) -> Option<String> {
        let request_session = self.session.as_ref()?;
        let mut state = request_session.state.lock().await;
        if !state.loaded {
            state.session = request_session.read_cookie();
            state.loaded = true;
        }

        let token = state.session.take().map(|s| s.access_token);
        state.user = None;
        request_session.clear_cookie();
        token
    }
}

fn record_call(surface: &'static str, status: impl Into<metrics::SharedString>) {
    metrics::counter!("backend_calls_total", "surface" => surface, "status" => status.into())
        .increment(1);
}

pub(crate) fn to_body<T: Serialize + ?Sized>(value: &T) -> Result<Value, BackendError> {
    serde_json::to_value(value)
        .map_err(|e| RemoteCallError::invalid_request(format!("unserializable body: {}", e)).into())
}

pub(crate) async fn decode<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, BackendError> {
    let bytes = response
        .bytes()
        .await
        .map_err(|e| RemoteCallError::transport(&e))?;

    serde_json::from_slice(&bytes).map_err(|e| {
        RemoteCallError::unexpected(format!("unexpected response body: {}", e)).into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(endpoint: &str, kind: CredentialKind, key: &str) -> BackendClient {
        BackendClient::new(
            reqwest::Client::new(),
            Url::parse(endpoint).unwrap(),
            Credential::new(kind, Secret::new(key.to_string())),
            None,
        )
    }

    #[test]
    fn urls_are_joined_by_segment() {
        let c = client("http://localhost:54321", CredentialKind::Public, "k");
        assert_eq!(
            c.url(&["rest", "v1", "projects"]).as_str(),
            "http://localhost:54321/rest/v1/projects"
        );

        let prefixed = client("https://host.example/base", CredentialKind::Public, "k");
        assert_eq!(
            prefixed.url(&["auth", "v1", "user"]).as_str(),
            "https://host.example/base/auth/v1/user"
        );
    }

    #[test]
    fn snapshot_never_contains_the_key() {
        let c = client("http://localhost:54321", CredentialKind::ServiceRole, "super-secret");
        let snapshot = c.snapshot();
        assert_eq!(snapshot.credential_kind, CredentialKind::ServiceRole);
        assert_eq!(snapshot.credential_fingerprint.len(), 16);
        assert!(!snapshot.session_bound);

        let rendered = format!("{:?} {:?}", snapshot, c);
        assert!(!rendered.contains("super-secret"));
    }

    #[test]
    fn same_key_same_fingerprint() {
        let a = client("http://localhost:54321", CredentialKind::Public, "anon");
        let b = client("http://localhost:54321", CredentialKind::Public, "anon");
        let c = client("http://localhost:54321", CredentialKind::Public, "other");
        assert_eq!(a.snapshot(), b.snapshot());
        assert_ne!(a.snapshot(), c.snapshot());
    }

    #[tokio::test]
    async fn unbound_handle_has_no_session() {
        let c = client("http://localhost:54321", CredentialKind::Public, "anon");
        assert!(c.current_session().await.unwrap().is_none());
        assert!(!c.session_cookie_present());
        assert!(c.end_session().await.is_none());
    }
}
