use super::client::{decode, Authorization, BackendClient};
use super::error::{BackendError, RemoteErrorKind};
use super::session::TokenResponse;
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub last_sign_in_at: Option<DateTime<Utc>>,
}

/// Auth operations of a handle.
pub struct AuthApi<'a> {
    client: &'a BackendClient,
}

impl<'a> AuthApi<'a> {
    pub(crate) fn new(client: &'a BackendClient) -> Self {
        Self { client }
    }

    /// The signed-in user, or `None` for anonymous requests and rejected tokens.
    pub async fn user(&self) -> Result<Option<User>, BackendError> {
        if let Some(user) = self.client.cached_user().await {
            return Ok(Some(user));
        }

        let Some(session) = self.client.current_session().await? else {
            return Ok(None);
        };

        // The refresh may have returned the user already.
        if let Some(user) = self.client.cached_user().await {
            return Ok(Some(user));
        }

        let url = self.client.url(&["auth", "v1", "user"]);
        let result = self
            .client
            .send(
                Method::GET,
                url,
                Vec::new(),
                None,
                Authorization::Token(session.access_token),
                "auth",
            )
            .await;

        let response = match result {
            Ok(response) => response,
            Err(BackendError::Remote(err)) if err.kind == RemoteErrorKind::Unauthorized => {
                tracing::debug!(code = ?err.code, "Access token rejected");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let user: User = decode(response).await?;
        self.client.remember_user(&user).await;
        Ok(Some(user))
    }

    /// Password grant. On a request-bound handle the session cookie is written.
    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<User>, BackendError> {
        let mut url = self.client.url(&["auth", "v1", "token"]);
        url.query_pairs_mut().append_pair("grant_type", "password");

        let response = self
            .client
            .send(
                Method::POST,
                url,
                Vec::new(),
                Some(serde_json::json!({ "email": email, "password": password })),
                Authorization::Credential,
                "auth",
            )
            .await?;

        let tokens: TokenResponse = decode(response).await?;
        let (session, user) = tokens.into_session(Utc::now());
        self.client.establish_session(session, user.clone()).await;

        tracing::info!(user_id = ?user.as_ref().map(|u| u.id), "User signed in");
        Ok(user)
    }

    /// Revoke the session remotely and always expire the cookie locally.
    pub async fn sign_out(&self) -> Result<(), BackendError> {
        let Some(access_token) = self.client.end_session().await else {
            return Ok(());
        };

        let url = self.client.url(&["auth", "v1", "logout"]);
        if let Err(e) = self
            .client
            .send(
                Method::POST,
                url,
                Vec::new(),
                None,
                Authorization::Token(access_token),
                "auth",
            )
            .await
        {
            tracing::warn!(error = %e, "Remote sign-out failed, cookie cleared anyway");
        }

        Ok(())
    }
}
