//! Extractors that hand handlers a backend handle for the current request.

use crate::backend::{BackendClient, BackendError, ResponseCookies, SessionCookies, User};
use crate::AppState;
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use service_core::error::AppError;
use service_core::middleware::tracing::RequestId;

fn request_id(parts: &Parts) -> Option<String> {
    parts.extensions.get::<RequestId>().map(|id| id.0.clone())
}

/// Handle bound to this request's session cookies.
pub struct ServerClient(pub BackendClient);

#[async_trait]
impl<S> FromRequestParts<S> for ServerClient
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);

        let outgoing = match parts.extensions.get::<ResponseCookies>() {
            Some(cookies) => cookies.clone(),
            None => {
                tracing::debug!("No cookie buffer on request, session writes will be dropped");
                ResponseCookies::committed()
            }
        };
        let cookies = SessionCookies::from_headers(&parts.headers, outgoing);

        let client = state
            .factory
            .server_client(cookies)
            .map_err(BackendError::from)?
            .with_request_id(request_id(parts));

        Ok(ServerClient(client))
    }
}

/// Anonymous handle with the public key and no session.
pub struct PublicClient(pub BackendClient);

#[async_trait]
impl<S> FromRequestParts<S> for PublicClient
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let client = state
            .factory
            .browser_client()
            .map_err(BackendError::from)?
            .with_request_id(request_id(parts));

        Ok(PublicClient(client))
    }
}

/// A signed-in user together with the request's handle. Rejects with 401 otherwise.
pub struct Authenticated {
    pub client: BackendClient,
    pub user: User,
}

#[async_trait]
impl<S> FromRequestParts<S> for Authenticated
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let ServerClient(client) = ServerClient::from_request_parts(parts, state).await?;

        let user = client.auth().user().await?;
        match user {
            Some(user) => Ok(Authenticated { client, user }),
            None => Err(AppError::Unauthorized(anyhow::anyhow!(
                "Authentication required"
            ))),
        }
    }
}
