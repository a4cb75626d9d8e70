use crate::backend::User;
use crate::middleware::ServerClient;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use service_core::error::AppError;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct SignInRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SignInResponse {
    pub signed_in: bool,
    pub user: Option<User>,
}

/// Password sign-in. The session cookie rides on this response.
pub async fn sign_in(
    ServerClient(client): ServerClient,
    Json(request): Json<SignInRequest>,
) -> Result<Json<SignInResponse>, AppError> {
    request.validate()?;

    let user = client
        .auth()
        .sign_in_with_password(&request.email, &request.password)
        .await?;

    Ok(Json(SignInResponse {
        signed_in: true,
        user,
    }))
}

pub async fn sign_out(ServerClient(client): ServerClient) -> Result<Json<Value>, AppError> {
    client.auth().sign_out().await?;
    Ok(Json(json!({ "signed_out": true })))
}
