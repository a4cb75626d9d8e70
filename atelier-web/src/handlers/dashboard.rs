//! Service catalogue management for signed-in users.

use crate::backend::{BackendError, Order, RemoteCallError};
use crate::middleware::Authenticated;
use crate::models::{NewService, Service, ServicePatch};
use axum::{extract::Path, http::StatusCode, Json};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

pub async fn list_services(
    Authenticated { client, .. }: Authenticated,
) -> Result<Json<Vec<Service>>, AppError> {
    let services = client
        .from("services")
        .select("*")
        .order("sort_order", Order::Asc)
        .fetch()
        .await?;

    Ok(Json(services))
}

pub async fn create_service(
    Authenticated { client, .. }: Authenticated,
    Json(service): Json<NewService>,
) -> Result<(StatusCode, Json<Service>), AppError> {
    service.validate()?;

    let created: Vec<Service> = client.from("services").insert(&service).await?;
    let created = created
        .into_iter()
        .next()
        .ok_or_else(|| BackendError::from(RemoteCallError::unexpected("insert returned no rows")))?;

    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_service(
    Authenticated { client, .. }: Authenticated,
    Path(id): Path<Uuid>,
    Json(patch): Json<ServicePatch>,
) -> Result<Json<Service>, AppError> {
    patch.validate()?;
    if patch.is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!("Nothing to update")));
    }

    let updated: Vec<Service> = client.from("services").eq("id", id).update(&patch).await?;
    updated
        .into_iter()
        .next()
        .map(Json)
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Service not found")))
}

pub async fn delete_service(
    Authenticated { client, .. }: Authenticated,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    match client.from("services").eq("id", id).delete().await? {
        0 => Err(AppError::NotFound(anyhow::anyhow!("Service not found"))),
        _ => Ok(StatusCode::NO_CONTENT),
    }
}
