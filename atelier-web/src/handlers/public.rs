//! Public marketing endpoints. Anonymous handles only.

use crate::backend::Order;
use crate::middleware::PublicClient;
use crate::models::{ContactRequest, NewCustomer, PortfolioItem, Project, Service};
use crate::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use service_core::error::AppError;
use validator::Validate;

#[derive(Debug, Default, Deserialize)]
pub struct PortfolioQuery {
    #[serde(default)]
    pub featured: bool,
    pub category: Option<String>,
}

#[tracing::instrument(skip(state, client))]
pub async fn portfolio(
    State(state): State<AppState>,
    PublicClient(client): PublicClient,
    Query(query): Query<PortfolioQuery>,
) -> Result<Json<Vec<PortfolioItem>>, AppError> {
    let mut request = client
        .from("projects")
        .select("*")
        .order("created_at", Order::Desc);
    if query.featured {
        request = request.eq("featured", true);
    }
    if let Some(category) = &query.category {
        request = request.eq("category", category);
    }

    let projects: Vec<Project> = request.fetch().await?;

    let storage = client.storage();
    let bucket = &state.settings.backend.storage_bucket;
    let items = projects
        .into_iter()
        .map(|project| PortfolioItem::from_project(project, &storage, bucket))
        .collect();

    Ok(Json(items))
}

pub async fn services(PublicClient(client): PublicClient) -> Result<Json<Vec<Service>>, AppError> {
    let services = client
        .from("services")
        .select("*")
        .eq("active", true)
        .order("sort_order", Order::Asc)
        .fetch()
        .await?;

    Ok(Json(services))
}

#[tracing::instrument(skip(client, request))]
pub async fn contact(
    PublicClient(client): PublicClient,
    Json(request): Json<ContactRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    request.validate()?;

    // Same answer as a real submission so the filter is not discoverable.
    if request.is_honeypot_filled() {
        tracing::info!("Dropping contact submission with filled honeypot");
        return Ok((StatusCode::CREATED, Json(json!({ "received": true }))));
    }

    let customer = NewCustomer::from(request);
    client.from("customers").insert_minimal(&customer).await?;

    tracing::info!("Contact enquiry stored");
    Ok((StatusCode::CREATED, Json(json!({ "received": true }))))
}
