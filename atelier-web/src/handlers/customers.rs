use crate::backend::Order;
use crate::middleware::Authenticated;
use crate::models::{Customer, CustomerFilter, CustomerPatch};
use axum::{
    extract::{Path, Query},
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

const LIST_LIMIT: usize = 200;

pub async fn list_customers(
    Authenticated { client, .. }: Authenticated,
    Query(filter): Query<CustomerFilter>,
) -> Result<Json<Vec<Customer>>, AppError> {
    let mut query = client
        .from("customers")
        .select("*")
        .order("created_at", Order::Desc)
        .limit(LIST_LIMIT);

    if let Some(status) = filter.status {
        query = query.eq("status", status);
    }
    if let Some(q) = filter.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        // `*` and `,` carry meaning in filter expressions.
        let term: String = q
            .chars()
            .filter(|c| !matches!(c, '*' | ',' | '(' | ')'))
            .collect();
        query = query.ilike("name", &format!("*{}*", term));
    }

    Ok(Json(query.fetch().await?))
}

pub async fn get_customer(
    Authenticated { client, .. }: Authenticated,
    Path(id): Path<Uuid>,
) -> Result<Json<Customer>, AppError> {
    let customer = client
        .from("customers")
        .select("*")
        .eq("id", id)
        .fetch_one()
        .await?;

    Ok(Json(customer))
}

#[tracing::instrument(skip(client, user, patch))]
pub async fn update_customer(
    Authenticated { client, user }: Authenticated,
    Path(id): Path<Uuid>,
    Json(patch): Json<CustomerPatch>,
) -> Result<Json<Customer>, AppError> {
    patch.validate()?;
    if patch.is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!("Nothing to update")));
    }

    let updated: Vec<Customer> = client.from("customers").eq("id", id).update(&patch).await?;
    let customer = updated
        .into_iter()
        .next()
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Customer not found")))?;

    tracing::info!(
        customer_id = %id,
        status = %customer.status,
        user_id = %user.id,
        "Customer updated"
    );
    Ok(Json(customer))
}
