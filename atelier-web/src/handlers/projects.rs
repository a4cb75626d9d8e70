use crate::backend::{Order, RemoteCallError};
use crate::middleware::Authenticated;
use crate::models::{NewProject, Project, ProjectForm, ProjectPatch};
use axum::{extract::Path, http::StatusCode, Form, Json};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

pub async fn list_projects(
    Authenticated { client, .. }: Authenticated,
) -> Result<Json<Vec<Project>>, AppError> {
    let projects = client
        .from("projects")
        .select("*")
        .order("created_at", Order::Desc)
        .fetch()
        .await?;

    Ok(Json(projects))
}

#[tracing::instrument(skip(client, user, form))]
pub async fn create_project(
    Authenticated { client, user }: Authenticated,
    Form(form): Form<ProjectForm>,
) -> Result<(StatusCode, Json<Project>), AppError> {
    form.validate()?;
    let project = NewProject::from(form);

    let created: Vec<Project> = client.from("projects").insert(&project).await?;
    let created = created
        .into_iter()
        .next()
        .ok_or_else(|| RemoteCallError::unexpected("insert returned no rows"))
        .map_err(crate::backend::BackendError::from)?;

    tracing::info!(project_id = %created.id, user_id = %user.id, "Project created");
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn get_project(
    Authenticated { client, .. }: Authenticated,
    Path(id): Path<Uuid>,
) -> Result<Json<Project>, AppError> {
    let project = client
        .from("projects")
        .select("*")
        .eq("id", id)
        .fetch_one()
        .await?;

    Ok(Json(project))
}

pub async fn update_project(
    Authenticated { client, .. }: Authenticated,
    Path(id): Path<Uuid>,
    Json(patch): Json<ProjectPatch>,
) -> Result<Json<Project>, AppError> {
    patch.validate()?;
    if patch.is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!("Nothing to update")));
    }

    let updated: Vec<Project> = client.from("projects").eq("id", id).update(&patch).await?;
    updated
        .into_iter()
        .next()
        .map(Json)
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Project not found")))
}

pub async fn delete_project(
    Authenticated { client, user }: Authenticated,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let deleted = client.from("projects").eq("id", id).delete().await?;
    if deleted == 0 {
        return Err(AppError::NotFound(anyhow::anyhow!("Project not found")));
    }

    tracing::info!(project_id = %id, user_id = %user.id, "Project deleted");
    Ok(StatusCode::NO_CONTENT)
}
