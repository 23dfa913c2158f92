//! Content type endpoints
//!
//! Thin adapters over [`ContentTypeRegistry`](crate::registry::ContentTypeRegistry);
//! every decision about validity and storage lives in the registry.

use crate::api::{bad_body, parse_id, ApiResponse, AppState};
use crate::error::Result;
use crate::registry::{ContentTypeInput, ContentTypePatch};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tracing::info;

pub async fn create_content_type(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Json<ContentTypeInput>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(input) = body.map_err(bad_body)?;
    let created = state.registry.create(input).await?;

    info!("Content type {} available at /content/{}", created.name, created.api_id);

    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

pub async fn list_content_types(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse> {
    let content_types = state.registry.list().await?;
    Ok(Json(ApiResponse::success(content_types)))
}

pub async fn get_content_type(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let content_type = state.registry.get(parse_id(&id)?).await?;
    Ok(Json(ApiResponse::success(content_type)))
}

pub async fn get_content_type_by_api_id(
    State(state): State<Arc<AppState>>,
    Path(api_id): Path<String>,
) -> Result<impl IntoResponse> {
    let content_type = state.registry.get_by_api_id(&api_id).await?;
    Ok(Json(ApiResponse::success(content_type)))
}

pub async fn update_content_type(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: std::result::Result<Json<ContentTypePatch>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let id = parse_id(&id)?;
    let Json(patch) = body.map_err(bad_body)?;
    let updated = state.registry.update(id, patch).await?;
    Ok(Json(ApiResponse::success(updated)))
}

pub async fn delete_content_type(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    state.registry.delete(parse_id(&id)?).await?;
    Ok(Json(ApiResponse::<()>::with_message(
        "Content type deleted",
        None,
    )))
}

pub async fn list_content_type_changes(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let changes = state.registry.changes(parse_id(&id)?).await?;
    Ok(Json(ApiResponse::success(changes)))
}
