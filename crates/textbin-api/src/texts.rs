use axum::{
    Extension, Json,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
};
use serde_json::json;

use textbin_types::api::{CreateTextRequest, TextResponse, UpdateTextRequest};
use textbin_types::models::{Identity, TextView};

use crate::error::ApiError;
use crate::extract::{JsonBody, PathParam};
use crate::state::AppState;

/// POST /v1/texts: anonymous callers create public, unowned texts.
pub async fn create_text(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    JsonBody(req): JsonBody<CreateTextRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let record = state.service.create_text(req, identity).await?;
    let location = format!("/v1/texts/{}", record.slug);

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(TextResponse {
            text: TextView::compose(record, 0, vec![]),
        }),
    ))
}

/// GET /v1/texts/{slug}
pub async fn show_text(
    State(state): State<AppState>,
    PathParam(slug): PathParam<String>,
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse, ApiError> {
    let view = state.service.compose_view(&slug, identity).await?;
    Ok(Json(TextResponse { text: view }))
}

/// PATCH /v1/texts/{slug}: body must carry `expected_version`.
pub async fn update_text(
    State(state): State<AppState>,
    PathParam(slug): PathParam<String>,
    Extension(identity): Extension<Identity>,
    JsonBody(req): JsonBody<UpdateTextRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let view = state.service.update_text(&slug, req, identity).await?;
    Ok(Json(TextResponse { text: view }))
}

/// DELETE /v1/texts/{slug}
pub async fn delete_text(
    State(state): State<AppState>,
    PathParam(slug): PathParam<String>,
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse, ApiError> {
    state.service.delete_text(&slug, identity).await?;
    Ok(Json(json!({ "message": "text successfully deleted" })))
}
