use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};

use textbin_types::api::{CommentRequest, CommentResponse};
use textbin_types::models::Identity;

use crate::error::ApiError;
use crate::extract::{JsonBody, PathParam};
use crate::middleware::require_user;
use crate::state::AppState;

/// POST /v1/texts/{slug}/comments
pub async fn add_comment(
    State(state): State<AppState>,
    PathParam(slug): PathParam<String>,
    Extension(identity): Extension<Identity>,
    JsonBody(req): JsonBody<CommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = require_user(identity)?;
    let comment = state.service.add_comment(&slug, user_id, req.content).await?;
    Ok((StatusCode::CREATED, Json(CommentResponse { comment })))
}

/// PATCH /v1/texts/{slug}/comments/{comment_id}: author only.
pub async fn update_comment(
    State(state): State<AppState>,
    PathParam((slug, comment_id)): PathParam<(String, i64)>,
    Extension(identity): Extension<Identity>,
    JsonBody(req): JsonBody<CommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = require_user(identity)?;
    let comment = state
        .service
        .update_comment(&slug, comment_id, user_id, req.content)
        .await?;
    Ok(Json(CommentResponse { comment }))
}

/// DELETE /v1/texts/{slug}/comments/{comment_id}: author only. Someone
/// else's comment answers 404, same as a missing one.
pub async fn delete_comment(
    State(state): State<AppState>,
    PathParam((slug, comment_id)): PathParam<(String, i64)>,
    Extension(identity): Extension<Identity>,
) -> Result<StatusCode, ApiError> {
    let user_id = require_user(identity)?;
    state.service.delete_comment(&slug, comment_id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
