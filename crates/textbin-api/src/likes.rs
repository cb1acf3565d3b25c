use axum::{
    Extension,
    extract::State,
    http::StatusCode,
};

use textbin_types::models::Identity;

use crate::error::ApiError;
use crate::extract::PathParam;
use crate::middleware::require_user;
use crate::state::AppState;

/// POST /v1/texts/{slug}/like: liking twice is fine.
pub async fn like_text(
    State(state): State<AppState>,
    PathParam(slug): PathParam<String>,
    Extension(identity): Extension<Identity>,
) -> Result<StatusCode, ApiError> {
    let user_id = require_user(identity)?;
    state.service.like(&slug, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /v1/texts/{slug}/like: removing a missing like is fine too.
pub async fn unlike_text(
    State(state): State<AppState>,
    PathParam(slug): PathParam<String>,
    Extension(identity): Extension<Identity>,
) -> Result<StatusCode, ApiError> {
    let user_id = require_user(identity)?;
    state.service.unlike(&slug, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
