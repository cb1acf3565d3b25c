use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, Validation, decode};

use textbin_types::api::Claims;
use textbin_types::models::Identity;

use crate::error::ApiError;
use crate::state::AppState;

/// Resolves the caller's identity and stores it as a request extension.
///
/// No `Authorization` header means anonymous. A header that is present but
/// not a valid bearer JWT is rejected rather than downgraded to anonymous.
pub async fn resolve_identity(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let identity = match req.headers().get(header::AUTHORIZATION) {
        None => Identity::Anonymous,
        Some(value) => {
            let token = value
                .to_str()
                .ok()
                .and_then(|v| v.strip_prefix("Bearer "))
                .ok_or(ApiError::InvalidToken)?;

            let token_data = decode::<Claims>(
                token,
                &DecodingKey::from_secret(state.jwt_secret.as_bytes()),
                &Validation::default(),
            )
            .map_err(|_| ApiError::InvalidToken)?;

            Identity::User(token_data.claims.sub)
        }
    };

    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

/// The user id, or 401 for anonymous callers.
pub fn require_user(identity: Identity) -> Result<i64, ApiError> {
    identity.user_id().ok_or(ApiError::AuthenticationRequired)
}
