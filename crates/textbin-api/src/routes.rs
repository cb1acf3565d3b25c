use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, patch, post},
};

use tower_http::catch_panic::CatchPanicLayer;

use crate::error::{method_not_allowed, panic_response, route_not_found};
use crate::middleware::resolve_identity;
use crate::state::AppState;
use crate::{comments, health, likes, texts};

/// Texts may be up to 1 MB; leave room for the JSON around them.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/v1/healthcheck", get(health::healthcheck))
        .with_state(state.clone());

    let identified_routes = Router::new()
        .route("/v1/texts", post(texts::create_text))
        .route(
            "/v1/texts/{slug}",
            get(texts::show_text)
                .patch(texts::update_text)
                .delete(texts::delete_text),
        )
        .route(
            "/v1/texts/{slug}/like",
            post(likes::like_text).delete(likes::unlike_text),
        )
        .route("/v1/texts/{slug}/comments", post(comments::add_comment))
        .route(
            "/v1/texts/{slug}/comments/{comment_id}",
            patch(comments::update_comment).delete(comments::delete_comment),
        )
        .layer(middleware::from_fn_with_state(state.clone(), resolve_identity))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(identified_routes)
        .method_not_allowed_fallback(method_not_allowed)
        .fallback(route_not_found)
        .layer(CatchPanicLayer::custom(panic_response))
}
