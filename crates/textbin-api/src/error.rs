use std::any::Any;

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::{HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{error, warn};

use textbin_db::StoreError;
use textbin_types::api::ErrorResponse;

const NOT_FOUND: &str = "the requested resource could not be found";
const SERVER_ERROR: &str = "the server encountered a problem and could not process your request";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The request body or URL could not be decoded.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// No route matches the path, or a path parameter is malformed.
    #[error("route not found")]
    RouteNotFound,

    #[error("method {0} not allowed")]
    MethodNotAllowed(Method),

    /// A bearer token was sent but could not be verified.
    #[error("invalid authentication token")]
    InvalidToken,

    /// The route needs a user and the request is anonymous.
    #[error("authentication required")]
    AuthenticationRequired,
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        match rejection {
            PathRejection::FailedToDeserializePathParams(_) => ApiError::RouteNotFound,
            other => {
                error!("Path extraction failed: {}", other.body_text());
                ApiError::Store(StoreError::Unavailable(other.body_text()))
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            ApiError::Store(StoreError::Validation(errors)) => {
                (StatusCode::UNPROCESSABLE_ENTITY, json!(errors.fields()))
            }
            ApiError::Store(StoreError::NotFound) | ApiError::RouteNotFound => {
                (StatusCode::NOT_FOUND, json!(NOT_FOUND))
            }
            ApiError::Store(StoreError::EditConflict) => (
                StatusCode::CONFLICT,
                json!("unable to update the record due to an edit conflict, please try again"),
            ),
            ApiError::Store(StoreError::ConstraintViolation) => (
                StatusCode::CONFLICT,
                json!("a text with this slug already exists, please try again"),
            ),
            ApiError::Store(StoreError::AllocationExhausted) => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!("could not allocate an identifier, please try again"),
            ),
            ApiError::Store(StoreError::Timeout | StoreError::Cancelled) => (
                StatusCode::GATEWAY_TIMEOUT,
                json!("the server took too long to respond, please try again"),
            ),
            ApiError::Store(e) => {
                error!("Store failure: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, json!(SERVER_ERROR))
            }
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, json!(message)),
            ApiError::MethodNotAllowed(method) => (
                StatusCode::METHOD_NOT_ALLOWED,
                json!(format!("the {} method is not supported for this resource", method)),
            ),
            ApiError::InvalidToken => {
                let mut response = error_body(
                    StatusCode::UNAUTHORIZED,
                    json!("invalid or missing authentication token"),
                );
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
                return response;
            }
            ApiError::AuthenticationRequired => (
                StatusCode::UNAUTHORIZED,
                json!("you must be authenticated to access this resource"),
            ),
        };

        error_body(status, error)
    }
}

fn error_body(status: StatusCode, error: Value) -> Response {
    (status, Json(ErrorResponse { error })).into_response()
}

/// Router fallback for paths nothing matches.
pub async fn route_not_found() -> ApiError {
    ApiError::RouteNotFound
}

/// Fallback for a known path hit with an unsupported method.
pub async fn method_not_allowed(method: Method) -> ApiError {
    ApiError::MethodNotAllowed(method)
}

/// Turns a handler panic into the usual 500 body instead of a dropped
/// connection. For `tower_http::catch_panic::CatchPanicLayer::custom`.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    };
    warn!("Handler panicked: {}", detail);
    error_body(StatusCode::INTERNAL_SERVER_ERROR, json!(SERVER_ERROR))
}
