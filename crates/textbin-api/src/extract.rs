//! Extractors whose rejections go through [`ApiError`], so malformed bodies
//! and path parameters get the same JSON error envelope as everything else.

use axum::extract::{FromRequest, FromRequestParts};

use crate::error::ApiError;

/// JSON request body. Decoding failures are 400s.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct JsonBody<T>(pub T);

/// Path parameters. A parameter that doesn't parse (a comment id of `abc`)
/// is a 404, same as an id that doesn't exist.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct PathParam<T>(pub T);
