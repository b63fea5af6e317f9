//! Request extractors whose rejections render as [`ApiError`] bodies.

use axum::extract::FromRequest;

use super::error::ApiError;

/// `axum::Json`, except a malformed or mistyped body answers
/// `400 { "success": false, "code": "bad_request", ... }`.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);
