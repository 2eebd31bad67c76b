//! API handlers module
//!
//! Handlers stay thin: extract, delegate to a workflow service, wrap the
//! result in the `{ "ok": true, ... }` envelope.

pub mod admin;
pub mod health;
pub mod issues;
pub mod notifications;
pub mod profiles;
pub mod reviews;
pub mod submissions;

use axum::extract::{FromRequest, FromRequestParts};
use axum::Json;
use journal_common::errors::AppError;
use serde::Serialize;

/// Success envelope
#[derive(Debug, Serialize)]
pub struct ApiOk<T> {
    ok: bool,
    #[serde(flatten)]
    payload: T,
}

pub type ApiResponse<T> = Json<ApiOk<T>>;

pub fn ok<T: Serialize>(payload: T) -> ApiResponse<T> {
    Json(ApiOk { ok: true, payload })
}

/// JSON body that rejects with the portal error envelope
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Path parameters that reject with the portal error envelope
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

/// Query string that rejects with the portal error envelope
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);
