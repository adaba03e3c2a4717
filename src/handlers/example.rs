//! Sample POST endpoint for exercising the gateway locally.
//!
//! # Endpoints
//!
//! - `POST /example-post` - Echo the JSON object body back to the caller

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, instrument};

use crate::error::{AppError, AppResult, sanitize_serde_error};

#[derive(Debug, Serialize)]
pub struct EchoResponse {
    pub message: &'static str,
    pub payload: Map<String, Value>,
}

/// Echo a JSON object.
///
/// # Response Body
///
/// ```json
/// {
///   "message": "Received POST request",
///   "payload": { "id": "7" }
/// }
/// ```
///
/// A body that is not a JSON object is rejected with 422.
#[instrument(skip_all)]
pub async fn example_post(
    payload: Result<Json<Map<String, Value>>, JsonRejection>,
) -> AppResult<Json<EchoResponse>> {
    let Json(payload) = payload.map_err(|rejection| AppError::BadRequest {
        status: StatusCode::UNPROCESSABLE_ENTITY,
        message: sanitize_serde_error(&rejection.body_text()),
    })?;

    info!(keys = payload.len(), "Received POST request");

    Ok(Json(EchoResponse {
        message: "Received POST request",
        payload,
    }))
}
