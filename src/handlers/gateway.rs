//! GET-to-POST gateway handler.
//!
//! # Endpoints
//!
//! - `GET /{*path}` - Look up `path` in the endpoint table and forward the
//!   query string to the mapped backend as a JSON POST body
//!
//! Every outcome, including a missing mapping or a failed backend call, is
//! rendered as a JSON response. The handler itself never errors.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use tracing::instrument;

use crate::error::AppError;
use crate::middleware::request_id::request_id;
use crate::state::AppState;

/// Translate an inbound GET into a backend POST.
///
/// # Example
///
/// `GET /report?id=7` with `/report` mapped to `https://svc/gen` sends
/// `POST https://svc/gen` with body `{"id": "7"}` and returns the backend's
/// status and JSON body unchanged.
#[instrument(skip_all, fields(path = %uri.path()))]
pub async fn forward(
    State(state): State<AppState>,
    uri: Uri,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
    headers: HeaderMap,
) -> Response {
    let Ok(path) = urlencoding::decode(uri.path()) else {
        return AppError::BadRequest {
            status: StatusCode::BAD_REQUEST,
            message: "Request path is not valid UTF-8".to_string(),
        }
        .into_response();
    };

    let Query(pairs) = match query {
        Ok(query) => query,
        Err(rejection) => {
            return AppError::BadRequest {
                status: StatusCode::BAD_REQUEST,
                message: format!("Invalid query string: {}", rejection.body_text()),
            }
            .into_response();
        }
    };

    state
        .translator
        .handle(&path, pairs, request_id(&headers))
        .await
        .into_response()
}

/// Fallback for a known path reached with an unsupported method.
pub async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}
