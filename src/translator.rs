//! GET → POST request translation.
//!
//! # Pipeline
//!
//! ```text
//! inbound path ──► EndpointStore::lookup ──► auth::resolve ──► OutboundClient::post
//!                        │                         │                    │
//!                        ▼                         ▼                    ▼
//!                   404 not found          500 credential      backend status/body
//!                                             missing          or 500 transport/internal
//! ```
//!
//! Every branch ends in a [`GatewayResponse`]; nothing escapes `handle` as an
//! error and the backend is called at most once per inbound request.

use std::sync::Arc;

use axum::Json;
use axum::http::header::HeaderValue;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{Map, Value};
use tracing::{error, info, instrument, warn};

use crate::auth;
use crate::credentials::CredentialProvider;
use crate::endpoints::{EndpointStore, normalize_path};
use crate::error::AppError;
use crate::metrics;
use crate::middleware::request_id::REQUEST_ID_HEADER;
use crate::outbound::{DispatchError, OutboundClient, OutboundRequest};

/// Final outcome of one inbound request.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl GatewayResponse {
    fn from_error(err: AppError) -> Self {
        Self {
            status: err.status_code(),
            body: serde_json::json!({ "detail": err.detail() }),
        }
    }
}

impl IntoResponse for GatewayResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Which terminal state a request ended in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    NotFound,
    AuthFailed,
    BackendResponded,
    TransportError,
    InternalError,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::NotFound => "not_found",
            Outcome::AuthFailed => "auth_failed",
            Outcome::BackendResponded => "backend_responded",
            Outcome::TransportError => "transport_error",
            Outcome::InternalError => "internal_error",
        }
    }
}

/// Resolves endpoints, attaches credentials and forwards the call.
#[derive(Clone)]
pub struct RequestTranslator {
    endpoints: Arc<EndpointStore>,
    credentials: Arc<dyn CredentialProvider>,
    client: OutboundClient,
}

impl RequestTranslator {
    pub fn new(
        endpoints: Arc<EndpointStore>,
        credentials: Arc<dyn CredentialProvider>,
        client: OutboundClient,
    ) -> Self {
        Self {
            endpoints,
            credentials,
            client,
        }
    }

    pub fn endpoints(&self) -> &EndpointStore {
        &self.endpoints
    }

    /// Translate one inbound GET into a backend POST.
    ///
    /// `query` keeps the inbound order; on duplicate keys the last value wins.
    #[instrument(skip(self, query, request_id), fields(path = %path))]
    pub async fn handle(
        &self,
        path: &str,
        query: Vec<(String, String)>,
        request_id: Option<&str>,
    ) -> GatewayResponse {
        let (outcome, response) = self.translate(path, query, request_id).await;
        metrics::record_request(outcome.as_str());
        response
    }

    async fn translate(
        &self,
        path: &str,
        query: Vec<(String, String)>,
        request_id: Option<&str>,
    ) -> (Outcome, GatewayResponse) {
        let get_path = normalize_path(path);
        info!(path = get_path, params = query.len(), "Received GET request");

        let Some(descriptor) = self.endpoints.lookup(get_path) else {
            warn!(path = get_path, "No mapping found for GET endpoint");
            return (
                Outcome::NotFound,
                GatewayResponse::from_error(AppError::RouteNotFound(get_path.to_string())),
            );
        };

        let mut headers = match auth::resolve(descriptor, self.credentials.as_ref()) {
            Ok(headers) => headers,
            Err(e) => {
                error!(path = get_path, error = %e, "Failed to resolve outbound credentials");
                return (Outcome::AuthFailed, GatewayResponse::from_error(e.into()));
            }
        };

        if let Some(id) = request_id.and_then(|id| HeaderValue::from_str(id).ok()) {
            headers.insert(REQUEST_ID_HEADER, id);
        }

        let request = OutboundRequest {
            url: descriptor.target_url(),
            body: query_to_json(query),
            headers,
        };

        match self.client.post(request).await {
            Ok(backend) => {
                info!(path = get_path, status = %backend.status, "Forwarded backend response");
                (
                    Outcome::BackendResponded,
                    GatewayResponse {
                        status: backend.status,
                        body: backend.body,
                    },
                )
            }
            Err(DispatchError::Transport(msg)) => {
                error!(path = get_path, error = %msg, "Backend request failed");
                (
                    Outcome::TransportError,
                    GatewayResponse::from_error(AppError::Transport(msg)),
                )
            }
            Err(DispatchError::Unexpected(msg)) => {
                error!(path = get_path, error = %msg, "Unexpected failure while forwarding");
                (
                    Outcome::InternalError,
                    GatewayResponse::from_error(AppError::Internal(msg)),
                )
            }
        }
    }
}

/// Collapse query pairs into a flat JSON object of strings.
pub fn query_to_json(query: Vec<(String, String)>) -> Map<String, Value> {
    let mut body = Map::with_capacity(query.len());
    for (key, value) in query {
        body.insert(key, Value::String(value));
    }
    body
}
