//! Request ID middleware for correlating gateway and backend logs.
//!
//! - Keeps an incoming `X-Request-Id` header, or generates a UUIDv4
//! - Makes the ID visible to handlers through the request headers
//! - Echoes the ID on the response
//!
//! The translator forwards the same ID to the backend, so one value follows
//! a call from the client through the gateway to the backend.

use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::header::{HeaderMap, HeaderValue};
use axum::http::{Request, Response};
use tower::{Layer, Service};
use tracing::{Span, debug};
use uuid::Uuid;

/// Header name for request ID.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest client-supplied ID that is accepted as-is.
const MAX_REQUEST_ID_LEN: usize = 128;

#[derive(Clone, Default)]
pub struct RequestIdLayer;

impl RequestIdLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for RequestIdLayer {
    type Service = RequestIdService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestIdService { inner }
    }
}

#[derive(Clone)]
pub struct RequestIdService<S> {
    inner: S,
}

impl<S> Service<Request<Body>> for RequestIdService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let request_id = extract_or_generate(req.headers());
        req.headers_mut()
            .insert(REQUEST_ID_HEADER, request_id.clone());

        if let Ok(id) = request_id.to_str() {
            Span::current().record("request_id", id);
            debug!(request_id = %id, "Processing request");
        }

        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let mut response = inner.call(req).await?;
            response.headers_mut().insert(REQUEST_ID_HEADER, request_id);
            Ok(response)
        })
    }
}

/// Reuse a sane client-supplied ID or generate a fresh one.
fn extract_or_generate(headers: &HeaderMap) -> HeaderValue {
    if let Some(value) = headers.get(REQUEST_ID_HEADER)
        && let Ok(text) = value.to_str()
        && !text.is_empty()
        && text.len() <= MAX_REQUEST_ID_LEN
    {
        return value.clone();
    }

    let generated = Uuid::new_v4().to_string();
    HeaderValue::from_str(&generated).unwrap_or_else(|_| HeaderValue::from_static("unknown"))
}

/// Request ID assigned by [`RequestIdLayer`], if present.
pub fn request_id(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
}
