//! Outbound HTTP client for backend POST calls.
//!
//! Wraps one pooled [`reqwest::Client`] shared by every request task. Each
//! inbound request produces exactly one [`OutboundRequest`]; the client never
//! retries.
//!
//! # Failure Classification
//!
//! | cause                                      | result                        |
//! |--------------------------------------------|-------------------------------|
//! | backend answered (any status)              | `Ok(BackendResponse)`         |
//! | connect / DNS / TLS / timeout / send error | `DispatchError::Transport`    |
//! | connection lost while reading the body     | `DispatchError::Transport`    |
//! | redirect failure                           | `DispatchError::Transport`    |
//! | body empty or not JSON, anything else      | `DispatchError::Unexpected`   |

use std::time::{Duration, Instant};

use axum::http::StatusCode;
use axum::http::header::HeaderMap;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::config::Config;
use crate::error::error_chain;
use crate::metrics;

/// A single POST to be sent to a backend.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub url: String,
    /// Inbound query parameters, sent as a flat JSON object
    pub body: Map<String, Value>,
    pub headers: HeaderMap,
}

/// What the backend answered.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendResponse {
    pub status: StatusCode,
    pub body: Value,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    /// The backend could not be reached or did not answer in time.
    #[error("{0}")]
    Transport(String),

    #[error("{0}")]
    Unexpected(String),
}

impl DispatchError {
    fn from_reqwest(err: reqwest::Error) -> Self {
        let rendered = error_chain(&err);
        // Body and decode errors come from the connection dropping while the
        // response is read; the JSON itself is parsed separately.
        if err.is_connect()
            || err.is_timeout()
            || err.is_request()
            || err.is_body()
            || err.is_decode()
            || err.is_redirect()
        {
            DispatchError::Transport(rendered)
        } else {
            DispatchError::Unexpected(rendered)
        }
    }
}

/// Pooled client used for every backend call.
#[derive(Debug, Clone)]
pub struct OutboundClient {
    http: reqwest::Client,
}

impl OutboundClient {
    /// Build the client from configured timeouts.
    ///
    /// # Errors
    ///
    /// Returns the underlying `reqwest::Error` if the TLS backend cannot be
    /// initialized.
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        Self::with_timeouts(config.upstream_timeout, config.upstream_connect_timeout)
    }

    pub fn with_timeouts(timeout: Duration, connect_timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;
        Ok(Self { http })
    }

    /// Send `request` once and return the backend's status and JSON body.
    ///
    /// # Errors
    ///
    /// See the module documentation for how failures are classified.
    #[instrument(skip(self, request), fields(url = %request.url))]
    pub async fn post(&self, request: OutboundRequest) -> Result<BackendResponse, DispatchError> {
        let started = Instant::now();

        let response = self
            .http
            .post(&request.url)
            .headers(request.headers)
            .json(&request.body)
            .send()
            .await
            .map_err(DispatchError::from_reqwest)?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(DispatchError::from_reqwest)?;
        metrics::record_backend_duration(started.elapsed().as_secs_f64());

        // An empty body is not JSON either.
        let body: Value = serde_json::from_slice(&bytes).map_err(|e| {
            DispatchError::Unexpected(format!(
                "Backend returned a non-JSON body (status {status}, {} bytes): {e}",
                bytes.len()
            ))
        })?;

        debug!(status = %status, "Backend responded");
        Ok(BackendResponse { status, body })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn client() -> OutboundClient {
        OutboundClient::with_timeouts(Duration::from_secs(5), Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        // Bind then drop to obtain a port with nothing listening on it.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let result = client()
            .post(OutboundRequest {
                url: format!("http://127.0.0.1:{port}/gen"),
                body: Map::new(),
                headers: HeaderMap::new(),
            })
            .await;

        match result {
            Err(DispatchError::Transport(msg)) => assert!(!msg.is_empty()),
            other => panic!("expected transport error, got {other:?}"),
        }
    }

    /// Serve one connection: read the whole request, write `response`
    /// verbatim, then close the socket.
    async fn raw_backend(response: &'static [u8]) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut chunk = [0u8; 1024];
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&chunk[..n]);
                if request_complete(&request) {
                    break;
                }
            }
            socket.write_all(response).await.unwrap();
            socket.shutdown().await.ok();
        });

        format!("http://{addr}/gen")
    }

    fn request_complete(raw: &[u8]) -> bool {
        let text = String::from_utf8_lossy(raw);
        let Some((head, body)) = text.split_once("\r\n\r\n") else {
            return false;
        };
        let length = head
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        body.len() >= length
    }

    fn request_to(url: String) -> OutboundRequest {
        OutboundRequest {
            url,
            body: Map::new(),
            headers: HeaderMap::new(),
        }
    }

    #[tokio::test]
    async fn test_connection_closed_mid_body_is_transport_error() {
        let url = raw_backend(
            b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 100\r\n\r\n{\"ok\":",
        )
        .await;

        match client().post(request_to(url)).await {
            Err(DispatchError::Transport(msg)) => assert!(!msg.is_empty()),
            other => panic!("expected transport error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_body_is_unexpected() {
        let url = raw_backend(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n").await;

        match client().post(request_to(url)).await {
            Err(DispatchError::Unexpected(msg)) => assert!(msg.contains("non-JSON")),
            other => panic!("expected unexpected error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_plain_text_body_is_unexpected() {
        let url = raw_backend(
            b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 4\r\n\r\noops",
        )
        .await;

        assert!(matches!(
            client().post(request_to(url)).await,
            Err(DispatchError::Unexpected(_))
        ));
    }

    #[tokio::test]
    async fn test_json_body_is_returned_with_status() {
        let url = raw_backend(
            b"HTTP/1.1 404 Not Found\r\nContent-Type: application/json\r\nContent-Length: 13\r\n\r\n{\"error\":\"x\"}",
        )
        .await;

        let response = client().post(request_to(url)).await.unwrap();
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert_eq!(response.body, serde_json::json!({"error": "x"}));
    }

    #[tokio::test]
    async fn test_invalid_url_is_not_a_backend_response() {
        let result = client()
            .post(OutboundRequest {
                url: "http://".to_string(),
                body: Map::new(),
                headers: HeaderMap::new(),
            })
            .await;
        assert!(result.is_err());
    }
}
