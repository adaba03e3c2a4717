//! Ordered access gates applied before any handler runs.
//!
//! ```text
//! Request → resolve client IP → gate 1 → gate 2 → ... → inner service
//!                                  │        │
//!                                  ▼        ▼
//!                               terminal response (first Deny wins)
//! ```
//!
//! Gates are synchronous checks against in-memory state. The first gate that
//! denies produces the response and later gates never see the request, so a
//! caller rejected by the allow-list does not consume rate-limit budget.

use std::net::IpAddr;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{Request, Response};
use tower::{Layer, Service};
use tracing::warn;

use super::ip::{TrustedProxyConfig, UNKNOWN_IP, resolve_client_ip};
use crate::metrics;

/// Identity of the caller, resolved once per request and shared by all gates.
///
/// Inserted into the request extensions for handlers once every gate passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientContext {
    pub ip: Option<IpAddr>,
    pub path: String,
}

impl ClientContext {
    /// Key identifying the caller for per-client accounting.
    pub fn key(&self) -> String {
        self.ip
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| UNKNOWN_IP.to_string())
    }
}

/// Why a request was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    IpNotAllowed,
    RateLimited,
}

impl DenyReason {
    pub fn as_str(self) -> &'static str {
        match self {
            DenyReason::IpNotAllowed => "ip_not_allowed",
            DenyReason::RateLimited => "rate_limited",
        }
    }
}

/// Result of one gate's check.
#[derive(Debug)]
pub enum AccessDecision {
    Allow,
    Deny {
        reason: DenyReason,
        response: Response<Body>,
    },
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessDecision::Allow)
    }
}

/// A single access check.
pub trait Gate: Send + Sync {
    fn check(&self, client: &ClientContext) -> AccessDecision;
}

/// Tower layer running a fixed, ordered list of gates.
#[derive(Clone)]
pub struct AccessGuardLayer {
    gates: Arc<[Arc<dyn Gate>]>,
    trusted_proxies: Arc<TrustedProxyConfig>,
}

impl AccessGuardLayer {
    pub fn new(gates: Vec<Arc<dyn Gate>>, trusted_proxies: TrustedProxyConfig) -> Self {
        Self {
            gates: gates.into(),
            trusted_proxies: Arc::new(trusted_proxies),
        }
    }
}

impl<S> Layer<S> for AccessGuardLayer {
    type Service = AccessGuardService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AccessGuardService {
            inner,
            gates: self.gates.clone(),
            trusted_proxies: self.trusted_proxies.clone(),
        }
    }
}

#[derive(Clone)]
pub struct AccessGuardService<S> {
    inner: S,
    gates: Arc<[Arc<dyn Gate>]>,
    trusted_proxies: Arc<TrustedProxyConfig>,
}

impl<S> AccessGuardService<S> {
    fn evaluate(&self, client: &ClientContext) -> AccessDecision {
        for gate in self.gates.iter() {
            let decision = gate.check(client);
            if !decision.is_allowed() {
                return decision;
            }
        }
        AccessDecision::Allow
    }
}

impl<S> Service<Request<Body>> for AccessGuardService<S>
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
        let client = ClientContext {
            ip: resolve_client_ip(&req, &self.trusted_proxies),
            path: req.uri().path().to_string(),
        };

        match self.evaluate(&client) {
            AccessDecision::Deny { reason, response } => {
                warn!(
                    client_ip = %client.key(),
                    path = %client.path,
                    reason = reason.as_str(),
                    "Request denied by access guard"
                );
                metrics::record_access_denied(reason.as_str());
                Box::pin(async move { Ok(response) })
            }
            AccessDecision::Allow => {
                req.extensions_mut().insert(client);
                // Call the instance that was polled ready; leave a fresh clone behind.
                let clone = self.inner.clone();
                let mut inner = std::mem::replace(&mut self.inner, clone);
                Box::pin(async move { inner.call(req).await })
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    struct Fixed {
        deny: Option<StatusCode>,
        calls: AtomicUsize,
    }

    impl Gate for Fixed {
        fn check(&self, _client: &ClientContext) -> AccessDecision {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.deny {
                Some(status) => AccessDecision::Deny {
                    reason: DenyReason::IpNotAllowed,
                    response: status.into_response(),
                },
                None => AccessDecision::Allow,
            }
        }
    }

    fn gate(deny: Option<StatusCode>) -> Arc<Fixed> {
        Arc::new(Fixed {
            deny,
            calls: AtomicUsize::new(0),
        })
    }

    fn service(gates: Vec<Arc<dyn Gate>>) -> AccessGuardService<()> {
        AccessGuardService {
            inner: (),
            gates: gates.into(),
            trusted_proxies: Arc::new(TrustedProxyConfig::default()),
        }
    }

    fn client() -> ClientContext {
        ClientContext {
            ip: Some("127.0.0.1".parse().unwrap()),
            path: "/".to_string(),
        }
    }

    #[test]
    fn test_all_pass() {
        let svc = service(vec![gate(None) as Arc<dyn Gate>, gate(None)]);
        assert!(svc.evaluate(&client()).is_allowed());
    }

    #[test]
    fn test_first_denial_short_circuits() {
        let first = gate(Some(StatusCode::FORBIDDEN));
        let second = gate(None);
        let svc = service(vec![first.clone() as Arc<dyn Gate>, second.clone()]);

        match svc.evaluate(&client()) {
            AccessDecision::Deny { response, .. } => {
                assert_eq!(response.status(), StatusCode::FORBIDDEN)
            }
            AccessDecision::Allow => panic!("expected denial"),
        }
        assert_eq!(first.calls.load(Ordering::SeqCst), 1);
        assert_eq!(second.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_allowed_request_reaches_ready_inner_service() {
        use std::net::SocketAddr;

        use axum::extract::ConnectInfo;
        use tower::ServiceExt;

        use crate::middleware::test_support::ReadyTracked;

        let mut svc = AccessGuardService {
            inner: ReadyTracked::default(),
            gates: vec![gate(None) as Arc<dyn Gate>].into(),
            trusted_proxies: Arc::new(TrustedProxyConfig::default()),
        };

        for _ in 0..2 {
            let req = Request::builder()
                .uri("/report")
                .extension(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 40000))))
                .body(Body::empty())
                .unwrap();
            let response = svc.ready().await.unwrap().call(req).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
    }

    #[test]
    fn test_client_key_unknown() {
        let ctx = ClientContext {
            ip: None,
            path: "/".to_string(),
        };
        assert_eq!(ctx.key(), UNKNOWN_IP);
        assert_eq!(client().key(), "127.0.0.1");
    }
}
