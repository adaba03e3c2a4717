//! Per-client rate limiting gate.
//!
//! # Algorithm
//!
//! Fixed one-minute windows per client IP. The first request from a client
//! opens a window; up to `RATE_LIMIT` requests are accepted inside it and
//! every further request is rejected until the window ends. The next request
//! after that opens a fresh window. A client therefore never gets more than
//! `RATE_LIMIT` requests accepted within one window, and each client has its
//! own counter, so one caller exhausting its quota does not affect another.
//!
//! # Response Headers
//!
//! On rate limit exceeded (429):
//! - `Retry-After`: Seconds until the current window ends
//! - `X-RateLimit-Limit`: Configured requests per minute
//! - `X-RateLimit-Remaining`: Always `0`
//!
//! # Memory
//!
//! Windows live in a concurrent map keyed by client IP. Expired windows are
//! evicted by [`RateLimitGate::evict_idle`], which `AppState` runs
//! periodically.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use dashmap::DashMap;
use tracing::debug;

use super::GuardConfigError;
use super::guard::{AccessDecision, ClientContext, DenyReason, Gate};
use crate::error::ErrorBody;

const WINDOW: Duration = Duration::from_secs(60);

/// One client's current window.
#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

#[derive(Clone)]
pub struct RateLimitGate {
    windows: Arc<DashMap<String, Window>>,
    per_minute: u32,
    window: Duration,
}

impl RateLimitGate {
    /// # Errors
    ///
    /// Returns `GuardConfigError::ZeroRateLimit` if `per_minute` is 0.
    pub fn new(per_minute: u32) -> Result<Self, GuardConfigError> {
        Self::with_window(per_minute, WINDOW)
    }

    /// Same as [`RateLimitGate::new`] with a custom window length.
    ///
    /// # Errors
    ///
    /// Returns `GuardConfigError::ZeroRateLimit` if `limit` is 0.
    pub fn with_window(limit: u32, window: Duration) -> Result<Self, GuardConfigError> {
        if limit == 0 {
            return Err(GuardConfigError::ZeroRateLimit);
        }

        Ok(Self {
            windows: Arc::new(DashMap::new()),
            per_minute: limit,
            window,
        })
    }

    pub fn per_minute(&self) -> u32 {
        self.per_minute
    }

    /// Number of clients currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }

    /// Drop windows that have ended; they carry no state.
    pub fn evict_idle(&self) {
        let before = self.windows.len();
        let now = Instant::now();
        self.windows
            .retain(|_, w| now.duration_since(w.started) < self.window);
        self.windows.shrink_to_fit();
        debug!(
            before,
            after = self.windows.len(),
            "Evicted expired rate limit windows"
        );
    }

    /// Count one request for `key`. Returns the wait until the window ends
    /// when the quota is already spent.
    fn acquire(&self, key: String) -> Result<(), Duration> {
        let now = Instant::now();
        let mut entry = self.windows.entry(key).or_insert(Window {
            started: now,
            count: 0,
        });

        let elapsed = now.duration_since(entry.started);
        if elapsed >= self.window {
            entry.started = now;
            entry.count = 0;
        }

        if entry.count < self.per_minute {
            entry.count += 1;
            Ok(())
        } else {
            Err(self.window.saturating_sub(now.duration_since(entry.started)))
        }
    }

    fn exceeded_response(&self, retry_after: u64) -> axum::response::Response {
        (
            StatusCode::TOO_MANY_REQUESTS,
            [
                ("Retry-After", retry_after.to_string()),
                ("X-RateLimit-Limit", self.per_minute.to_string()),
                ("X-RateLimit-Remaining", "0".to_string()),
            ],
            Json(ErrorBody::new(format!(
                "Rate limit exceeded: {} per 1 minute",
                self.per_minute
            ))),
        )
            .into_response()
    }
}

impl Gate for RateLimitGate {
    fn check(&self, client: &ClientContext) -> AccessDecision {
        match self.acquire(client.key()) {
            Ok(()) => AccessDecision::Allow,
            Err(wait) => {
                // Round up so clients never retry before the window ends.
                let retry_after = (wait.as_secs() + u64::from(wait.subsec_nanos() > 0)).max(1);
                AccessDecision::Deny {
                    reason: DenyReason::RateLimited,
                    response: self.exceeded_response(retry_after),
                }
            }
        }
    }
}
