//! HTTP middleware guarding and annotating every request.
//!
//! - **Access Guard**: ordered gates (IP allow-list, then rate limit)
//! - **Request ID**: generation and propagation of `X-Request-Id`
//!
//! # Architecture
//!
//! ```text
//! Request → Access Guard [allow-list → rate limit] → Request ID → Handler → Response
//!                 ↓              ↓
//!            403 Forbidden   429 Too Many
//! ```

use std::fmt;

pub mod allow_list;
pub mod guard;
pub mod ip;
pub mod rate_limit;
pub mod request_id;

pub use allow_list::IpAllowList;
pub use guard::{AccessDecision, AccessGuardLayer, ClientContext, DenyReason, Gate};
pub use ip::{CidrRange, TrustedProxyConfig, UNKNOWN_IP, resolve_client_ip};
pub use rate_limit::RateLimitGate;
pub use request_id::{REQUEST_ID_HEADER, RequestIdLayer};

/// Invalid access guard configuration. Fatal at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardConfigError {
    /// No allowed IPs: every request would be rejected.
    EmptyAllowList,
    /// A limit of zero requests per minute.
    ZeroRateLimit,
}

impl fmt::Display for GuardConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuardConfigError::EmptyAllowList => write!(
                f,
                "No allowed IP addresses set. Define ALLOWED_IPS environment variable."
            ),
            GuardConfigError::ZeroRateLimit => {
                write!(f, "RATE_LIMIT must be greater than 0 requests per minute")
            }
        }
    }
}

impl std::error::Error for GuardConfigError {}

impl From<GuardConfigError> for crate::error::AppError {
    fn from(err: GuardConfigError) -> Self {
        crate::error::AppError::ConfigError(err.to_string())
    }
}
