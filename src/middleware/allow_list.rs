//! IP allow-list gate.
//!
//! Only callers whose resolved IP is exactly one of the configured addresses
//! get through; everyone else receives `403` with a fixed message. A caller
//! whose IP cannot be determined is always rejected.

use std::collections::HashSet;
use std::net::IpAddr;

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;

use super::GuardConfigError;
use super::guard::{AccessDecision, ClientContext, DenyReason, Gate};
use crate::error::ErrorBody;

pub const FORBIDDEN_DETAIL: &str = "Access forbidden: Your IP address is not allowed";

#[derive(Debug, Clone)]
pub struct IpAllowList {
    allowed: HashSet<IpAddr>,
}

impl IpAllowList {
    /// # Errors
    ///
    /// Returns `GuardConfigError::EmptyAllowList` if `ips` is empty; an empty
    /// list would reject every request.
    pub fn new(ips: impl IntoIterator<Item = IpAddr>) -> Result<Self, GuardConfigError> {
        let allowed: HashSet<IpAddr> = ips.into_iter().map(|ip| ip.to_canonical()).collect();
        if allowed.is_empty() {
            return Err(GuardConfigError::EmptyAllowList);
        }
        Ok(Self { allowed })
    }

    pub fn contains(&self, ip: &IpAddr) -> bool {
        self.allowed.contains(ip)
    }
}

impl Gate for IpAllowList {
    fn check(&self, client: &ClientContext) -> AccessDecision {
        match client.ip {
            Some(ip) if self.contains(&ip) => AccessDecision::Allow,
            _ => AccessDecision::Deny {
                reason: DenyReason::IpNotAllowed,
                response: (StatusCode::FORBIDDEN, Json(ErrorBody::new(FORBIDDEN_DETAIL)))
                    .into_response(),
            },
        }
    }
}
