//! Client IP resolution for the access gates.
//!
//! The client IP is the TCP peer address taken from Axum's
//! [`ConnectInfo`] extension, so the server must be started with
//! `into_make_service_with_connect_info::<SocketAddr>()`.
//!
//! # Reverse Proxies
//!
//! Forwarding headers are only honored when the peer itself lies inside a
//! `TRUSTED_PROXIES` range. In that case the client IP is read from:
//!
//! 1. `X-Forwarded-For` (first entry of the comma-separated list)
//! 2. `X-Real-IP`
//! 3. the peer address, if neither header is present
//!
//! A header value that does not parse as an IP address yields no client IP,
//! which every allow-list rejects. Requests from untrusted peers cannot
//! influence their identity through headers at all.
//!
//! IPv4-mapped IPv6 addresses (`::ffff:10.0.0.1`) are canonicalized to IPv4
//! so they compare equal to IPv4 allow-list entries.

use std::net::{IpAddr, SocketAddr};

use axum::extract::ConnectInfo;
use axum::http::Request;
use tracing::{debug, warn};

/// Rate-limit key used when no client IP could be determined.
pub const UNKNOWN_IP: &str = "unknown";

// =============================================================================
// Trusted Proxy CIDR Matching
// =============================================================================

/// Parsed CIDR network range.
#[derive(Debug, Clone)]
pub struct CidrRange {
    network: IpAddr,
    prefix_len: u8,
}

impl CidrRange {
    /// Parse a CIDR notation string (e.g., "10.0.0.0/8" or "::1/128").
    ///
    /// A bare address is accepted as a single-host range. Returns `None` if
    /// the format is invalid.
    pub fn parse(cidr: &str) -> Option<Self> {
        let cidr = cidr.trim();
        let (addr, prefix) = match cidr.split_once('/') {
            Some((addr, prefix)) => (addr, Some(prefix)),
            None => (cidr, None),
        };

        let network: IpAddr = addr.parse().ok()?;
        let max_prefix = match network {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };
        let prefix_len = match prefix {
            Some(p) => p.parse().ok()?,
            None => max_prefix,
        };
        if prefix_len > max_prefix {
            return None;
        }

        Some(Self {
            network,
            prefix_len,
        })
    }

    /// Check if an IP address is contained within this CIDR range.
    pub fn contains(&self, ip: &IpAddr) -> bool {
        match (&self.network, ip) {
            (IpAddr::V4(net), IpAddr::V4(addr)) => {
                let mask = if self.prefix_len == 0 {
                    0
                } else {
                    u32::MAX << (32 - self.prefix_len)
                };
                (u32::from(*net) & mask) == (u32::from(*addr) & mask)
            }
            (IpAddr::V6(net), IpAddr::V6(addr)) => {
                let mask = if self.prefix_len == 0 {
                    0
                } else {
                    u128::MAX << (128 - self.prefix_len)
                };
                (u128::from(*net) & mask) == (u128::from(*addr) & mask)
            }
            _ => false,
        }
    }
}

/// Reverse proxies whose forwarding headers are believed.
///
/// Empty by default: nobody is trusted and the peer address is always used.
#[derive(Debug, Clone, Default)]
pub struct TrustedProxyConfig {
    ranges: Vec<CidrRange>,
}

impl TrustedProxyConfig {
    /// Build from CIDR strings. Invalid entries are logged and skipped.
    pub fn new(cidrs: &[String]) -> Self {
        let ranges: Vec<CidrRange> = cidrs
            .iter()
            .filter_map(|cidr| {
                let parsed = CidrRange::parse(cidr);
                if parsed.is_none() {
                    warn!(cidr = %cidr, "Invalid CIDR range in TRUSTED_PROXIES, skipping");
                }
                parsed
            })
            .collect();

        if !ranges.is_empty() {
            debug!(count = ranges.len(), "Trusted proxy ranges configured");
        }

        Self { ranges }
    }

    pub fn is_enabled(&self) -> bool {
        !self.ranges.is_empty()
    }

    /// Whether `ip` belongs to a configured proxy range.
    pub fn is_trusted(&self, ip: &IpAddr) -> bool {
        self.ranges.iter().any(|range| range.contains(ip))
    }
}

// =============================================================================
// Header Extraction
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ForwardedIp<'a> {
    FromXff(&'a str),
    FromRealIp(&'a str),
    NotFound,
}

fn forwarded_ip_from_headers<B>(req: &Request<B>) -> ForwardedIp<'_> {
    if let Some(forwarded) = req.headers().get("x-forwarded-for")
        && let Ok(value) = forwarded.to_str()
        && let Some(first_ip) = value.split(',').next()
    {
        return ForwardedIp::FromXff(first_ip.trim());
    }

    if let Some(real_ip) = req.headers().get("x-real-ip")
        && let Ok(value) = real_ip.to_str()
    {
        return ForwardedIp::FromRealIp(value.trim());
    }

    ForwardedIp::NotFound
}

/// Peer address of the connection, if the server exposes it.
pub fn peer_ip<B>(req: &Request<B>) -> Option<IpAddr> {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_canonical())
}

/// Resolve the IP address identifying the caller of `req`.
///
/// Returns `None` when the peer address is unavailable, or when a trusted
/// proxy forwarded a value that is not an IP address.
pub fn resolve_client_ip<B>(req: &Request<B>, trusted_proxies: &TrustedProxyConfig) -> Option<IpAddr> {
    let peer = peer_ip(req)?;
    if !trusted_proxies.is_trusted(&peer) {
        return Some(peer);
    }

    let forwarded = match forwarded_ip_from_headers(req) {
        ForwardedIp::FromXff(ip) | ForwardedIp::FromRealIp(ip) => ip,
        ForwardedIp::NotFound => {
            debug!(peer = %peer, "Trusted proxy sent no forwarding headers");
            return Some(peer);
        }
    };

    match forwarded.parse::<IpAddr>() {
        Ok(ip) => Some(ip.to_canonical()),
        Err(_) => {
            warn!(peer = %peer, forwarded, "Unparseable forwarded client IP");
            None
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request_from(peer: &str) -> axum::http::request::Builder {
        let addr: SocketAddr = peer.parse().unwrap();
        Request::builder().extension(ConnectInfo(addr))
    }

    fn proxies(cidrs: &[&str]) -> TrustedProxyConfig {
        TrustedProxyConfig::new(&cidrs.iter().map(|c| c.to_string()).collect::<Vec<_>>())
    }

    #[test]
    fn test_peer_address_is_client_ip() {
        let req = request_from("192.168.1.7:5555").body(Body::empty()).unwrap();
        assert_eq!(
            resolve_client_ip(&req, &TrustedProxyConfig::default()),
            Some("192.168.1.7".parse().unwrap())
        );
    }

    #[test]
    fn test_missing_connect_info_is_unknown() {
        let req = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(resolve_client_ip(&req, &TrustedProxyConfig::default()), None);
    }

    #[test]
    fn test_headers_ignored_from_untrusted_peer() {
        let req = request_from("203.0.113.9:1000")
            .header("x-forwarded-for", "10.0.0.1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(
            resolve_client_ip(&req, &proxies(&["10.0.0.0/8"])),
            Some("203.0.113.9".parse().unwrap())
        );
    }

    #[test]
    fn test_xff_honored_from_trusted_peer() {
        let req = request_from("10.1.2.3:1000")
            .header("x-forwarded-for", " 198.51.100.4 , 10.1.2.3")
            .header("x-real-ip", "198.51.100.99")
            .body(Body::empty())
            .unwrap();
        assert_eq!(
            resolve_client_ip(&req, &proxies(&["10.0.0.0/8"])),
            Some("198.51.100.4".parse().unwrap())
        );
    }

    #[test]
    fn test_real_ip_honored_from_trusted_peer() {
        let req = request_from("10.1.2.3:1000")
            .header("x-real-ip", "2001:db8::1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(
            resolve_client_ip(&req, &proxies(&["10.0.0.0/8"])),
            Some("2001:db8::1".parse().unwrap())
        );
    }

    #[test]
    fn test_trusted_peer_without_headers_falls_back_to_peer() {
        let req = request_from("10.1.2.3:1000").body(Body::empty()).unwrap();
        assert_eq!(
            resolve_client_ip(&req, &proxies(&["10.0.0.0/8"])),
            Some("10.1.2.3".parse().unwrap())
        );
    }

    #[test]
    fn test_garbage_forwarded_value_is_unknown() {
        let req = request_from("10.1.2.3:1000")
            .header("x-forwarded-for", "not-an-ip")
            .body(Body::empty())
            .unwrap();
        assert_eq!(resolve_client_ip(&req, &proxies(&["10.0.0.0/8"])), None);
    }

    #[test]
    fn test_ipv4_mapped_peer_is_canonicalized() {
        let req = request_from("[::ffff:127.0.0.1]:8080")
            .body(Body::empty())
            .unwrap();
        assert_eq!(peer_ip(&req), Some("127.0.0.1".parse().unwrap()));
    }

    // ==========================================================================
    // CIDR Range Tests
    // ==========================================================================

    #[test]
    fn test_cidr_parse() {
        assert_eq!(CidrRange::parse("10.0.0.0/8").unwrap().prefix_len, 8);
        assert_eq!(CidrRange::parse("::1/128").unwrap().prefix_len, 128);
        assert_eq!(CidrRange::parse("192.168.1.1").unwrap().prefix_len, 32);
    }

    #[test]
    fn test_cidr_parse_invalid() {
        assert!(CidrRange::parse("not-an-ip").is_none());
        assert!(CidrRange::parse("10.0.0.0/33").is_none());
        assert!(CidrRange::parse("10.0.0.0/x").is_none());
    }

    #[test]
    fn test_cidr_contains() {
        let cidr = CidrRange::parse("192.168.1.0/24").unwrap();
        assert!(cidr.contains(&"192.168.1.254".parse().unwrap()));
        assert!(!cidr.contains(&"192.168.2.1".parse().unwrap()));
        assert!(!cidr.contains(&"::1".parse().unwrap()));

        let any = CidrRange::parse("0.0.0.0/0").unwrap();
        assert!(any.contains(&"8.8.8.8".parse().unwrap()));
    }

    #[test]
    fn test_trusted_proxy_config_empty_trusts_nobody() {
        let config = TrustedProxyConfig::new(&[]);
        assert!(!config.is_enabled());
        assert!(!config.is_trusted(&"10.0.0.1".parse().unwrap()));
    }

    #[test]
    fn test_trusted_proxy_config_skips_invalid() {
        let config = proxies(&["bogus", "172.16.0.0/12"]);
        assert!(config.is_enabled());
        assert!(config.is_trusted(&"172.31.255.255".parse().unwrap()));
        assert!(!config.is_trusted(&"8.8.8.8".parse().unwrap()));
    }
}
