//! Application configuration loaded from environment variables.
//!
//! # Required
//!
//! - `RATE_LIMIT`: Requests per minute allowed per client IP (must be > 0)
//! - `ALLOWED_IPS`: Comma-separated IP addresses allowed to call the gateway
//!
//! Missing or invalid required values abort startup.
//!
//! # Optional
//!
//! - `HOST` / `PORT`: Listen address (default: `0.0.0.0:8000`)
//! - `ENDPOINTS_CONFIG`: Endpoint mapping file (default: `/app/config/config.yml`)
//! - `TRUSTED_PROXIES`: CIDR ranges whose forwarding headers are believed
//! - `UPSTREAM_TIMEOUT_SECS`: Whole-request timeout for backend calls (default: 30)
//! - `UPSTREAM_CONNECT_TIMEOUT_SECS`: Connect timeout for backend calls (default: 10)
//! - `MAX_REQUEST_BODY_SIZE`: Body limit for `POST /example-post` (default: 1MB)
//! - `RATE_LIMIT_CLEANUP_SECS`: Expired rate-limit window eviction interval (default: 60)
//! - `METRICS_PORT`: Prometheus exporter port (default: 0 = disabled)

use std::env;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{AppError, AppResult};

pub const DEFAULT_ENDPOINTS_CONFIG: &str = "/app/config/config.yml";

#[derive(Debug, Clone)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    pub host: String,
    pub port: u16,

    /// Path of the YAML endpoint mapping
    pub endpoints_config: PathBuf,

    // =========================================================================
    // Access Guard Configuration
    // =========================================================================
    /// Requests per minute per client IP
    pub rate_limit_per_minute: u32,

    /// Client IPs allowed to use the gateway (never empty)
    pub allowed_ips: Vec<IpAddr>,

    /// CIDR ranges of reverse proxies allowed to set `X-Forwarded-For`.
    /// Empty means the TCP peer address is always the client IP.
    pub trusted_proxies: Vec<String>,

    /// How often expired rate-limit windows are evicted
    pub rate_limit_cleanup_interval: Duration,

    // =========================================================================
    // Outbound Client Configuration
    // =========================================================================
    pub upstream_timeout: Duration,
    pub upstream_connect_timeout: Duration,

    // =========================================================================
    // Limits & Observability
    // =========================================================================
    /// Maximum request body size in bytes
    pub max_request_body_size: usize,

    /// Port for Prometheus metrics endpoint (0 = disabled)
    pub metrics_port: u16,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if `RATE_LIMIT` or `ALLOWED_IPS` is
    /// missing or invalid, or any optional value fails to parse.
    pub fn from_env() -> AppResult<Self> {
        // Load an .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let config = Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: Self::parse_env("PORT", 8000)?,
            endpoints_config: env::var("ENDPOINTS_CONFIG")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_ENDPOINTS_CONFIG)),

            rate_limit_per_minute: Self::parse_rate_limit(env::var("RATE_LIMIT").ok().as_deref())?,
            allowed_ips: Self::parse_allowed_ips(env::var("ALLOWED_IPS").ok().as_deref())?,
            trusted_proxies: Self::parse_list(env::var("TRUSTED_PROXIES").ok().as_deref()),
            rate_limit_cleanup_interval: Duration::from_secs(Self::parse_env(
                "RATE_LIMIT_CLEANUP_SECS",
                60,
            )?),

            upstream_timeout: Duration::from_secs(Self::parse_env("UPSTREAM_TIMEOUT_SECS", 30)?),
            upstream_connect_timeout: Duration::from_secs(Self::parse_env(
                "UPSTREAM_CONNECT_TIMEOUT_SECS",
                10,
            )?),

            max_request_body_size: Self::parse_env("MAX_REQUEST_BODY_SIZE", 1024 * 1024)?,
            metrics_port: Self::parse_env("METRICS_PORT", 0)?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values for consistency and correctness.
    fn validate(&self) -> AppResult<()> {
        if self.rate_limit_per_minute == 0 {
            return Err(AppError::ConfigError(
                "RATE_LIMIT must be greater than 0".to_string(),
            ));
        }

        if self.allowed_ips.is_empty() {
            return Err(AppError::ConfigError(
                "No allowed IP addresses set. Define ALLOWED_IPS environment variable.".to_string(),
            ));
        }

        if self.upstream_timeout.is_zero() || self.upstream_connect_timeout.is_zero() {
            return Err(AppError::ConfigError(
                "UPSTREAM_TIMEOUT_SECS and UPSTREAM_CONNECT_TIMEOUT_SECS must be greater than 0"
                    .to_string(),
            ));
        }

        if self.rate_limit_cleanup_interval.is_zero() {
            return Err(AppError::ConfigError(
                "RATE_LIMIT_CLEANUP_SECS must be greater than 0".to_string(),
            ));
        }

        if self.max_request_body_size == 0 {
            return Err(AppError::ConfigError(
                "MAX_REQUEST_BODY_SIZE must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Get the full server address for binding.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn metrics_enabled(&self) -> bool {
        self.metrics_port > 0
    }

    /// Get the metrics endpoint address, or `None` if metrics are disabled.
    pub fn metrics_addr(&self) -> Option<std::net::SocketAddr> {
        if self.metrics_enabled() {
            Some(std::net::SocketAddr::from((
                [0, 0, 0, 0],
                self.metrics_port,
            )))
        } else {
            None
        }
    }

    /// Parse `RATE_LIMIT`. Required.
    fn parse_rate_limit(raw: Option<&str>) -> AppResult<u32> {
        let raw = raw.map(str::trim).filter(|v| !v.is_empty()).ok_or_else(|| {
            AppError::ConfigError(
                "No rate limit set. Define RATE_LIMIT environment variable.".to_string(),
            )
        })?;

        let limit: u32 = raw
            .parse()
            .map_err(|e| AppError::ConfigError(format!("Invalid RATE_LIMIT '{raw}': {e}")))?;
        if limit == 0 {
            return Err(AppError::ConfigError(
                "RATE_LIMIT must be greater than 0".to_string(),
            ));
        }
        Ok(limit)
    }

    /// Parse `ALLOWED_IPS`. Required, non-empty, every entry an IP literal.
    fn parse_allowed_ips(raw: Option<&str>) -> AppResult<Vec<IpAddr>> {
        let entries = Self::parse_list(raw);
        if entries.is_empty() {
            return Err(AppError::ConfigError(
                "No allowed IP addresses set. Define ALLOWED_IPS environment variable.".to_string(),
            ));
        }

        entries
            .iter()
            .map(|entry| {
                entry.parse::<IpAddr>().map_err(|e| {
                    AppError::ConfigError(format!("Invalid IP '{entry}' in ALLOWED_IPS: {e}"))
                })
            })
            .collect()
    }

    /// Split a comma-separated value, trimming entries and dropping empty ones.
    fn parse_list(raw: Option<&str>) -> Vec<String> {
        raw.map(|s| {
            s.split(',')
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect()
        })
        .unwrap_or_default()
    }

    /// Parse an environment variable into the specified type with a default value.
    fn parse_env<T>(name: &str, default: T) -> AppResult<T>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match env::var(name) {
            Ok(val) => val
                .trim()
                .parse()
                .map_err(|e| AppError::ConfigError(format!("Invalid {name}: {e}"))),
            Err(_) => Ok(default),
        }
    }
}

/// Development configuration: loopback-only access, 60 requests per minute.
///
/// Production deployments should use `Config::from_env()` instead.
impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            endpoints_config: PathBuf::from(DEFAULT_ENDPOINTS_CONFIG),
            rate_limit_per_minute: 60,
            allowed_ips: vec![IpAddr::from([127, 0, 0, 1])],
            trusted_proxies: vec![],
            rate_limit_cleanup_interval: Duration::from_secs(60),
            upstream_timeout: Duration::from_secs(30),
            upstream_connect_timeout: Duration::from_secs(10),
            max_request_body_size: 1024 * 1024,
            metrics_port: 0,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server_addr(), "0.0.0.0:8000");
        assert!(!config.metrics_enabled());
        assert!(config.metrics_addr().is_none());
    }

    #[test]
    fn test_rate_limit_required() {
        let err = Config::parse_rate_limit(None).unwrap_err();
        assert!(err.to_string().contains("RATE_LIMIT"));
        assert!(Config::parse_rate_limit(Some("  ")).is_err());
    }

    #[test]
    fn test_rate_limit_parsing() {
        assert_eq!(Config::parse_rate_limit(Some("5")).unwrap(), 5);
        assert_eq!(Config::parse_rate_limit(Some(" 120 ")).unwrap(), 120);
        assert!(Config::parse_rate_limit(Some("0")).is_err());
        assert!(Config::parse_rate_limit(Some("five")).is_err());
        assert!(Config::parse_rate_limit(Some("-3")).is_err());
    }

    #[test]
    fn test_allowed_ips_required() {
        assert!(Config::parse_allowed_ips(None).is_err());
        assert!(Config::parse_allowed_ips(Some("")).is_err());
        assert!(Config::parse_allowed_ips(Some(" , ,")).is_err());
    }

    #[test]
    fn test_allowed_ips_parsing() {
        let ips = Config::parse_allowed_ips(Some("127.0.0.1, 10.0.0.5,::1")).unwrap();
        assert_eq!(
            ips,
            vec![
                "127.0.0.1".parse::<IpAddr>().unwrap(),
                "10.0.0.5".parse().unwrap(),
                "::1".parse().unwrap(),
            ]
        );
    }

    #[test]
    fn test_allowed_ips_rejects_non_ip() {
        let err = Config::parse_allowed_ips(Some("127.0.0.1,localhost")).unwrap_err();
        assert!(err.to_string().contains("localhost"));
    }

    #[test]
    fn test_validate_empty_allow_list() {
        let config = Config {
            allowed_ips: vec![],
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_timeout() {
        let config = Config {
            upstream_timeout: Duration::ZERO,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_metrics_addr_when_enabled() {
        let config = Config {
            metrics_port: 9090,
            ..Config::default()
        };
        assert_eq!(config.metrics_addr().unwrap().port(), 9090);
    }

    #[test]
    fn test_parse_list() {
        assert_eq!(
            Config::parse_list(Some("10.0.0.0/8, ,172.16.0.0/12")),
            vec!["10.0.0.0/8".to_string(), "172.16.0.0/12".to_string()]
        );
        assert!(Config::parse_list(None).is_empty());
    }
}
