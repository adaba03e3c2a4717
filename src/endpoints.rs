//! Endpoint mapping: which GET path forwards to which POST target.
//!
//! The mapping is read once at startup from a YAML file and never changes
//! afterwards. Lookups are performed concurrently by every request task
//! through a shared `Arc<EndpointStore>`, so no synchronization is needed.
//!
//! # File Format
//!
//! ```yaml
//! endpoints:
//!   /report:
//!     post_url: /gen
//!     target_host: http://svc
//!     auth_method: bearer
//!     api_key_env: SVC_KEY
//! ```
//!
//! # Normalization
//!
//! Keys are stored without trailing slashes, and inbound paths are normalized
//! the same way before lookup, so `/report/` and `/report` hit the same entry.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};

/// How credentials are attached to the outbound call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthMethod {
    None,
    Token,
    Bearer,
    Basic,
}

impl AuthMethod {
    /// Parse an `auth_method` value.
    ///
    /// Unrecognized values fall back to `None`: the endpoint is forwarded
    /// without an `Authorization` header.
    pub fn parse(value: Option<&str>) -> Self {
        let Some(raw) = value else {
            return AuthMethod::None;
        };

        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "none" => AuthMethod::None,
            "token" => AuthMethod::Token,
            "bearer" => AuthMethod::Bearer,
            "basic" => AuthMethod::Basic,
            other => {
                warn!(
                    auth_method = other,
                    "Unknown auth_method, forwarding without authentication"
                );
                AuthMethod::None
            }
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuthMethod::None => "none",
            AuthMethod::Token => "token",
            AuthMethod::Bearer => "bearer",
            AuthMethod::Basic => "basic",
        };
        f.write_str(name)
    }
}

/// Names of the environment variables holding an endpoint's secrets.
///
/// Only the names live in configuration; values are read per request through
/// a [`CredentialProvider`](crate::credentials::CredentialProvider).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialRefs {
    pub api_key_env: Option<String>,
    pub username_env: Option<String>,
    pub password_env: Option<String>,
}

/// One configured GET → POST translation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointDescriptor {
    /// Normalized inbound path (identity of the descriptor)
    pub get_path: String,
    /// Path appended to `target_host` for the outbound POST
    pub post_path: String,
    /// Base URL of the backend, e.g. `http://svc`
    pub target_host: String,
    pub auth_method: AuthMethod,
    pub credentials: CredentialRefs,
}

impl EndpointDescriptor {
    /// Full URL of the outbound POST: `target_host` joined with `post_path`.
    pub fn target_url(&self) -> String {
        let host = self.target_host.trim_end_matches('/');
        if self.post_path.is_empty() {
            host.to_string()
        } else if self.post_path.starts_with('/') {
            format!("{host}{}", self.post_path)
        } else {
            format!("{host}/{}", self.post_path)
        }
    }
}

/// Strip trailing slashes from a path.
///
/// `/` itself normalizes to the empty string, matching how the inbound path
/// of a request for the root is normalized.
pub fn normalize_path(path: &str) -> &str {
    path.trim_end_matches('/')
}

/// Raw YAML shape of the mapping file.
#[derive(Debug, Deserialize)]
struct EndpointFile {
    #[serde(default)]
    endpoints: HashMap<String, RawEndpoint>,
}

#[derive(Debug, Deserialize)]
struct RawEndpoint {
    post_url: String,
    target_host: String,
    #[serde(default)]
    auth_method: Option<String>,
    #[serde(default)]
    api_key_env: Option<String>,
    #[serde(default)]
    username_env: Option<String>,
    #[serde(default)]
    password_env: Option<String>,
}

/// Read-only map from normalized GET path to its descriptor.
#[derive(Debug, Clone, Default)]
pub struct EndpointStore {
    endpoints: HashMap<String, EndpointDescriptor>,
}

impl EndpointStore {
    /// Load and validate the mapping file at `path`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if the file cannot be read or any
    /// entry is invalid. Callers treat this as fatal.
    pub fn load(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::ConfigError(format!(
                "Failed to read endpoint config {}: {e}",
                path.display()
            ))
        })?;

        let store = Self::from_yaml_str(&contents)?;
        info!(
            path = %path.display(),
            endpoints = store.len(),
            "Loaded endpoint configuration"
        );
        Ok(store)
    }

    /// Parse and validate a YAML mapping document.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` on malformed YAML, keys without a
    /// leading `/`, keys that collide after normalization, non-HTTP target
    /// hosts, or auth methods missing their credential names.
    pub fn from_yaml_str(contents: &str) -> AppResult<Self> {
        let file: EndpointFile = serde_yaml::from_str(contents)
            .map_err(|e| AppError::ConfigError(format!("Invalid endpoint config: {e}")))?;

        let descriptors = file
            .endpoints
            .into_iter()
            .map(|(key, raw)| build_descriptor(&key, raw))
            .collect::<AppResult<Vec<_>>>()?;

        Self::from_descriptors(descriptors)
    }

    /// Build a store from already constructed descriptors.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if two descriptors share a normalized path.
    pub fn from_descriptors(
        descriptors: impl IntoIterator<Item = EndpointDescriptor>,
    ) -> AppResult<Self> {
        let mut endpoints = HashMap::new();
        for mut descriptor in descriptors {
            descriptor.get_path = normalize_path(&descriptor.get_path).to_string();
            let key = descriptor.get_path.clone();
            if endpoints.insert(key.clone(), descriptor).is_some() {
                return Err(AppError::ConfigError(format!(
                    "Duplicate endpoint mapping for GET path '{key}'"
                )));
            }
        }
        Ok(Self { endpoints })
    }

    /// Look up the descriptor for an inbound path (normalized here).
    pub fn lookup(&self, path: &str) -> Option<&EndpointDescriptor> {
        let found = self.endpoints.get(normalize_path(path));
        debug!(path, found = found.is_some(), "Endpoint lookup");
        found
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Iterate over configured GET paths (unordered).
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.endpoints.keys().map(String::as_str)
    }
}

fn build_descriptor(key: &str, raw: RawEndpoint) -> AppResult<EndpointDescriptor> {
    if !key.starts_with('/') {
        return Err(AppError::ConfigError(format!(
            "Endpoint key '{key}' must start with '/'"
        )));
    }

    let target_host = raw.target_host.trim().to_string();
    if !(target_host.starts_with("http://") || target_host.starts_with("https://")) {
        return Err(AppError::ConfigError(format!(
            "Endpoint '{key}': target_host '{target_host}' must be an http(s) URL"
        )));
    }

    let auth_method = AuthMethod::parse(raw.auth_method.as_deref());
    let credentials = CredentialRefs {
        api_key_env: non_empty(raw.api_key_env),
        username_env: non_empty(raw.username_env),
        password_env: non_empty(raw.password_env),
    };

    match auth_method {
        AuthMethod::Token | AuthMethod::Bearer if credentials.api_key_env.is_none() => {
            return Err(AppError::ConfigError(format!(
                "Endpoint '{key}': auth_method '{auth_method}' requires api_key_env"
            )));
        }
        AuthMethod::Basic
            if credentials.username_env.is_none() || credentials.password_env.is_none() =>
        {
            return Err(AppError::ConfigError(format!(
                "Endpoint '{key}': auth_method 'basic' requires username_env and password_env"
            )));
        }
        _ => {}
    }

    Ok(EndpointDescriptor {
        get_path: normalize_path(key).to_string(),
        post_path: raw.post_url.trim().to_string(),
        target_host,
        auth_method,
        credentials,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
