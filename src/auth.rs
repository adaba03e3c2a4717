//! Outbound authentication header construction.
//!
//! Turns an endpoint's [`AuthMethod`] and credential names into the headers
//! attached to the outbound POST:
//!
//! | method   | header                                  |
//! |----------|-----------------------------------------|
//! | `none`   | *(none)*                                |
//! | `token`  | `Authorization: Token <key>`            |
//! | `bearer` | `Authorization: Bearer <key>`           |
//! | `basic`  | `Authorization: Basic base64(user:pass)`|
//!
//! No network I/O happens here; the only side effect is reading secrets
//! through the supplied [`CredentialProvider`].

use axum::http::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;

use crate::credentials::CredentialProvider;
use crate::endpoints::{AuthMethod, EndpointDescriptor};
use crate::error::AppError;

/// Failure to build the outbound authentication headers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("API key not found in environment variable {name}")]
    ApiKeyMissing { name: String },

    #[error(
        "Basic auth credentials not found in environment variables {username_env} and/or {password_env}"
    )]
    BasicCredentialsMissing {
        username_env: String,
        password_env: String,
    },

    /// Credential names are validated at load time; this only fires for
    /// descriptors built by hand without them.
    #[error("Endpoint {get_path} has no credential source configured for {method} auth")]
    CredentialSourceMissing { get_path: String, method: AuthMethod },

    /// The secret contains bytes that are not valid in an HTTP header.
    #[error("Credential from {name} is not a valid header value")]
    InvalidHeaderValue { name: String },
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::CredentialMissing(err.to_string())
    }
}

/// Build the authentication headers for `descriptor`.
///
/// # Errors
///
/// Returns an [`AuthError`] naming the credential source(s) when a required
/// secret is not available.
pub fn resolve(
    descriptor: &EndpointDescriptor,
    provider: &dyn CredentialProvider,
) -> Result<HeaderMap, AuthError> {
    let mut headers = HeaderMap::new();
    let refs = &descriptor.credentials;

    match descriptor.auth_method {
        AuthMethod::None => {}
        method @ (AuthMethod::Token | AuthMethod::Bearer) => {
            let name = refs
                .api_key_env
                .as_deref()
                .ok_or_else(|| AuthError::CredentialSourceMissing {
                    get_path: descriptor.get_path.clone(),
                    method,
                })?;
            let key = provider
                .lookup(name)
                .ok_or_else(|| AuthError::ApiKeyMissing {
                    name: name.to_string(),
                })?;
            let scheme = if method == AuthMethod::Token {
                "Token"
            } else {
                "Bearer"
            };
            headers.insert(AUTHORIZATION, header_value(&format!("{scheme} {key}"), name)?);
        }
        AuthMethod::Basic => {
            let (Some(username_env), Some(password_env)) =
                (refs.username_env.as_deref(), refs.password_env.as_deref())
            else {
                return Err(AuthError::CredentialSourceMissing {
                    get_path: descriptor.get_path.clone(),
                    method: AuthMethod::Basic,
                });
            };
            let (Some(username), Some(password)) =
                (provider.lookup(username_env), provider.lookup(password_env))
            else {
                return Err(AuthError::BasicCredentialsMissing {
                    username_env: username_env.to_string(),
                    password_env: password_env.to_string(),
                });
            };
            let encoded = STANDARD.encode(format!("{username}:{password}"));
            headers.insert(
                AUTHORIZATION,
                header_value(&format!("Basic {encoded}"), username_env)?,
            );
        }
    }

    Ok(headers)
}

fn header_value(value: &str, source: &str) -> Result<HeaderValue, AuthError> {
    let mut header = HeaderValue::from_str(value).map_err(|_| AuthError::InvalidHeaderValue {
        name: source.to_string(),
    })?;
    header.set_sensitive(true);
    Ok(header)
}
