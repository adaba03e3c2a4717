//! Secret lookup for outbound authentication.
//!
//! Endpoint configuration only names the variables that hold secrets. The
//! values are resolved per request through [`CredentialProvider`], which the
//! process backs with its environment and tests back with a fixed map.

use std::collections::HashMap;
use std::env;

/// Source of named secrets.
pub trait CredentialProvider: Send + Sync {
    /// Return the value stored under `name`, or `None` when it is absent.
    ///
    /// Empty values count as absent.
    fn lookup(&self, name: &str) -> Option<String>;
}

/// Reads credentials from the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvCredentials;

impl CredentialProvider for EnvCredentials {
    fn lookup(&self, name: &str) -> Option<String> {
        env::var(name).ok().filter(|v| !v.is_empty())
    }
}

/// Fixed in-memory credentials.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    values: HashMap<String, String>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }
}

impl<K, V> FromIterator<(K, V)> for StaticCredentials
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl CredentialProvider for StaticCredentials {
    fn lookup(&self, name: &str) -> Option<String> {
        self.values.get(name).filter(|v| !v.is_empty()).cloned()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_static_lookup() {
        let creds = StaticCredentials::new().with("SVC_KEY", "abc123");
        assert_eq!(creds.lookup("SVC_KEY").as_deref(), Some("abc123"));
        assert_eq!(creds.lookup("OTHER"), None);
    }

    #[test]
    fn test_static_empty_value_is_absent() {
        let creds: StaticCredentials = [("EMPTY", "")].into_iter().collect();
        assert_eq!(creds.lookup("EMPTY"), None);
    }

    #[test]
    fn test_env_lookup_missing_variable() {
        assert_eq!(
            EnvCredentials.lookup("GET_TO_POST_TEST_SURELY_UNSET_VARIABLE"),
            None
        );
    }

    #[test]
    fn test_env_lookup_reads_process_environment() {
        // PATH is set in every test environment.
        assert!(EnvCredentials.lookup("PATH").is_some());
    }
}
