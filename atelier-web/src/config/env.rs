//! Environment resolution for backend endpoints and credentials.
//!
//! Values are looked up through an [`EnvSource`] on every resolution, trimmed, and
//! treated as absent when empty. Resolution never yields a partially populated
//! [`ResolvedEnv`]: the first missing requirement fails the whole call.

use reqwest::Url;
use secrecy::Secret;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

pub const BACKEND_URL: &str = "BACKEND_URL";
pub const BACKEND_ANON_KEY: &str = "BACKEND_ANON_KEY";
pub const BACKEND_SERVICE_ROLE_KEY: &str = "BACKEND_SERVICE_ROLE_KEY";
pub const EMAIL_API_KEY: &str = "EMAIL_API_KEY";
pub const SITE_URL: &str = "SITE_URL";
pub const CRON_SECRET: &str = "CRON_SECRET";

/// Every variable the service knows about, in reporting order.
pub const KNOWN_KEYS: [&str; 6] = [
    BACKEND_URL,
    BACKEND_ANON_KEY,
    BACKEND_SERVICE_ROLE_KEY,
    EMAIL_API_KEY,
    SITE_URL,
    CRON_SECRET,
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("{key} is not a valid http(s) URL: {reason}")]
    InvalidUrl { key: &'static str, reason: String },
}

/// Where configuration values come from.
pub trait EnvSource: Send + Sync {
    fn var(&self, key: &str) -> Option<String>;
}

/// The process environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// A fixed set of values, for tests and embedded setups.
#[derive(Debug, Default, Clone)]
pub struct MapEnv(HashMap<String, String>);

impl MapEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.0.insert(key.to_string(), value.to_string());
        self
    }
}

impl EnvSource for MapEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.0.get(key).cloned()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyScope {
    /// Endpoint and public key.
    Public,
    /// Endpoint, public key and secret key.
    Privileged,
}

#[derive(Debug, Clone)]
pub struct ResolvedEnv {
    pub endpoint: Url,
    pub public_key: Secret<String>,
    /// Present only for [`KeyScope::Privileged`].
    pub secret_key: Option<Secret<String>>,
}

/// Presence of one configuration value. Never carries the value itself.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct EnvPresence {
    pub key: &'static str,
    pub present: bool,
    pub length: usize,
}

#[derive(Clone)]
pub struct EnvResolver {
    source: Arc<dyn EnvSource>,
}

impl EnvResolver {
    pub fn new(source: Arc<dyn EnvSource>) -> Self {
        Self { source }
    }

    pub fn from_process() -> Self {
        Self::new(Arc::new(ProcessEnv))
    }

    fn lookup(&self, key: &'static str) -> Option<String> {
        let value = self
            .source
            .var(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        tracing::debug!(
            key = key,
            present = value.is_some(),
            length = value.as_ref().map(|v| v.len()).unwrap_or(0),
            "Resolved configuration value"
        );

        value
    }

    /// Resolve the endpoint and the key(s) the scope needs.
    pub fn resolve(&self, scope: KeyScope) -> Result<ResolvedEnv, ConfigurationError> {
        let raw_endpoint = self
            .lookup(BACKEND_URL)
            .ok_or(ConfigurationError::Missing(BACKEND_URL))?;
        let endpoint = parse_endpoint(BACKEND_URL, &raw_endpoint)?;

        let public_key = self
            .lookup(BACKEND_ANON_KEY)
            .ok_or(ConfigurationError::Missing(BACKEND_ANON_KEY))?;

        let secret_key = match scope {
            KeyScope::Public => None,
            KeyScope::Privileged => Some(Secret::new(
                self.lookup(BACKEND_SERVICE_ROLE_KEY)
                    .ok_or(ConfigurationError::Missing(BACKEND_SERVICE_ROLE_KEY))?,
            )),
        };

        Ok(ResolvedEnv {
            endpoint,
            public_key: Secret::new(public_key),
            secret_key,
        })
    }

    /// Resolve a single required value.
    pub fn require(&self, key: &'static str) -> Result<Secret<String>, ConfigurationError> {
        self.lookup(key)
            .map(Secret::new)
            .ok_or(ConfigurationError::Missing(key))
    }

    /// Resolve a required value that must be an absolute http(s) URL.
    pub fn require_url(&self, key: &'static str) -> Result<Url, ConfigurationError> {
        let raw = self.lookup(key).ok_or(ConfigurationError::Missing(key))?;
        parse_endpoint(key, &raw)
    }

    /// Presence and length of every known value, for diagnostics.
    pub fn report(&self) -> Vec<EnvPresence> {
        KNOWN_KEYS
            .iter()
            .copied()
            .map(|key| {
                let value = self.lookup(key);
                EnvPresence {
                    key,
                    present: value.is_some(),
                    length: value.map(|v| v.len()).unwrap_or(0),
                }
            })
            .collect()
    }
}

fn parse_endpoint(key: &'static str, raw: &str) -> Result<Url, ConfigurationError> {
    let url = Url::parse(raw).map_err(|e| ConfigurationError::InvalidUrl {
        key,
        reason: e.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        other => Err(ConfigurationError::InvalidUrl {
            key,
            reason: format!("unsupported scheme or missing host ({})", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn full_env() -> MapEnv {
        MapEnv::new()
            .with(BACKEND_URL, "https://abcd1234.backend.example")
            .with(BACKEND_ANON_KEY, "anon-key")
            .with(BACKEND_SERVICE_ROLE_KEY, "service-role-key")
    }

    fn resolver(env: MapEnv) -> EnvResolver {
        EnvResolver::new(Arc::new(env))
    }

    #[test]
    fn public_scope_has_no_secret() {
        let resolved = resolver(full_env()).resolve(KeyScope::Public).unwrap();
        assert_eq!(resolved.endpoint.as_str(), "https://abcd1234.backend.example/");
        assert_eq!(resolved.public_key.expose_secret(), "anon-key");
        assert!(resolved.secret_key.is_none());
    }

    #[test]
    fn privileged_scope_carries_secret() {
        let resolved = resolver(full_env()).resolve(KeyScope::Privileged).unwrap();
        assert_eq!(
            resolved.secret_key.unwrap().expose_secret(),
            "service-role-key"
        );
    }

    #[test]
    fn empty_endpoint_is_reported_before_key() {
        let env = MapEnv::new()
            .with(BACKEND_URL, "")
            .with(BACKEND_ANON_KEY, "abc");
        let err = resolver(env).resolve(KeyScope::Public).unwrap_err();
        assert_eq!(err, ConfigurationError::Missing(BACKEND_URL));
        assert!(err.to_string().contains("BACKEND_URL"));
        assert!(!err.to_string().contains("ANON"));
    }

    #[test]
    fn any_missing_or_blank_key_fails() {
        for (key, scope) in [
            (BACKEND_URL, KeyScope::Public),
            (BACKEND_ANON_KEY, KeyScope::Public),
            (BACKEND_URL, KeyScope::Privileged),
            (BACKEND_ANON_KEY, KeyScope::Privileged),
            (BACKEND_SERVICE_ROLE_KEY, KeyScope::Privileged),
        ] {
            for blank in [None, Some("   ")] {
                let mut env = MapEnv::new();
                for k in [BACKEND_URL, BACKEND_ANON_KEY, BACKEND_SERVICE_ROLE_KEY] {
                    if k != key {
                        let value = if k == BACKEND_URL {
                            "http://localhost:54321"
                        } else {
                            "x"
                        };
                        env = env.with(k, value);
                    } else if let Some(value) = blank {
                        env = env.with(k, value);
                    }
                }

                let err = resolver(env).resolve(scope).unwrap_err();
                assert_eq!(err, ConfigurationError::Missing(key), "{key} {scope:?}");
            }
        }
    }

    #[test]
    fn values_are_trimmed() {
        let env = MapEnv::new()
            .with(BACKEND_URL, "  http://localhost:54321  ")
            .with(BACKEND_ANON_KEY, "\tanon\n");
        let resolved = resolver(env).resolve(KeyScope::Public).unwrap();
        assert_eq!(resolved.endpoint.host_str(), Some("localhost"));
        assert_eq!(resolved.public_key.expose_secret(), "anon");
    }

    #[test]
    fn non_http_endpoint_is_rejected() {
        let env = full_env().with(BACKEND_URL, "postgres://db.internal:5432");
        let err = resolver(env).resolve(KeyScope::Public).unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidUrl { key: BACKEND_URL, .. }));
    }

    #[test]
    fn require_single_value() {
        let r = resolver(full_env().with(CRON_SECRET, "s3cret"));
        assert_eq!(r.require(CRON_SECRET).unwrap().expose_secret(), "s3cret");
        assert_eq!(
            r.require(EMAIL_API_KEY).unwrap_err(),
            ConfigurationError::Missing(EMAIL_API_KEY)
        );
    }

    #[test]
    fn report_has_lengths_not_values() {
        let report = resolver(full_env()).report();
        assert_eq!(report.len(), KNOWN_KEYS.len());

        let anon = report.iter().find(|p| p.key == BACKEND_ANON_KEY).unwrap();
        assert!(anon.present);
        assert_eq!(anon.length, "anon-key".len());

        let cron = report.iter().find(|p| p.key == CRON_SECRET).unwrap();
        assert!(!cron.present);

        let json = serde_json::to_string(&report).unwrap();
        assert!(!json.contains("service-role-key"));
    }
}
