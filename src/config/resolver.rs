//! Request-time resolution of environment-provided settings.
//!
//! The backend origin and the default scanner organization are read on every
//! request, so a changed environment (or reloaded config) is picked up without
//! a restart. Resolution fails closed: no origin means no forward.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;
use url::Url;

use crate::config::schema::{BackendConfig, ScannerConfig};

/// Read-only view of process environment variables.
pub trait EnvSource: Send + Sync + fmt::Debug {
    /// Returns the value of `key`, if set.
    fn var(&self, key: &str) -> Option<String>;
}

/// The real process environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// A fixed set of variables. Used by tests and embedders.
#[derive(Debug, Default, Clone)]
pub struct StaticEnv {
    vars: HashMap<String, String>,
}

impl StaticEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }
}

impl EnvSource for StaticEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

/// Why the backend origin could not be resolved.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("backend origin is not configured")]
    Missing,

    #[error("backend origin {value:?} is invalid: {reason}")]
    Invalid { value: String, reason: String },
}

/// Resolve the backend origin: env variables in order, then the static value.
pub fn resolve_backend_origin(
    config: &BackendConfig,
    env: &dyn EnvSource,
) -> Result<Url, ResolveError> {
    let raw = first_set(env, &config.origin_env)
        .or_else(|| non_empty(config.origin.clone()))
        .ok_or(ResolveError::Missing)?;

    parse_origin(&raw)
}

/// Resolve the default scanner organization, if any.
pub fn resolve_default_org(config: &ScannerConfig, env: &dyn EnvSource) -> Option<String> {
    first_set(env, &config.default_org_env).or_else(|| non_empty(config.default_org.clone()))
}

/// Parse an absolute `http`/`https` URL with a host.
pub fn parse_origin(raw: &str) -> Result<Url, ResolveError> {
    let invalid = |reason: &str| ResolveError::Invalid {
        value: raw.to_string(),
        reason: reason.to_string(),
    };

    let url = Url::parse(raw.trim()).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host"));
    }
    Ok(url)
}

fn first_set(env: &dyn EnvSource, keys: &[String]) -> Option<String> {
    keys.iter().find_map(|key| non_empty(env.var(key)))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_takes_precedence_in_order() {
        let config = BackendConfig {
            origin: Some("https://static.example.com".into()),
            ..Default::default()
        };
        let env = StaticEnv::new()
            .with("BACKEND_URL", "https://second.example.com")
            .with("VITE_BACKEND_URL", "https://first.example.com");

        let url = resolve_backend_origin(&config, &env).unwrap();
        assert_eq!(url.host_str(), Some("first.example.com"));
    }

    #[test]
    fn falls_back_to_static_origin() {
        let config = BackendConfig {
            origin: Some("https://static.example.com".into()),
            ..Default::default()
        };
        let env = StaticEnv::new().with("VITE_BACKEND_URL", "");

        let url = resolve_backend_origin(&config, &env).unwrap();
        assert_eq!(url.host_str(), Some("static.example.com"));
    }

    #[test]
    fn missing_origin_fails_closed() {
        let err = resolve_backend_origin(&BackendConfig::default(), &StaticEnv::new()).unwrap_err();
        assert_eq!(err, ResolveError::Missing);
    }

    #[test]
    fn rejects_non_http_origins() {
        assert!(matches!(parse_origin("ftp://files.example.com"), Err(ResolveError::Invalid { .. })));
        assert!(matches!(parse_origin("not a url"), Err(ResolveError::Invalid { .. })));
        assert!(parse_origin("http://127.0.0.1:4000").is_ok());
    }

    #[test]
    fn default_org_prefers_env() {
        let config = ScannerConfig {
            default_org: Some("from-config".into()),
            ..Default::default()
        };
        let env = StaticEnv::new().with("VITE_BODYGRAM_ORG_ID", "from-env");
        assert_eq!(resolve_default_org(&config, &env).as_deref(), Some("from-env"));
        assert_eq!(
            resolve_default_org(&config, &StaticEnv::new()).as_deref(),
            Some("from-config")
        );
        assert_eq!(resolve_default_org(&ScannerConfig::default(), &StaticEnv::new()), None);
    }
}
