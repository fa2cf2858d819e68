//! Configuration loading from disk.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::resolver::{EnvSource, ProcessEnv};
use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Overrides `listener.bind_address`.
pub const BIND_ENV: &str = "GATEWAY_BIND";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file, applying process env overrides.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    load_config_with_env(path, &ProcessEnv)
}

/// Load and validate configuration from a TOML file against an explicit environment.
pub fn load_config_with_env(path: &Path, env: &dyn EnvSource) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut config: GatewayConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    apply_env_overrides(&mut config, env);
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Load from `path` when given, otherwise start from defaults.
pub fn load_or_default(path: Option<&Path>, env: &dyn EnvSource) -> Result<GatewayConfig, ConfigError> {
    match path {
        Some(path) => load_config_with_env(path, env),
        None => {
            let mut config = GatewayConfig::default();
            apply_env_overrides(&mut config, env);
            validate_config(&config).map_err(ConfigError::Validation)?;
            Ok(config)
        }
    }
}

/// Apply process-level overrides that take precedence over the file.
pub fn apply_env_overrides(config: &mut GatewayConfig, env: &dyn EnvSource) {
    if let Some(bind) = env.var(BIND_ENV).filter(|v| !v.is_empty()) {
        config.listener.bind_address = bind;
    }
}
