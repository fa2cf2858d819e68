//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse, env overrides)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared via Arc<ArcSwap<_>> to all handlers
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → atomic swap of the snapshot
//!
//! Per request:
//!     resolver.rs reads backend origin / default org from the environment
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Backend origin is resolved per request and fails closed

pub mod loader;
pub mod resolver;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use resolver::{EnvSource, ProcessEnv, ResolveError, StaticEnv};
pub use schema::{
    AdminConfig, BackendConfig, GatewayConfig, ListenerConfig, ObservabilityConfig, ScannerConfig,
    SessionConfig, TlsConfig,
};
