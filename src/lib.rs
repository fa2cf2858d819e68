//! Edge gateway for the tailor marketplace front-end.
//!
//! Relays `/proxy/*` to the configured backend origin and serves an
//! embeddable copy of the body-scanner page.

pub mod admin;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod proxy;
pub mod scanner;
pub mod session;

pub use config::schema::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
