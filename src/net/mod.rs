//! Network layer.
//!
//! Plain TCP listeners are handed straight to axum; TLS termination goes
//! through axum-server with rustls when `listener.tls` is configured.

pub mod tls;
