//! Session subsystem.
//!
//! # Data Flow
//! ```text
//! /proxy/auth/login relay (2xx, JSON)
//!     → capture.rs (extract token + user)
//!     → store.rs (login)
//!
//! GET /session, POST /session/logout
//!     → handlers.rs → store.rs (get / logout)
//! ```

pub mod capture;
pub mod handlers;
pub mod store;

pub use store::{Session, SessionError, SessionStore, User, UserRole};
