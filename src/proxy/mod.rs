//! Generic backend forwarding.
//!
//! # Data Flow
//! ```text
//! ANY /proxy/{*path}
//!     → handler.rs (resolve origin per request; 500 when absent)
//!     → forwarder.rs (target URL, outbound request, no retries)
//!     → headers.rs (copy, strip hop-by-hop, rewrite host)
//!     → upstream status/headers/body relayed verbatim, or 502
//! ```

pub mod forwarder;
pub mod handler;
pub mod headers;

pub use forwarder::{Forwarder, ForwardError, InboundRequest, UpstreamResponse};
