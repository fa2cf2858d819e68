//! Scanner completion signalling.
//!
//! The embedded scan page reports progress with `postMessage` payloads of the
//! shape `{"type": <n>, "payload": ...}`. They are decoded into [`ScanEvent`]
//! only after the sender origin is checked, then delivered to the subscribers
//! of that scan's token. Subscribers of other tokens never see them.
//!
//! # Tags
//! - `2`: scan complete, `payload` carries the measurements
//! - `0`: scanner closed by the user
//! - anything else: ignored

use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::broadcast;

const TAG_SCANNER_CLOSED: i64 = 0;
const TAG_SCAN_COMPLETE: i64 = 2;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScanEvent {
    ScanComplete { payload: Value },
    ScannerClosed,
}

impl ScanEvent {
    /// SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            ScanEvent::ScanComplete { .. } => "scan_complete",
            ScanEvent::ScannerClosed => "scanner_closed",
        }
    }
}

#[derive(Debug, Error)]
pub enum ScanMessageError {
    #[error("message origin {0:?} is not allowed")]
    UntrustedOrigin(String),

    #[error("malformed scan message: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Deserialize)]
struct RawMessage {
    #[serde(rename = "type")]
    tag: Option<i64>,
    #[serde(default)]
    payload: Value,
}

fn normalize_origin(origin: &str) -> String {
    origin.trim().trim_end_matches('/').to_ascii_lowercase()
}

/// Check `origin` against `allowed`, then decode `body`.
///
/// `Ok(None)` means a well-formed message with a tag nobody acts on.
pub fn decode_message(
    origin: Option<&str>,
    allowed: &[String],
    body: &[u8],
) -> Result<Option<ScanEvent>, ScanMessageError> {
    let origin = origin.unwrap_or_default();
    let normalized = normalize_origin(origin);
    if normalized.is_empty() || !allowed.iter().any(|a| normalize_origin(a) == normalized) {
        return Err(ScanMessageError::UntrustedOrigin(origin.to_string()));
    }

    let raw: RawMessage = serde_json::from_slice(body)?;
    Ok(match raw.tag {
        Some(TAG_SCAN_COMPLETE) => Some(ScanEvent::ScanComplete { payload: raw.payload }),
        Some(TAG_SCANNER_CLOSED) => Some(ScanEvent::ScannerClosed),
        _ => None,
    })
}

/// Scan events, one broadcast channel per scan token.
///
/// A channel exists only while it has subscribers. Clones share the hub.
#[derive(Debug, Clone)]
pub struct ScanEventHub {
    inner: Arc<HubInner>,
}

#[derive(Debug)]
struct HubInner {
    channels: DashMap<String, broadcast::Sender<ScanEvent>>,
    capacity: usize,
}

impl ScanEventHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(HubInner {
                channels: DashMap::new(),
                capacity: capacity.max(1),
            }),
        }
    }

    /// Deliver `event` to the subscribers of `token`, returning how many received it.
    pub fn publish(&self, token: &str, event: ScanEvent) -> usize {
        self.inner
            .channels
            .get(token)
            .map(|tx| tx.send(event).unwrap_or(0))
            .unwrap_or(0)
    }

    /// Subscribe to the events of `token`. Dropping the subscription unsubscribes.
    pub fn subscribe(&self, token: &str) -> ScanSubscription {
        let rx = self
            .inner
            .channels
            .entry(token.to_string())
            .or_insert_with(|| broadcast::channel(self.inner.capacity).0)
            .subscribe();
        ScanSubscription {
            rx,
            token: token.to_string(),
            hub: self.inner.clone(),
        }
    }

    /// Subscribers across every token.
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .channels
            .iter()
            .map(|entry| entry.value().receiver_count())
            .sum()
    }

    /// Tokens with at least one subscriber.
    pub fn active_scans(&self) -> usize {
        self.inner.channels.len()
    }
}

/// A live subscription to one token of a [`ScanEventHub`].
#[derive(Debug)]
pub struct ScanSubscription {
    rx: broadcast::Receiver<ScanEvent>,
    token: String,
    hub: Arc<HubInner>,
}

impl ScanSubscription {
    /// The next event, or `None` once the channel is gone.
    ///
    /// A subscriber that falls behind skips the events it missed.
    pub async fn next(&mut self) -> Option<ScanEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Scan event subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for ScanSubscription {
    fn drop(&mut self) {
        // Our receiver is still alive here, so one remaining means it was the last.
        self.hub
            .channels
            .remove_if(&self.token, |_, tx| tx.receiver_count() <= 1);
    }
}
