//! In-memory session store with an explicit lifecycle.
//!
//! ```text
//! start:    hydrate (snapshot file → live sessions, expired entries dropped)
//! login:    token → Session { user, expires_at }
//! read:     expired session is removed and reported as absent
//! logout:   token removed
//! sweep:    expired sessions purged on an interval
//! shutdown: persist (live sessions → snapshot file)
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::config::SessionConfig;

/// Marketplace roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UserRole {
    Customer,
    Tailor,
}

/// The authenticated user as returned by the backend auth endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: UserRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user: User,
    /// Unix seconds.
    pub expires_at: u64,
}

impl Session {
    pub fn is_expired_at(&self, now: u64) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session snapshot {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("session snapshot {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Serialize, Deserialize, Default)]
struct Snapshot {
    sessions: Vec<Session>,
}

/// Sessions keyed by bearer token.
#[derive(Debug)]
pub struct SessionStore {
    sessions: DashMap<String, Session>,
    ttl: Duration,
    snapshot_path: Option<PathBuf>,
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

impl SessionStore {
    pub fn new(ttl: Duration, snapshot_path: Option<PathBuf>) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl,
            snapshot_path,
        }
    }

    /// Build a store from config, loading the snapshot when one exists.
    pub fn hydrate(config: &SessionConfig) -> Result<Self, SessionError> {
        let store = Self::new(
            Duration::from_secs(config.ttl_secs),
            config.snapshot_path.clone(),
        );

        let Some(path) = store.snapshot_path.as_deref() else {
            return Ok(store);
        };
        if !path.exists() {
            return Ok(store);
        }

        let snapshot = read_snapshot(path)?;
        let now = now_secs();
        let mut dropped = 0;
        for session in snapshot.sessions {
            if session.is_expired_at(now) {
                dropped += 1;
                continue;
            }
            store.sessions.insert(session.token.clone(), session);
        }

        tracing::info!(
            path = %path.display(),
            restored = store.sessions.len(),
            dropped,
            "Sessions hydrated"
        );
        Ok(store)
    }

    /// Start (or replace) a session for `token`.
    pub fn login(&self, token: impl Into<String>, user: User) -> Session {
        let token = token.into();
        let session = Session {
            token: token.clone(),
            user,
            expires_at: now_secs().saturating_add(self.ttl.as_secs()),
        };
        tracing::debug!(user_id = %session.user.id, "Session started");
        self.sessions.insert(token, session.clone());
        session
    }

    /// End the session for `token`, returning it if it was live.
    pub fn logout(&self, token: &str) -> Option<Session> {
        self.sessions
            .remove(token)
            .map(|(_, session)| session)
            .filter(|s| !s.is_expired_at(now_secs()))
    }

    /// The live session for `token`. Expired sessions are removed.
    pub fn get(&self, token: &str) -> Option<Session> {
        let now = now_secs();
        let session = self.sessions.get(token).map(|s| s.clone())?;
        if session.is_expired_at(now) {
            self.sessions.remove_if(token, |_, s| s.is_expired_at(now));
            return None;
        }
        Some(session)
    }

    /// Remove every expired session, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = now_secs();
        let before = self.sessions.len();
        self.sessions.retain(|_, s| !s.is_expired_at(now));
        before - self.sessions.len()
    }

    /// Purge expired sessions every `every` until the task is aborted.
    pub fn spawn_sweeper(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        let every = every.max(Duration::from_millis(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let purged = self.purge_expired();
                if purged > 0 {
                    tracing::debug!(purged, remaining = self.len(), "Expired sessions purged");
                }
            }
        })
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Write live sessions to the snapshot file, if one is configured.
    pub fn persist(&self) -> Result<(), SessionError> {
        let Some(path) = self.snapshot_path.as_deref() else {
            return Ok(());
        };

        self.purge_expired();
        let snapshot = Snapshot {
            sessions: self.sessions.iter().map(|e| e.value().clone()).collect(),
        };
        write_snapshot(path, &snapshot)?;

        tracing::info!(path = %path.display(), sessions = snapshot.sessions.len(), "Sessions persisted");
        Ok(())
    }
}

fn read_snapshot(path: &Path) -> Result<Snapshot, SessionError> {
    let raw = fs::read(path).map_err(|source| SessionError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&raw).map_err(|source| SessionError::Corrupt {
        path: path.to_path_buf(),
        source,
    })
}

fn write_snapshot(path: &Path, snapshot: &Snapshot) -> Result<(), SessionError> {
    let io_err = |source| SessionError::Io {
        path: path.to_path_buf(),
        source,
    };
    let raw = serde_json::to_vec_pretty(snapshot).map_err(|source| SessionError::Corrupt {
        path: path.to_path_buf(),
        source,
    })?;

    // Write-then-rename so a crash never leaves a truncated snapshot.
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, raw).map_err(io_err)?;
    fs::rename(&tmp, path).map_err(io_err)
}
