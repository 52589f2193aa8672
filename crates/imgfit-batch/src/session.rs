//! Session bookkeeping for batch results.
//!
//! A session is one processed batch held in memory until the client
//! downloads it or it expires. Two boundaries matter here:
//!
//! - [`SessionId`] is an opaque token constructed only by the server; the
//!   strict parse is what keeps untrusted identifiers out of lookups (the
//!   classic path-traversal shape never survives it).
//! - [`SessionStore`] is an explicit store behind an interface with TTL
//!   eviction, not a process-wide mutable global.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::batch::BatchReport;

/// Session-level errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    /// The supplied identifier is not a canonical v4 UUID.
    #[error("Invalid session id")]
    InvalidId,

    /// No live session under that identifier.
    #[error("Session not found or expired")]
    NotFound,
}

/// An opaque session token.
///
/// Only [`SessionId::new`] mints identifiers; [`SessionId::parse`] accepts
/// nothing but the canonical lowercase hyphenated form of a version-4
/// RFC 4122 UUID, so a client-supplied string is either exactly a token
/// this server could have produced or it is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Mint a fresh session identifier.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse and validate an untrusted identifier string.
    pub fn parse(input: &str) -> Result<Self, SessionError> {
        let uuid = Uuid::try_parse(input).map_err(|_| SessionError::InvalidId)?;

        if uuid.get_version_num() != 4 {
            return Err(SessionError::InvalidId);
        }
        if !matches!(uuid.get_variant(), uuid::Variant::RFC4122) {
            return Err(SessionError::InvalidId);
        }
        // Only the canonical lowercase hyphenated spelling is accepted;
        // braced, URN, simple, and uppercase forms are not tokens we mint.
        if uuid.to_string() != input {
            return Err(SessionError::InvalidId);
        }

        Ok(Self(uuid))
    }

    /// First eight characters, used in log lines and archive names.
    pub fn short(&self) -> String {
        self.0.to_string().chars().take(8).collect()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SessionId {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[derive(Debug)]
struct SessionEntry {
    report: Arc<BatchReport>,
    created: Instant,
}

/// In-memory session store with explicit TTL eviction.
///
/// All access goes through `&self`; the store is safe to share across
/// worker threads.
#[derive(Debug)]
pub struct SessionStore {
    ttl: Duration,
    entries: Mutex<HashMap<SessionId, SessionEntry>>,
}

impl SessionStore {
    /// Default session lifetime.
    pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_default_ttl() -> Self {
        Self::new(Self::DEFAULT_TTL)
    }

    /// Store a report under a freshly minted identifier.
    ///
    /// Expired entries are evicted on the way in, so the store cannot grow
    /// without bound between downloads.
    pub fn insert(&self, report: BatchReport) -> SessionId {
        self.evict_expired();

        let id = SessionId::new();
        let entry = SessionEntry {
            report: Arc::new(report),
            created: Instant::now(),
        };
        self.lock().insert(id, entry);

        info!(session = %id.short(), "session stored");
        id
    }

    /// Look up a live session's report.
    pub fn get(&self, id: &SessionId) -> Result<Arc<BatchReport>, SessionError> {
        let entries = self.lock();
        match entries.get(id) {
            Some(entry) if entry.created.elapsed() <= self.ttl => Ok(Arc::clone(&entry.report)),
            _ => Err(SessionError::NotFound),
        }
    }

    /// Drop a session eagerly (client-requested cleanup).
    pub fn remove(&self, id: &SessionId) -> Result<(), SessionError> {
        match self.lock().remove(id) {
            Some(_) => {
                info!(session = %id.short(), "session removed");
                Ok(())
            }
            None => Err(SessionError::NotFound),
        }
    }

    /// Evict every entry older than the TTL; returns how many were dropped.
    pub fn evict_expired(&self) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.created.elapsed() <= self.ttl);
        let evicted = before - entries.len();

        if evicted > 0 {
            debug!(evicted, "evicted expired sessions");
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<SessionId, SessionEntry>> {
        self.entries.lock().expect("session store lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn empty_report() -> BatchReport {
        BatchReport {
            target_kb: 200.0,
            processed_count: 0,
            outcomes: Vec::new(),
        }
    }

    #[test]
    fn test_session_id_roundtrip() {
        let id = SessionId::new();
        let parsed = SessionId::parse(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_session_id_rejects_traversal_shapes() {
        for input in [
            "../../etc/passwd",
            "..",
            "",
            "not-a-uuid",
            "00000000-0000-0000-0000-000000000000",
        ] {
            assert_eq!(SessionId::parse(input), Err(SessionError::InvalidId), "{input}");
        }
    }

    #[test]
    fn test_session_id_rejects_non_canonical_spellings() {
        let id = SessionId::new().to_string();

        let uppercase = id.to_uppercase();
        let braced = format!("{{{id}}}");
        let simple = id.replace('-', "");
        let urn = format!("urn:uuid:{id}");

        for input in [uppercase, braced, simple, urn] {
            assert_eq!(SessionId::parse(&input), Err(SessionError::InvalidId), "{input}");
        }
    }

    #[test]
    fn test_session_id_rejects_wrong_version() {
        // A valid RFC 4122 UUID, but version 1
        let v1 = "f81d4fae-7dec-11d0-a765-00a0c91e6bf6";
        assert_eq!(SessionId::parse(v1), Err(SessionError::InvalidId));
    }

    #[test]
    fn test_session_id_short() {
        let id = SessionId::new();
        let short = id.short();
        assert_eq!(short.len(), 8);
        assert!(id.to_string().starts_with(&short));
    }

    #[test]
    fn test_store_insert_get_remove() {
        let store = SessionStore::with_default_ttl();
        let id = store.insert(empty_report());

        let report = store.get(&id).unwrap();
        assert_eq!(report.target_kb, 200.0);
        assert_eq!(store.len(), 1);

        store.remove(&id).unwrap();
        assert!(store.is_empty());
        assert!(matches!(store.get(&id), Err(SessionError::NotFound)));
    }

    #[test]
    fn test_store_remove_missing() {
        let store = SessionStore::with_default_ttl();
        assert_eq!(store.remove(&SessionId::new()), Err(SessionError::NotFound));
    }

    #[test]
    fn test_store_ttl_expiry() {
        let store = SessionStore::new(Duration::from_millis(5));
        let id = store.insert(empty_report());

        thread::sleep(Duration::from_millis(20));

        // Expired entries fail lookups even before a sweep runs
        assert!(matches!(store.get(&id), Err(SessionError::NotFound)));
        assert_eq!(store.evict_expired(), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_insert_sweeps_expired_entries() {
        let store = SessionStore::new(Duration::from_millis(5));
        store.insert(empty_report());
        thread::sleep(Duration::from_millis(20));

        let live = store.insert(empty_report());

        assert_eq!(store.len(), 1);
        assert!(store.get(&live).is_ok());
    }

    #[test]
    fn test_session_id_serializes_as_string() {
        let id = SessionId::new();
        let json = serde_json::to_value(id).unwrap();
        assert_eq!(json, serde_json::Value::String(id.to_string()));
    }
}
