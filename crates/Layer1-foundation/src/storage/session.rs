//! Session Store - 세션 범위 문자열 key/value 저장소
//!
//! The durable tier of the TTL cache. Survives process restarts within one
//! session (same session id), but never across sessions.

use super::JsonStore;
use crate::{Error, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Session-scoped string store
///
/// Implementations may fail at any time (quota, missing backing storage).
/// Callers treat a failed `get` as a miss and a failed `set` as best-effort.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Wait until every accepted `set` is durable
    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// MemorySessionStore
// ============================================================================

/// In-memory session store with an optional byte quota
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    entries: Mutex<HashMap<String, String>>,
    quota_bytes: Option<usize>,
    disabled: bool,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject writes once stored keys + values exceed `bytes`
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            quota_bytes: Some(bytes),
            ..Self::default()
        }
    }

    /// A store whose every operation fails (storage unavailable)
    pub fn unavailable() -> Self {
        Self {
            disabled: true,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn used_bytes(entries: &HashMap<String, String>) -> usize {
        entries.iter().map(|(k, v)| k.len() + v.len()).sum()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        if self.disabled {
            return Err(Error::Storage("session storage unavailable".to_string()));
        }
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        if self.disabled {
            return Err(Error::Storage("session storage unavailable".to_string()));
        }

        let mut entries = self.entries.lock();
        if let Some(quota) = self.quota_bytes {
            let previous = entries.get(key).map(|v| key.len() + v.len()).unwrap_or(0);
            let projected = Self::used_bytes(&entries) - previous + key.len() + value.len();
            if projected > quota {
                return Err(Error::Storage(format!(
                    "quota exceeded: {} > {} bytes",
                    projected, quota
                )));
            }
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// ============================================================================
// JsonSessionStore
// ============================================================================

/// File-backed session store: one JSON map per session id
///
/// `set` updates the map immediately. Inside a tokio runtime the file is
/// rewritten on the blocking pool; writes are versioned so an older snapshot
/// never overwrites a newer one.
pub struct JsonSessionStore {
    file: Arc<SessionFile>,
    entries: Mutex<Versioned>,
}

struct Versioned {
    map: HashMap<String, String>,
    version: u64,
}

struct SessionFile {
    store: JsonStore,
    filename: String,
    /// Last version on disk; held for the whole write
    written: Mutex<u64>,
}

impl SessionFile {
    fn persist(&self, version: u64, map: &HashMap<String, String>) -> Result<()> {
        let mut written = self.written.lock();
        if version <= *written {
            return Ok(());
        }
        self.store.save(&self.filename, map)?;
        *written = version;
        Ok(())
    }
}

impl JsonSessionStore {
    /// Open (or create) the session file under the user cache directory
    pub fn open(session_id: &str) -> Result<Self> {
        Self::open_in(JsonStore::sessions()?, session_id)
    }

    /// Open the session file inside an explicit store
    pub fn open_in(store: JsonStore, session_id: &str) -> Result<Self> {
        if session_id.is_empty()
            || !session_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(Error::InvalidInput(format!(
                "invalid session id: {:?}",
                session_id
            )));
        }

        let filename = format!("{}.json", session_id);
        let entries = match store.load_optional::<HashMap<String, String>>(&filename) {
            Ok(Some(entries)) => entries,
            Ok(None) => HashMap::new(),
            Err(e) => {
                // Corrupt session file: start over rather than fail
                debug!("Discarding unreadable session file {}: {}", filename, e);
                HashMap::new()
            }
        };

        Ok(Self {
            file: Arc::new(SessionFile {
                store,
                filename,
                written: Mutex::new(0),
            }),
            entries: Mutex::new(Versioned {
                map: entries,
                version: 0,
            }),
        })
    }
}

impl SessionStore for JsonSessionStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().map.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let (version, snapshot) = {
            let mut entries = self.entries.lock();
            entries.map.insert(key.to_string(), value.to_string());
            entries.version += 1;
            (entries.version, entries.map.clone())
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let file = Arc::clone(&self.file);
                handle.spawn_blocking(move || {
                    if let Err(e) = file.persist(version, &snapshot) {
                        debug!("Session write {} failed: {}", file.filename, e);
                    }
                });
                Ok(())
            }
            Err(_) => self.file.persist(version, &snapshot),
        }
    }

    fn flush(&self) -> Result<()> {
        let (version, snapshot) = {
            let entries = self.entries.lock();
            (entries.version, entries.map.clone())
        };
        self.file.persist(version, &snapshot)
    }
}
