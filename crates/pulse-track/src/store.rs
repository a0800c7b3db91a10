//! Persisted flag storage.
//!
//! The pipeline reads a handful of string flags (auth token, waitlist
//! email, demo-mode toggle, session id) from key-value storage owned by
//! the host application. Two scopes exist:
//!
//! - session scope (`MemoryStore`): lives as long as the process
//! - durable scope (`JsonFileStore`): a JSON map on disk, shared with the
//!   rest of the application
//!
//! Mutations bump a revision watch channel so the pipeline can recompute
//! visitor classification without polling.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;
use tokio::sync::watch;
use tracing::warn;

/// Key holding the persisted session id (session scope).
pub const SESSION_ID_KEY: &str = "analytics_session_id";

/// Key holding the waitlist email, or the sentinel `"true"` (durable scope).
pub const WAITLIST_EMAIL_KEY: &str = "waitlist_email";

/// Key holding the auth token (durable scope).
pub const AUTH_TOKEN_KEY: &str = "auth_token";

/// Key holding the demo-mode toggle as the string `"true"` (durable scope).
pub const DEMO_MODE_KEY: &str = "demo_mode";

/// Errors from flag storage operations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("flag file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Key-value storage for persisted flags.
///
/// `subscribe` returns a revision counter that is bumped after every
/// successful `set`/`remove`, whichever store handle performed it.
pub trait FlagStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
    fn subscribe(&self) -> watch::Receiver<u64>;
}

/// Read a flag, treating storage failures as "absent".
///
/// Storage trouble must never escalate past the pipeline; the failed read
/// is logged and the flag reported unset.
pub(crate) fn guarded_get(store: &dyn FlagStore, key: &str) -> Option<String> {
    match store.get(key) {
        Ok(value) => value,
        Err(e) => {
            warn!(key, error = %e, "flag read failed, treating as absent");
            None
        }
    }
}

/// In-process flag store, session scope.
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    revision: watch::Sender<u64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        MemoryStore {
            entries: Mutex::new(HashMap::new()),
            revision,
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FlagStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = lock_entries(&self.entries);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        lock_entries(&self.entries).insert(key.to_string(), value.to_string());
        self.revision.send_modified(|r| *r += 1);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        lock_entries(&self.entries).remove(key);
        self.revision.send_modified(|r| *r += 1);
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }
}

fn lock_entries(
    entries: &Mutex<HashMap<String, String>>,
) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
    entries
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Durable flag store backed by a JSON file.
///
/// The whole map is rewritten through a temp file and an atomic rename on
/// every mutation, so a crash mid-write leaves the previous map intact.
pub struct JsonFileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process;
    // cross-process writers are not coordinated.
    write_lock: Mutex<()>,
    revision: watch::Sender<u64>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let (revision, _) = watch::channel(0);
        JsonFileStore {
            path: path.into(),
            write_lock: Mutex::new(()),
            revision,
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<HashMap<String, String>, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_map(&self, map: &HashMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(map)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl FlagStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.read_map()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        // A corrupt file would otherwise wedge every future set; start over
        // from an empty map and log what was lost.
        let mut map = match self.read_map() {
            Ok(map) => map,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "flag file unreadable, rewriting");
                HashMap::new()
            }
        };
        map.insert(key.to_string(), value.to_string());
        self.write_map(&map)?;
        self.revision.send_modified(|r| *r += 1);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut map = self.read_map()?;
        if map.remove(key).is_some() {
            self.write_map(&map)?;
        }
        self.revision.send_modified(|r| *r += 1);
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }
}

/// Default directory for durable analytics state.
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pulse")
        .join("analytics")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert_eq!(store.get(AUTH_TOKEN_KEY).unwrap(), None);
        store.set(AUTH_TOKEN_KEY, "tok-123").unwrap();
        assert_eq!(
            store.get(AUTH_TOKEN_KEY).unwrap(),
            Some("tok-123".to_string())
        );
        store.remove(AUTH_TOKEN_KEY).unwrap();
        assert_eq!(store.get(AUTH_TOKEN_KEY).unwrap(), None);
    }

    #[test]
    fn test_memory_store_bumps_revision() {
        let store = MemoryStore::new();
        let rx = store.subscribe();
        assert_eq!(*rx.borrow(), 0);
        store.set(DEMO_MODE_KEY, "true").unwrap();
        assert_eq!(*rx.borrow(), 1);
        store.remove(DEMO_MODE_KEY).unwrap();
        assert_eq!(*rx.borrow(), 2);
    }

    #[test]
    fn test_json_file_store_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("flags.json"));
        assert_eq!(store.get(WAITLIST_EMAIL_KEY).unwrap(), None);
        store.set(WAITLIST_EMAIL_KEY, "a@b.com").unwrap();
        store.set(DEMO_MODE_KEY, "true").unwrap();
        assert_eq!(
            store.get(WAITLIST_EMAIL_KEY).unwrap(),
            Some("a@b.com".to_string())
        );

        // A second handle over the same path sees the persisted flags.
        let reopened = JsonFileStore::new(dir.path().join("flags.json"));
        assert_eq!(
            reopened.get(DEMO_MODE_KEY).unwrap(),
            Some("true".to_string())
        );
    }

    #[test]
    fn test_json_file_store_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested").join("flags.json"));
        store.set(AUTH_TOKEN_KEY, "tok").unwrap();
        assert_eq!(store.get(AUTH_TOKEN_KEY).unwrap(), Some("tok".to_string()));
    }

    #[test]
    fn test_json_file_store_corrupt_file_errors_on_get() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("flags.json");
        fs::write(&path, "not json").unwrap();
        let store = JsonFileStore::new(&path);
        assert!(store.get(AUTH_TOKEN_KEY).is_err());
        // guarded_get downgrades that to "absent"
        assert_eq!(guarded_get(&store, AUTH_TOKEN_KEY), None);
    }

    #[test]
    fn test_json_file_store_set_recovers_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("flags.json");
        fs::write(&path, "not json").unwrap();
        let store = JsonFileStore::new(&path);
        store.set(DEMO_MODE_KEY, "true").unwrap();
        assert_eq!(
            store.get(DEMO_MODE_KEY).unwrap(),
            Some("true".to_string())
        );
    }

    #[test]
    fn test_default_data_dir_shape() {
        let dir = default_data_dir();
        assert!(dir.to_string_lossy().contains("pulse"));
        assert!(dir.to_string_lossy().contains("analytics"));
    }
}
