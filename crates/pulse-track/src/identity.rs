//! Session identity and visitor classification.
//!
//! One `SessionIdentity` exists per tracker. The session id is read from
//! (or created in) session-scope storage once; the classification snapshot
//! is recomputed on flag-store change notifications, never polled.

use std::sync::{Arc, RwLock};

use tokio::sync::watch;
use tracing::warn;

use pulse_common::{SessionId, UserKind};

use crate::store::{
    guarded_get, FlagStore, AUTH_TOKEN_KEY, DEMO_MODE_KEY, SESSION_ID_KEY, WAITLIST_EMAIL_KEY,
};

/// Point-in-time classification of the visitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserSnapshot {
    pub kind: UserKind,
    pub demo_mode: bool,
}

/// Stable session id plus a cached classification snapshot.
pub struct SessionIdentity {
    session_id: SessionId,
    flags: Arc<dyn FlagStore>,
    snapshot: RwLock<UserSnapshot>,
}

impl SessionIdentity {
    /// Resolve the session id and take the initial classification snapshot.
    pub fn bootstrap(session_store: &dyn FlagStore, flags: Arc<dyn FlagStore>) -> Self {
        let session_id = get_or_create_session_id(session_store);
        let snapshot = RwLock::new(read_snapshot(flags.as_ref()));
        SessionIdentity {
            session_id,
            flags,
            snapshot,
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// The cached classification snapshot.
    pub fn snapshot(&self) -> UserSnapshot {
        *self
            .snapshot
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Recompute the classification from the flag store.
    pub fn refresh(&self) {
        let fresh = read_snapshot(self.flags.as_ref());
        *self
            .snapshot
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = fresh;
    }

    /// Change feed of the underlying flag store.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.flags.subscribe()
    }
}

/// Read the persisted session id, creating and persisting one if absent.
///
/// Idempotent within one store lifetime. If the store cannot be read or
/// written, the returned id is ephemeral and the session simply will not
/// survive a pipeline restart.
fn get_or_create_session_id(store: &dyn FlagStore) -> SessionId {
    match store.get(SESSION_ID_KEY) {
        Ok(Some(raw)) => {
            if let Some(id) = SessionId::parse(&raw) {
                return id;
            }
            warn!(value = %raw, "stored session id is malformed, regenerating");
        }
        Ok(None) => {}
        Err(e) => {
            warn!(error = %e, "session store unreadable, using ephemeral session id");
        }
    }

    let id = SessionId::new();
    if let Err(e) = store.set(SESSION_ID_KEY, id.as_str()) {
        warn!(error = %e, "failed to persist session id, continuing with ephemeral id");
    }
    id
}

fn read_snapshot(flags: &dyn FlagStore) -> UserSnapshot {
    // An empty string does not count as a set flag.
    let authenticated = guarded_get(flags, AUTH_TOKEN_KEY).is_some_and(|v| !v.is_empty());
    let waitlisted = guarded_get(flags, WAITLIST_EMAIL_KEY).is_some_and(|v| !v.is_empty());
    let demo_mode = guarded_get(flags, DEMO_MODE_KEY).as_deref() == Some("true");

    UserSnapshot {
        kind: UserKind::classify(authenticated, waitlisted, demo_mode),
        demo_mode,
    }
}
