//! Session identity.
//!
//! A session spans one run of the host application, identified by an id
//! that is persisted in session-scope storage so it survives re-creation
//! of the pipeline within the same storage lifetime.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Length of the random suffix in a session id.
const SUFFIX_LEN: usize = 9;

/// Session ID for grouping analytics events.
///
/// Format: `session_<unix_millis>_<suffix>`
/// Example: `session_1754380800123_k3x9w2abq`
///
/// The millisecond timestamp gives coarse ordering across sessions; the
/// base32 suffix disambiguates sessions created in the same millisecond.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    /// Generate a new session ID.
    pub fn new() -> Self {
        let millis = chrono::Utc::now().timestamp_millis();
        SessionId(format!("session_{}_{}", millis, generate_base32_suffix()))
    }

    /// Parse an existing session ID string.
    ///
    /// Returns `None` for anything that does not match the generated
    /// format, so a cleared or corrupted store triggers regeneration.
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.split('_');
        if parts.next() != Some("session") {
            return None;
        }
        let millis = parts.next()?;
        let suffix = parts.next()?;
        if parts.next().is_some() {
            return None;
        }
        if millis.is_empty() || !millis.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        if suffix.len() != SUFFIX_LEN {
            return None;
        }
        if !suffix.chars().all(|c| matches!(c, 'a'..='z' | '2'..='7')) {
            return None;
        }
        Some(SessionId(s.to_string()))
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn generate_base32_suffix() -> String {
    let uuid = uuid::Uuid::new_v4();
    let bytes = uuid.as_bytes();
    let alphabet = b"abcdefghijklmnopqrstuvwxyz234567";
    let mut out = String::with_capacity(SUFFIX_LEN);
    for b in bytes.iter().take(SUFFIX_LEN) {
        let idx = (b & 0x1F) as usize;
        out.push(alphabet[idx] as char);
    }
    out
}
