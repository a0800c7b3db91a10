//! Visitor classification.
//!
//! The pipeline tags every event with a snapshot of who the visitor is,
//! derived from three persisted flags: an auth token, a waitlist email,
//! and a demo-mode toggle.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification of the current visitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserKind {
    /// Sandboxed demo experience, no live data.
    Demo,

    /// Left an email on the waitlist but has no account.
    Waitlisted,

    /// Holds a valid auth token.
    Authenticated,

    /// None of the above.
    Anonymous,
}

impl UserKind {
    /// Classify from the three persisted flags.
    ///
    /// First match wins, in the order authenticated > waitlisted > demo >
    /// anonymous. The order is a deliberate tie-break: an authenticated
    /// visitor who once joined the waitlist is still authenticated.
    pub fn classify(authenticated: bool, waitlisted: bool, demo: bool) -> Self {
        if authenticated {
            UserKind::Authenticated
        } else if waitlisted {
            UserKind::Waitlisted
        } else if demo {
            UserKind::Demo
        } else {
            UserKind::Anonymous
        }
    }
}

impl fmt::Display for UserKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserKind::Demo => write!(f, "demo"),
            UserKind::Waitlisted => write!(f, "waitlisted"),
            UserKind::Authenticated => write!(f, "authenticated"),
            UserKind::Anonymous => write!(f, "anonymous"),
        }
    }
}
