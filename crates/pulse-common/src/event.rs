//! Event wire model.
//!
//! The collector predates this crate, so field names and property keys
//! match it exactly: camelCase top-level fields, batches wrapped in an
//! `events` envelope.

use serde::{Deserialize, Serialize};

use crate::id::SessionId;
use crate::user::UserKind;

/// Event name for page navigations.
pub const PAGE_VIEW: &str = "page_view";

/// Event name for feature usage.
pub const FEATURE_INTERACTION: &str = "feature_interaction";

/// Event name for a completed waitlist signup.
pub const WAITLIST_SIGNUP_COMPLETED: &str = "waitlist_signup_completed";

/// Event name for a waitlist call-to-action being shown or clicked.
pub const WAITLIST_CTA_TRIGGERED: &str = "waitlist_cta_triggered";

/// Free-form event payload. Insertion order is irrelevant to the collector.
pub type Properties = serde_json::Map<String, serde_json::Value>;

/// A single analytics event.
///
/// Immutable once created: the pipeline only appends, drains, and drops
/// events, never edits them. Identity fields (`demo_mode`, `user_type`,
/// `page`) are snapshots taken at enqueue time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsEvent {
    pub session_id: SessionId,
    pub event_name: String,
    /// RFC 3339, assigned at enqueue time.
    pub timestamp: String,
    pub demo_mode: bool,
    pub user_type: UserKind,
    pub page: String,
    pub properties: Properties,
}

/// Request envelope for `POST /api/analytics/track`.
#[derive(Debug, Serialize)]
pub struct EventBatch<'a> {
    pub events: &'a [AnalyticsEvent],
}

/// Request body for `POST /api/analytics/session`, sent once per session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInit {
    pub session_id: SessionId,
    pub demo_mode: bool,
    pub user_type: UserKind,
    pub landing_page: String,
    pub referrer: String,
    pub timestamp: String,
}
