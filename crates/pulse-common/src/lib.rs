//! Pulse analytics shared types.
//!
//! This crate provides the value types shared across the pipeline:
//! - Session identity (`SessionId`)
//! - Visitor classification (`UserKind`)
//! - The event wire model sent to the collector

pub mod event;
pub mod id;
pub mod user;

pub use event::{AnalyticsEvent, EventBatch, Properties, SessionInit};
pub use id::SessionId;
pub use user::UserKind;
