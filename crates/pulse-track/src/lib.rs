//! Pulse client analytics pipeline.
//!
//! This crate provides:
//! - A persisted flag store with change notifications
//! - Session identity and visitor classification
//! - An in-memory event queue with a periodic flush worker
//! - HTTP delivery plus a best-effort beacon for shutdown
//! - The `Tracker` facade that host code instruments against
//!
//! Tracking calls never block on the network, and delivery failures never
//! surface to host code.

pub mod config;
pub mod identity;
pub mod queue;
pub mod store;
pub mod tracker;
pub mod transport;

mod worker;

pub use config::TrackerConfig;
pub use identity::{SessionIdentity, UserSnapshot};
pub use queue::EventQueue;
pub use store::{default_data_dir, FlagStore, JsonFileStore, MemoryStore, StoreError};
pub use tracker::{Tracker, TrackerBuilder};
pub use transport::{BeaconSender, HttpBeacon, HttpTransport, Transport, TransportError};

/// Default flush interval in seconds.
pub const DEFAULT_FLUSH_INTERVAL_SECS: u64 = 5;

/// Default cap on queued events before the oldest are dropped.
pub const DEFAULT_MAX_QUEUE_EVENTS: usize = 10_000;
