//! Test doubles for the delivery boundary.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use pulse_common::{AnalyticsEvent, SessionInit};
use pulse_track::{BeaconSender, Tracker, TrackerConfig, TransportError};
use pulse_track::{FlagStore, MemoryStore, Transport};

/// Transport that records every batch and session announcement.
#[derive(Default)]
pub struct CapturingTransport {
    pub batches: Mutex<Vec<Vec<AnalyticsEvent>>>,
    pub sessions: Mutex<Vec<SessionInit>>,
}

impl CapturingTransport {
    pub fn batches(&self) -> Vec<Vec<AnalyticsEvent>> {
        self.batches.lock().unwrap().clone()
    }

    pub fn sessions(&self) -> Vec<SessionInit> {
        self.sessions.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for CapturingTransport {
    async fn send_events(&self, events: &[AnalyticsEvent]) -> Result<(), TransportError> {
        self.batches.lock().unwrap().push(events.to_vec());
        Ok(())
    }

    async fn send_session(&self, init: &SessionInit) -> Result<(), TransportError> {
        self.sessions.lock().unwrap().push(init.clone());
        Ok(())
    }
}

/// Transport that rejects every delivery, counting the attempts.
#[derive(Default)]
pub struct FailingTransport {
    pub attempts: Mutex<usize>,
}

#[async_trait]
impl Transport for FailingTransport {
    async fn send_events(&self, _events: &[AnalyticsEvent]) -> Result<(), TransportError> {
        *self.attempts.lock().unwrap() += 1;
        Err(TransportError::Status { status: 500 })
    }

    async fn send_session(&self, _init: &SessionInit) -> Result<(), TransportError> {
        Err(TransportError::Status { status: 500 })
    }
}

/// Beacon that records raw payloads instead of sending them.
#[derive(Default)]
pub struct CapturingBeacon {
    pub payloads: Mutex<Vec<Vec<u8>>>,
}

impl CapturingBeacon {
    pub fn payloads(&self) -> Vec<Vec<u8>> {
        self.payloads.lock().unwrap().clone()
    }
}

impl BeaconSender for CapturingBeacon {
    fn try_send(&self, payload: Vec<u8>) -> bool {
        self.payloads.lock().unwrap().push(payload);
        true
    }
}

/// A tracker wired to in-memory stores and the given doubles.
pub fn build_tracker(
    transport: Arc<dyn Transport>,
    beacon: Arc<dyn BeaconSender>,
    flags: Arc<dyn FlagStore>,
) -> Tracker {
    Tracker::builder()
        .config(TrackerConfig::new("http://127.0.0.1:8787"))
        .transport(transport)
        .beacon(beacon)
        .flag_store(flags)
        .session_store(Arc::new(MemoryStore::new()))
        .build()
}

/// Convenience for tests that do not care about the flag store.
pub fn build_default_tracker(
    transport: Arc<dyn Transport>,
    beacon: Arc<dyn BeaconSender>,
) -> Tracker {
    build_tracker(transport, beacon, Arc::new(MemoryStore::new()))
}
