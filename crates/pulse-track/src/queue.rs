//! In-memory event queue.
//!
//! FIFO buffer between tracking calls and the flush worker. Appends are
//! synchronous and never block on I/O; the worker drains the whole queue
//! in one atomic snapshot.

use std::collections::VecDeque;
use std::sync::Mutex;

use tracing::warn;

use pulse_common::AnalyticsEvent;

/// Bounded FIFO buffer of pending events.
///
/// When the cap is reached the oldest event is dropped; the tracking call
/// still returns immediately.
pub struct EventQueue {
    events: Mutex<VecDeque<AnalyticsEvent>>,
    max_events: usize,
}

impl EventQueue {
    pub fn new(max_events: usize) -> Self {
        EventQueue {
            events: Mutex::new(VecDeque::new()),
            max_events,
        }
    }

    /// Append an event, dropping the oldest one if the queue is full.
    pub fn push(&self, event: AnalyticsEvent) {
        let mut events = self.lock();
        if events.len() >= self.max_events {
            events.pop_front();
            warn!(
                capacity = self.max_events,
                "event queue full, dropping oldest event"
            );
        }
        events.push_back(event);
    }

    /// Take all queued events, leaving the queue empty.
    ///
    /// Snapshot and clear happen under one lock; events enqueued after the
    /// drain land in the next batch.
    pub fn drain(&self) -> Vec<AnalyticsEvent> {
        self.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<AnalyticsEvent>> {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
