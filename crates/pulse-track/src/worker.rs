//! Background flush worker.
//!
//! One task per tracker. It owns the flush cadence, reacts to flag-store
//! changes, and performs the last-chance beacon send on shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use pulse_common::EventBatch;

use crate::identity::SessionIdentity;
use crate::queue::EventQueue;
use crate::transport::{BeaconSender, Transport};

pub(crate) struct FlushWorker {
    pub queue: Arc<EventQueue>,
    pub transport: Arc<dyn Transport>,
    pub beacon: Arc<dyn BeaconSender>,
    pub identity: Arc<SessionIdentity>,
    pub flush_interval: Duration,
}

impl FlushWorker {
    /// Run until shutdown is signaled.
    ///
    /// `changes` is the flag-store change feed, subscribed before the
    /// worker is spawned so no mutation slips between tracker construction
    /// and the first poll.
    pub async fn run(&self, shutdown: CancellationToken, mut changes: watch::Receiver<u64>) {
        let mut ticker = tokio::time::interval(self.flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; consume it so flushes only
        // happen a full interval after start.
        ticker.tick().await;

        let mut watching = true;

        info!(
            interval_secs = self.flush_interval.as_secs_f64(),
            "flush worker started"
        );

        loop {
            tokio::select! {
                // Cancellation outranks a tick that lands at the same
                // instant; nothing may flush after the beacon.
                biased;

                _ = shutdown.cancelled() => {
                    self.drain_to_beacon();
                    info!("flush worker shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    self.flush().await;
                }
                res = changes.changed(), if watching => match res {
                    Ok(()) => self.identity.refresh(),
                    Err(_) => watching = false,
                },
            }
        }
    }

    /// Drain the queue and submit the batch.
    ///
    /// The queue is cleared before the send: a failed batch is logged and
    /// lost, never re-queued (at-most-once delivery).
    async fn flush(&self) {
        let batch = self.queue.drain();
        if batch.is_empty() {
            return;
        }

        debug!(events = batch.len(), "flushing event batch");
        if let Err(e) = self.transport.send_events(&batch).await {
            warn!(error = %e, lost = batch.len(), "event batch delivery failed");
        }
    }

    /// Hand any remaining events to the beacon, exactly once, at shutdown.
    fn drain_to_beacon(&self) {
        let batch = self.queue.drain();
        if batch.is_empty() {
            return;
        }

        match serde_json::to_vec(&EventBatch { events: &batch }) {
            Ok(payload) => {
                if self.beacon.try_send(payload) {
                    debug!(events = batch.len(), "final batch handed to beacon");
                } else {
                    warn!(lost = batch.len(), "beacon unavailable, final batch dropped");
                }
            }
            Err(e) => {
                warn!(error = %e, lost = batch.len(), "failed to encode final batch");
            }
        }
    }
}
