//! Delivery to the collector.
//!
//! Two separate capabilities:
//!
//! - [`Transport`]: the normal asynchronous path, awaited by the flush
//!   worker.
//! - [`BeaconSender`]: a non-blocking, best-effort handoff used once at
//!   shutdown, when nothing may wait on the network.
//!
//! Errors stop at this boundary. Callers log them and move on; delivery
//! failure never reaches host code.

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use pulse_common::{AnalyticsEvent, EventBatch, SessionInit};

use crate::config::TrackerConfig;

/// Errors from a delivery attempt.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("collector returned status {status}")]
    Status { status: u16 },
}

/// Asynchronous delivery of batches and session announcements.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_events(&self, events: &[AnalyticsEvent]) -> Result<(), TransportError>;
    async fn send_session(&self, init: &SessionInit) -> Result<(), TransportError>;
}

/// JSON-over-HTTP transport to the collector.
pub struct HttpTransport {
    client: reqwest::Client,
    track_url: String,
    session_url: String,
}

impl HttpTransport {
    pub fn new(config: &TrackerConfig) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "failed to build configured http client, using defaults");
                reqwest::Client::new()
            });
        HttpTransport {
            client,
            track_url: config.track_url(),
            session_url: config.session_url(),
        }
    }

    async fn post_json<T: serde::Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
    ) -> Result<(), TransportError> {
        let response = self.client.post(url).json(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send_events(&self, events: &[AnalyticsEvent]) -> Result<(), TransportError> {
        self.post_json(&self.track_url, &EventBatch { events }).await
    }

    async fn send_session(&self, init: &SessionInit) -> Result<(), TransportError> {
        self.post_json(&self.session_url, init).await
    }
}

/// Non-blocking best-effort send for shutdown.
///
/// `try_send` must not await delivery: it either hands the payload off and
/// returns `true`, or returns `false` and the payload is lost. There is no
/// retry and no confirmation.
pub trait BeaconSender: Send + Sync {
    fn try_send(&self, payload: Vec<u8>) -> bool;
}

/// Beacon that spawns a fire-and-forget POST on the current runtime.
///
/// The spawned request is not awaited; if the process exits before it
/// completes, the batch is lost.
pub struct HttpBeacon {
    client: reqwest::Client,
    track_url: String,
}

impl HttpBeacon {
    pub fn new(config: &TrackerConfig) -> Self {
        HttpBeacon {
            client: reqwest::Client::new(),
            track_url: config.track_url(),
        }
    }
}

impl BeaconSender for HttpBeacon {
    fn try_send(&self, payload: Vec<u8>) -> bool {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return false;
        };
        let client = self.client.clone();
        let url = self.track_url.clone();
        handle.spawn(async move {
            let _ = client
                .post(&url)
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(payload)
                .send()
                .await;
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_display() {
        let err = TransportError::Status { status: 503 };
        assert_eq!(err.to_string(), "collector returned status 503");
    }

    #[test]
    fn test_http_beacon_without_runtime_reports_failure() {
        let beacon = HttpBeacon::new(&TrackerConfig::default());
        assert!(!beacon.try_send(b"{\"events\":[]}".to_vec()));
    }

    #[tokio::test]
    async fn test_http_beacon_inside_runtime_hands_off() {
        let beacon = HttpBeacon::new(&TrackerConfig::default());
        // Delivery itself is best-effort; only the handoff is observable.
        assert!(beacon.try_send(b"{\"events\":[]}".to_vec()));
    }
}
