//! The tracking facade.
//!
//! `Tracker` is what host code holds: five tracking methods that enqueue
//! synchronously, read-only identity accessors, and lifecycle control for
//! the background flush worker. No tracking call performs network I/O.

use std::sync::{Arc, RwLock};
use std::time::Instant;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use pulse_common::{
    event, AnalyticsEvent, Properties, SessionId, SessionInit, UserKind,
};

use crate::config::TrackerConfig;
use crate::identity::SessionIdentity;
use crate::queue::EventQueue;
use crate::store::{FlagStore, JsonFileStore, MemoryStore, WAITLIST_EMAIL_KEY};
use crate::transport::{BeaconSender, HttpBeacon, HttpTransport, Transport};
use crate::worker::FlushWorker;

/// Client analytics tracker.
///
/// Construct with [`Tracker::builder`], call [`start`](Tracker::start)
/// inside a tokio runtime, and [`shutdown`](Tracker::shutdown) on
/// teardown so queued events get their last-chance beacon send.
pub struct Tracker {
    config: TrackerConfig,
    identity: Arc<SessionIdentity>,
    queue: Arc<EventQueue>,
    flags: Arc<dyn FlagStore>,
    transport: Arc<dyn Transport>,
    beacon: Arc<dyn BeaconSender>,
    current_page: RwLock<String>,
    started_at: Instant,
    shutdown: CancellationToken,
    worker_handle: Option<JoinHandle<()>>,
    // Subscribed at build time so flag mutations made before start() still
    // wake the worker.
    changes: Option<watch::Receiver<u64>>,
}

impl Tracker {
    pub fn builder() -> TrackerBuilder {
        TrackerBuilder::new()
    }

    /// Start the flush worker and announce the session to the collector.
    ///
    /// Idempotent; the second and later calls do nothing.
    pub fn start(&mut self) {
        if self.worker_handle.is_some() {
            return;
        }

        let worker = FlushWorker {
            queue: Arc::clone(&self.queue),
            transport: Arc::clone(&self.transport),
            beacon: Arc::clone(&self.beacon),
            identity: Arc::clone(&self.identity),
            flush_interval: self.config.flush_interval,
        };
        let shutdown = self.shutdown.clone();
        let changes = self
            .changes
            .take()
            .unwrap_or_else(|| self.identity.subscribe());
        self.worker_handle = Some(tokio::spawn(async move {
            worker.run(shutdown, changes).await;
        }));

        // One-shot session announcement, off the caller's path.
        let transport = Arc::clone(&self.transport);
        let init = self.session_init();
        tokio::spawn(async move {
            if let Err(e) = transport.send_session(&init).await {
                warn!(error = %e, "session announcement failed");
            }
        });

        info!(session_id = %self.identity.session_id(), "analytics tracker started");
    }

    /// Stop the flush worker.
    ///
    /// Remaining events are handed to the beacon; in-flight sends are not
    /// cancelled. No flush fires after this returns.
    pub async fn shutdown(&mut self) {
        self.shutdown.cancel();
        if let Some(handle) = self.worker_handle.take() {
            let _ = handle.await;
        }
    }

    /// Record a generic event at the current page.
    pub fn track_event(&self, name: &str, properties: Option<Properties>) {
        let event = self.make_event(name, None, properties.unwrap_or_default());
        self.enqueue(event);
    }

    /// Record a page navigation and update the current page.
    pub fn track_page_view(&self, page: &str, referrer: Option<&str>) {
        *self
            .current_page
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = page.to_string();

        let mut properties = Properties::new();
        let referrer = referrer
            .map(str::to_string)
            .or_else(|| self.config.referrer.clone())
            .unwrap_or_default();
        properties.insert("referrer".to_string(), serde_json::json!(referrer));
        properties.insert(
            "userAgent".to_string(),
            serde_json::json!(self.config.user_agent),
        );

        let event = self.make_event(event::PAGE_VIEW, Some(page.to_string()), properties);
        self.enqueue(event);
    }

    /// Record usage of a feature.
    ///
    /// Caller-supplied properties win over the built-in keys.
    pub fn track_feature_interaction(
        &self,
        feature: &str,
        action: &str,
        properties: Option<Properties>,
    ) {
        let mut props = Properties::new();
        props.insert("feature".to_string(), serde_json::json!(feature));
        props.insert("action".to_string(), serde_json::json!(action));
        props.insert(
            "demo_mode".to_string(),
            serde_json::json!(self.identity.snapshot().demo_mode),
        );
        if let Some(extra) = properties {
            props.extend(extra);
        }

        let event = self.make_event(event::FEATURE_INTERACTION, None, props);
        self.enqueue(event);
    }

    /// Record a completed waitlist signup.
    ///
    /// The one tracking call with a durable side effect: it persists the
    /// waitlist flag, so the visitor classifies as waitlisted from here
    /// on. The enqueued event still snapshots the pre-conversion state.
    pub fn track_conversion(&self, source: &str, email: Option<&str>) {
        let mut props = Properties::new();
        props.insert("source".to_string(), serde_json::json!(source));
        if let Some(domain) = email.and_then(|e| e.split('@').nth(1)) {
            props.insert("emailDomain".to_string(), serde_json::json!(domain));
        }
        props.insert(
            "sessionDuration".to_string(),
            serde_json::json!(self.session_duration_secs()),
        );

        let event = self.make_event(event::WAITLIST_SIGNUP_COMPLETED, None, props);
        self.enqueue(event);

        if let Err(e) = self.flags.set(WAITLIST_EMAIL_KEY, email.unwrap_or("true")) {
            warn!(error = %e, "failed to persist waitlist flag");
        }
        self.identity.refresh();
    }

    /// Record a waitlist call-to-action being triggered.
    ///
    /// Caller-supplied properties win over the built-in keys.
    pub fn track_waitlist_cta(&self, source: &str, properties: Option<Properties>) {
        let mut props = Properties::new();
        props.insert("source".to_string(), serde_json::json!(source));
        props.insert(
            "sessionDuration".to_string(),
            serde_json::json!(self.session_duration_secs()),
        );
        if let Some(extra) = properties {
            props.extend(extra);
        }

        let event = self.make_event(event::WAITLIST_CTA_TRIGGERED, None, props);
        self.enqueue(event);
    }

    pub fn session_id(&self) -> &SessionId {
        self.identity.session_id()
    }

    pub fn user_kind(&self) -> UserKind {
        self.identity.snapshot().kind
    }

    pub fn demo_mode(&self) -> bool {
        self.identity.snapshot().demo_mode
    }

    /// Events currently queued and not yet flushed.
    pub fn pending_events(&self) -> usize {
        self.queue.len()
    }

    fn make_event(
        &self,
        name: &str,
        page: Option<String>,
        properties: Properties,
    ) -> AnalyticsEvent {
        let snapshot = self.identity.snapshot();
        let page = page.unwrap_or_else(|| {
            self.current_page
                .read()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .clone()
        });
        AnalyticsEvent {
            session_id: self.identity.session_id().clone(),
            event_name: name.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            demo_mode: snapshot.demo_mode,
            user_type: snapshot.kind,
            page,
            properties,
        }
    }

    fn enqueue(&self, event: AnalyticsEvent) {
        debug!(
            event = %event.event_name,
            page = %event.page,
            user_type = %event.user_type,
            "queued analytics event"
        );
        self.queue.push(event);
    }

    fn session_init(&self) -> SessionInit {
        let snapshot = self.identity.snapshot();
        SessionInit {
            session_id: self.identity.session_id().clone(),
            demo_mode: snapshot.demo_mode,
            user_type: snapshot.kind,
            landing_page: self.config.landing_page.clone(),
            referrer: self.config.referrer.clone().unwrap_or_default(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    fn session_duration_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

impl Drop for Tracker {
    fn drop(&mut self) {
        // Backstop for hosts that skip shutdown(): stop the worker so no
        // timer outlives the tracker. The worker's own cancel path still
        // attempts the beacon send.
        self.shutdown.cancel();
    }
}

/// Builder for [`Tracker`], with injection points for every collaborator.
pub struct TrackerBuilder {
    config: TrackerConfig,
    transport: Option<Arc<dyn Transport>>,
    beacon: Option<Arc<dyn BeaconSender>>,
    flag_store: Option<Arc<dyn FlagStore>>,
    session_store: Option<Arc<dyn FlagStore>>,
}

impl TrackerBuilder {
    pub fn new() -> Self {
        TrackerBuilder {
            config: TrackerConfig::default(),
            transport: None,
            beacon: None,
            flag_store: None,
            session_store: None,
        }
    }

    pub fn config(mut self, config: TrackerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn beacon(mut self, beacon: Arc<dyn BeaconSender>) -> Self {
        self.beacon = Some(beacon);
        self
    }

    /// Durable flag store shared with the host application.
    pub fn flag_store(mut self, store: Arc<dyn FlagStore>) -> Self {
        self.flag_store = Some(store);
        self
    }

    /// Session-scope store holding the session id.
    pub fn session_store(mut self, store: Arc<dyn FlagStore>) -> Self {
        self.session_store = Some(store);
        self
    }

    /// Build the tracker. Infallible: analytics setup must never take the
    /// host application down.
    pub fn build(self) -> Tracker {
        let config = self.config;
        let flags = self.flag_store.unwrap_or_else(|| {
            Arc::new(JsonFileStore::new(config.data_dir.join("flags.json")))
        });
        let session_store = self
            .session_store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()));
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(HttpTransport::new(&config)));
        let beacon = self
            .beacon
            .unwrap_or_else(|| Arc::new(HttpBeacon::new(&config)));

        let identity = Arc::new(SessionIdentity::bootstrap(
            session_store.as_ref(),
            Arc::clone(&flags),
        ));
        let changes = Some(identity.subscribe());
        let queue = Arc::new(EventQueue::new(config.max_queue_events));
        let current_page = RwLock::new(config.landing_page.clone());

        Tracker {
            config,
            identity,
            queue,
            flags,
            transport,
            beacon,
            current_page,
            started_at: Instant::now(),
            shutdown: CancellationToken::new(),
            worker_handle: None,
            changes,
        }
    }
}

impl Default for TrackerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
