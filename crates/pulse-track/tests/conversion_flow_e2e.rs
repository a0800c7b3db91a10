//! Conversion side effects and live classification updates.

mod support;

use std::sync::Arc;
use std::time::Duration;

use pulse_common::UserKind;
use pulse_track::{FlagStore, MemoryStore};

use support::{build_tracker, CapturingBeacon, CapturingTransport};

const DEMO_MODE_KEY: &str = "demo_mode";
const AUTH_TOKEN_KEY: &str = "auth_token";

#[tokio::test(start_paused = true)]
async fn conversion_reclassifies_later_events_as_waitlisted() {
    let transport = Arc::new(CapturingTransport::default());
    let beacon = Arc::new(CapturingBeacon::default());
    let flags = Arc::new(MemoryStore::new());
    flags.set(DEMO_MODE_KEY, "true").unwrap();

    let mut tracker = build_tracker(
        transport.clone(),
        beacon,
        Arc::clone(&flags) as Arc<dyn FlagStore>,
    );
    tracker.start();

    tracker.track_event("before", None);
    tracker.track_conversion("footer_cta", Some("a@b.com"));
    tracker.track_event("after", None);

    tokio::time::sleep(Duration::from_secs(6)).await;

    let batches = transport.batches();
    assert_eq!(batches.len(), 1);
    let batch = &batches[0];
    assert_eq!(batch.len(), 3);
    assert_eq!(batch[0].user_type, UserKind::Demo);
    assert_eq!(batch[1].event_name, "waitlist_signup_completed");
    assert_eq!(batch[1].user_type, UserKind::Demo);
    assert_eq!(batch[2].user_type, UserKind::Waitlisted);
    // Demo mode itself is untouched by the conversion.
    assert!(batch[2].demo_mode);

    assert_eq!(tracker.user_kind(), UserKind::Waitlisted);
    tracker.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn host_flag_changes_reach_the_pipeline_without_polling() {
    let transport = Arc::new(CapturingTransport::default());
    let beacon = Arc::new(CapturingBeacon::default());
    let flags = Arc::new(MemoryStore::new());

    let mut tracker = build_tracker(
        transport.clone(),
        beacon,
        Arc::clone(&flags) as Arc<dyn FlagStore>,
    );
    tracker.start();

    tracker.track_event("anonymous_event", None);

    // The host application logs the visitor in through the shared store;
    // the change feed wakes the worker, which refreshes the snapshot.
    flags.set(AUTH_TOKEN_KEY, "tok-123").unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    tracker.track_event("authenticated_event", None);
    tokio::time::sleep(Duration::from_secs(6)).await;

    let batches = transport.batches();
    assert_eq!(batches.len(), 1);
    let batch = &batches[0];
    assert_eq!(batch[0].user_type, UserKind::Anonymous);
    assert_eq!(batch[1].user_type, UserKind::Authenticated);

    tracker.shutdown().await;
}
