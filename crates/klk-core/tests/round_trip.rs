//! End-to-end configuration round-trips through the `Companion` controller
//! with an in-memory slot, a recording host and a scripted transport.

use std::sync::Arc;

use klk_core::{
    Companion, ConfigStore, Configuration, DeliveryOutcome, HostEvent, Phase, RecordingHost,
    StubTransport, TransactionId, WatchInfo,
};
use klk_store::{FileSlotStore, MemorySlotStore, SlotStore};
use serde_json::json;

const BASE: &str = "https://exe44.github.io/pebble-klk/config-web/config-klk.html";

struct Harness {
    companion: Companion,
    host: Arc<RecordingHost>,
    transport: Arc<StubTransport>,
    slot: Arc<MemorySlotStore>,
    store: ConfigStore,
}

fn harness(slot: MemorySlotStore, host: RecordingHost, transport: StubTransport) -> Harness {
    let slot = Arc::new(slot);
    let host = Arc::new(host);
    let transport = Arc::new(transport);
    let store = ConfigStore::new(slot.clone());
    let companion = Companion::new(BASE, store.clone(), host.clone(), transport.clone());
    Harness {
        companion,
        host,
        transport,
        slot,
        store,
    }
}

fn show() -> HostEvent {
    HostEvent::ShowConfiguration { payload: json!({}) }
}

fn closed(decoded: &str) -> HostEvent {
    HostEvent::WebviewClosed {
        response: urlencoding::encode(decoded).into_owned(),
    }
}

fn config(json: &str) -> Configuration {
    Configuration::from_json(json).unwrap()
}

// ── Launcher ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn empty_store_without_watch_opens_bare_url() {
    let mut h = harness(
        MemorySlotStore::new(),
        RecordingHost::new(),
        StubTransport::delivering(),
    );

    h.companion.handle(show()).unwrap();

    assert_eq!(h.host.opened(), vec![BASE.to_string()]);
}

#[tokio::test]
async fn aplite_watch_gets_capability_flags() {
    let mut h = harness(
        MemorySlotStore::with_blob(r#"{"units":"metric"}"#),
        RecordingHost::with_watch(WatchInfo::new("aplite")),
        StubTransport::delivering(),
    );

    h.companion.handle(show()).unwrap();

    let opened = h.host.opened();
    assert_eq!(opened.len(), 1);
    assert!(
        opened[0].ends_with("?units=metric&isPebbleColor=0&isAplite=1"),
        "unexpected url: {}",
        opened[0]
    );
    // The derived flags are only for the page, never persisted
    assert_eq!(h.store.load(), config(r#"{"units":"metric"}"#));
}

// ── Response ingestion ────────────────────────────────────────────────────────

#[tokio::test]
async fn dismissed_page_writes_nothing_and_sends_nothing() {
    let mut h = harness(
        MemorySlotStore::with_blob(r#"{"units":"metric"}"#),
        RecordingHost::new(),
        StubTransport::delivering(),
    );

    h.companion.handle(show()).unwrap();
    h.companion.handle(closed("")).unwrap();

    assert_eq!(
        h.slot.read().unwrap().as_deref(),
        Some(r#"{"units":"metric"}"#)
    );
    assert!(h.companion.drain().await.is_empty());
    assert_eq!(h.transport.send_count(), 0);
    assert_eq!(h.companion.phase(), Phase::Idle);
}

#[tokio::test]
async fn submission_is_stored_and_relayed_once() {
    let mut h = harness(
        MemorySlotStore::new(),
        RecordingHost::new(),
        StubTransport::delivering(),
    );

    h.companion.handle(show()).unwrap();
    h.companion
        .handle(closed(r#"{"units":"imperial"}"#))
        .unwrap();
    let outcomes = h.companion.drain().await;

    let expected = config(r#"{"units":"imperial"}"#);
    assert_eq!(h.store.load(), expected);
    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].is_delivered());
    assert_eq!(h.transport.send_count(), 1);
    assert_eq!(h.transport.sent()[0].payload(), &expected);
}

#[tokio::test]
async fn store_and_last_relayed_message_agree() {
    let mut h = harness(
        MemorySlotStore::new(),
        RecordingHost::new(),
        StubTransport::delivering(),
    );

    for body in [r#"{"a":1}"#, r#"{"b":"two","c":true}"#] {
        h.companion.handle(show()).unwrap();
        h.companion.handle(closed(body)).unwrap();
    }
    h.companion.drain().await;

    let sent = h.transport.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent.last().unwrap().payload(), &h.store.load());
}

#[tokio::test]
async fn malformed_submission_is_reported_and_changes_nothing() {
    let mut h = harness(
        MemorySlotStore::with_blob(r#"{"units":"metric"}"#),
        RecordingHost::new(),
        StubTransport::delivering(),
    );

    h.companion.handle(show()).unwrap();
    let result = h.companion.handle(closed(r#"{"units":"#));

    assert!(matches!(result, Err(klk_core::BridgeError::MalformedResponse(_))));
    assert_eq!(h.store.load(), config(r#"{"units":"metric"}"#));
    assert_eq!(h.transport.send_count(), 0);
}

// ── Delivery ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn delivery_failure_is_reported_once_and_store_kept() {
    let mut h = harness(
        MemorySlotStore::new(),
        RecordingHost::new(),
        StubTransport::failing("APP_MSG_NOT_CONNECTED"),
    );

    h.companion
        .handle(closed(r#"{"units":"imperial"}"#))
        .unwrap();
    let outcomes = h.companion.drain().await;

    assert_eq!(
        outcomes,
        vec![DeliveryOutcome::Failed {
            transaction_id: TransactionId(1),
            error: "APP_MSG_NOT_CONNECTED".into(),
        }]
    );
    assert_eq!(h.transport.send_count(), 1);
    assert_eq!(h.store.load(), config(r#"{"units":"imperial"}"#));
}

// ── Concurrency ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn overlapping_round_trips_last_write_wins() {
    let mut h = harness(
        MemorySlotStore::new(),
        RecordingHost::with_watch(WatchInfo::new("basalt")),
        StubTransport::delivering(),
    );

    h.companion.handle(show()).unwrap();
    h.companion.handle(show()).unwrap();
    assert_eq!(h.host.opened().len(), 2);

    h.companion
        .handle(closed(r#"{"units":"metric","hour24":true}"#))
        .unwrap();
    h.companion
        .handle(closed(r#"{"units":"imperial"}"#))
        .unwrap();
    h.companion.drain().await;

    // No merge of the two submissions
    assert_eq!(h.store.load(), config(r#"{"units":"imperial"}"#));
    assert_eq!(h.transport.send_count(), 2);
}

#[tokio::test]
async fn next_url_reflects_last_submission() {
    let mut h = harness(
        MemorySlotStore::new(),
        RecordingHost::with_watch(WatchInfo::new("chalk")),
        StubTransport::delivering(),
    );

    h.companion.handle(show()).unwrap();
    h.companion
        .handle(closed(r#"{"units":"imperial","city":"São Paulo"}"#))
        .unwrap();
    h.companion.handle(show()).unwrap();

    let opened = h.host.opened();
    assert_eq!(opened[0], format!("{BASE}?isPebbleColor=1&isAplite=0"));
    assert_eq!(
        opened[1],
        format!("{BASE}?units=imperial&city=S%C3%A3o%20Paulo&isPebbleColor=1&isAplite=0")
    );
}

// ── Persistence across restarts ───────────────────────────────────────────────

#[tokio::test]
async fn submission_survives_restart() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("config.json");

    {
        let store = ConfigStore::new(Arc::new(FileSlotStore::new(path.clone())));
        let mut companion = Companion::new(
            BASE,
            store,
            Arc::new(RecordingHost::new()),
            Arc::new(StubTransport::delivering()),
        );
        companion.handle(closed(r#"{"units":"metric"}"#)).unwrap();
        companion.drain().await;
    }

    let host = Arc::new(RecordingHost::new());
    let store = ConfigStore::new(Arc::new(FileSlotStore::new(path)));
    let transport = Arc::new(StubTransport::delivering());
    let mut companion = Companion::new(BASE, store, host.clone(), transport);
    companion.handle(show()).unwrap();

    assert_eq!(host.opened(), vec![format!("{BASE}?units=metric")]);
}
