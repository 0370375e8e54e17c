//! End-to-end cycle scenarios against the in-memory store, scripted feeds
//! and a scripted channel.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use jiff::tz::Offset;
use jiff::{SignedDuration, Timestamp};

use super::alerting::CooldownGuard;
use super::notifications::{
    ChannelResponse, IntervalPacer, MessagingChannel, NotificationDispatcher, SendPacer,
    TemplateParam,
};
use super::{AlertCycle, BatchRole, CycleOutcome, FeedCoordinator};
use crate::config::PriorityMode;
use crate::error::{AppError, AppResult};
use crate::external::feeds::{FeedBatch, FeedProvider, FeedQuery};
use crate::models::{
    EarthquakeEvent, FailureReason, FeedSource, NewEarthquake, ParsedEvent,
};
use crate::storage::{MemoryStore, StoragePorts};

const TR: Offset = Offset::constant(3);

// ============================================================================
// Fixtures
// ============================================================================

pub(crate) fn parsed(source: FeedSource, ts: &str, magnitude: f64, longitude: f64) -> ParsedEvent {
    ParsedEvent {
        source,
        timestamp: ts.parse().unwrap(),
        latitude: 39.2343,
        longitude,
        depth: 7.0,
        md: None,
        ml: Some(magnitude),
        mw: None,
        magnitude,
        location: "SINDIRGI (BALIKESIR)".to_string(),
        quality: "İlksel".to_string(),
    }
}

pub(crate) fn event(id: i64, magnitude: f64, ts: &str) -> EarthquakeEvent {
    let new = NewEarthquake::from_parsed(parsed(FeedSource::Afad, ts, magnitude, 28.0), TR);
    EarthquakeEvent::from_new(id, new, Timestamp::now())
}

enum Script {
    Events(Vec<ParsedEvent>),
    Fail,
}

struct FakeFeed {
    source: FeedSource,
    script: Mutex<Script>,
    floors: Mutex<Vec<f64>>,
}

impl FakeFeed {
    fn new(source: FeedSource) -> Arc<Self> {
        Arc::new(Self {
            source,
            script: Mutex::new(Script::Events(Vec::new())),
            floors: Mutex::new(Vec::new()),
        })
    }

    fn serve(&self, events: Vec<ParsedEvent>) {
        *self.script.lock().unwrap() = Script::Events(events);
    }

    fn fail(&self) {
        *self.script.lock().unwrap() = Script::Fail;
    }

    fn floors(&self) -> Vec<f64> {
        self.floors.lock().unwrap().clone()
    }
}

#[async_trait]
impl FeedProvider for FakeFeed {
    fn source(&self) -> FeedSource {
        self.source
    }

    async fn fetch(&self, query: &FeedQuery) -> AppResult<FeedBatch> {
        self.floors.lock().unwrap().push(query.floor());
        match &*self.script.lock().unwrap() {
            Script::Events(events) => Ok(FeedBatch {
                events: events
                    .iter()
                    .filter(|e| e.magnitude >= query.floor())
                    .cloned()
                    .collect(),
                skipped: 0,
            }),
            Script::Fail => Err(AppError::Network {
                feed: self.source.as_str().to_string(),
                message: "connection reset".to_string(),
                source: None,
            }),
        }
    }
}

/// Answers by recipient address: `rejected`, `error`, `unparsable` and
/// `panic` misbehave; anything else is delivered.
#[derive(Default)]
struct FakeChannel {
    sent: Mutex<Vec<(String, Vec<TemplateParam>)>>,
}

impl FakeChannel {
    fn sent(&self) -> Vec<(String, Vec<TemplateParam>)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessagingChannel for FakeChannel {
    async fn send_template(
        &self,
        to: &str,
        _template: &str,
        params: &[TemplateParam],
    ) -> AppResult<ChannelResponse> {
        let count = {
            let mut sent = self.sent.lock().unwrap();
            sent.push((to.to_string(), params.to_vec()));
            sent.len()
        };

        match to {
            "rejected" => Ok(ChannelResponse {
                status: 400,
                body: r#"{"error":{"message":"Recipient not in allowed list"}}"#.to_string(),
            }),
            "error" => Err(AppError::ExternalApi {
                platform: "fake".to_string(),
                message: "connection refused".to_string(),
                source: None,
            }),
            "unparsable" => Ok(ChannelResponse {
                status: 200,
                body: "{}".to_string(),
            }),
            "panic" => panic!("channel blew up"),
            _ => Ok(ChannelResponse {
                status: 200,
                body: format!(r#"{{"messages":[{{"id":"wamid.{}"}}]}}"#, count),
            }),
        }
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

struct NoPacer;

#[async_trait]
impl SendPacer for NoPacer {
    async fn pace(&self, _index: usize) {}
}

struct Harness {
    store: Arc<MemoryStore>,
    primary: Arc<FakeFeed>,
    secondary: Arc<FakeFeed>,
    channel: Arc<FakeChannel>,
    cycle: AlertCycle,
}

fn harness(mode: PriorityMode, threshold: f64, pacer: Arc<dyn SendPacer>) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let poll = store.add_poll("deprem", threshold);
    let group = store.add_group("ege", true);
    store.subscribe(group.id, poll.id);

    let primary = FakeFeed::new(FeedSource::Afad);
    let secondary = FakeFeed::new(FeedSource::Kandilli);
    let channel = Arc::new(FakeChannel::default());
    let ports = StoragePorts::from_memory(store.clone());

    let coordinator = FeedCoordinator::new(
        primary.clone(),
        secondary.clone(),
        ports.earthquakes.clone(),
        mode,
        0.5,
        TR,
    );
    let cooldown = CooldownGuard::new(ports.notifications.clone(), ports.earthquakes.clone(), 30);
    let dispatcher = NotificationDispatcher::new(
        ports.subscribers.clone(),
        ports.notifications.clone(),
        channel.clone(),
        pacer,
        "deprem",
        TR,
    );
    let cycle = AlertCycle::new(coordinator, ports.subscribers, cooldown, dispatcher, "deprem");

    Harness {
        store,
        primary,
        secondary,
        channel,
        cycle,
    }
}

impl Harness {
    fn member(&self, name: &str, address: &str) -> i32 {
        let recipient = self.store.add_recipient(name, address, true);
        self.store.add_member(1, recipient.id);
        recipient.id
    }
}

fn default_harness() -> Harness {
    harness(PriorityMode::PrimaryWithFailover, 4.0, Arc::new(NoPacer))
}

// ============================================================================
// Ingestion
// ============================================================================

#[tokio::test]
async fn test_reingesting_same_batch_inserts_nothing() {
    let h = default_harness();
    h.primary.serve(vec![
        parsed(FeedSource::Afad, "2025-05-13T06:00:00Z", 3.8, 28.1),
        parsed(FeedSource::Afad, "2025-05-13T06:05:00Z", 3.6, 28.2),
    ]);

    let first = h.cycle.ingest_only().await.unwrap();
    assert_eq!(first.inserted_count(), 2);

    let second = h.cycle.ingest_only().await.unwrap();
    assert_eq!(second.inserted_count(), 0);
    assert_eq!(second.batches[0].duplicates, 2);
    assert_eq!(h.store.earthquakes().len(), 2);
}

#[tokio::test]
async fn test_same_event_from_both_feeds_is_stored_once() {
    let h = default_harness();
    let shared = parsed(FeedSource::Afad, "2025-05-13T06:00:00Z", 4.2, 28.1);
    h.primary.serve(vec![shared.clone()]);
    h.secondary.serve(vec![ParsedEvent {
        source: FeedSource::Kandilli,
        ..shared
    }]);

    let report = h.cycle.ingest_only().await.unwrap();
    assert_eq!(report.inserted_count(), 1);
    assert_eq!(report.batches[1].duplicates, 1);
    assert_eq!(h.store.earthquakes()[0].source, FeedSource::Afad);
}

#[tokio::test]
async fn test_floor_is_threshold_minus_margin() {
    let h = default_harness();
    h.primary.serve(vec![
        parsed(FeedSource::Afad, "2025-05-13T06:00:00Z", 3.4, 28.1),
        parsed(FeedSource::Afad, "2025-05-13T06:01:00Z", 3.6, 28.2),
    ]);

    let outcome = h.cycle.run().await;

    assert_eq!(h.primary.floors(), vec![3.5]);
    assert_eq!(h.store.earthquakes().len(), 1);
    assert!(matches!(outcome, CycleOutcome::BelowThreshold { magnitude, .. } if magnitude == 3.6));
    assert!(h.channel.sent().is_empty());
}

#[tokio::test]
async fn test_secondary_is_history_only_when_primary_succeeds() {
    let h = default_harness();
    h.member("Ayşe", "905551112233");
    h.primary.serve(vec![]);
    h.secondary.serve(vec![parsed(FeedSource::Kandilli, "2025-05-13T06:00:00Z", 5.1, 28.1)]);

    let outcome = h.cycle.run().await;

    assert_eq!(outcome, CycleOutcome::NothingNew);
    assert_eq!(h.store.earthquakes().len(), 1);
    assert!(h.channel.sent().is_empty());
}

#[tokio::test]
async fn test_secondary_becomes_actionable_when_primary_fails() {
    let h = default_harness();
    h.member("Ayşe", "905551112233");
    h.primary.fail();
    h.secondary.serve(vec![parsed(FeedSource::Kandilli, "2025-05-13T06:00:00Z", 5.1, 28.1)]);

    let report = h.cycle.ingest_only().await.unwrap();
    assert_eq!(report.batches.len(), 1);
    assert_eq!(report.batches[0].role, BatchRole::Actionable);
    assert_eq!(report.batches[0].source, FeedSource::Kandilli);

    h.secondary.serve(vec![parsed(FeedSource::Kandilli, "2025-05-13T07:00:00Z", 5.3, 28.1)]);
    let outcome = h.cycle.run().await;
    assert!(matches!(outcome, CycleOutcome::Dispatched { report, .. } if report.delivered == 1));

    let (_, params) = &h.channel.sent()[0];
    assert!(params[1].text.ends_with("(KOERI)"));
}

#[tokio::test]
async fn test_secondary_failure_is_swallowed() {
    let h = default_harness();
    h.primary.serve(vec![parsed(FeedSource::Afad, "2025-05-13T06:00:00Z", 3.8, 28.1)]);
    h.secondary.fail();

    let report = h.cycle.ingest_only().await.unwrap();
    assert_eq!(report.batches.len(), 1);
    assert_eq!(report.inserted_count(), 1);
}

#[tokio::test]
async fn test_store_failure_keeps_committed_rows_actionable() {
    let h = harness(PriorityMode::AlwaysBoth, 4.0, Arc::new(NoPacer));
    h.member("Ayşe", "905551112233");
    h.primary.serve(vec![parsed(FeedSource::Afad, "2025-05-13T06:00:00Z", 6.1, 28.1)]);
    h.secondary.serve(vec![parsed(FeedSource::Kandilli, "2025-05-13T06:30:00Z", 3.9, 29.0)]);
    h.store.fail_inserts_from(Some(FeedSource::Kandilli));

    let outcome = h.cycle.run().await;

    assert!(matches!(
        outcome,
        CycleOutcome::Dispatched { event_id: 1, report } if report.delivered == 1
    ));
    assert_eq!(h.store.earthquakes().len(), 1);
    assert_eq!(h.store.notifications()[0].earthquake_id, 1);

    // The refused row is retried once the store recovers
    h.store.fail_inserts_from(None);
    let report = h.cycle.ingest_only().await.unwrap();
    assert_eq!(report.inserted_count(), 1);
    assert_eq!(report.batches[0].duplicates, 1);
    assert_eq!(report.batches[1].failed, 0);
    assert_eq!(h.store.earthquakes().len(), 2);
}

#[tokio::test]
async fn test_failed_rows_are_counted_per_batch() {
    let h = harness(PriorityMode::AlwaysBoth, 4.0, Arc::new(NoPacer));
    h.primary.serve(vec![parsed(FeedSource::Afad, "2025-05-13T06:00:00Z", 4.4, 28.1)]);
    h.secondary.serve(vec![
        parsed(FeedSource::Kandilli, "2025-05-13T06:30:00Z", 4.6, 29.0),
        parsed(FeedSource::Kandilli, "2025-05-13T06:40:00Z", 4.2, 29.1),
    ]);
    h.store.fail_inserts_from(Some(FeedSource::Kandilli));

    let report = h.cycle.ingest_only().await.unwrap();

    assert_eq!(report.batches.len(), 2);
    assert_eq!(report.batches[0].failed, 0);
    assert_eq!(report.batches[1].fetched, 2);
    assert_eq!(report.batches[1].failed, 2);
    let actionable: Vec<f64> = report.actionable().map(|e| e.magnitude).collect();
    assert_eq!(actionable, vec![4.4]);
}

#[tokio::test]
async fn test_both_feeds_failing_fails_the_cycle() {
    let h = default_harness();
    h.primary.fail();
    h.secondary.fail();

    assert!(h.cycle.ingest_only().await.is_err());
    assert!(matches!(h.cycle.run().await, CycleOutcome::Failed { .. }));
}

#[tokio::test]
async fn test_always_both_merges_actionable_sets() {
    let h = harness(PriorityMode::AlwaysBoth, 4.0, Arc::new(NoPacer));
    h.member("Ayşe", "905551112233");
    h.primary.serve(vec![parsed(FeedSource::Afad, "2025-05-13T06:00:00Z", 4.1, 28.1)]);
    h.secondary.serve(vec![parsed(FeedSource::Kandilli, "2025-05-13T06:30:00Z", 4.8, 29.0)]);

    let outcome = h.cycle.run().await;

    let strongest = h
        .store
        .earthquakes()
        .into_iter()
        .find(|e| e.magnitude == 4.8)
        .unwrap();
    assert!(matches!(outcome, CycleOutcome::Dispatched { event_id, .. } if event_id == strongest.id));
}

// ============================================================================
// Alerting
// ============================================================================

#[tokio::test]
async fn test_single_burst_for_strongest_event() {
    let h = default_harness();
    let ayse = h.member("Ayşe Yılmaz", "905551112233");
    let mehmet = h.member("Mehmet", "905554445566");

    // Mehmet also belongs to a second subscribed group
    let second = h.store.add_group("marmara", true);
    h.store.subscribe(second.id, 1);
    h.store.add_member(second.id, mehmet);

    h.primary.serve(vec![
        parsed(FeedSource::Afad, "2025-05-13T06:00:00Z", 4.4, 28.1),
        parsed(FeedSource::Afad, "2025-05-13T06:05:56Z", 5.2, 28.2),
        parsed(FeedSource::Afad, "2025-05-13T06:10:00Z", 4.9, 28.3),
    ]);

    let outcome = h.cycle.run().await;

    let sent = h.channel.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].1[0].text, "Ayşe Yılmaz");
    assert_eq!(
        sent[0].1[1].text,
        "Biraz önce (09:05) SINDIRGI (BALIKESIR) merkezli 5.2 büyüklüğünde (AFAD)"
    );

    let notifications = h.store.notifications();
    assert_eq!(notifications.len(), 2);
    let strongest = h.store.earthquakes().into_iter().find(|e| e.magnitude == 5.2).unwrap();
    assert!(notifications.iter().all(|n| n.earthquake_id == strongest.id && !n.is_read));
    assert_eq!(
        notifications.iter().map(|n| n.recipient_id).collect::<Vec<_>>(),
        vec![ayse, mehmet]
    );
    assert!(matches!(
        outcome,
        CycleOutcome::Dispatched { report, .. } if report.attempted == 2 && report.delivered == 2
    ));
}

#[tokio::test]
async fn test_cooldown_suppresses_then_releases() {
    let h = default_harness();
    h.member("Ayşe", "905551112233");

    h.primary.serve(vec![parsed(FeedSource::Afad, "2025-05-13T06:00:00Z", 4.5, 28.1)]);
    assert!(matches!(h.cycle.run().await, CycleOutcome::Dispatched { .. }));

    h.primary.serve(vec![parsed(FeedSource::Afad, "2025-05-13T06:20:00Z", 4.7, 28.2)]);
    let outcome = h.cycle.run().await;
    assert!(matches!(
        outcome,
        CycleOutcome::CooldownActive { last_event_id: 1, remaining_seconds } if remaining_seconds > 0
    ));
    assert_eq!(h.channel.sent().len(), 1);

    h.primary.serve(vec![parsed(FeedSource::Afad, "2025-05-13T06:40:00Z", 4.6, 28.3)]);
    let later = Timestamp::now() + SignedDuration::from_mins(31);
    assert!(matches!(h.cycle.run_at(later).await, CycleOutcome::Dispatched { event_id: 3, .. }));
    assert_eq!(h.channel.sent().len(), 2);
}

#[tokio::test]
async fn test_cooldown_measures_from_event_insert_time() {
    let h = default_harness();
    h.member("Ayşe", "905551112233");

    h.primary.serve(vec![parsed(FeedSource::Afad, "2025-05-13T06:00:00Z", 4.5, 28.1)]);
    h.cycle.run().await;
    h.store.backdate_event(1, Timestamp::now() - SignedDuration::from_mins(45));

    h.primary.serve(vec![parsed(FeedSource::Afad, "2025-05-13T06:20:00Z", 4.7, 28.2)]);
    assert!(matches!(h.cycle.run().await, CycleOutcome::Dispatched { event_id: 2, .. }));
}

#[tokio::test]
async fn test_missing_poll_fails_cycle() {
    let h = default_harness();
    let ports = StoragePorts::from_memory(h.store.clone());
    let cycle = AlertCycle::new(
        FeedCoordinator::new(
            h.primary.clone(),
            h.secondary.clone(),
            ports.earthquakes.clone(),
            PriorityMode::PrimaryWithFailover,
            0.5,
            TR,
        ),
        ports.subscribers.clone(),
        CooldownGuard::new(ports.notifications.clone(), ports.earthquakes.clone(), 30),
        NotificationDispatcher::new(
            ports.subscribers,
            ports.notifications,
            h.channel.clone(),
            Arc::new(NoPacer),
            "deprem",
            TR,
        ),
        "tsunami",
    );

    assert!(matches!(cycle.run().await, CycleOutcome::Failed { error } if error.contains("tsunami")));
    assert!(h.primary.floors().is_empty());
}

// ============================================================================
// Dispatch
// ============================================================================

#[tokio::test]
async fn test_each_member_failure_is_isolated() {
    let h = default_harness();
    let first = h.member("Ayşe", "905551112233");
    h.member("Rejected", "rejected");
    h.member("Error", "error");
    h.member("Unparsable", "unparsable");
    let panicking = h.member("Panic", "panic");
    let audit = h.member("Audit", "905557778899");
    let last = h.member("Mehmet", "905554445566");
    h.store.fail_audit_for(audit);

    h.primary.serve(vec![parsed(FeedSource::Afad, "2025-05-13T06:00:00Z", 4.5, 28.1)]);
    let outcome = h.cycle.run().await;

    assert!(matches!(
        outcome,
        CycleOutcome::Dispatched { report, .. }
            if report.attempted == 7 && report.delivered == 2 && report.failed == 5
    ));
    assert_eq!(h.channel.sent().len(), 7);

    let delivered: Vec<i32> = h.store.notifications().iter().map(|n| n.recipient_id).collect();
    assert_eq!(delivered, vec![first, last]);

    let reasons: Vec<FailureReason> = h.store.failures().iter().map(|f| f.reason).collect();
    assert_eq!(
        reasons,
        vec![
            FailureReason::SendRejected,
            FailureReason::SendError,
            FailureReason::ConfirmationUnparsable,
            FailureReason::SendError,
        ]
    );
    let failures = h.store.failures();
    assert!(failures[0].detail.contains("HTTP 400"));
    assert_eq!(failures[3].recipient_id, panicking);
    assert_eq!(failures[3].detail, "panicked");
}

#[tokio::test]
async fn test_no_subscribers_dispatches_nothing() {
    let h = default_harness();
    h.primary.serve(vec![parsed(FeedSource::Afad, "2025-05-13T06:00:00Z", 4.5, 28.1)]);

    let outcome = h.cycle.run().await;
    assert!(matches!(outcome, CycleOutcome::Dispatched { report, .. } if report.attempted == 0));
}

#[tokio::test(start_paused = true)]
async fn test_sends_are_paced() {
    let h = harness(
        PriorityMode::PrimaryWithFailover,
        4.0,
        Arc::new(IntervalPacer::from_millis(1000)),
    );
    h.member("A", "905550000001");
    h.member("B", "905550000002");
    h.member("C", "905550000003");
    h.primary.serve(vec![parsed(FeedSource::Afad, "2025-05-13T06:00:00Z", 4.5, 28.1)]);

    let start = tokio::time::Instant::now();
    h.cycle.run().await;

    assert_eq!(h.channel.sent().len(), 3);
    assert!(start.elapsed() >= Duration::from_secs(2));
    assert!(start.elapsed() < Duration::from_secs(3));
}
