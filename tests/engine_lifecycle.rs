//! Integration tests for the refresh engine: selection, manual and periodic
//! refresh, failure isolation and the single-fetch-in-flight rule.
//!
//! Every test drives a real engine over an in-memory source on a paused
//! tokio clock, so hour-long timers elapse instantly.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use radioinfo::app::AppEvent;
use radioinfo::refresh::{
    self, CycleKind, EngineHandle, EngineStatus, Posted, RefreshState, SelectOutcome, StartupError,
    UpdateRequest, REFRESH_INTERVAL,
};
use radioinfo::schedule::{Channel, Program};
use radioinfo::source::{ChannelPage, FetchError, Page, ProgramPage, RemoteSource};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::time::Instant;

// ============================================================================
// Test Source
// ============================================================================

/// Three channels; every day holds six four-hour programs starting at midnight UTC.
struct MockSource {
    catalog_fails: AtomicBool,
    failing_channel: Mutex<Option<String>>,
    panics: AtomicBool,
    gated: AtomicBool,
    gate: Semaphore,
    schedule_calls: AtomicUsize,
}

impl MockSource {
    fn new() -> Self {
        Self {
            catalog_fails: AtomicBool::new(false),
            failing_channel: Mutex::new(None),
            panics: AtomicBool::new(false),
            gated: AtomicBool::new(false),
            gate: Semaphore::new(0),
            schedule_calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.schedule_calls.load(Ordering::SeqCst)
    }

    fn fail_channel(&self, id: Option<&str>) {
        *self.failing_channel.lock().unwrap() = id.map(str::to_string);
    }
}

fn day_programs(channel_id: &str, date: NaiveDate) -> Vec<Program> {
    (0..6)
        .map(|slot| {
            let start = date.and_hms_opt(slot * 4, 0, 0).unwrap().and_utc();
            Program::new(
                format!("{} {} {:02}:00", channel_id, date, slot * 4),
                start,
                start + chrono::TimeDelta::hours(4),
            )
        })
        .collect()
}

impl RemoteSource for MockSource {
    async fn fetch_channel_page(&self, page: u32) -> Result<ChannelPage, FetchError> {
        if self.catalog_fails.load(Ordering::SeqCst) {
            return Err(FetchError::HttpStatus(503));
        }
        Ok(Page {
            items: vec![
                Channel::new("1", "P1"),
                Channel::new("2", "P2"),
                Channel::new("3", "P3"),
            ],
            page,
            total_pages: 1,
        })
    }

    async fn fetch_schedule_page(
        &self,
        channel_id: &str,
        date: NaiveDate,
        page: u32,
    ) -> Result<ProgramPage, FetchError> {
        self.schedule_calls.fetch_add(1, Ordering::SeqCst);
        if self.gated.load(Ordering::SeqCst) {
            self.gate.acquire().await.expect("gate closed").forget();
        }
        if self.panics.load(Ordering::SeqCst) {
            panic!("boom");
        }
        let failing = self.failing_channel.lock().unwrap().clone();
        if failing.as_deref() == Some(channel_id) {
            return Err(FetchError::Timeout);
        }
        Ok(Page {
            items: day_programs(channel_id, date),
            page,
            total_pages: 1,
        })
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2017, 12, 10, 18, 0, 0).unwrap()
}

fn far_future() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2300, 1, 1, 12, 0, 0).unwrap()
}

async fn start(source: &Arc<MockSource>) -> (EngineHandle, mpsc::Receiver<AppEvent>) {
    start_at(source, fixed_now).await
}

async fn start_at(
    source: &Arc<MockSource>,
    clock: refresh::Clock,
) -> (EngineHandle, mpsc::Receiver<AppEvent>) {
    let (tx, rx) = mpsc::channel(32);
    let engine = match refresh::start_with_clock(Arc::clone(source), tx, clock).await {
        Ok(engine) => engine,
        Err(e) => panic!("engine failed to start: {}", e),
    };
    (engine, rx)
}

async fn next_event(rx: &mut mpsc::Receiver<AppEvent>) -> AppEvent {
    tokio::time::timeout(Duration::from_secs(4 * 3600), rx.recv())
        .await
        .expect("timed out waiting for engine event")
        .expect("event channel closed")
}

/// Consumes events up to and including the next `Idle`.
async fn until_idle(rx: &mut mpsc::Receiver<AppEvent>) -> Vec<AppEvent> {
    let mut seen = Vec::new();
    loop {
        let event = next_event(rx).await;
        let done = matches!(event, AppEvent::Idle);
        seen.push(event);
        if done {
            return seen;
        }
    }
}

fn published(outcome: SelectOutcome) -> (Arc<radioinfo::schedule::ScheduleSnapshot>, bool) {
    match outcome {
        SelectOutcome::Published { snapshot, cached } => (snapshot, cached),
        other => panic!("expected a published schedule, got {:?}", other),
    }
}

// ============================================================================
// Startup
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_startup_loads_catalog_in_order() {
    let source = Arc::new(MockSource::new());
    let (engine, _rx) = start(&source).await;

    let names: Vec<&str> = engine.catalog().iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["P1", "P2", "P3"]);
    assert_eq!(engine.status(), EngineStatus::default());
    assert_eq!(source.calls(), 0);

    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_catalog_failure_is_startup_error() {
    let source = Arc::new(MockSource::new());
    source.catalog_fails.store(true, Ordering::SeqCst);

    let (tx, _rx) = mpsc::channel(32);
    match refresh::start_with_clock(Arc::clone(&source), tx, fixed_now).await {
        Err(StartupError::Catalog(FetchError::HttpStatus(503))) => {}
        Err(e) => panic!("unexpected startup error: {}", e),
        Ok(_) => panic!("engine started without a catalog"),
    }
}

// ============================================================================
// Selection
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_select_publishes_windowed_and_marked_schedule() {
    let source = Arc::new(MockSource::new());
    let (engine, mut rx) = start(&source).await;

    let (snapshot, cached) = published(engine.select_channel("P1").await.unwrap());
    assert!(!cached);
    assert_eq!(snapshot.channel_name, "P1");

    // Starts within whole hours [-12, 11] of 18:00 Dec 10
    let titles: Vec<&str> = snapshot.programs.iter().map(|p| p.title.as_str()).collect();
    assert_eq!(
        titles,
        vec![
            "1 2017-12-10 08:00",
            "1 2017-12-10 12:00",
            "1 2017-12-10 16:00",
            "1 2017-12-10 20:00",
            "1 2017-12-11 00:00",
            "1 2017-12-11 04:00",
        ]
    );
    // 12:00-16:00 is the last one over by 18:00
    assert_eq!(snapshot.marked, Some(1));
    assert_eq!(source.calls(), 3);

    let events = until_idle(&mut rx).await;
    assert!(matches!(
        &events[0],
        AppEvent::Busy { kind: CycleKind::Selection, channel: Some(name) } if name == "P1"
    ));
    assert!(matches!(&events[1], AppEvent::SchedulePublished(s) if s.channel_name == "P1"));
    assert_eq!(events.len(), 3);
    assert_eq!(engine.status(), EngineStatus::default());

    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_reselecting_fetched_channel_uses_cache() {
    let source = Arc::new(MockSource::new());
    let (engine, mut rx) = start(&source).await;

    published(engine.select_channel("P1").await.unwrap());
    until_idle(&mut rx).await;
    published(engine.select_channel("P2").await.unwrap());
    until_idle(&mut rx).await;
    assert_eq!(source.calls(), 6);

    let (snapshot, cached) = published(engine.select_channel("P1").await.unwrap());
    assert!(cached);
    assert_eq!(snapshot.channel_name, "P1");
    assert_eq!(source.calls(), 6);
    assert!(matches!(next_event(&mut rx).await, AppEvent::SchedulePublished(_)));

    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_empty_selection_clears_without_fetching() {
    let source = Arc::new(MockSource::new());
    let (engine, mut rx) = start(&source).await;

    assert_eq!(engine.select_channel("").await.unwrap(), SelectOutcome::Cleared);
    assert!(matches!(next_event(&mut rx).await, AppEvent::SelectionCleared));
    assert_eq!(source.calls(), 0);

    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_unknown_channel_is_rejected() {
    let source = Arc::new(MockSource::new());
    let (engine, _rx) = start(&source).await;

    assert_eq!(
        engine.select_channel("P9").await.unwrap(),
        SelectOutcome::UnknownChannel
    );
    assert_eq!(source.calls(), 0);

    engine.shutdown().await;
}

// ============================================================================
// Single Flight
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_requests_during_fetch_are_refused() {
    let source = Arc::new(MockSource::new());
    source.gated.store(true, Ordering::SeqCst);
    let (engine, mut rx) = start(&source).await;

    engine.post_select_channel("P1").unwrap();
    assert!(matches!(
        next_event(&mut rx).await,
        AppEvent::Busy { kind: CycleKind::Selection, .. }
    ));
    assert_eq!(
        engine.status(),
        EngineStatus {
            refresh: RefreshState::Idle,
            selection_blocked: true,
        }
    );

    assert_eq!(
        engine.request_manual_update().await.unwrap(),
        UpdateRequest::Ignored
    );
    assert_eq!(engine.select_channel("P2").await.unwrap(), SelectOutcome::Busy);
    assert!(matches!(
        next_event(&mut rx).await,
        AppEvent::SelectionRefused { channel } if channel == "P2"
    ));

    source.gate.add_permits(3);
    let events = until_idle(&mut rx).await;
    assert!(matches!(&events[0], AppEvent::SchedulePublished(s) if s.channel_name == "P1"));

    // Only the first selection reached the source
    assert_eq!(source.calls(), 3);
    assert_eq!(engine.status(), EngineStatus::default());

    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_manual_update_reports_refreshing_status() {
    let source = Arc::new(MockSource::new());
    let (engine, mut rx) = start(&source).await;
    published(engine.select_channel("P1").await.unwrap());
    until_idle(&mut rx).await;

    source.gated.store(true, Ordering::SeqCst);
    assert_eq!(
        engine.request_manual_update().await.unwrap(),
        UpdateRequest::Started
    );
    assert!(matches!(
        next_event(&mut rx).await,
        AppEvent::Busy { kind: CycleKind::Manual, channel: Some(_) }
    ));
    let status = engine.status();
    assert_eq!(status.refresh, RefreshState::Refreshing);
    assert!(status.is_busy());

    source.gate.add_permits(3);
    until_idle(&mut rx).await;
    assert_eq!(engine.status(), EngineStatus::default());

    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_posted_selection_during_fetch_is_reported() {
    let source = Arc::new(MockSource::new());
    source.gated.store(true, Ordering::SeqCst);
    let (engine, mut rx) = start(&source).await;

    assert_eq!(engine.post_select_channel("P1").unwrap(), Posted::Queued);
    assert!(matches!(next_event(&mut rx).await, AppEvent::Busy { .. }));

    assert_eq!(engine.post_select_channel("P3").unwrap(), Posted::Queued);
    assert!(matches!(
        next_event(&mut rx).await,
        AppEvent::SelectionRefused { channel } if channel == "P3"
    ));

    source.gate.add_permits(3);
    let events = until_idle(&mut rx).await;
    assert!(matches!(&events[0], AppEvent::SchedulePublished(s) if s.channel_name == "P1"));
    assert_eq!(source.calls(), 3);

    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_full_command_queue_reports_dropped_request() {
    let source = Arc::new(MockSource::new());
    source.gated.store(true, Ordering::SeqCst);
    // Room for one event: the engine stalls on the first refusal it reports
    let (tx, rx) = mpsc::channel(1);
    let engine = match refresh::start_with_clock(Arc::clone(&source), tx, fixed_now).await {
        Ok(engine) => engine,
        Err(e) => panic!("engine failed to start: {}", e),
    };

    let mut dropped = false;
    for _ in 0..100 {
        if engine.post_select_channel("P1").unwrap() == Posted::Dropped {
            dropped = true;
            break;
        }
        tokio::task::yield_now().await;
    }
    assert!(dropped, "command queue never filled up");
    assert_eq!(engine.post_manual_update().unwrap(), Posted::Dropped);

    drop(rx);
    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_manual_update_during_refresh_is_ignored() {
    let source = Arc::new(MockSource::new());
    let (engine, mut rx) = start(&source).await;
    published(engine.select_channel("P1").await.unwrap());
    until_idle(&mut rx).await;
    assert_eq!(source.calls(), 3);

    source.gated.store(true, Ordering::SeqCst);
    assert_eq!(
        engine.request_manual_update().await.unwrap(),
        UpdateRequest::Started
    );
    assert!(matches!(
        next_event(&mut rx).await,
        AppEvent::Busy { kind: CycleKind::Manual, .. }
    ));
    assert_eq!(engine.status().refresh, RefreshState::Refreshing);

    let before = source.calls();
    assert_eq!(
        engine.request_manual_update().await.unwrap(),
        UpdateRequest::Ignored
    );
    assert_eq!(source.calls(), before);

    source.gate.add_permits(3);
    let events = until_idle(&mut rx).await;
    assert!(events
        .iter()
        .any(|e| matches!(e, AppEvent::SchedulePublished(s) if s.channel_name == "P1")));
    // The ignored request started no second cycle
    assert_eq!(
        events.iter().filter(|e| matches!(e, AppEvent::Busy { .. })).count(),
        0
    );
    assert_eq!(source.calls(), 6);
    assert_eq!(engine.status(), EngineStatus::default());

    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_manual_refresh_failure_returns_to_idle() {
    let source = Arc::new(MockSource::new());
    let (engine, mut rx) = start(&source).await;
    published(engine.select_channel("P1").await.unwrap());
    until_idle(&mut rx).await;

    source.fail_channel(Some("1"));
    assert_eq!(
        engine.request_manual_update().await.unwrap(),
        UpdateRequest::Started
    );
    let events = until_idle(&mut rx).await;
    assert_eq!(events.len(), 3);
    assert!(matches!(
        &events[0],
        AppEvent::Busy { kind: CycleKind::Manual, channel: Some(name) } if name == "P1"
    ));
    assert!(matches!(&events[1], AppEvent::RefreshFailed { channel, .. } if channel == "P1"));
    assert_eq!(engine.status(), EngineStatus::default());

    // The failed cycle left P1 empty, so selecting it fetches again
    source.fail_channel(None);
    let before = source.calls();
    let (snapshot, cached) = published(engine.select_channel("P1").await.unwrap());
    assert!(!cached);
    assert_eq!(snapshot.programs.len(), 6);
    assert_eq!(source.calls(), before + 3);

    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_aborts_fetch_in_flight() {
    let source = Arc::new(MockSource::new());
    source.gated.store(true, Ordering::SeqCst);
    let (engine, mut rx) = start(&source).await;

    engine.post_select_channel("P1").unwrap();
    assert!(matches!(next_event(&mut rx).await, AppEvent::Busy { .. }));

    engine.shutdown().await;
}

// ============================================================================
// Manual and Periodic Refresh
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_manual_update_clears_every_channel_and_refetches_selected() {
    let source = Arc::new(MockSource::new());
    let (engine, mut rx) = start(&source).await;

    published(engine.select_channel("P2").await.unwrap());
    until_idle(&mut rx).await;
    published(engine.select_channel("P1").await.unwrap());
    until_idle(&mut rx).await;
    assert_eq!(source.calls(), 6);

    assert_eq!(
        engine.request_manual_update().await.unwrap(),
        UpdateRequest::Started
    );
    let events = until_idle(&mut rx).await;
    assert!(matches!(
        &events[0],
        AppEvent::Busy { kind: CycleKind::Manual, channel: Some(name) } if name == "P1"
    ));
    assert!(matches!(&events[1], AppEvent::SchedulePublished(s) if s.channel_name == "P1"));
    assert_eq!(source.calls(), 9);

    // P2 lost its programs in the update and is fetched again
    let (_, cached) = published(engine.select_channel("P2").await.unwrap());
    assert!(!cached);
    assert_eq!(source.calls(), 12);

    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_periodic_refresh_after_one_interval() {
    let started = Instant::now();
    let source = Arc::new(MockSource::new());
    let (engine, mut rx) = start(&source).await;

    published(engine.select_channel("P1").await.unwrap());
    until_idle(&mut rx).await;

    let events = until_idle(&mut rx).await;
    let elapsed = started.elapsed();
    assert!(matches!(
        &events[0],
        AppEvent::Busy { kind: CycleKind::Periodic, channel: Some(name) } if name == "P1"
    ));
    assert!(matches!(&events[1], AppEvent::SchedulePublished(_)));
    assert!(elapsed >= REFRESH_INTERVAL, "fired after {:?}", elapsed);
    assert!(elapsed < REFRESH_INTERVAL + Duration::from_secs(1));
    assert_eq!(source.calls(), 6);

    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_periodic_refresh_without_selection() {
    let source = Arc::new(MockSource::new());
    let (engine, mut rx) = start(&source).await;

    let events = until_idle(&mut rx).await;
    assert!(matches!(
        &events[0],
        AppEvent::Busy { kind: CycleKind::Periodic, channel: None }
    ));
    assert_eq!(events.len(), 2);
    assert_eq!(source.calls(), 0);

    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_manual_update_restarts_timer() {
    let source = Arc::new(MockSource::new());
    let (engine, mut rx) = start(&source).await;

    tokio::time::sleep(Duration::from_secs(1800)).await;
    let manual_at = Instant::now();
    assert_eq!(
        engine.request_manual_update().await.unwrap(),
        UpdateRequest::Started
    );
    let events = until_idle(&mut rx).await;
    assert!(matches!(&events[0], AppEvent::Busy { kind: CycleKind::Manual, .. }));

    let events = until_idle(&mut rx).await;
    assert!(matches!(&events[0], AppEvent::Busy { kind: CycleKind::Periodic, .. }));
    assert!(manual_at.elapsed() >= REFRESH_INTERVAL);

    engine.shutdown().await;
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_failed_fetch_leaves_channel_empty_and_others_intact() {
    let source = Arc::new(MockSource::new());
    let (engine, mut rx) = start(&source).await;

    published(engine.select_channel("P1").await.unwrap());
    until_idle(&mut rx).await;

    source.fail_channel(Some("2"));
    let outcome = engine.select_channel("P2").await.unwrap();
    assert!(matches!(outcome, SelectOutcome::Failed(ref e) if e.contains("timed out")));

    let events = until_idle(&mut rx).await;
    assert!(matches!(&events[0], AppEvent::Busy { .. }));
    assert!(matches!(
        &events[1],
        AppEvent::RefreshFailed { channel, .. } if channel == "P2"
    ));
    assert_eq!(engine.status(), EngineStatus::default());

    // The earlier snapshot survives the failure
    let (_, cached) = published(engine.select_channel("P1").await.unwrap());
    assert!(cached);

    // The failed channel has nothing cached and is tried again
    source.fail_channel(None);
    let calls = source.calls();
    let (snapshot, cached) = published(engine.select_channel("P2").await.unwrap());
    assert!(!cached);
    assert_eq!(snapshot.programs.len(), 6);
    assert_eq!(source.calls(), calls + 3);

    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_marking_failure_still_publishes() {
    let source = Arc::new(MockSource::new());
    let (engine, mut rx) = start_at(&source, far_future).await;

    let (snapshot, _) = published(engine.select_channel("P1").await.unwrap());
    assert!(!snapshot.programs.is_empty());
    assert_eq!(snapshot.marked, None);

    let events = until_idle(&mut rx).await;
    assert!(matches!(
        &events[1],
        AppEvent::MarkingFailed { channel, .. } if channel == "P1"
    ));
    assert!(matches!(&events[2], AppEvent::SchedulePublished(s) if s.marked.is_none()));

    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_panicking_fetch_is_reported_and_engine_recovers() {
    let source = Arc::new(MockSource::new());
    source.panics.store(true, Ordering::SeqCst);
    let (engine, mut rx) = start(&source).await;

    let outcome = engine.select_channel("P1").await.unwrap();
    assert_eq!(outcome, SelectOutcome::Failed("boom".to_string()));

    let events = until_idle(&mut rx).await;
    assert!(matches!(
        &events[1],
        AppEvent::TaskPanicked { task: "schedule_fetch", error } if error == "boom"
    ));
    assert_eq!(engine.status(), EngineStatus::default());

    source.panics.store(false, Ordering::SeqCst);
    let (snapshot, _) = published(engine.select_channel("P1").await.unwrap());
    assert_eq!(snapshot.marked, Some(1));

    engine.shutdown().await;
}
