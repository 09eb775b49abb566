//! Unit tests for the supervisor components
//!
//! The fakes here stand in for the engine and the display so the poller,
//! the event loop and teardown can be observed without a network or a
//! terminal. Integration tests live in the top-level tests directory.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use tokio_test::assert_ok;

use crate::app::display::{DisplaySurface, InputEvent, InputEvents, Widget};
use crate::app::engine::TransferEngine;
use crate::errors::{DisplayError, DisplayResult, EngineError, EngineResult, SupervisorError};

use super::*;

/// Handle issued by [`FakeEngine`]: index into its progress table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FakeHandle(usize);

/// Engine whose byte counts are set by the test
pub struct FakeEngine {
    transfers: Mutex<Vec<FakeTransfer>>,
    closes: AtomicUsize,
    finished: watch::Sender<Option<bool>>,
}

struct FakeTransfer {
    name: String,
    completed: u64,
    missing: u64,
    failing: bool,
}

impl FakeEngine {
    pub fn new() -> Self {
        let (finished, _) = watch::channel(None);
        Self {
            transfers: Mutex::new(Vec::new()),
            closes: AtomicUsize::new(0),
            finished,
        }
    }

    pub fn set_progress(&self, handle: FakeHandle, completed: u64, missing: u64) {
        let mut transfers = self.transfers.lock().unwrap();
        let transfer = &mut transfers[handle.0];
        transfer.completed = completed;
        transfer.missing = missing;
        transfer.failing = false;
    }

    pub fn set_failing(&self, handle: FakeHandle) {
        self.transfers.lock().unwrap()[handle.0].failing = true;
    }

    /// Report natural completion to `wait_all_complete`
    pub fn finish(&self) {
        self.finished.send_if_modified(|state| {
            let unset = state.is_none();
            if unset {
                *state = Some(true);
            }
            unset
        });
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    fn push(&self, name: &str) -> FakeHandle {
        let mut transfers = self.transfers.lock().unwrap();
        transfers.push(FakeTransfer {
            name: name.to_string(),
            completed: 0,
            missing: 0,
            failing: false,
        });
        FakeHandle(transfers.len() - 1)
    }

    fn with_transfer<T>(&self, handle: &FakeHandle, f: impl FnOnce(&FakeTransfer) -> T) -> T {
        f(&self.transfers.lock().unwrap()[handle.0])
    }
}

impl TransferEngine for FakeEngine {
    type Handle = FakeHandle;

    async fn add_from_descriptor(&self, path: &Path) -> EngineResult<FakeHandle> {
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(self.push(&name))
    }

    async fn add_from_locator(&self, locator: &str) -> EngineResult<FakeHandle> {
        match locator.strip_prefix("fake://") {
            Some(name) => Ok(self.push(name)),
            None => Err(EngineError::InvalidLocator {
                locator: locator.to_string(),
                reason: "not a fake locator".to_string(),
            }),
        }
    }

    fn bytes_completed(&self, handle: &FakeHandle) -> EngineResult<u64> {
        self.with_transfer(handle, |t| {
            if t.failing {
                Err(EngineError::UnknownTransfer { id: handle.0 })
            } else {
                Ok(t.completed)
            }
        })
    }

    fn bytes_missing(&self, handle: &FakeHandle) -> EngineResult<u64> {
        self.with_transfer(handle, |t| {
            if t.failing {
                Err(EngineError::UnknownTransfer { id: handle.0 })
            } else {
                Ok(t.missing)
            }
        })
    }

    fn name(&self, handle: &FakeHandle) -> String {
        self.with_transfer(handle, |t| t.name.clone())
    }

    async fn wait_all_complete(&self) -> bool {
        let mut rx = self.finished.subscribe();
        let natural = match rx.wait_for(Option::is_some).await {
            Ok(state) => (*state).unwrap_or(false),
            Err(_) => false,
        };
        natural
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.finished.send_if_modified(|state| {
            let unset = state.is_none();
            if unset {
                *state = Some(false);
            }
            unset
        });
    }
}

/// What a [`RecordingDisplay`] saw
#[derive(Debug, Default)]
pub struct DisplayLog {
    pub inits: usize,
    pub closes: usize,
    pub widgets: Vec<Widget>,
    /// Widget count at each `present` call
    pub presents: Vec<usize>,
    /// Whether the input stream was already dropped when `close` ran
    pub input_dropped_at_close: Option<bool>,
}

impl DisplayLog {
    pub fn gauges(&self) -> Vec<&crate::app::display::GaugeWidget> {
        self.widgets
            .iter()
            .filter_map(|widget| match widget {
                Widget::Gauge(gauge) => Some(gauge),
                Widget::Banner { .. } => None,
            })
            .collect()
    }
}

/// Display that records calls and takes input from the test
pub struct RecordingDisplay {
    log: Arc<Mutex<DisplayLog>>,
    events: Option<InputEvents>,
    input: mpsc::Sender<InputEvent>,
    fail_init: bool,
}

/// Test side of a [`RecordingDisplay`]
pub struct DisplayMonitor {
    pub log: Arc<Mutex<DisplayLog>>,
    pub input: mpsc::Sender<InputEvent>,
}

impl RecordingDisplay {
    pub fn new() -> (Self, DisplayMonitor) {
        let log = Arc::new(Mutex::new(DisplayLog::default()));
        let (input, events) = InputEvents::channel();
        (
            Self {
                log: Arc::clone(&log),
                events: Some(events),
                input: input.clone(),
                fail_init: false,
            },
            DisplayMonitor { log, input },
        )
    }

    pub fn failing_init() -> (Self, DisplayMonitor) {
        let (mut display, monitor) = Self::new();
        display.fail_init = true;
        (display, monitor)
    }
}

impl DisplayMonitor {
    pub fn closes(&self) -> usize {
        self.log.lock().unwrap().closes
    }

    pub fn inits(&self) -> usize {
        self.log.lock().unwrap().inits
    }

    pub fn widget_count(&self) -> usize {
        self.log.lock().unwrap().widgets.len()
    }
}

impl DisplaySurface for RecordingDisplay {
    fn init(&mut self) -> DisplayResult<()> {
        if self.fail_init {
            return Err(DisplayError::NotATerminal);
        }
        self.log.lock().unwrap().inits += 1;
        Ok(())
    }

    fn render_widget(&mut self, widget: &Widget) -> DisplayResult<()> {
        self.log.lock().unwrap().widgets.push(widget.clone());
        Ok(())
    }

    fn present(&mut self) -> DisplayResult<()> {
        let mut log = self.log.lock().unwrap();
        let rendered = log.widgets.len();
        log.presents.push(rendered);
        Ok(())
    }

    fn poll_events(&mut self) -> DisplayResult<InputEvents> {
        self.events.take().ok_or(DisplayError::EventsTaken)
    }

    fn close(&mut self) -> DisplayResult<()> {
        let mut log = self.log.lock().unwrap();
        log.closes += 1;
        log.input_dropped_at_close = Some(self.input.is_closed());
        Ok(())
    }
}

/// Supervisor configuration with a short tick and no OS signal listeners
pub fn create_test_config() -> SupervisorConfig {
    SupervisorConfig::default()
        .with_tick_interval(Duration::from_millis(10))
        .with_signal_handling(false)
}

async fn supervisor_with(
    names: &[&str],
) -> (Supervisor<FakeEngine, RecordingDisplay>, Arc<FakeEngine>, DisplayMonitor) {
    let engine = Arc::new(FakeEngine::new());
    let (display, monitor) = RecordingDisplay::new();
    let mut supervisor = Supervisor::new(create_test_config(), Arc::clone(&engine), display);
    for name in names {
        supervisor
            .register_locator(&format!("fake://{}", name))
            .await
            .unwrap();
    }
    (supervisor, engine, monitor)
}

/// Test a transfer half way through
///
/// 50 of 100 bytes must show as 50% with the standard label and no
/// completion marker.
#[tokio::test]
async fn test_tick_renders_half_done_transfer() {
    let engine = FakeEngine::new();
    let handle = engine.add_from_locator("fake://half").await.unwrap();
    engine.set_progress(handle, 50, 50);

    let mut registry = TransferRegistry::new();
    registry.register(handle, "half");
    let (mut display, monitor) = RecordingDisplay::new();

    let summary = ProgressPoller::new().tick(&mut registry, &engine, &mut display);
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.complete, 0);

    let log = monitor.log.lock().unwrap();
    let gauges = log.gauges();
    assert_eq!(gauges.len(), 1);
    assert_eq!(gauges[0].percent, 50);
    assert_eq!(gauges[0].label, "50% complete");
    assert!(!gauges[0].complete);
}

/// Test nothing missing means complete
#[tokio::test]
async fn test_tick_marks_finished_transfer_complete() {
    let engine = FakeEngine::new();
    let handle = engine.add_from_locator("fake://done").await.unwrap();
    engine.set_progress(handle, 100, 0);

    let mut registry = TransferRegistry::new();
    registry.register(handle, "done");
    let (mut display, monitor) = RecordingDisplay::new();

    let summary = ProgressPoller::new().tick(&mut registry, &engine, &mut display);
    assert_eq!(summary.complete, 1);

    let log = monitor.log.lock().unwrap();
    let gauge = log.gauges()[0].clone();
    assert_eq!(gauge.percent, 100);
    assert_eq!(gauge.label, "100% complete");
    assert!(gauge.complete);
}

/// Test a tick renders every gauge and then presents them in one batch
#[tokio::test]
async fn test_tick_presents_once_per_batch() {
    let engine = FakeEngine::new();
    let mut registry = TransferRegistry::new();
    for name in ["a", "b", "c"] {
        let handle = engine.add_from_locator(&format!("fake://{}", name)).await.unwrap();
        engine.set_progress(handle, 1, 1);
        registry.register(handle, name);
    }
    let (mut display, monitor) = RecordingDisplay::new();
    let mut poller = ProgressPoller::new();

    poller.tick(&mut registry, &engine, &mut display);
    poller.render_all(&registry, &mut display);

    assert_eq!(monitor.log.lock().unwrap().presents, vec![3, 6]);
}

/// Test the completion marker is sticky
///
/// A later, lower reading moves the percentage but never clears the marker.
#[tokio::test]
async fn test_complete_marker_survives_lower_reading() {
    let engine = FakeEngine::new();
    let handle = engine.add_from_locator("fake://flaky").await.unwrap();
    let mut registry = TransferRegistry::new();
    registry.register(handle, "flaky");
    let (mut display, _monitor) = RecordingDisplay::new();
    let mut poller = ProgressPoller::new();

    engine.set_progress(handle, 100, 0);
    poller.tick(&mut registry, &engine, &mut display);

    engine.set_progress(handle, 10, 90);
    let summary = poller.tick(&mut registry, &engine, &mut display);

    let record = registry.iter().next().unwrap();
    assert!(record.state().complete);
    assert_eq!(record.state().percent, 10);
    assert_eq!(summary.complete, 1);
    assert_eq!(poller.ticks(), 2);
}

/// Test a failing progress query skips only its own record
#[tokio::test]
async fn test_failed_query_skips_only_that_record() {
    let engine = FakeEngine::new();
    let ok = engine.add_from_locator("fake://ok").await.unwrap();
    let broken = engine.add_from_locator("fake://broken").await.unwrap();
    engine.set_progress(ok, 1, 3);
    engine.set_failing(broken);

    let mut registry = TransferRegistry::new();
    registry.register(ok, "ok");
    registry.register(broken, "broken");
    let (mut display, monitor) = RecordingDisplay::new();

    let summary = ProgressPoller::new().tick(&mut registry, &engine, &mut display);
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.skipped, 1);

    let log = monitor.log.lock().unwrap();
    let gauges = log.gauges();
    assert_eq!(gauges.len(), 1);
    assert_eq!(gauges[0].title, "ok");
    assert_eq!(gauges[0].percent, 25);

    // the skipped record keeps its previous state
    let broken_state = registry.iter().nth(1).unwrap().state();
    assert_eq!(broken_state.label, "0% complete");
}

/// Test quitting from the keyboard
///
/// The engine and the display are each closed exactly once and the last
/// gauge keeps the progress seen before the quit.
#[tokio::test]
async fn test_user_quit_tears_down_once() {
    let (supervisor, engine, monitor) = supervisor_with(&["alpha", "beta"]).await;
    let handles: Vec<FakeHandle> = supervisor.registry().iter().map(|r| *r.handle()).collect();
    engine.set_progress(handles[0], 30, 70);
    engine.set_progress(handles[1], 60, 40);

    let input = monitor.input.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        input.send(InputEvent::key('q')).await.unwrap();
    });

    let result = timeout(Duration::from_secs(2), supervisor.run()).await.unwrap();
    let report = assert_ok!(result);

    assert_eq!(report.shutdown.origin, ShutdownOrigin::UserQuit);
    assert!(report.shutdown.display_restored);
    assert_eq!(report.transfers, 2);
    assert_eq!(report.complete, 0);
    assert!(report.ticks >= 1);
    assert_eq!(engine.close_count(), 1);
    assert_eq!(monitor.closes(), 1);

    let log = monitor.log.lock().unwrap();
    assert_eq!(
        log.widgets.first(),
        Some(&Widget::Banner {
            text: crate::constants::supervisor::BANNER_TEXT.to_string()
        })
    );
    let last_alpha = log.gauges().into_iter().rev().find(|g| g.slot == 0).unwrap().clone();
    assert_eq!(last_alpha.label, "30% complete");
}

#[tokio::test]
async fn test_ctrl_c_key_is_a_quit() {
    let (supervisor, engine, monitor) = supervisor_with(&["only"]).await;
    monitor.input.send(InputEvent::ctrl('c')).await.unwrap();

    let report = timeout(Duration::from_secs(2), supervisor.run())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(report.shutdown.origin, ShutdownOrigin::UserQuit);
    assert_eq!(engine.close_count(), 1);
}

/// Test many simultaneous shutdown requests
///
/// Exactly one request is accepted whichever origin wins, and teardown
/// runs once.
#[tokio::test]
async fn test_concurrent_requests_cause_one_teardown() {
    let (supervisor, engine, monitor) = supervisor_with(&["one", "two"]).await;
    let handle = supervisor.shutdown_handle();

    let origins = [
        ShutdownOrigin::Signal(SignalKind::Terminate),
        ShutdownOrigin::UserQuit,
        ShutdownOrigin::TransfersFinished { natural: true },
    ];
    let requesters: Vec<_> = (0..32)
        .map(|i| {
            let handle = handle.clone();
            let origin = origins[i % origins.len()];
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                handle.request(origin)
            })
        })
        .collect();

    let report = timeout(Duration::from_secs(2), supervisor.run())
        .await
        .unwrap()
        .unwrap();

    let accepted = futures::future::join_all(requesters)
        .await
        .into_iter()
        .filter(|r| *r.as_ref().unwrap())
        .count();

    assert_eq!(accepted, 1);
    assert!(origins.contains(&report.shutdown.origin));
    assert_eq!(engine.close_count(), 1);
    assert_eq!(monitor.closes(), 1);
    assert_eq!(handle.state(), ShutdownState::TornDown);
}

/// Test the session ends by itself once every transfer finishes
#[tokio::test]
async fn test_natural_completion_ends_session() {
    let (supervisor, engine, monitor) = supervisor_with(&["quick"]).await;
    let handle = supervisor.registry().iter().next().map(|r| *r.handle()).unwrap();

    let finisher = Arc::clone(&engine);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        finisher.set_progress(handle, 10, 0);
        finisher.finish();
    });

    let report = timeout(Duration::from_secs(2), supervisor.run())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        report.shutdown.origin,
        ShutdownOrigin::TransfersFinished { natural: true }
    );
    assert_eq!(engine.close_count(), 1);
    assert_eq!(monitor.closes(), 1);
}

/// Test an empty registry is refused before the terminal is touched
#[tokio::test]
async fn test_no_transfers_fails_before_display_init() {
    let (supervisor, engine, monitor) = supervisor_with(&[]).await;

    let result = supervisor.run().await;
    assert!(matches!(result, Err(SupervisorError::NoTransfers)));
    assert_eq!(monitor.inits(), 0);
    assert_eq!(monitor.widget_count(), 0);
    assert_eq!(engine.close_count(), 0);
}

#[tokio::test]
async fn test_display_init_failure_is_fatal() {
    let engine = Arc::new(FakeEngine::new());
    let (display, monitor) = RecordingDisplay::failing_init();
    let mut supervisor = Supervisor::new(create_test_config(), Arc::clone(&engine), display);
    supervisor.register_locator("fake://x").await.unwrap();

    let result = supervisor.run().await;
    assert!(matches!(
        result,
        Err(SupervisorError::DisplayInit(DisplayError::NotATerminal))
    ));
    assert_eq!(monitor.widget_count(), 0);
    assert_eq!(engine.close_count(), 0);
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let engine = Arc::new(FakeEngine::new());
    let (display, monitor) = RecordingDisplay::new();
    let config = create_test_config().with_tick_interval(Duration::ZERO);
    let mut supervisor = Supervisor::new(config, engine, display);
    supervisor.register_locator("fake://x").await.unwrap();

    assert!(matches!(
        supervisor.run().await,
        Err(SupervisorError::Config(_))
    ));
    assert_eq!(monitor.inits(), 0);
}

/// Test a resize redraws the banner and every gauge without polling
#[tokio::test]
async fn test_resize_rerenders_every_record() {
    let engine = Arc::new(FakeEngine::new());
    let (display, monitor) = RecordingDisplay::new();
    // long tick so only startup and resize render
    let config = create_test_config().with_tick_interval(Duration::from_secs(3600));
    let mut supervisor = Supervisor::new(config, engine, display);
    supervisor.register_locator("fake://a").await.unwrap();
    supervisor.register_locator("fake://b").await.unwrap();
    let handle = supervisor.shutdown_handle();

    monitor
        .input
        .send(InputEvent::Resize {
            width: 100,
            height: 40,
        })
        .await
        .unwrap();
    monitor.input.send(InputEvent::key('x')).await.unwrap();

    let requester = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.request(ShutdownOrigin::Signal(SignalKind::Hangup))
    });

    let report = timeout(Duration::from_secs(2), supervisor.run())
        .await
        .unwrap()
        .unwrap();
    assert!(requester.await.unwrap());
    assert_eq!(
        report.shutdown.origin,
        ShutdownOrigin::Signal(SignalKind::Hangup)
    );
    assert_eq!(report.ticks, 0);

    // banner + two gauges at startup, again after the resize
    assert_eq!(monitor.widget_count(), 6);
}

/// Test rejected sources are skipped and slots stay dense
#[tokio::test]
async fn test_register_sources_skips_rejected_entries() {
    let (mut supervisor, _engine, _monitor) = supervisor_with(&[]).await;
    let sources = TransferSources {
        descriptors: vec!["transfers/first.transfer".into()],
        locators: vec![
            "fake://second".to_string(),
            "https://example.com/not-fake".to_string(),
            "fake://third".to_string(),
        ],
    };

    assert_eq!(supervisor.register_sources(&sources).await, 3);

    let titles: Vec<&str> = supervisor
        .registry()
        .iter()
        .map(|r| r.state().title.as_str())
        .collect();
    assert_eq!(titles, vec!["first", "second", "third"]);

    let slots: Vec<usize> = supervisor.registry().iter().map(|r| r.id().index()).collect();
    assert_eq!(slots, vec![0, 1, 2]);
}

/// Test the input stream is released before the display is closed, so a
/// reader thread blocked on a full channel can exit and be joined
#[tokio::test]
async fn test_input_stream_dropped_before_display_close() {
    let (supervisor, _engine, monitor) = supervisor_with(&["one"]).await;
    monitor.input.send(InputEvent::key('q')).await.unwrap();

    timeout(Duration::from_secs(2), supervisor.run())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(monitor.closes(), 1);
    assert_eq!(monitor.log.lock().unwrap().input_dropped_at_close, Some(true));
    assert!(monitor.input.is_closed());
}
