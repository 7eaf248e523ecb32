// Integration tests for the session lifecycle
//
// These drive the controller through start/stop/switch against mock
// capture and transport collaborators, verifying status transitions,
// teardown ordering, and device release.

use anyhow::Result;
use aura_guide::capture::{AudioChunk, CameraFrame, CaptureBackend, CaptureConstraints};
use aura_guide::config::Config;
use aura_guide::error::SessionError;
use aura_guide::haptics::LogHapticSink;
use aura_guide::history::MemoryHistory;
use aura_guide::session::{SessionController, SessionStatus};
use aura_guide::transport::{
    LiveEvent, MediaChunk, OpenConfig, SessionHandle, SessionTransport,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;

/// Shared log of capture backend activity
#[derive(Default)]
struct BackendLog {
    events: StdMutex<Vec<String>>,
}

impl BackendLog {
    fn push(&self, entry: String) {
        self.events.lock().unwrap().push(entry);
    }

    fn snapshot(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

struct MockBackend {
    log: Arc<BackendLog>,
    /// Number of acquisition attempts to reject before succeeding
    fail_attempts: usize,
    audio_tx: Option<mpsc::Sender<AudioChunk>>,
    audio_rx: Option<mpsc::Receiver<AudioChunk>>,
    frame_tx: watch::Sender<Option<CameraFrame>>,
    capturing: bool,
}

impl MockBackend {
    fn new(log: Arc<BackendLog>, fail_attempts: usize) -> Self {
        let (frame_tx, _) = watch::channel(None);
        Self {
            log,
            fail_attempts,
            audio_tx: None,
            audio_rx: None,
            frame_tx,
            capturing: false,
        }
    }
}

#[async_trait::async_trait]
impl CaptureBackend for MockBackend {
    async fn acquire(&mut self, constraints: &CaptureConstraints) -> Result<(), SessionError> {
        if self.fail_attempts > 0 {
            self.fail_attempts -= 1;
            self.log.push(format!(
                "reject {}x{}",
                constraints.width, constraints.height
            ));
            return Err(SessionError::DeviceAcquisition(
                "constraints rejected".to_string(),
            ));
        }

        self.log.push(format!(
            "acquire {}x{} {:?}",
            constraints.width, constraints.height, constraints.facing
        ));

        let (tx, rx) = mpsc::channel(8);
        self.audio_tx = Some(tx);
        self.audio_rx = Some(rx);
        self.capturing = true;
        Ok(())
    }

    fn take_audio(&mut self) -> Option<mpsc::Receiver<AudioChunk>> {
        self.audio_rx.take()
    }

    fn frames(&self) -> watch::Receiver<Option<CameraFrame>> {
        self.frame_tx.subscribe()
    }

    async fn release(&mut self) {
        if self.capturing {
            self.log.push("release".to_string());
            self.audio_tx = None;
            self.audio_rx = None;
            self.frame_tx.send_replace(None);
            self.capturing = false;
        }
    }

    fn is_capturing(&self) -> bool {
        self.capturing
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Per-session handles the test uses to inject events and observe output
struct SessionProbe {
    events: mpsc::Sender<LiveEvent>,
    goals: mpsc::UnboundedReceiver<String>,
}

struct MockTransport {
    connects: AtomicUsize,
    fail: AtomicBool,
    probe_tx: mpsc::UnboundedSender<SessionProbe>,
}

impl MockTransport {
    fn new(fail: bool) -> (Arc<Self>, mpsc::UnboundedReceiver<SessionProbe>) {
        let (probe_tx, probe_rx) = mpsc::unbounded_channel();
        let transport = Arc::new(Self {
            connects: AtomicUsize::new(0),
            fail: AtomicBool::new(fail),
            probe_tx,
        });
        (transport, probe_rx)
    }

    fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl SessionTransport for MockTransport {
    async fn connect(
        &self,
        _open: OpenConfig,
    ) -> Result<(Box<dyn SessionHandle>, mpsc::Receiver<LiveEvent>), SessionError> {
        self.connects.fetch_add(1, Ordering::SeqCst);

        if self.fail.load(Ordering::SeqCst) {
            return Err(SessionError::Transport("connection refused".to_string()));
        }

        let (events_tx, events_rx) = mpsc::channel(32);
        let (goals_tx, goals_rx) = mpsc::unbounded_channel();

        let _ = self.probe_tx.send(SessionProbe {
            events: events_tx,
            goals: goals_rx,
        });

        Ok((Box::new(MockHandle { goals_tx }), events_rx))
    }
}

struct MockHandle {
    goals_tx: mpsc::UnboundedSender<String>,
}

#[async_trait::async_trait]
impl SessionHandle for MockHandle {
    async fn send(&self, _chunk: MediaChunk) {}

    async fn set_goal(&self, goal: &str) {
        let _ = self.goals_tx.send(goal.to_string());
    }

    async fn disconnect(&self) {}
}

struct Harness {
    controller: SessionController,
    transport: Arc<MockTransport>,
    probes: mpsc::UnboundedReceiver<SessionProbe>,
    log: Arc<BackendLog>,
    _tmp: TempDir,
}

fn harness(fail_acquires: usize, fail_connect: bool) -> Harness {
    let tmp = TempDir::new().expect("temp dir");

    let mut cfg = Config::default();
    cfg.recording.output_dir = tmp.path().join("recordings").display().to_string();
    cfg.session.settle_delay_ms = 10;

    let log = Arc::new(BackendLog::default());
    let backend = Box::new(MockBackend::new(log.clone(), fail_acquires));
    let (transport, probes) = MockTransport::new(fail_connect);

    let controller = SessionController::new(
        cfg,
        backend,
        transport.clone(),
        Arc::new(MemoryHistory::new()),
        Arc::new(LogHapticSink),
    );

    Harness {
        controller,
        transport,
        probes,
        log,
        _tmp: tmp,
    }
}

async fn wait_for_status(rx: &mut watch::Receiver<SessionStatus>, want: SessionStatus) {
    timeout(Duration::from_secs(2), async {
        loop {
            if *rx.borrow_and_update() == want {
                return;
            }
            rx.changed().await.expect("status channel closed");
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {}", want));
}

async fn wait_until(mut check: impl FnMut() -> bool) {
    timeout(Duration::from_secs(2), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition never held");
}

#[tokio::test]
async fn test_start_reports_connecting_before_open() -> Result<()> {
    let mut h = harness(0, false);
    let mut status = h.controller.watch_status();

    h.controller.start().await?;
    assert_eq!(h.controller.status(), SessionStatus::Connecting);

    let probe = h.probes.recv().await.expect("session opened");
    probe.events.send(LiveEvent::Opened).await?;
    wait_for_status(&mut status, SessionStatus::Connected).await;

    Ok(())
}

#[tokio::test]
async fn test_start_while_active_is_noop() -> Result<()> {
    let mut h = harness(0, false);

    h.controller.start().await?;
    let probe = h.probes.recv().await.expect("session opened");
    probe.events.send(LiveEvent::Opened).await?;

    h.controller.start().await?;
    h.controller.start().await?;

    assert_eq!(h.transport.connect_count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_stop_releases_devices_and_is_idempotent() -> Result<()> {
    let mut h = harness(0, false);

    h.controller.start().await?;
    let probe = h.probes.recv().await.expect("session opened");
    probe.events.send(LiveEvent::Opened).await?;

    h.controller.stop().await;
    assert_eq!(h.controller.status(), SessionStatus::Disconnected);

    // Second stop releases nothing twice and raises nothing
    h.controller.stop().await;
    assert_eq!(h.controller.status(), SessionStatus::Disconnected);

    let releases = h
        .log
        .snapshot()
        .iter()
        .filter(|e| *e == "release")
        .count();
    assert_eq!(releases, 1);
    Ok(())
}

#[tokio::test]
async fn test_acquire_failure_fails_to_error_then_restarts() -> Result<()> {
    // Both the preferred and the fallback acquisition are rejected
    let h = harness(2, false);

    assert!(h.controller.start().await.is_err());
    assert_eq!(h.controller.status(), SessionStatus::Error);
    assert_eq!(h.transport.connect_count(), 0);

    // Error is a legal restart point
    h.controller.start().await?;
    assert_eq!(h.controller.status(), SessionStatus::Connecting);
    Ok(())
}

#[tokio::test]
async fn test_acquire_fallback_relaxes_constraints() -> Result<()> {
    let h = harness(1, false);

    h.controller.start().await?;

    let log = h.log.snapshot();
    assert_eq!(log[0], "reject 640x480");
    assert!(log[1].starts_with("acquire 0x0"), "got {:?}", log);
    Ok(())
}

#[tokio::test]
async fn test_transport_connect_failure_sets_error_and_releases() -> Result<()> {
    let h = harness(0, true);

    assert!(h.controller.start().await.is_err());
    assert_eq!(h.controller.status(), SessionStatus::Error);

    let log = h.log.snapshot();
    assert!(log.contains(&"release".to_string()), "got {:?}", log);
    Ok(())
}

#[tokio::test]
async fn test_transport_error_event_tears_down_to_error() -> Result<()> {
    let mut h = harness(0, false);
    let mut status = h.controller.watch_status();

    h.controller.start().await?;
    let probe = h.probes.recv().await.expect("session opened");
    probe.events.send(LiveEvent::Opened).await?;
    wait_for_status(&mut status, SessionStatus::Connected).await;

    probe
        .events
        .send(LiveEvent::Error("engine went away".to_string()))
        .await?;
    wait_for_status(&mut status, SessionStatus::Error).await;

    // Devices come back even though the user never pressed stop
    let log = h.log.clone();
    wait_until(move || log.snapshot().contains(&"release".to_string())).await;

    // No silent drop to Disconnected; the user must restart explicitly
    assert_eq!(h.controller.status(), SessionStatus::Error);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_restart_racing_error_teardown_keeps_new_session() -> Result<()> {
    // The error teardown runs as its own task; a restart issued right
    // after the Error status may beat it to the operation lock. Either
    // ordering must leave the second session healthy.
    for _ in 0..10 {
        let mut h = harness(0, false);
        let mut status = h.controller.watch_status();

        h.controller.start().await?;
        let probe = h.probes.recv().await.expect("session opened");
        probe.events.send(LiveEvent::Opened).await?;
        wait_for_status(&mut status, SessionStatus::Connected).await;

        probe
            .events
            .send(LiveEvent::Error("engine went away".to_string()))
            .await?;
        wait_for_status(&mut status, SessionStatus::Error).await;

        // Restart immediately, racing the spawned teardown
        h.controller.start().await?;
        let probe2 = h.probes.recv().await.expect("second session opened");
        probe2.events.send(LiveEvent::Opened).await?;
        wait_for_status(&mut status, SessionStatus::Connected).await;

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(h.controller.status(), SessionStatus::Connected);
        assert_eq!(h.transport.connect_count(), 2);

        // The errored session's devices were released exactly once, and
        // never after the new session acquired its own
        let log = h.log.snapshot();
        let last_acquire = log
            .iter()
            .rposition(|e| e.starts_with("acquire"))
            .expect("reacquired");
        assert!(
            !log[last_acquire..].iter().any(|e| e == "release"),
            "got {:?}",
            log
        );
        assert_eq!(log.iter().filter(|e| *e == "release").count(), 1);
    }
    Ok(())
}

#[tokio::test]
async fn test_set_goal_updates_in_band_without_reconnect() -> Result<()> {
    let mut h = harness(0, false);
    let mut status = h.controller.watch_status();

    h.controller.start().await?;
    let mut probe = h.probes.recv().await.expect("session opened");
    probe.events.send(LiveEvent::Opened).await?;
    wait_for_status(&mut status, SessionStatus::Connected).await;

    h.controller.set_goal("Find the exit").await;

    let goal = timeout(Duration::from_secs(2), probe.goals.recv())
        .await?
        .expect("goal delivered");
    assert_eq!(goal, "Find the exit");
    assert_eq!(h.transport.connect_count(), 1);
    assert_eq!(h.controller.status(), SessionStatus::Connected);
    Ok(())
}

#[tokio::test]
async fn test_switch_facing_restarts_with_toggled_camera() -> Result<()> {
    let mut h = harness(0, false);
    let mut status = h.controller.watch_status();

    h.controller.start().await?;
    let probe = h.probes.recv().await.expect("session opened");
    probe.events.send(LiveEvent::Opened).await?;
    wait_for_status(&mut status, SessionStatus::Connected).await;

    h.controller.switch_facing().await?;

    let probe2 = h.probes.recv().await.expect("second session opened");
    probe2.events.send(LiveEvent::Opened).await?;
    wait_for_status(&mut status, SessionStatus::Connected).await;

    assert_eq!(h.transport.connect_count(), 2);

    // Old devices are fully released before the new acquisition
    let log = h.log.snapshot();
    let release_at = log.iter().position(|e| e == "release").expect("released");
    let reacquire_at = log
        .iter()
        .rposition(|e| e.starts_with("acquire"))
        .expect("reacquired");
    assert!(release_at < reacquire_at, "got {:?}", log);
    assert!(log[reacquire_at].contains("User"), "got {:?}", log);
    Ok(())
}

#[tokio::test]
async fn test_switch_facing_while_idle_only_flips_preference() -> Result<()> {
    let h = harness(0, false);

    h.controller.switch_facing().await?;

    assert_eq!(h.transport.connect_count(), 0);
    assert_eq!(h.controller.status(), SessionStatus::Disconnected);
    assert!(h.log.snapshot().is_empty());
    Ok(())
}
