use super::{SessionContext, SessionStatus};
use crate::capture::{acquire_with_fallback, CameraFacing, CaptureBackend, CaptureConstraints};
use crate::config::Config;
use crate::haptics::{self, HapticSink};
use crate::history::HistorySink;
use crate::playback::{self, MonotonicClock, PlaybackScheduler};
use crate::recorder::{self, ActiveRecording, MixFrame, SessionRecorder};
use crate::transport::{
    system_instruction_for, LiveEvent, OpenConfig, SessionHandle, SessionTransport,
    TranscriptSource,
};
use crate::uplink;
use anyhow::{Context, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Owns one live guidance session's lifecycle.
///
/// Start/stop/switch requests are serialized behind a single operation lock,
/// so a start issued while a teardown is still running waits and then
/// applies instead of racing it.
pub struct SessionController {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    ctx: Arc<SessionContext>,
    config: Config,
    backend: Mutex<Box<dyn CaptureBackend>>,
    transport: Arc<dyn SessionTransport>,
    history: Arc<dyn HistorySink>,
    haptics: Arc<dyn HapticSink>,
    /// Serializes start/stop/teardown
    op_lock: Mutex<()>,
    active: Mutex<Option<ActiveSession>>,
    facing: StdMutex<CameraFacing>,
    /// Bumped on every start; lets a session's own error teardown tell
    /// whether a restart has already replaced it
    epoch: AtomicU64,
}

/// Resources owned by one running session
struct ActiveSession {
    epoch: u64,
    handle: Arc<dyn SessionHandle>,
    recording: Option<ActiveRecording>,
    scheduler: Arc<StdMutex<PlaybackScheduler>>,
    audio_pump: JoinHandle<()>,
    /// Started by the event loop once the remote session opens
    video_sampler: Arc<StdMutex<Option<JoinHandle<()>>>>,
    event_loop: Option<JoinHandle<()>>,
}

impl SessionController {
    pub fn new(
        config: Config,
        backend: Box<dyn CaptureBackend>,
        transport: Arc<dyn SessionTransport>,
        history: Arc<dyn HistorySink>,
        haptics: Arc<dyn HapticSink>,
    ) -> Self {
        let ctx = Arc::new(SessionContext::new(
            config.session.default_goal.clone(),
            config.session.caption_limit,
        ));

        Self {
            inner: Arc::new(ControllerInner {
                ctx,
                config,
                backend: Mutex::new(backend),
                transport,
                history,
                haptics,
                op_lock: Mutex::new(()),
                active: Mutex::new(None),
                facing: StdMutex::new(CameraFacing::Environment),
                epoch: AtomicU64::new(0),
            }),
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.inner.ctx.status()
    }

    pub fn watch_status(&self) -> watch::Receiver<SessionStatus> {
        self.inner.ctx.watch_status()
    }

    pub fn context(&self) -> Arc<SessionContext> {
        self.inner.ctx.clone()
    }

    pub fn facing(&self) -> CameraFacing {
        *self.inner.facing.lock().unwrap()
    }

    /// Start a session. A no-op while one is already connecting/connected;
    /// allowed from Disconnected and from Error (explicit restart).
    pub async fn start(&self) -> Result<()> {
        let _guard = self.inner.op_lock.lock().await;

        let status = self.inner.ctx.status();
        if !status.can_start() {
            warn!("Session already active ({}), ignoring start", status);
            return Ok(());
        }

        match self.inner.clone().start_locked().await {
            Ok(()) => Ok(()),
            Err(e) => {
                error!("Failed to start session: {}", e);
                self.inner.ctx.set_status(SessionStatus::Error);
                self.inner.teardown_locked().await;
                Err(e)
            }
        }
    }

    /// Stop the session and tear everything down. Idempotent: a second stop
    /// while already disconnected releases nothing twice and raises nothing.
    pub async fn stop(&self) {
        let _guard = self.inner.op_lock.lock().await;
        self.inner.teardown_locked().await;
        self.inner.ctx.set_status(SessionStatus::Disconnected);
    }

    /// Start/stop toggle (the spacebar behavior)
    pub async fn toggle(&self) -> Result<()> {
        match self.inner.ctx.status() {
            SessionStatus::Connected | SessionStatus::Connecting => {
                self.stop().await;
                Ok(())
            }
            _ => self.start().await,
        }
    }

    /// Switch the preferred camera. Live device reconfiguration is not a
    /// separate state: while connected this is a full teardown, a settle
    /// delay, then an ordinary restart under the new constraints.
    pub async fn switch_facing(&self) -> Result<()> {
        let was_connected = self.inner.ctx.status() == SessionStatus::Connected;

        if was_connected {
            self.stop().await;
            self.toggle_facing();
            tokio::time::sleep(std::time::Duration::from_millis(
                self.inner.config.session.settle_delay_ms,
            ))
            .await;
            self.start().await
        } else {
            self.toggle_facing();
            Ok(())
        }
    }

    fn toggle_facing(&self) {
        let mut facing = self.inner.facing.lock().unwrap();
        *facing = facing.toggled();
        info!("Camera facing set to {:?}", *facing);
    }

    /// Update the navigation goal. Never reconnects; the live session gets
    /// the update in-band.
    pub async fn set_goal(&self, goal: &str) {
        self.inner.ctx.set_goal(goal);

        let handle = {
            let active = self.inner.active.lock().await;
            active.as_ref().map(|a| a.handle.clone())
        };
        if let Some(handle) = handle {
            handle.set_goal(goal).await;
        }
    }

    pub fn set_mic_enabled(&self, enabled: bool) {
        self.inner.ctx.set_mic_enabled(enabled);
    }

    pub fn set_video_enabled(&self, enabled: bool) {
        self.inner.ctx.set_video_enabled(enabled);
    }
}

impl ControllerInner {
    async fn start_locked(self: Arc<Self>) -> Result<()> {
        // A session that errored may still be registered if the user
        // restarts before its teardown task wins the operation lock
        if self.active.lock().await.is_some() {
            self.teardown_locked().await;
        }
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;

        self.ctx.clear_caption();
        self.ctx.set_status(SessionStatus::Connecting);

        let constraints = CaptureConstraints {
            width: self.config.video.width,
            height: self.config.video.height,
            frame_rate: self.config.video.frame_rate,
            facing: *self.facing.lock().unwrap(),
        };

        let (audio_rx, frames) = {
            let mut backend = self.backend.lock().await;
            acquire_with_fallback(backend.as_mut(), &constraints).await?;
            let audio_rx = backend
                .take_audio()
                .context("capture backend produced no audio stream")?;
            (audio_rx, backend.frames())
        };

        let goal = self.ctx.goal();

        // Recording is best-effort: guidance continues without it
        let recorder =
            SessionRecorder::new(&self.config.recording, self.config.audio.input_sample_rate);
        let recording = match recorder.start(&goal) {
            Ok(r) => Some(r),
            Err(e) => {
                warn!("Recording unavailable, continuing without it: {}", e);
                None
            }
        };
        let mix_tx = recording.as_ref().map(|r| r.mix_sender());

        let open = OpenConfig {
            model: self.config.engine.model.clone(),
            system_instruction: system_instruction_for(&goal),
            voice: self.config.engine.voice.clone(),
        };

        let (handle, events) = match self.transport.connect(open).await {
            Ok(pair) => pair,
            Err(e) => {
                // Too short to meet the artifact threshold; discards itself
                if let Some(recording) = recording {
                    let _ = recording.stop().await;
                }
                return Err(e.into());
            }
        };
        let handle: Arc<dyn SessionHandle> = Arc::from(handle);

        let scheduler = Arc::new(StdMutex::new(PlaybackScheduler::new(
            Arc::new(MonotonicClock::new()),
            self.config.audio.output_sample_rate,
        )));

        let audio_pump =
            uplink::spawn_audio_pump(self.ctx.clone(), audio_rx, handle.clone(), mix_tx.clone());

        let video_sampler = Arc::new(StdMutex::new(None));
        let event_loop = self.clone().spawn_event_loop(
            epoch,
            events,
            handle.clone(),
            frames,
            scheduler.clone(),
            mix_tx,
            video_sampler.clone(),
        );

        let mut active = self.active.lock().await;
        *active = Some(ActiveSession {
            epoch,
            handle,
            recording,
            scheduler,
            audio_pump,
            video_sampler,
            event_loop: Some(event_loop),
        });

        info!("Session started (goal: {})", goal);
        Ok(())
    }

    /// Dedicated consumption loop for inbound session events.
    fn spawn_event_loop(
        self: Arc<Self>,
        epoch: u64,
        mut events: mpsc::Receiver<LiveEvent>,
        handle: Arc<dyn SessionHandle>,
        frames: tokio::sync::watch::Receiver<Option<crate::capture::CameraFrame>>,
        scheduler: Arc<StdMutex<PlaybackScheduler>>,
        mix_tx: Option<mpsc::Sender<MixFrame>>,
        video_sampler: Arc<StdMutex<Option<JoinHandle<()>>>>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    LiveEvent::Opened => {
                        self.ctx.set_status(SessionStatus::Connected);

                        let task = uplink::spawn_video_sampler(
                            self.ctx.clone(),
                            frames.clone(),
                            handle.clone(),
                            self.config.video.clone(),
                        );
                        if let Some(old) = video_sampler.lock().unwrap().replace(task) {
                            old.abort();
                        }
                    }
                    LiveEvent::Audio(payload) => {
                        let segment = {
                            let mut scheduler = scheduler.lock().unwrap();
                            playback::schedule_or_skip(&mut scheduler, &payload)
                        };

                        // Recordings capture the guidance the user heard
                        if let (Some(segment), Some(tx)) = (segment, mix_tx.as_ref()) {
                            let samples = recorder::resample_linear(
                                &segment.samples,
                                segment.sample_rate,
                                self.config.audio.input_sample_rate,
                            );
                            let timestamp_ms = (segment.start_secs * 1000.0) as u64;
                            let _ = tx.send(MixFrame::guidance(samples, timestamp_ms)).await;
                        }
                    }
                    LiveEvent::Transcript(transcript) => {
                        if transcript.source != TranscriptSource::Engine {
                            continue;
                        }

                        let caption = self.ctx.push_caption(&transcript.text);
                        debug!("Caption: {}", caption);

                        if let Some(category) = haptics::classify(&transcript.text) {
                            self.haptics.vibrate(&category.pattern());
                        }
                    }
                    LiveEvent::Error(e) => {
                        error!("Transport error: {}", e);
                        self.ctx.set_status(SessionStatus::Error);

                        // Teardown runs outside this task so it can await the
                        // operation lock without blocking event delivery
                        let inner = self.clone();
                        tokio::spawn(async move {
                            inner.teardown_after_error(epoch).await;
                        });
                        break;
                    }
                    LiveEvent::Closed => {
                        debug!("Remote session closed");
                        break;
                    }
                }
            }
        })
    }

    /// Tear down after a transport failure; the status stays Error until the
    /// user explicitly restarts.
    ///
    /// A restart may win the operation lock first and replace the session
    /// (start handles the leftover registration itself); tearing down then
    /// would destroy the new session's resources, so this only acts if the
    /// errored session is still the active one.
    async fn teardown_after_error(self: Arc<Self>, epoch: u64) {
        let _guard = self.op_lock.lock().await;

        let superseded = {
            let active = self.active.lock().await;
            !matches!(active.as_ref(), Some(a) if a.epoch == epoch)
        };
        if superseded {
            debug!("Skipping teardown for superseded session");
            return;
        }

        self.teardown_locked().await;
    }

    /// Unconditional teardown. Every step runs even when an earlier one
    /// fails, in a fixed order: recorder, video timer, capture devices,
    /// playback path, transport handle.
    async fn teardown_locked(&self) {
        let mut active = self.active.lock().await.take();

        if let Some(active) = active.as_mut() {
            if let Some(recording) = active.recording.take() {
                if let Some(artifact) = recording.stop().await {
                    if let Err(e) = self.history.save(artifact).await {
                        error!("Failed to save recording: {}", e);
                    }
                }
            }

            if let Some(task) = active.video_sampler.lock().unwrap().take() {
                task.abort();
            }
        }

        // Device locks are freed even if the session never fully started
        self.backend.lock().await.release().await;

        if let Some(mut active) = active {
            active.scheduler.lock().unwrap().close();
            active.handle.disconnect().await;

            // Both end on their own once their channels close; abort makes
            // teardown deterministic
            active.audio_pump.abort();
            if let Some(event_loop) = active.event_loop.take() {
                event_loop.abort();
            }
        }

        debug!("Teardown complete");
    }
}
