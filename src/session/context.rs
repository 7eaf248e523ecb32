use super::SessionStatus;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::sync::watch;
use tracing::info;

/// Shared session state read from several concurrent tasks.
///
/// Every mutable cross-task field lives here behind a defined setter; the
/// capture, uplink, and event-loop tasks each hold an `Arc` to this record
/// instead of ambient globals.
pub struct SessionContext {
    status_tx: watch::Sender<SessionStatus>,
    mic_enabled: AtomicBool,
    video_enabled: AtomicBool,
    goal: Mutex<String>,
    caption: Mutex<String>,
    caption_limit: usize,
}

impl SessionContext {
    pub fn new(goal: impl Into<String>, caption_limit: usize) -> Self {
        let (status_tx, _) = watch::channel(SessionStatus::Disconnected);
        Self {
            status_tx,
            mic_enabled: AtomicBool::new(true),
            video_enabled: AtomicBool::new(true),
            goal: Mutex::new(goal.into()),
            caption: Mutex::new(String::new()),
            caption_limit,
        }
    }

    pub fn status(&self) -> SessionStatus {
        *self.status_tx.borrow()
    }

    /// Watch channel for status changes (used by callers awaiting a state)
    pub fn watch_status(&self) -> watch::Receiver<SessionStatus> {
        self.status_tx.subscribe()
    }

    pub fn set_status(&self, status: SessionStatus) {
        let previous = self.status();
        if previous != status {
            info!("Session status: {} -> {}", previous, status);
        }
        self.status_tx.send_replace(status);
    }

    pub fn mic_enabled(&self) -> bool {
        self.mic_enabled.load(Ordering::SeqCst)
    }

    pub fn set_mic_enabled(&self, enabled: bool) {
        self.mic_enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn video_enabled(&self) -> bool {
        self.video_enabled.load(Ordering::SeqCst)
    }

    pub fn set_video_enabled(&self, enabled: bool) {
        self.video_enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn goal(&self) -> String {
        self.goal.lock().unwrap().clone()
    }

    pub fn set_goal(&self, goal: &str) {
        *self.goal.lock().unwrap() = goal.to_string();
    }

    /// Append an engine transcript fragment to the rolling caption buffer,
    /// keeping only the most recent characters. Returns the new caption.
    pub fn push_caption(&self, fragment: &str) -> String {
        let mut caption = self.caption.lock().unwrap();
        caption.push_str(fragment);

        let count = caption.chars().count();
        if count > self.caption_limit {
            *caption = caption.chars().skip(count - self.caption_limit).collect();
        }

        caption.clone()
    }

    pub fn caption(&self) -> String {
        self.caption.lock().unwrap().clone()
    }

    /// Transcript state does not survive across sessions
    pub fn clear_caption(&self) {
        self.caption.lock().unwrap().clear();
    }
}
