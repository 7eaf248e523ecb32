//! Remote session client
//!
//! One logical session to the reasoning engine. The transport delivers
//! inbound events (open/close/error/audio/transcript) as a typed stream
//! consumed by the controller's event loop; outbound media goes through a
//! [`SessionHandle`] that tolerates stray sends after close.

pub mod client;
pub mod protocol;

pub use client::GeminiLiveClient;
pub use protocol::{MediaChunk, SYSTEM_INSTRUCTION_TEMPLATE};

use crate::error::SessionError;
use tokio::sync::mpsc;

/// Who produced a transcript fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptSource {
    User,
    Engine,
}

/// A partial or complete piece of narration text
#[derive(Debug, Clone)]
pub struct TranscriptEvent {
    pub source: TranscriptSource,
    pub text: String,
    pub is_final: bool,
}

/// Inbound events delivered by the remote session
#[derive(Debug, Clone)]
pub enum LiveEvent {
    /// Session is open and ready for media
    Opened,
    /// Connection ended; no payload guarantees
    Closed,
    /// Transport-level failure; the session must transition to Error
    Error(String),
    /// Synthesized audio payload (raw PCM at the engine's output rate)
    Audio(Vec<u8>),
    Transcript(TranscriptEvent),
}

/// Session open configuration
#[derive(Debug, Clone)]
pub struct OpenConfig {
    pub model: String,
    pub system_instruction: String,
    pub voice: String,
}

/// Opens logical sessions to the reasoning engine
#[async_trait::async_trait]
pub trait SessionTransport: Send + Sync {
    /// Open a session. Returns the outbound handle and the inbound event
    /// stream. Any rejection is terminal for this attempt; there is no
    /// automatic reconnect.
    async fn connect(
        &self,
        open: OpenConfig,
    ) -> Result<(Box<dyn SessionHandle>, mpsc::Receiver<LiveEvent>), SessionError>;
}

/// Outbound side of an open session
#[async_trait::async_trait]
pub trait SessionHandle: Send + Sync {
    /// Enqueue a media chunk. A stray call after close is a silent no-op.
    async fn send(&self, chunk: MediaChunk);

    /// Update the goal context mid-session without reconnecting.
    async fn set_goal(&self, goal: &str);

    /// Drop the session handle. Broader teardown ordering is the state
    /// machine's responsibility.
    async fn disconnect(&self);
}

/// Render the system instruction for a goal
pub fn system_instruction_for(goal: &str) -> String {
    SYSTEM_INSTRUCTION_TEMPLATE.replace("{{USER_GOAL}}", goal)
}
