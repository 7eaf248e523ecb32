//! Session lifecycle
//!
//! This module provides the live session orchestration:
//! - `SessionStatus`: the four-state lifecycle machine
//! - `SessionContext`: shared mutable session state behind defined setters
//! - `SessionController`: start/stop/switch orchestration and teardown

mod context;
mod controller;

pub use context::SessionContext;
pub use controller::SessionController;

use std::fmt;

/// Lifecycle state of the one active session.
///
/// Legal transitions:
/// - Disconnected -> Connecting (user starts; capture acquisition begins)
/// - Connecting -> Connected (remote session signals open)
/// - Connecting | Connected -> Error (acquisition or transport failure)
/// - Connected | Connecting | Error -> Disconnected (user stop / teardown)
///
/// There is no Disconnected -> Connected shortcut, and Error is terminal
/// until the user explicitly restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl SessionStatus {
    /// A new session may only start from these states
    pub fn can_start(self) -> bool {
        matches!(self, SessionStatus::Disconnected | SessionStatus::Error)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionStatus::Disconnected => "disconnected",
            SessionStatus::Connecting => "connecting",
            SessionStatus::Connected => "connected",
            SessionStatus::Error => "error",
        };
        f.write_str(s)
    }
}
