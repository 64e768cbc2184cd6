//! Session state shared between the client facade and the dispatch worker.
//!
//! The state byte is atomic so `write` can check connectivity without
//! taking a lock; the identity returned by the collector handshake sits
//! behind an `RwLock` because it is read rarely.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use parking_lot::RwLock;

/// Lifecycle state of the logical session to the collector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
    Failed = 3,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Connecting,
            2 => Self::Connected,
            3 => Self::Failed,
            _ => Self::Disconnected,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Identity returned by the collector during the handshake.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionInfo {
    /// Identifier the collector assigned to (or resumed for) this client.
    pub client_id: String,
    /// Version string reported by the collector.
    pub server_version: String,
}

/// Shared session handle. One per client, cloned into the dispatch
/// worker via `Arc`.
pub struct Session {
    state: AtomicU8,
    info: RwLock<Option<SessionInfo>>,
}

impl Session {
    /// Create a session in the `Disconnected` state.
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(SessionState::Disconnected as u8),
            info: RwLock::new(None),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Transition to `state`.
    pub fn set_state(&self, state: SessionState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// `true` while records may be dispatched.
    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Connected
    }

    /// Identity from the most recent successful handshake.
    pub fn info(&self) -> Option<SessionInfo> {
        self.info.read().clone()
    }

    /// Record the identity returned by a successful handshake.
    pub fn set_info(&self, info: SessionInfo) {
        *self.info.write() = Some(info);
    }

    /// Drop the stored identity on disconnect or failure.
    pub fn clear_info(&self) {
        *self.info.write() = None;
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state())
            .field("info", &self.info())
            .finish()
    }
}
