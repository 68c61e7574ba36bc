//! Lifecycle state of a live session and the snapshot shared with callers

use parking_lot::RwLock;
use std::sync::Arc;

/// Session lifecycle: `Idle -> Starting -> Live -> Idle`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SessionState {
    /// No transport, no microphone, empty schedule
    #[default]
    Idle,
    /// Microphone acquired or being acquired, transport not yet open
    Starting,
    /// Audio flowing in both directions
    Live,
}

impl SessionState {
    pub fn is_idle(&self) -> bool {
        matches!(self, SessionState::Idle)
    }

    pub fn is_starting(&self) -> bool {
        matches!(self, SessionState::Starting)
    }

    pub fn is_live(&self) -> bool {
        matches!(self, SessionState::Live)
    }

    /// Holding resources (not idle)
    pub fn is_active(&self) -> bool {
        !self.is_idle()
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "Idle"),
            SessionState::Starting => write!(f, "Starting"),
            SessionState::Live => write!(f, "Live"),
        }
    }
}

/// What a UI needs to render the session controls
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionStatus {
    pub state: SessionState,
    /// Start in progress
    pub is_loading: bool,
    /// Last user-facing error, cleared on the next start
    pub error: Option<String>,
    pub frames_sent: u64,
    pub chunks_played: u64,
}

/// Thread-safe status cell written by the session, read by anyone
#[derive(Clone, Debug, Default)]
pub struct SharedStatus {
    inner: Arc<RwLock<SessionStatus>>,
}

impl SharedStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> SessionStatus {
        self.inner.read().clone()
    }

    pub fn update<F: FnOnce(&mut SessionStatus)>(&self, f: F) {
        f(&mut self.inner.write());
    }
}
