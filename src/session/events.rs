//! Messages flowing into and out of a live session
//!
//! Every producer (transport tasks, capture thread, output device) posts into
//! one inbox; the session is the only consumer. Producers tied to a particular
//! session stamp their events with its epoch so leftovers from a torn-down
//! session can be recognised and dropped.

use crate::audio::frames::AudioFrame;
use crate::playback::PlaybackId;
use crate::session::state::SessionState;
use crate::transcript::TranscriptTurn;
use crate::transport::TransportEvent;
use tokio::sync::mpsc::UnboundedSender;

/// Monotonic counter identifying one start of a session
pub type Epoch = u64;

/// Everything the session reacts to
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Transport { epoch: Epoch, event: TransportEvent },
    Capture { epoch: Epoch, frame: AudioFrame },
    PlaybackEnded(PlaybackId),
}

/// Caller requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    /// Start a conversation (no-op unless idle)
    Start,

    /// Stop the conversation and release all devices
    Stop,

    /// Stop and end the session loop
    Shutdown,
}

/// Notifications for the caller
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    StateChanged(SessionState),

    /// A turn with content was finalized
    TurnCompleted(TranscriptTurn),

    /// The model's speech was cut off by the user
    Interrupted,

    /// User-facing error message
    Error(String),

    /// The session loop has exited
    Shutdown,
}

pub type Inbox = UnboundedSender<SessionEvent>;

/// Where a transport delivers its events
#[derive(Debug, Clone)]
pub struct TransportSink {
    epoch: Epoch,
    inbox: Inbox,
}

impl TransportSink {
    pub fn new(epoch: Epoch, inbox: Inbox) -> Self {
        Self { epoch, inbox }
    }

    /// Post an event; returns false once the session is gone
    pub fn emit(&self, event: TransportEvent) -> bool {
        self.inbox
            .send(SessionEvent::Transport {
                epoch: self.epoch,
                event,
            })
            .is_ok()
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }
}

/// Where a microphone delivers finished frames
#[derive(Debug, Clone)]
pub struct FrameSink {
    epoch: Epoch,
    inbox: Inbox,
}

impl FrameSink {
    pub fn new(epoch: Epoch, inbox: Inbox) -> Self {
        Self { epoch, inbox }
    }

    /// Post a frame; returns false once the session is gone
    pub fn push(&self, frame: AudioFrame) -> bool {
        self.inbox
            .send(SessionEvent::Capture {
                epoch: self.epoch,
                frame,
            })
            .is_ok()
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }
}

/// Where an output device reports finished playback units
#[derive(Debug, Clone)]
pub struct PlaybackSink {
    inbox: Inbox,
}

impl PlaybackSink {
    pub fn new(inbox: Inbox) -> Self {
        Self { inbox }
    }

    pub fn ended(&self, id: PlaybackId) {
        let _ = self.inbox.send(SessionEvent::PlaybackEnded(id));
    }
}
