//! Live session lifecycle

pub mod config;
pub mod controller;
pub mod events;
pub mod state;

pub use config::{LiveConfig, ResponseModality};
pub use controller::{LiveAudioSession, SessionHandle};
pub use events::{SessionCommand, SessionEvent, SessionUpdate};
pub use state::{SessionState, SessionStatus, SharedStatus};
