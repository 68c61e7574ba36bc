//! Studio Live - realtime voice conversations with a hosted generative model
//!
//! The crate is built around [`session::LiveAudioSession`], which owns the
//! microphone, the realtime transport and the playback scheduler for one
//! conversation at a time.

pub mod audio;
pub mod playback;
pub mod session;
pub mod transcript;
pub mod transport;

pub use session::{
    LiveAudioSession, LiveConfig, SessionCommand, SessionHandle, SessionState, SessionStatus,
    SessionUpdate,
};
pub use transcript::{TranscriptStore, TranscriptTurn};
pub use transport::GenAiClient;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LiveError {
    #[error("Microphone permission denied: {0}")]
    PermissionDenied(String),

    #[error("Audio device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Transport closed by remote")]
    TransportClosed,

    #[error("Audio decode error: {0}")]
    DecodeError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Audio processing error: {0}")]
    AudioProcessingError(String),

    #[error("Channel error: {0}")]
    ChannelError(String),

    #[error("IO error: {0}")]
    IOError(String),
}

impl From<std::io::Error> for LiveError {
    fn from(e: std::io::Error) -> Self {
        LiveError::IOError(e.to_string())
    }
}

impl LiveError {
    /// Check if the live conversation can continue after this error
    pub fn is_recoverable(&self) -> bool {
        match self {
            // The user has to grant access or plug in a device
            LiveError::PermissionDenied(_) => false,
            LiveError::DeviceUnavailable(_) => false,
            // Transport failures end the session, no reconnect
            LiveError::TransportError(_) => false,
            LiveError::TransportClosed => false,
            // A bad chunk is skipped
            LiveError::DecodeError(_) => true,
            LiveError::ConfigError(_) => false,
            LiveError::AudioProcessingError(_) => true,
            LiveError::ChannelError(_) => false,
            LiveError::IOError(_) => false,
        }
    }

    /// Get a user-friendly description
    pub fn user_message(&self) -> String {
        match self {
            LiveError::PermissionDenied(_) => {
                "Microphone access was denied. Please allow microphone access and try again."
                    .to_string()
            }
            LiveError::DeviceUnavailable(_) => {
                "No usable audio device found. Please check your microphone/speakers.".to_string()
            }
            LiveError::TransportError(_) => "A connection error occurred.".to_string(),
            LiveError::TransportClosed => "The conversation has ended.".to_string(),
            LiveError::DecodeError(_) => "Received audio could not be played.".to_string(),
            LiveError::ConfigError(_) => {
                "Configuration error. Please check settings and credentials.".to_string()
            }
            LiveError::AudioProcessingError(_) => {
                "Audio processing failed. Please try again.".to_string()
            }
            LiveError::ChannelError(_) => {
                "Internal communication error. Please restart the application.".to_string()
            }
            LiveError::IOError(_) => "File system error occurred.".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LiveError>;
