//! Configuration for a live session
//!
//! Fixed for the lifetime of one session; a new start picks up changes.

use crate::audio::device::CaptureFormat;
use crate::audio::pcm::pcm_mime_type;
use crate::{LiveError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Modality the model answers in
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResponseModality {
    #[default]
    Audio,
}

impl ResponseModality {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseModality::Audio => "AUDIO",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveConfig {
    /// Target model identifier
    pub model: String,

    /// Prebuilt voice the model speaks with
    pub voice: String,

    pub response_modality: ResponseModality,

    /// Request a transcription stream of the user's speech
    pub input_transcription: bool,

    /// Request a transcription stream of the model's speech
    pub output_transcription: bool,

    pub system_instruction: Option<String>,

    /// Sample rate of outbound microphone frames
    pub input_sample_rate: u32,

    /// Sample rate of inbound model audio
    pub output_sample_rate: u32,

    /// Samples per outbound frame
    pub frame_size: usize,

    /// Outbound frames allowed to wait for the network before new ones are dropped
    pub max_pending_frames: usize,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash-native-audio-preview-09-2025".to_string(),
            voice: "Zephyr".to_string(),
            response_modality: ResponseModality::Audio,
            input_transcription: true,
            output_transcription: true,
            system_instruction: Some(
                "You are a helpful business assistant. Be concise and professional.".to_string(),
            ),
            input_sample_rate: 16000,
            output_sample_rate: 24000,
            frame_size: 4096,
            max_pending_frames: 32,
        }
    }
}

impl LiveConfig {
    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)
            .map_err(|e| LiveError::ConfigError(format!("Invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            LiveError::ConfigError(format!("Failed to read {:?}: {}", path.as_ref(), e))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = voice.into();
        self
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    pub fn without_system_instruction(mut self) -> Self {
        self.system_instruction = None;
        self
    }

    pub fn with_transcription(mut self, input: bool, output: bool) -> Self {
        self.input_transcription = input;
        self.output_transcription = output;
        self
    }

    pub fn with_frame_size(mut self, frame_size: usize) -> Self {
        self.frame_size = frame_size;
        self
    }

    pub fn with_max_pending_frames(mut self, frames: usize) -> Self {
        self.max_pending_frames = frames;
        self
    }

    /// MIME type of outbound frames, e.g. `audio/pcm;rate=16000`
    pub fn input_mime_type(&self) -> String {
        pcm_mime_type(self.input_sample_rate)
    }

    pub fn capture_format(&self) -> CaptureFormat {
        CaptureFormat {
            sample_rate: self.input_sample_rate,
            frame_size: self.frame_size,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(LiveError::ConfigError("model is required".into()));
        }
        if self.voice.trim().is_empty() {
            return Err(LiveError::ConfigError("voice is required".into()));
        }
        if self.input_sample_rate == 0 || self.output_sample_rate == 0 {
            return Err(LiveError::ConfigError(
                "sample rates must be greater than 0".into(),
            ));
        }
        if self.frame_size == 0 {
            return Err(LiveError::ConfigError("frame_size must be greater than 0".into()));
        }
        if self.max_pending_frames == 0 {
            return Err(LiveError::ConfigError(
                "max_pending_frames must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}
