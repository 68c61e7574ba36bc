pub mod buffer;
pub mod device;
pub mod frames;
#[cfg(feature = "audio-io")]
pub mod input;
#[cfg(feature = "audio-io")]
pub mod output;
pub mod pcm;
pub mod resampler;

pub use buffer::AudioRingBuffer;
pub use device::{CaptureFormat, Microphone, OutputDevice};
pub use frames::{AudioFrame, FrameAssembler};
#[cfg(feature = "audio-io")]
pub use input::MicrophoneCapture;
#[cfg(feature = "audio-io")]
pub use output::SpeakerOutput;
pub use resampler::AudioResampler;
