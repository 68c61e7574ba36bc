//! Fixed-size capture frames and the assembler that produces them

use crate::audio::buffer::AudioRingBuffer;
use crate::audio::pcm::{encode_base64, encode_pcm16, pcm_mime_type};
use crate::audio::resampler::AudioResampler;
use crate::transport::MediaChunk;
use crate::Result;

/// Frames kept before the oldest audio is overwritten
const BUFFERED_FRAMES: usize = 4;

/// One block of mono capture audio at the wire input rate
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioFrame {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn duration_seconds(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Encode as base64 PCM16 ready to be sent over the transport
    pub fn to_media_chunk(&self) -> MediaChunk {
        MediaChunk {
            data: encode_base64(&encode_pcm16(&self.samples)),
            mime_type: pcm_mime_type(self.sample_rate),
        }
    }
}

/// Turns arbitrary-length device callbacks into fixed-size frames
pub struct FrameAssembler {
    resampler: Option<AudioResampler>,
    buffer: AudioRingBuffer,
    frame_size: usize,
    output_rate: u32,
}

impl FrameAssembler {
    pub fn new(device_rate: u32, output_rate: u32, frame_size: usize) -> Result<Self> {
        let resampler = if device_rate != output_rate {
            Some(AudioResampler::new(device_rate, output_rate)?)
        } else {
            None
        };

        Ok(Self {
            resampler,
            buffer: AudioRingBuffer::new(frame_size * BUFFERED_FRAMES),
            frame_size,
            output_rate,
        })
    }

    /// Feed mono device samples and collect every frame that became complete
    pub fn push(&mut self, samples: &[f32]) -> Result<Vec<AudioFrame>> {
        let converted;
        let input = match self.resampler.as_mut() {
            Some(resampler) => {
                converted = resampler.process_stream(samples)?;
                &converted[..]
            }
            None => samples,
        };

        let mut frames = Vec::new();
        for piece in input.chunks(self.frame_size.max(1)) {
            self.buffer.write(piece);
            while let Some(samples) = self.buffer.read_exact(self.frame_size) {
                frames.push(AudioFrame::new(samples, self.output_rate));
            }
        }
        Ok(frames)
    }

    /// Forget partial audio, e.g. before a new session starts streaming
    pub fn reset(&mut self) {
        self.buffer.clear();
        if let Some(resampler) = self.resampler.as_mut() {
            resampler.reset();
        }
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }
}

/// Average interleaved channels into mono
pub fn downmix_to_mono(data: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return data.to_vec();
    }
    data.chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}
