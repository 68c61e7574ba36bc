use crate::{LiveError, Result};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use tracing::debug;

/// Frames per channel handed to rubato per call
const CHUNK_FRAMES: usize = 1024;

/// Mono sample-rate converter between the device and wire rates.
///
/// Two modes are offered: [`resample`](Self::resample) converts a complete
/// buffer and zero-pads the tail, while [`process_stream`](Self::process_stream)
/// keeps the remainder for the next call so a continuous capture stream is
/// converted without padding artifacts.
pub struct AudioResampler {
    resampler: SincFixedIn<f32>,
    input_rate: u32,
    output_rate: u32,
    pending: Vec<f32>,
}

impl AudioResampler {
    pub fn new(input_rate: u32, output_rate: u32) -> Result<Self> {
        if input_rate == 0 || output_rate == 0 {
            return Err(LiveError::ConfigError(
                "Sample rates must be greater than 0".into(),
            ));
        }

        let params = SincInterpolationParameters {
            sinc_len: 128,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: 128,
            window: WindowFunction::BlackmanHarris2,
        };

        let resampler = SincFixedIn::<f32>::new(
            output_rate as f64 / input_rate as f64,
            2.0,
            params,
            CHUNK_FRAMES,
            1,
        )
        .map_err(|e| {
            LiveError::AudioProcessingError(format!("Failed to create resampler: {}", e))
        })?;

        debug!("Created resampler: {} Hz -> {} Hz", input_rate, output_rate);

        Ok(Self {
            resampler,
            input_rate,
            output_rate,
            pending: Vec::with_capacity(CHUNK_FRAMES),
        })
    }

    /// Convert a complete buffer, padding the last partial chunk with silence
    pub fn resample(&mut self, input: &[f32]) -> Result<Vec<f32>> {
        if input.is_empty() {
            return Ok(Vec::new());
        }

        let ratio = self.output_rate as f64 / self.input_rate as f64;
        let mut output = Vec::with_capacity((input.len() as f64 * ratio * 1.1) as usize);

        for chunk in input.chunks(CHUNK_FRAMES) {
            let mut planar = vec![vec![0.0f32; CHUNK_FRAMES]];
            planar[0][..chunk.len()].copy_from_slice(chunk);

            let converted = self.process_chunk(&planar)?;
            let wanted = if chunk.len() < CHUNK_FRAMES {
                ((chunk.len() as f64) * ratio).ceil() as usize
            } else {
                converted.len()
            };
            output.extend_from_slice(&converted[..wanted.min(converted.len())]);
        }

        Ok(output)
    }

    /// Convert the next piece of a continuous stream.
    ///
    /// Input that does not fill a whole chunk is held back until the next call.
    pub fn process_stream(&mut self, input: &[f32]) -> Result<Vec<f32>> {
        self.pending.extend_from_slice(input);

        let mut output = Vec::new();
        while self.pending.len() >= CHUNK_FRAMES {
            let planar = vec![self.pending.drain(..CHUNK_FRAMES).collect::<Vec<f32>>()];
            output.extend(self.process_chunk(&planar)?);
        }
        Ok(output)
    }

    fn process_chunk(&mut self, planar: &[Vec<f32>]) -> Result<Vec<f32>> {
        let mut converted = self
            .resampler
            .process(planar, None)
            .map_err(|e| LiveError::AudioProcessingError(format!("Resampling failed: {}", e)))?;
        Ok(converted.swap_remove(0))
    }

    pub fn input_rate(&self) -> u32 {
        self.input_rate
    }

    pub fn output_rate(&self) -> u32 {
        self.output_rate
    }

    /// Drop filter history and any held-back stream input
    pub fn reset(&mut self) {
        self.resampler.reset();
        self.pending.clear();
    }
}
