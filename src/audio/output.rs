use crate::audio::device::{join_device_thread, OutputDevice};
use crate::audio::resampler::AudioResampler;
use crate::playback::{PlaybackChunk, PlaybackId};
use crate::session::events::PlaybackSink;
use crate::{LiveError, Result};
use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Stream, StreamConfig};
use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Source frames mixed per resampler pass
const MIX_BLOCK: usize = 1024;

/// One scheduled unit, positioned in source frames
struct Voice {
    id: PlaybackId,
    samples: Vec<f32>,
    start_frame: u64,
}

impl Voice {
    fn end_frame(&self) -> u64 {
        self.start_frame + self.samples.len() as u64
    }
}

/// Mixes scheduled voices on a continuous timeline at the source rate.
///
/// When the device runs at another rate the mixed stream, silence included,
/// goes through a single streaming resampler, so consecutive voices are
/// converted as one signal and join without seams.
#[derive(Default)]
struct Mixer {
    voices: Vec<Voice>,
    sink: Option<PlaybackSink>,
    source_rate: Option<u32>,
    /// Source frames mixed so far
    rendered: u64,
    resampler: Option<AudioResampler>,
    /// Converted samples not yet handed to the device
    pending: VecDeque<f32>,
}

impl Mixer {
    fn clear(&mut self) {
        self.voices.clear();
        self.source_rate = None;
        self.rendered = 0;
        self.resampler = None;
        self.pending.clear();
    }

    /// Rate voices are mixed at, fixed by the first chunk after open.
    ///
    /// The timeline is aligned with the device clock when it is established.
    fn stream_rate(&mut self, chunk_rate: u32, device_rate: u32, played: u64) -> Result<u32> {
        if let Some(rate) = self.source_rate {
            return Ok(rate);
        }

        self.resampler = if chunk_rate == device_rate {
            None
        } else {
            Some(AudioResampler::new(chunk_rate, device_rate)?)
        };
        self.rendered = played * chunk_rate as u64 / device_rate.max(1) as u64;
        self.pending.clear();
        self.source_rate = Some(chunk_rate);
        Ok(chunk_rate)
    }

    /// Source frame a unit due at `start_at` seconds starts on
    fn place(&self, start_at: f64, rate: u32) -> u64 {
        ((start_at * rate as f64).round() as u64).max(self.rendered)
    }

    /// Mix the next `frames` source frames. Finished voices are appended to
    /// `finished` and dropped.
    fn mix(&mut self, frames: usize, finished: &mut Vec<PlaybackId>) -> Vec<f32> {
        let start = self.rendered;
        let end = start + frames as u64;
        let mut block = vec![0.0f32; frames];

        self.voices.retain(|voice| {
            let from = start.max(voice.start_frame);
            let to = end.min(voice.end_frame());

            for frame in from..to {
                block[(frame - start) as usize] +=
                    voice.samples[(frame - voice.start_frame) as usize];
            }

            if voice.end_frame() <= end {
                finished.push(voice.id);
                false
            } else {
                true
            }
        });

        self.rendered = end;
        block
    }

    /// Fill an interleaved device buffer.
    ///
    /// Returns the ids of voices that finished while producing it.
    fn fill(&mut self, data: &mut [f32], channels: usize) -> Vec<PlaybackId> {
        let channels = channels.max(1);
        let frames = data.len() / channels;
        let mut finished = Vec::new();

        data.fill(0.0);
        if self.source_rate.is_none() {
            return finished;
        }

        if self.resampler.is_none() {
            let block = self.mix(frames, &mut finished);
            write_frames(data, channels, block.into_iter());
            return finished;
        }

        while self.pending.len() < frames {
            let block = self.mix(MIX_BLOCK, &mut finished);
            let Some(resampler) = self.resampler.as_mut() else {
                break;
            };
            match resampler.process_stream(&block) {
                Ok(converted) => self.pending.extend(converted),
                Err(e) => {
                    warn!("Playback resampling failed: {}", e);
                    break;
                }
            }
        }

        let available = frames.min(self.pending.len());
        write_frames(data, channels, self.pending.drain(..available));
        finished
    }
}

fn write_frames(data: &mut [f32], channels: usize, samples: impl Iterator<Item = f32>) {
    for (frame, sample) in data.chunks_mut(channels).zip(samples) {
        frame.fill(sample);
    }
}

#[derive(Default)]
struct Shared {
    mixer: Mutex<Mixer>,
    frames_played: AtomicU64,
    device_rate: AtomicU32,
}

/// Default system speaker with a sample-accurate clock.
///
/// The clock is the number of frames the device has consumed since `open`.
/// Scheduled chunks are mixed in at their absolute start frame, so back to
/// back chunks play without gaps.
#[derive(Default)]
pub struct SpeakerOutput {
    shared: Arc<Shared>,
    stop_tx: Option<Sender<()>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl SpeakerOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.stop_tx.is_some()
    }

    pub fn device_rate(&self) -> u32 {
        self.shared.device_rate.load(Ordering::Acquire)
    }
}

#[async_trait]
impl OutputDevice for SpeakerOutput {
    async fn open(&mut self, sink: PlaybackSink) -> Result<()> {
        if self.is_open() {
            return Ok(());
        }

        {
            let mut mixer = self.shared.mixer.lock();
            mixer.clear();
            mixer.sink = Some(sink);
        }
        self.shared.frames_played.store(0, Ordering::Release);

        let (stop_tx, stop_rx) = bounded(1);
        let (ready_tx, ready_rx) = oneshot::channel();
        let shared = Arc::clone(&self.shared);

        let thread = thread::Builder::new()
            .name("studio-live-playback".into())
            .spawn(move || playback_thread(shared, stop_rx, ready_tx))
            .map_err(|e| {
                LiveError::DeviceUnavailable(format!("Failed to spawn playback thread: {}", e))
            })?;

        let ready = ready_rx
            .await
            .unwrap_or_else(|_| Err(LiveError::DeviceUnavailable("Playback thread exited".into())));

        match ready {
            Ok(rate) => {
                info!("Speaker opened at {} Hz", rate);
                self.stop_tx = Some(stop_tx);
                self.thread = Some(thread);
                Ok(())
            }
            Err(e) => {
                join_device_thread(thread, "Playback");
                self.shared.mixer.lock().sink = None;
                Err(e)
            }
        }
    }

    fn current_time(&self) -> f64 {
        let rate = self.device_rate();
        if rate == 0 {
            return 0.0;
        }
        self.shared.frames_played.load(Ordering::Acquire) as f64 / rate as f64
    }

    fn schedule(&mut self, chunk: PlaybackChunk) -> Result<()> {
        if !self.is_open() {
            return Err(LiveError::DeviceUnavailable("Speaker not open".into()));
        }

        let device_rate = self.device_rate();
        let played = self.shared.frames_played.load(Ordering::Acquire);
        let mut mixer = self.shared.mixer.lock();

        let rate = mixer.stream_rate(chunk.sample_rate, device_rate, played)?;
        let samples = if chunk.sample_rate == rate {
            chunk.samples
        } else {
            debug!(
                "Converting {} Hz chunk to the {} Hz playback stream",
                chunk.sample_rate, rate
            );
            AudioResampler::new(chunk.sample_rate, rate)?.resample(&chunk.samples)?
        };
        let start_frame = mixer.place(chunk.start_at, rate);

        debug!(id = chunk.id, start_frame, len = samples.len(), "Scheduling playback");
        mixer.voices.push(Voice {
            id: chunk.id,
            samples,
            start_frame,
        });
        Ok(())
    }

    fn stop(&mut self, id: PlaybackId) {
        self.shared.mixer.lock().voices.retain(|voice| voice.id != id);
    }

    fn close(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            join_device_thread(thread, "Playback");
            info!("Speaker closed");
        }

        let mut mixer = self.shared.mixer.lock();
        mixer.clear();
        mixer.sink = None;
    }
}

impl Drop for SpeakerOutput {
    fn drop(&mut self) {
        self.close();
    }
}

fn playback_thread(shared: Arc<Shared>, stop: Receiver<()>, ready: oneshot::Sender<Result<u32>>) {
    let stream = match open_output_stream(shared) {
        Ok((stream, rate)) => {
            let _ = ready.send(Ok(rate));
            stream
        }
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    // Blocks until close() or until the speaker is dropped
    let _ = stop.recv();
    drop(stream);
}

fn open_output_stream(shared: Arc<Shared>) -> Result<(Stream, u32)> {
    let host = cpal::default_host();

    let device = host
        .default_output_device()
        .ok_or_else(|| LiveError::DeviceUnavailable("No output device available".into()))?;

    info!(
        "Using output device: {}",
        device.name().unwrap_or_else(|_| "Unknown".to_string())
    );

    let config: StreamConfig = device
        .default_output_config()
        .map_err(|e| LiveError::DeviceUnavailable(format!("Failed to get output config: {}", e)))?
        .into();

    let channels = config.channels as usize;
    let device_rate = config.sample_rate.0;
    shared.device_rate.store(device_rate, Ordering::Release);

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let mut mixer = shared.mixer.lock();
                let finished = mixer.fill(data, channels);

                if let Some(sink) = mixer.sink.as_ref() {
                    for id in finished {
                        sink.ended(id);
                    }
                }
                drop(mixer);

                shared
                    .frames_played
                    .fetch_add((data.len() / channels.max(1)) as u64, Ordering::AcqRel);
            },
            |err| warn!("Audio output stream error: {}", err),
            None,
        )
        .map_err(|e| {
            LiveError::DeviceUnavailable(format!("Failed to build output stream: {}", e))
        })?;

    stream
        .play()
        .map_err(|e| LiveError::DeviceUnavailable(format!("Failed to start output stream: {}", e)))?;

    Ok((stream, device_rate))
}
