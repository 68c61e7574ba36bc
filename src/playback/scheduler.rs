//! Gapless scheduling of model audio on the output clock
//!
//! Chunks arrive from the network at irregular times but must play back to
//! back in stream order. Each chunk starts at the later of "when the previous
//! chunk ends" and "now", so playback never overlaps and only leaves a gap
//! when the network actually fell behind the clock.

use crate::audio::device::OutputDevice;
use crate::audio::pcm::decode_pcm16;
use crate::session::events::PlaybackSink;
use crate::{LiveError, Result};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Identifier of one scheduled playback unit
pub type PlaybackId = u64;

/// Decoded model audio and its position on the output clock
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackChunk {
    pub id: PlaybackId,
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    /// Absolute start time on the output clock, in seconds
    pub start_at: f64,
}

impl PlaybackChunk {
    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Where a chunk landed on the output clock
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledUnit {
    pub id: PlaybackId,
    pub start_at: f64,
    pub duration: f64,
}

pub struct PlaybackScheduler {
    output: Box<dyn OutputDevice>,
    sample_rate: u32,
    next_start_time: f64,
    scheduled: BTreeSet<PlaybackId>,
    next_id: PlaybackId,
    is_open: bool,
}

impl PlaybackScheduler {
    /// Create a scheduler for mono PCM16 audio at `sample_rate`
    pub fn new(output: Box<dyn OutputDevice>, sample_rate: u32) -> Self {
        Self {
            output,
            sample_rate,
            next_start_time: 0.0,
            scheduled: BTreeSet::new(),
            next_id: 1,
            is_open: false,
        }
    }

    /// Open the output device for a new session
    pub async fn open(&mut self, sink: PlaybackSink) -> Result<()> {
        if self.is_open {
            return Ok(());
        }
        self.output.open(sink).await?;
        self.is_open = true;
        Ok(())
    }

    /// Decode one inbound PCM16 payload and schedule it after everything
    /// already queued.
    ///
    /// Empty or malformed payloads fail with `DecodeError` and leave the
    /// schedule untouched.
    pub fn enqueue(&mut self, raw: &[u8]) -> Result<ScheduledUnit> {
        if !self.is_open {
            return Err(LiveError::DeviceUnavailable(
                "output device is not open".into(),
            ));
        }

        let samples = decode_pcm16(raw)?;
        let start_at = self.next_start_time.max(self.output.current_time());

        let id = self.next_id;
        self.next_id += 1;

        let chunk = PlaybackChunk {
            id,
            samples,
            sample_rate: self.sample_rate,
            start_at,
        };
        let duration = chunk.duration();

        self.output.schedule(chunk)?;
        self.scheduled.insert(id);
        self.next_start_time = start_at + duration;

        debug!(
            "Scheduled chunk {} at {:.3}s for {:.3}s ({} in flight)",
            id,
            start_at,
            duration,
            self.scheduled.len()
        );

        Ok(ScheduledUnit {
            id,
            start_at,
            duration,
        })
    }

    /// A unit finished playing
    pub fn on_ended(&mut self, id: PlaybackId) {
        self.scheduled.remove(&id);
    }

    /// Barge-in: silence everything queued and restart the cursor at "now"
    pub fn interrupt(&mut self) {
        let stopped = self.stop_all();
        self.next_start_time = self.output.current_time();
        info!("Playback interrupted, stopped {} chunk(s)", stopped);
    }

    /// Teardown: stop everything, rewind the cursor and close the device
    pub fn reset(&mut self) {
        self.stop_all();
        self.next_start_time = 0.0;
        if self.is_open {
            self.output.close();
            self.is_open = false;
        }
    }

    fn stop_all(&mut self) -> usize {
        let ids = std::mem::take(&mut self.scheduled);
        for &id in &ids {
            self.output.stop(id);
        }
        ids.len()
    }

    /// End time of the most recently scheduled chunk
    pub fn next_start_time(&self) -> f64 {
        self.next_start_time
    }

    pub fn scheduled_len(&self) -> usize {
        self.scheduled.len()
    }

    pub fn is_scheduled(&self, id: PlaybackId) -> bool {
        self.scheduled.contains(&id)
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    pub fn current_time(&self) -> f64 {
        self.output.current_time()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::pcm::encode_pcm16;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    #[derive(Default)]
    struct Recorded {
        clock: f64,
        scheduled: Vec<(PlaybackId, f64)>,
        stopped: Vec<PlaybackId>,
        closed: usize,
    }

    struct FakeOutput(Arc<Mutex<Recorded>>);

    #[async_trait]
    impl OutputDevice for FakeOutput {
        async fn open(&mut self, _sink: PlaybackSink) -> Result<()> {
            Ok(())
        }
        fn current_time(&self) -> f64 {
            self.0.lock().clock
        }
        fn schedule(&mut self, chunk: PlaybackChunk) -> Result<()> {
            self.0.lock().scheduled.push((chunk.id, chunk.start_at));
            Ok(())
        }
        fn stop(&mut self, id: PlaybackId) {
            self.0.lock().stopped.push(id);
        }
        fn close(&mut self) {
            self.0.lock().closed += 1;
        }
    }

    async fn scheduler() -> (PlaybackScheduler, Arc<Mutex<Recorded>>) {
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let mut scheduler = PlaybackScheduler::new(Box::new(FakeOutput(recorded.clone())), 24000);
        let (tx, _rx) = mpsc::unbounded_channel();
        scheduler.open(PlaybackSink::new(tx)).await.unwrap();
        (scheduler, recorded)
    }

    fn seconds(duration: f64) -> Vec<u8> {
        encode_pcm16(&vec![0.1; (duration * 24000.0) as usize])
    }

    #[tokio::test]
    async fn test_chunks_are_gapless_and_ordered() {
        let (mut scheduler, _) = scheduler().await;

        let durations = [1.0, 0.5, 2.0, 0.25];
        let units: Vec<ScheduledUnit> = durations
            .iter()
            .map(|&d| scheduler.enqueue(&seconds(d)).unwrap())
            .collect();

        assert_eq!(units[0].start_at, 0.0);
        for pair in units.windows(2) {
            assert_eq!(pair[1].start_at, pair[0].start_at + pair[0].duration);
            assert!(pair[1].id > pair[0].id);
        }
        assert_eq!(scheduler.next_start_time(), 3.75);
        assert_eq!(scheduler.scheduled_len(), 4);
    }

    #[tokio::test]
    async fn test_late_chunk_starts_now() {
        let (mut scheduler, recorded) = scheduler().await;

        scheduler.enqueue(&seconds(0.5)).unwrap();
        recorded.lock().clock = 2.0;

        let unit = scheduler.enqueue(&seconds(0.5)).unwrap();
        assert_eq!(unit.start_at, 2.0);
        assert_eq!(scheduler.next_start_time(), 2.5);
    }

    #[tokio::test]
    async fn test_interrupt_stops_everything_and_restarts_at_clock() {
        let (mut scheduler, recorded) = scheduler().await;

        let a = scheduler.enqueue(&seconds(1.0)).unwrap();
        let b = scheduler.enqueue(&seconds(1.0)).unwrap();
        recorded.lock().clock = 0.4;

        scheduler.interrupt();
        assert_eq!(scheduler.scheduled_len(), 0);
        assert_eq!(recorded.lock().stopped, vec![a.id, b.id]);

        let next = scheduler.enqueue(&seconds(0.5)).unwrap();
        assert_eq!(next.start_at, 0.4);
    }

    #[tokio::test]
    async fn test_ended_units_leave_the_set() {
        let (mut scheduler, _) = scheduler().await;
        let unit = scheduler.enqueue(&seconds(0.1)).unwrap();
        assert!(scheduler.is_scheduled(unit.id));

        scheduler.on_ended(unit.id);
        assert!(!scheduler.is_scheduled(unit.id));
        scheduler.on_ended(unit.id);
        assert_eq!(scheduler.scheduled_len(), 0);
    }

    #[tokio::test]
    async fn test_bad_payload_is_skipped() {
        let (mut scheduler, recorded) = scheduler().await;
        scheduler.enqueue(&seconds(1.0)).unwrap();

        assert!(matches!(scheduler.enqueue(&[]), Err(LiveError::DecodeError(_))));
        assert!(matches!(scheduler.enqueue(&[7]), Err(LiveError::DecodeError(_))));

        assert_eq!(scheduler.next_start_time(), 1.0);
        assert_eq!(recorded.lock().scheduled.len(), 1);
    }

    #[tokio::test]
    async fn test_reset_closes_output_once() {
        let (mut scheduler, recorded) = scheduler().await;
        scheduler.enqueue(&seconds(1.0)).unwrap();

        scheduler.reset();
        scheduler.reset();

        assert_eq!(scheduler.next_start_time(), 0.0);
        assert_eq!(scheduler.scheduled_len(), 0);
        assert_eq!(recorded.lock().closed, 1);
        assert!(scheduler.enqueue(&seconds(1.0)).is_err());
    }
}
