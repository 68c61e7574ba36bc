//! Platform audio capabilities used by a live session

use crate::playback::PlaybackChunk;
use crate::playback::PlaybackId;
use crate::session::events::{FrameSink, PlaybackSink};
use crate::Result;
use async_trait::async_trait;

/// Shape of the frames a microphone must deliver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureFormat {
    /// Wire sample rate in Hz
    pub sample_rate: u32,
    /// Samples per frame
    pub frame_size: usize,
}

/// Audio input device.
///
/// Acquisition and streaming are separate steps: a session holds the device
/// while its transport is still connecting, and frames only flow once the
/// transport is open.
#[async_trait]
pub trait Microphone: Send {
    /// Acquire the input device.
    ///
    /// Fails with `PermissionDenied` or `DeviceUnavailable`.
    async fn acquire(&mut self, format: CaptureFormat) -> Result<()>;

    /// Begin delivering frames of the acquired format into `sink`
    fn start(&mut self, sink: FrameSink) -> Result<()>;

    /// Stop capture and release the device. Safe to call when not held.
    fn release(&mut self);

    fn is_held(&self) -> bool;
}

/// Audio output device with an absolute, monotonic clock.
#[async_trait]
pub trait OutputDevice: Send {
    /// Open the device; completion of scheduled units is reported into `sink`
    async fn open(&mut self, sink: PlaybackSink) -> Result<()>;

    /// Current output clock reading in seconds
    fn current_time(&self) -> f64;

    /// Schedule a chunk to start at `chunk.start_at` on the output clock
    fn schedule(&mut self, chunk: PlaybackChunk) -> Result<()>;

    /// Stop a scheduled unit immediately; unknown ids are ignored
    fn stop(&mut self, id: PlaybackId);

    /// Stop everything and release the device. Safe to call when closed.
    fn close(&mut self);
}

/// Reap a device thread after it has been told to stop.
///
/// Inside a tokio runtime the join runs on the blocking pool so a slow driver
/// teardown never stalls the session's task.
#[cfg(feature = "audio-io")]
pub(crate) fn join_device_thread(thread: std::thread::JoinHandle<()>, name: &'static str) {
    let join = move || {
        if thread.join().is_err() {
            tracing::error!("{} thread panicked", name);
        }
    };

    match tokio::runtime::Handle::try_current() {
        Ok(runtime) => {
            runtime.spawn_blocking(join);
        }
        Err(_) => join(),
    }
}
