pub mod scheduler;

pub use scheduler::{PlaybackChunk, PlaybackId, PlaybackScheduler, ScheduledUnit};
