use ringbuf::{traits::*, HeapRb};

/// Bounded FIFO of mono samples used to cut capture audio into frames.
///
/// When the buffer is full the oldest samples are discarded so the newest
/// audio always survives.
pub struct AudioRingBuffer {
    buffer: HeapRb<f32>,
    overwritten: u64,
}

impl AudioRingBuffer {
    /// Create a new ring buffer with the specified capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: HeapRb::new(capacity.max(1)),
            overwritten: 0,
        }
    }

    /// Append samples, dropping the oldest ones on overflow
    pub fn write(&mut self, samples: &[f32]) {
        for &sample in samples {
            if self.buffer.try_push(sample).is_err() {
                let _ = self.buffer.try_pop();
                let _ = self.buffer.try_push(sample);
                self.overwritten += 1;
            }
        }
    }

    /// Remove exactly `count` samples, or nothing if fewer are buffered
    pub fn read_exact(&mut self, count: usize) -> Option<Vec<f32>> {
        if count == 0 || self.len() < count {
            return None;
        }

        let mut samples = Vec::with_capacity(count);
        while samples.len() < count {
            match self.buffer.try_pop() {
                Some(sample) => samples.push(sample),
                None => break,
            }
        }
        Some(samples)
    }

    /// Get the number of samples available to read
    pub fn len(&self) -> usize {
        self.buffer.occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity().get()
    }

    /// Samples lost to overflow since creation
    pub fn overwritten(&self) -> u64 {
        self.overwritten
    }
}
