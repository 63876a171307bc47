//! Circular delay line with fractional reads.
//!
//! Sized once at prepare time; nothing reallocates while audio runs.
//! A delay of `d` samples reads the sample written `d` writes ago, so
//! `read(0.0)` returns the most recent write.

use alloc::vec;
use alloc::vec::Vec;

/// Heap-backed circular delay with linear interpolation.
#[derive(Debug, Clone)]
pub struct DelayLine {
    buffer: Vec<f32>,
    write_pos: usize,
}

impl DelayLine {
    /// Delay able to hold `capacity` samples (at least one).
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: vec![0.0; capacity.max(1)],
            write_pos: 0,
        }
    }

    /// Delay long enough for `max_seconds` at `sample_rate`.
    pub fn from_time(sample_rate: f32, max_seconds: f32) -> Self {
        Self::new((sample_rate * max_seconds) as usize + 2)
    }

    /// Reallocate for a new capacity and clear. Prepare-time only.
    pub fn resize(&mut self, capacity: usize) {
        self.buffer.clear();
        self.buffer.resize(capacity.max(1), 0.0);
        self.write_pos = 0;

        #[cfg(feature = "tracing")]
        tracing::trace!(capacity = self.buffer.len(), "delay line resized");
    }

    /// Samples the line can hold.
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Longest delay readable without wrapping onto new data.
    pub fn max_delay(&self) -> f32 {
        (self.buffer.len() - 1) as f32
    }

    /// Read `delay` samples back, linearly interpolated.
    #[inline]
    pub fn read(&self, delay: f32) -> f32 {
        let len = self.buffer.len();
        let delay = delay.clamp(0.0, self.max_delay());
        let whole = delay as usize;
        let frac = delay - whole as f32;
        // most recent write sits at write_pos - 1
        let a_pos = (self.write_pos + len - 1 - whole) % len;
        let b_pos = (a_pos + len - 1) % len;
        let a = self.buffer[a_pos];
        a + (self.buffer[b_pos] - a) * frac
    }

    /// Append a sample.
    #[inline]
    pub fn write(&mut self, sample: f32) {
        self.buffer[self.write_pos] = sample;
        self.write_pos += 1;
        if self.write_pos == self.buffer.len() {
            self.write_pos = 0;
        }
    }

    /// Read, then write.
    #[inline]
    pub fn read_write(&mut self, sample: f32, delay: f32) -> f32 {
        let out = self.read(delay);
        self.write(sample);
        out
    }

    /// Zero the contents.
    pub fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }
}
