//! Output peak metering shared with a UI thread.

use core::sync::atomic::{AtomicU32, Ordering};

/// Seconds for a held peak to fall by 1/e.
pub const PEAK_DECAY_SECONDS: f32 = 0.3;

/// Per-channel decaying peak meter.
///
/// The audio thread calls [`track`](Self::track) once per block; readers
/// on other threads call [`peaks`](Self::peaks).
#[derive(Debug, Default)]
pub struct LevelMeter {
    left: AtomicU32,
    right: AtomicU32,
}

impl LevelMeter {
    /// Meter at silence.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a rendered block into the peaks.
    pub fn track(&self, left: &[f32], right: &[f32], sample_rate: f32) {
        let seconds = if sample_rate > 0.0 {
            left.len() as f32 / sample_rate
        } else {
            0.0
        };
        let decay = libm::expf(-seconds / PEAK_DECAY_SECONDS);
        Self::update(&self.left, left, decay);
        Self::update(&self.right, right, decay);
    }

    fn update(slot: &AtomicU32, block: &[f32], decay: f32) {
        let block_peak = block
            .iter()
            .filter(|s| s.is_finite())
            .fold(0.0f32, |m, s| m.max(s.abs()));
        let held = f32::from_bits(slot.load(Ordering::Relaxed)) * decay;
        slot.store(held.max(block_peak).to_bits(), Ordering::Relaxed);
    }

    /// Current (left, right) peaks, linear.
    pub fn peaks(&self) -> (f32, f32) {
        (
            f32::from_bits(self.left.load(Ordering::Relaxed)),
            f32::from_bits(self.right.load(Ordering::Relaxed)),
        )
    }

    /// Louder of the two channels.
    pub fn peak(&self) -> f32 {
        let (l, r) = self.peaks();
        l.max(r)
    }

    /// Drop both peaks to zero.
    pub fn reset(&self) {
        self.left.store(0, Ordering::Relaxed);
        self.right.store(0, Ordering::Relaxed);
    }
}
