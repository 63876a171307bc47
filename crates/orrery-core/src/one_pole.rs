//! One-pole filter, 6 dB/oct.
//!
//! `y[n] = x[n] + c·(y[n-1] − x[n])` with `c = exp(−2π·f/fs)`. The high-pass
//! output is the input minus the low-pass state. Used for delay feedback
//! damping and the ring modulator's low and high cuts.

use crate::flush_denormal;
use libm::expf;

/// One-pole low-pass with a complementary high-pass tap.
#[derive(Debug, Clone)]
pub struct OnePole {
    state: f32,
    coeff: f32,
    sample_rate: f32,
    freq: f32,
}

impl OnePole {
    /// Filter with corner `freq_hz`.
    pub fn new(sample_rate: f32, freq_hz: f32) -> Self {
        let mut filter = Self {
            state: 0.0,
            coeff: 0.0,
            sample_rate,
            freq: freq_hz,
        };
        filter.update_coeff();
        filter
    }

    /// Move the corner. Skips the `exp` when unchanged.
    pub fn set_frequency(&mut self, freq_hz: f32) {
        if freq_hz != self.freq {
            self.freq = freq_hz;
            self.update_coeff();
        }
    }

    /// Corner in Hz.
    pub fn frequency(&self) -> f32 {
        self.freq
    }

    /// Change sample rate, keeping the corner.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.update_coeff();
    }

    /// Low-pass one sample.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        self.state = flush_denormal(input + self.coeff * (self.state - input));
        self.state
    }

    /// High-pass one sample (input minus the low-passed signal).
    #[inline]
    pub fn process_highpass(&mut self, input: f32) -> f32 {
        input - self.process(input)
    }

    /// Zero the state.
    pub fn reset(&mut self) {
        self.state = 0.0;
    }

    fn update_coeff(&mut self) {
        let f = self.freq.clamp(0.0, self.sample_rate * 0.49);
        self.coeff = expf(-core::f32::consts::TAU * f / self.sample_rate);
    }
}
