//! Damped feedback comb filter, the resonator of the reverb.
//!
//! Freeverb topology: the delayed output passes through a one-pole low-pass
//! before being fed back. The delay length is variable up to the capacity
//! given at construction so room size can move without reallocating.

use crate::DelayLine;
use crate::flush_denormal;

/// Lowpass-feedback comb filter.
#[derive(Debug, Clone)]
pub struct CombFilter {
    delay: DelayLine,
    length: f32,
    feedback: f32,
    damp: f32,
    store: f32,
}

impl CombFilter {
    /// Comb holding up to `max_delay_samples`, initially at full length.
    pub fn new(max_delay_samples: usize) -> Self {
        let delay = DelayLine::new(max_delay_samples + 1);
        let length = delay.max_delay();
        Self {
            delay,
            length,
            feedback: 0.5,
            damp: 0.5,
            store: 0.0,
        }
    }

    /// Loop length in samples, clamped to the capacity.
    #[inline]
    pub fn set_length(&mut self, samples: f32) {
        self.length = samples.clamp(1.0, self.delay.max_delay());
    }

    /// Loop gain, clamped to [0, 0.99].
    #[inline]
    pub fn set_feedback(&mut self, feedback: f32) {
        self.feedback = feedback.clamp(0.0, 0.99);
    }

    /// Feedback damping coefficient in [0, 1]; 0 leaves the loop bright.
    #[inline]
    pub fn set_damp(&mut self, damp: f32) {
        self.damp = damp.clamp(0.0, 1.0);
    }

    /// Loop gain.
    pub fn feedback(&self) -> f32 {
        self.feedback
    }

    /// Filter one sample.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        // read length - 1 back so a full loop takes `length` samples
        let out = self.delay.read(self.length - 1.0);
        self.store = flush_denormal(out + (self.store - out) * self.damp);
        self.delay.write(input + self.store * self.feedback);
        out
    }

    /// Zero the loop.
    pub fn clear(&mut self) {
        self.delay.clear();
        self.store = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_echo_arrives_after_length() {
        let mut comb = CombFilter::new(100);
        comb.set_feedback(0.5);
        comb.set_damp(0.0);
        comb.set_length(40.0);
        assert_eq!(comb.process(1.0), 0.0);
        for _ in 0..38 {
            assert_eq!(comb.process(0.0), 0.0);
        }
        assert!((comb.process(0.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_feedback_decays() {
        let mut comb = CombFilter::new(10);
        comb.set_feedback(0.8);
        comb.set_damp(0.2);
        comb.process(1.0);
        let mut energy_early = 0.0;
        let mut energy_late = 0.0;
        for i in 0..400 {
            let y = comb.process(0.0);
            if i < 100 {
                energy_early += y * y;
            } else if i >= 300 {
                energy_late += y * y;
            }
        }
        assert!(energy_late < energy_early * 0.01);
    }

    #[test]
    fn test_clear_silences() {
        let mut comb = CombFilter::new(10);
        for _ in 0..20 {
            comb.process(1.0);
        }
        comb.clear();
        for _ in 0..20 {
            assert_eq!(comb.process(0.0), 0.0);
        }
    }
}
