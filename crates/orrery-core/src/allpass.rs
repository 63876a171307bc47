//! Schroeder allpass used for reverb diffusion.

use crate::DelayLine;
use crate::flush_denormal;

/// Freeverb-style allpass: `y = d − x`, the line stores `x + g·d`.
#[derive(Debug, Clone)]
pub struct AllpassFilter {
    delay: DelayLine,
    length: f32,
    feedback: f32,
}

impl AllpassFilter {
    /// Allpass holding up to `max_delay_samples`, initially at full length.
    pub fn new(max_delay_samples: usize) -> Self {
        let delay = DelayLine::new(max_delay_samples + 1);
        let length = delay.max_delay();
        Self {
            delay,
            length,
            feedback: 0.5,
        }
    }

    /// Loop length in samples, clamped to the capacity.
    #[inline]
    pub fn set_length(&mut self, samples: f32) {
        self.length = samples.clamp(1.0, self.delay.max_delay());
    }

    /// Diffusion gain, clamped to ±0.99.
    #[inline]
    pub fn set_feedback(&mut self, feedback: f32) {
        self.feedback = feedback.clamp(-0.99, 0.99);
    }

    /// Filter one sample.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let delayed = self.delay.read(self.length - 1.0);
        self.delay
            .write(flush_denormal(input + delayed * self.feedback));
        delayed - input
    }

    /// Zero the line.
    pub fn clear(&mut self) {
        self.delay.clear();
    }
}
