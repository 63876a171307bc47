//! Gain slot.

use orrery_core::{Effect, SmoothedParam};

/// Smoothed linear gain.
///
/// ```rust
/// use orrery_core::Effect;
/// use orrery_effects::SlotGain;
///
/// let mut gain = SlotGain::new(48000.0);
/// gain.set_gain(0.5);
/// gain.reset();
/// assert_eq!(gain.process_stereo(1.0, -1.0), (0.5, -0.5));
/// ```
#[derive(Debug, Clone)]
pub struct SlotGain {
    gain: SmoothedParam,
}

impl SlotGain {
    /// Unity gain.
    pub fn new(sample_rate: f32) -> Self {
        Self {
            gain: SmoothedParam::standard(1.0, sample_rate),
        }
    }

    /// Linear gain target.
    pub fn set_gain(&mut self, gain: f32) {
        self.gain.set_target(gain);
    }

    /// Gain being approached.
    pub fn gain(&self) -> f32 {
        self.gain.target()
    }
}

impl Effect for SlotGain {
    #[inline]
    fn process_stereo(&mut self, left: f32, right: f32) -> (f32, f32) {
        let g = self.gain.advance();
        (left * g, right * g)
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.gain.set_sample_rate(sample_rate);
    }

    fn reset(&mut self) {
        self.gain.snap_to_target();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gain_ramps_smoothly() {
        let mut gain = SlotGain::new(48000.0);
        gain.set_gain(0.0);
        let first = gain.process_stereo(1.0, 1.0).0;
        assert!(first > 0.9, "no jump on a gain change");
        for _ in 0..48000 {
            gain.process_stereo(1.0, 1.0);
        }
        assert!(gain.process_stereo(1.0, 1.0).0 < 1e-4);
    }
}
