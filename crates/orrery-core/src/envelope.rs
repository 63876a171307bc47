//! Peak envelope follower for the dynamics detector and level meters.
//!
//! Separate attack and release coefficients, `c = exp(−1 / (t·fs))` with the
//! times in seconds.

use libm::expf;

/// Rectifying peak follower.
#[derive(Debug, Clone)]
pub struct EnvelopeFollower {
    envelope: f32,
    attack_coeff: f32,
    release_coeff: f32,
    sample_rate: f32,
    attack_s: f32,
    release_s: f32,
}

impl EnvelopeFollower {
    /// 1 ms attack, 100 ms release.
    pub fn new(sample_rate: f32) -> Self {
        Self::with_times(sample_rate, 0.001, 0.1)
    }

    /// Follower with explicit times in seconds.
    pub fn with_times(sample_rate: f32, attack_s: f32, release_s: f32) -> Self {
        let mut follower = Self {
            envelope: 0.0,
            attack_coeff: 0.0,
            release_coeff: 0.0,
            sample_rate,
            attack_s,
            release_s,
        };
        follower.update_coefficients();
        follower
    }

    /// Attack time in seconds, floored at 10 µs.
    pub fn set_attack(&mut self, seconds: f32) {
        if seconds != self.attack_s {
            self.attack_s = seconds;
            self.update_coefficients();
        }
    }

    /// Release time in seconds, floored at 1 ms.
    pub fn set_release(&mut self, seconds: f32) {
        if seconds != self.release_s {
            self.release_s = seconds;
            self.update_coefficients();
        }
    }

    /// Change sample rate, keeping the times.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.update_coefficients();
    }

    /// Track `|input|` and return the envelope.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let rectified = input.abs();
        let coeff = if rectified > self.envelope {
            self.attack_coeff
        } else {
            self.release_coeff
        };
        self.envelope = rectified + coeff * (self.envelope - rectified);
        self.envelope
    }

    /// Current envelope.
    pub fn level(&self) -> f32 {
        self.envelope
    }

    /// Zero the envelope.
    pub fn reset(&mut self) {
        self.envelope = 0.0;
    }

    fn update_coefficients(&mut self) {
        let attack = self.attack_s.max(1e-5);
        let release = self.release_s.max(1e-3);
        self.attack_coeff = expf(-1.0 / (attack * self.sample_rate));
        self.release_coeff = expf(-1.0 / (release * self.sample_rate));
    }
}

impl Default for EnvelopeFollower {
    fn default() -> Self {
        Self::new(48000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attack_rises() {
        let mut env = EnvelopeFollower::with_times(48000.0, 0.001, 0.1);
        let mut y = 0.0;
        for _ in 0..500 {
            y = env.process(-1.0);
        }
        assert!(y > 0.9, "envelope should rise, got {y}");
    }

    #[test]
    fn test_release_falls_slower_than_attack() {
        let mut env = EnvelopeFollower::with_times(48000.0, 0.0001, 0.5);
        for _ in 0..1000 {
            env.process(1.0);
        }
        for _ in 0..480 {
            env.process(0.0);
        }
        assert!(env.level() > 0.9, "10 ms into a 500 ms release: {}", env.level());
    }
}
