//! Fixed output stage after the lanes: output gain, DC high-pass, limiter.
//!
//! The nonlinear slot effects can leave DC and overs behind. The high-pass
//! removes the former at 5 Hz and the limiter catches the latter.

use core::f32::consts::FRAC_1_SQRT_2;
use libm::expf;
use orrery_core::{Biquad, BiquadCoefficients, Effect, SmoothedParam, db_to_linear};

/// Corner of the DC high-pass in Hz.
pub const DC_CUTOFF_HZ: f32 = 5.0;

/// Limiter ceiling in dB.
pub const LIMITER_THRESHOLD_DB: f32 = -0.3;

/// Limiter release time constant in seconds.
pub const LIMITER_RELEASE_SECONDS: f32 = 0.05;

/// Peak limiter with instant attack and exponential release.
///
/// Gain follows `threshold / peak` down in one sample, so no output sample
/// exceeds the threshold. It recovers as
/// `g[n] = c·g[n-1] + (1 − c)·target` with `c = exp(−1 / (release · fs))`.
/// Detection is linked across channels.
#[derive(Debug, Clone)]
pub struct Limiter {
    threshold: f32,
    release_seconds: f32,
    release_coeff: f32,
    gain: f32,
}

impl Limiter {
    /// Limiter with a ceiling of `threshold_db` and the given release.
    pub fn new(sample_rate: f32, threshold_db: f32, release_seconds: f32) -> Self {
        let mut limiter = Self {
            threshold: db_to_linear(threshold_db),
            release_seconds,
            release_coeff: 0.0,
            gain: 1.0,
        };
        limiter.set_sample_rate(sample_rate);
        limiter
    }

    /// Linear ceiling.
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Gain applied to the last frame.
    pub fn gain(&self) -> f32 {
        self.gain
    }
}

impl Effect for Limiter {
    #[inline]
    fn process_stereo(&mut self, left: f32, right: f32) -> (f32, f32) {
        let peak = left.abs().max(right.abs());
        let target = if peak > self.threshold { self.threshold / peak } else { 1.0 };
        self.gain = if target < self.gain {
            target
        } else {
            self.release_coeff * self.gain + (1.0 - self.release_coeff) * target
        };
        (left * self.gain, right * self.gain)
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.release_coeff = expf(-1.0 / (self.release_seconds * sample_rate).max(1.0));
    }

    fn reset(&mut self) {
        self.gain = 1.0;
    }
}

/// Output gain, then the 2nd-order DC high-pass, then the limiter.
///
/// ```rust
/// use orrery_core::Effect;
/// use orrery_effects::PostChain;
///
/// let mut post = PostChain::new(48000.0);
/// post.set_output_gain(4.0);
/// let mut peak = 0.0f32;
/// for n in 0..4800 {
///     let x = if n % 100 < 50 { 1.0 } else { -1.0 };
///     let (l, _) = post.process_stereo(x, x);
///     peak = peak.max(l.abs());
/// }
/// assert!(peak <= 0.9661);
/// ```
#[derive(Debug, Clone)]
pub struct PostChain {
    output_gain: SmoothedParam,
    dc: [Biquad; 2],
    limiter: Limiter,
    sample_rate: f32,
}

impl PostChain {
    /// Unity gain post chain.
    pub fn new(sample_rate: f32) -> Self {
        let dc = BiquadCoefficients::highpass(DC_CUTOFF_HZ, FRAC_1_SQRT_2, sample_rate);
        Self {
            output_gain: SmoothedParam::fast(1.0, sample_rate),
            dc: [Biquad::with_coefficients(dc), Biquad::with_coefficients(dc)],
            limiter: Limiter::new(sample_rate, LIMITER_THRESHOLD_DB, LIMITER_RELEASE_SECONDS),
            sample_rate,
        }
    }

    /// Linear output gain.
    pub fn set_output_gain(&mut self, gain: f32) {
        self.output_gain.set_target(gain);
    }

    /// The limiter stage.
    pub fn limiter(&self) -> &Limiter {
        &self.limiter
    }
}

impl Effect for PostChain {
    #[inline]
    fn process_stereo(&mut self, left: f32, right: f32) -> (f32, f32) {
        let gain = self.output_gain.advance();
        let [dc_l, dc_r] = &mut self.dc;
        let left = dc_l.process(left * gain);
        let right = dc_r.process(right * gain);
        self.limiter.process_stereo(left, right)
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        let dc = BiquadCoefficients::highpass(DC_CUTOFF_HZ, FRAC_1_SQRT_2, sample_rate);
        for filter in &mut self.dc {
            filter.set_coefficients(dc);
        }
        self.output_gain.set_sample_rate(sample_rate);
        self.limiter.set_sample_rate(sample_rate);
    }

    fn reset(&mut self) {
        for filter in &mut self.dc {
            filter.clear();
        }
        self.output_gain.snap_to_target();
        self.limiter.reset();
    }
}
