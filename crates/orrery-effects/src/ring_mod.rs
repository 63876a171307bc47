//! Two-carrier ring modulator.
//!
//! ```text
//! in → × lerp(1, c1, mix1) → × lerp(1, c2, mix2) → high-pass (low cut) → low-pass (high cut) → out
//! ```
//!
//! Each carrier morphs from sine to square with its shape control. The
//! right channel runs both carriers `1 + spread` times faster than the left.

use core::f32::consts::TAU;
use libm::sinf;
use orrery_core::{Effect, OnePole, SmoothedParam, lerp};

/// Ring modulator settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RingModParams {
    /// Carrier frequencies in Hz.
    pub freq: [f32; 2],
    /// Carrier shapes, 0 = sine, 1 = square.
    pub shape: [f32; 2],
    /// Carrier mixes, 0 = bypass.
    pub mix: [f32; 2],
    /// Relative detune of the right channel.
    pub spread: f32,
    /// High-pass corner on the modulated signal, Hz.
    pub low_cut: f32,
    /// Low-pass corner on the modulated signal, Hz.
    pub high_cut: f32,
}

impl Default for RingModParams {
    fn default() -> Self {
        Self {
            freq: [40.0, 40.0],
            shape: [0.0; 2],
            mix: [0.0; 2],
            spread: 0.03,
            low_cut: 20.0,
            high_cut: 20_000.0,
        }
    }
}

/// Sine-to-square carrier at `phase` in [0, 1).
#[inline]
fn carrier(phase: f32, shape: f32) -> f32 {
    let sine = sinf(phase * TAU);
    let square = if phase < 0.5 { 1.0 } else { -1.0 };
    lerp(sine, square, shape)
}

/// Stereo ring modulator.
///
/// ```rust
/// use orrery_core::Effect;
/// use orrery_effects::{RingModParams, RingModulator};
///
/// let mut rm = RingModulator::new(48000.0);
/// rm.set_params(&RingModParams { mix: [1.0, 0.0], ..RingModParams::default() });
/// let (l, r) = rm.process_stereo(0.5, 0.5);
/// assert!(l.abs() <= 0.5 && r.abs() <= 0.5);
/// ```
#[derive(Debug, Clone)]
pub struct RingModulator {
    params: RingModParams,
    /// `[carrier][channel]`
    phase: [[f32; 2]; 2],
    mix: [SmoothedParam; 2],
    low_cut: [OnePole; 2],
    high_cut: [OnePole; 2],
    sample_rate: f32,
}

impl RingModulator {
    /// Bypassed ring modulator.
    pub fn new(sample_rate: f32) -> Self {
        let params = RingModParams::default();
        Self {
            params,
            phase: [[0.0; 2]; 2],
            mix: [
                SmoothedParam::fast(params.mix[0], sample_rate),
                SmoothedParam::fast(params.mix[1], sample_rate),
            ],
            low_cut: [
                OnePole::new(sample_rate, params.low_cut),
                OnePole::new(sample_rate, params.low_cut),
            ],
            high_cut: [
                OnePole::new(sample_rate, params.high_cut),
                OnePole::new(sample_rate, params.high_cut),
            ],
            sample_rate,
        }
    }

    /// Apply new settings.
    pub fn set_params(&mut self, params: &RingModParams) {
        self.params = *params;
        for (smoothed, mix) in self.mix.iter_mut().zip(params.mix) {
            smoothed.set_target(mix.clamp(0.0, 1.0));
        }
        for filter in &mut self.low_cut {
            filter.set_frequency(params.low_cut);
        }
        for filter in &mut self.high_cut {
            filter.set_frequency(params.high_cut);
        }
    }

    /// Current settings.
    pub fn params(&self) -> &RingModParams {
        &self.params
    }
}

impl Effect for RingModulator {
    #[inline]
    fn process_stereo(&mut self, left: f32, right: f32) -> (f32, f32) {
        let mix = [self.mix[0].advance(), self.mix[1].advance()];
        let detune = [1.0, 1.0 + self.params.spread];
        let mut out = [left, right];

        for (k, phases) in self.phase.iter_mut().enumerate() {
            for (ch, phase) in phases.iter_mut().enumerate() {
                out[ch] *= lerp(1.0, carrier(*phase, self.params.shape[k]), mix[k]);
                *phase += self.params.freq[k] * detune[ch] / self.sample_rate;
                *phase -= libm::floorf(*phase);
            }
        }

        for (ch, x) in out.iter_mut().enumerate() {
            let cut = self.low_cut[ch].process_highpass(*x);
            *x = self.high_cut[ch].process(cut);
        }
        (out[0], out[1])
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        for filter in self.low_cut.iter_mut().chain(&mut self.high_cut) {
            filter.set_sample_rate(sample_rate);
        }
        for mix in &mut self.mix {
            mix.set_sample_rate(sample_rate);
        }
    }

    fn reset(&mut self) {
        self.phase = [[0.0; 2]; 2];
        for filter in self.low_cut.iter_mut().chain(&mut self.high_cut) {
            filter.reset();
        }
        for mix in &mut self.mix {
            mix.snap_to_target();
        }
    }
}
