//! Quadrature oscillator with unison.
//!
//! Instead of a scalar sample, [`QuadOscillator`] produces a [`StereoPosition`]:
//! a 2D point per channel orbiting the origin. `x` carries the cosine partials
//! and `y` the sine partials, so a single partial traces the unit circle.
//! The voice composes four of these into epicycles.
//!
//! # Unison
//!
//! Up to [`MAX_UNISON`] detuned copies run side by side. For `n` voices and
//! detune `d` semitones, voice `i` sits at
//!
//! ```text
//! offset_i = -d + i * 2d / (n - 1)        (0 when n == 1)
//! pan_i    = clamp(pan - spread + i * 2 * spread / (n - 1), -1, 1)
//! gain_L   = (1 - pan_i) / 2,  gain_R = (1 + pan_i) / 2
//! ```
//!
//! Increments and gains are recomputed only when parameters change, never
//! per sample.

use core::f32::consts::TAU;
use core::ops::{Add, AddAssign, Mul, Sub};

use orrery_core::fast_math::MAX_PARTIALS;
use orrery_core::{cosine_for_phase_and_tones, semitone_power, sine_for_phase_and_tones, wrap_pi};

/// Maximum detuned copies per oscillator.
pub const MAX_UNISON: usize = 4;

/// A point on the left and right orbits.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StereoPosition {
    /// Left channel, cosine axis.
    pub x_l: f32,
    /// Left channel, sine axis.
    pub y_l: f32,
    /// Right channel, cosine axis.
    pub x_r: f32,
    /// Right channel, sine axis.
    pub y_r: f32,
}

impl StereoPosition {
    /// The origin.
    pub const ORIGIN: Self = Self {
        x_l: 0.0,
        y_l: 0.0,
        x_r: 0.0,
        y_r: 0.0,
    };

    /// Build from left and right points.
    pub const fn new(x_l: f32, y_l: f32, x_r: f32, y_r: f32) -> Self {
        Self { x_l, y_l, x_r, y_r }
    }

    /// Distance of the left point from the origin.
    pub fn radius_left(&self) -> f32 {
        libm::sqrtf(self.x_l * self.x_l + self.y_l * self.y_l)
    }

    /// Distance of the right point from the origin.
    pub fn radius_right(&self) -> f32 {
        libm::sqrtf(self.x_r * self.x_r + self.y_r * self.y_r)
    }
}

impl Add for StereoPosition {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self {
            x_l: self.x_l + rhs.x_l,
            y_l: self.y_l + rhs.y_l,
            x_r: self.x_r + rhs.x_r,
            y_r: self.y_r + rhs.y_r,
        }
    }
}

impl AddAssign for StereoPosition {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for StereoPosition {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self {
            x_l: self.x_l - rhs.x_l,
            y_l: self.y_l - rhs.y_l,
            x_r: self.x_r - rhs.x_r,
            y_r: self.y_r - rhs.y_r,
        }
    }
}

impl Mul<f32> for StereoPosition {
    type Output = Self;

    #[inline]
    fn mul(self, s: f32) -> Self {
        Self {
            x_l: self.x_l * s,
            y_l: self.y_l * s,
            x_r: self.x_r * s,
            y_r: self.y_r * s,
        }
    }
}

/// Per-update oscillator settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadOscParams {
    /// Unison copies, 1..=4.
    pub voices: usize,
    /// Use every partial regardless of `tones`.
    pub saw: bool,
    /// Partial count, fractional, 1.0 up to 6.0.
    pub tones: f32,
    /// Centre pan, −1..1.
    pub pan: f32,
    /// Pan spread across unison copies, 0..1.
    pub spread: f32,
    /// Detune spread in semitones, 0..0.5.
    pub detune: f32,
    /// Start phase at note-on, in cycles.
    pub phase: f32,
}

impl Default for QuadOscParams {
    fn default() -> Self {
        Self {
            voices: MAX_UNISON,
            saw: false,
            tones: 1.0,
            pan: 0.0,
            spread: 0.0,
            detune: 0.0,
            phase: 0.0,
        }
    }
}

impl QuadOscParams {
    /// Partial count actually rendered.
    #[inline]
    pub fn effective_tones(&self) -> f32 {
        if self.saw {
            MAX_PARTIALS as f32
        } else {
            self.tones.clamp(1.0, MAX_PARTIALS as f32)
        }
    }

    fn unison(&self) -> usize {
        self.voices.clamp(1, MAX_UNISON)
    }
}

/// Unison quadrature oscillator.
///
/// ```rust
/// use orrery_synth::{QuadOscParams, QuadOscillator};
///
/// let mut osc = QuadOscillator::new();
/// osc.set_sample_rate(48000.0);
/// osc.set_params(220.0, QuadOscParams { voices: 1, ..QuadOscParams::default() });
/// let p = osc.next_position();
/// assert!((p.radius_left() - 1.0).abs() < 1e-3);
/// ```
#[derive(Debug, Clone)]
pub struct QuadOscillator {
    sample_rate: f32,
    frequency: f32,
    params: QuadOscParams,
    tones: f32,
    norm: f32,
    phases: [f32; MAX_UNISON],
    phase_incs: [f32; MAX_UNISON],
    gains_l: [f32; MAX_UNISON],
    gains_r: [f32; MAX_UNISON],
}

impl Default for QuadOscillator {
    fn default() -> Self {
        Self::new()
    }
}

impl QuadOscillator {
    /// Oscillator with no sample rate; it renders silence until one is set.
    pub fn new() -> Self {
        let mut osc = Self {
            sample_rate: 0.0,
            frequency: 0.0,
            params: QuadOscParams::default(),
            tones: 1.0,
            norm: 0.0,
            phases: [0.0; MAX_UNISON],
            phase_incs: [0.0; MAX_UNISON],
            gains_l: [0.0; MAX_UNISON],
            gains_r: [0.0; MAX_UNISON],
        };
        osc.recalculate();
        osc
    }

    /// Set the sample rate and recompute increments.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate.max(0.0);
        self.recalculate();
    }

    /// Current sample rate; 0 until prepared.
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Update frequency and parameters.
    pub fn set_params(&mut self, frequency: f32, params: QuadOscParams) {
        if frequency == self.frequency && params == self.params {
            return;
        }
        self.frequency = frequency;
        self.params = params;
        self.recalculate();
    }

    /// Current parameters.
    pub fn params(&self) -> &QuadOscParams {
        &self.params
    }

    /// Fundamental in Hz.
    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    /// Recompute unison increments and pan gains.
    pub fn recalculate(&mut self) {
        let voices = self.params.unison();
        let detune = self.params.detune.clamp(0.0, 2.0);
        let spread = self.params.spread.clamp(0.0, 1.0);
        let (detune_step, pan_step) = if voices > 1 {
            let denom = (voices - 1) as f32;
            (2.0 * detune / denom, 2.0 * spread / denom)
        } else {
            (0.0, 0.0)
        };
        let (base_detune, base_pan) = if voices > 1 {
            (-detune, self.params.pan - spread)
        } else {
            (0.0, self.params.pan)
        };

        let inc_scale = if self.sample_rate > 0.0 {
            TAU / self.sample_rate
        } else {
            0.0
        };

        for i in 0..MAX_UNISON {
            if i < voices {
                let pan = (base_pan + pan_step * i as f32).clamp(-1.0, 1.0);
                self.gains_l[i] = (1.0 - pan) * 0.5;
                self.gains_r[i] = (1.0 + pan) * 0.5;
                let freq = self.frequency * semitone_power(base_detune + detune_step * i as f32);
                self.phase_incs[i] = freq * inc_scale;
            } else {
                self.gains_l[i] = 0.0;
                self.gains_r[i] = 0.0;
                self.phase_incs[i] = 0.0;
            }
        }

        self.tones = self.params.effective_tones();
        // a centred copy lands on the unit circle whatever the unison count
        self.norm = 2.0 / voices as f32;
    }

    /// Phase increments in radians per sample.
    pub fn phase_increments(&self) -> [f32; MAX_UNISON] {
        self.phase_incs
    }

    /// Left and right gains of each unison copy.
    pub fn pan_gains(&self) -> ([f32; MAX_UNISON], [f32; MAX_UNISON]) {
        (self.gains_l, self.gains_r)
    }

    /// Current phases in radians.
    pub fn phases(&self) -> [f32; MAX_UNISON] {
        self.phases
    }

    /// Restart every copy at `phase` cycles.
    pub fn note_on(&mut self, phase: f32) {
        let start = wrap_pi(phase * TAU);
        self.phases = [start; MAX_UNISON];
    }

    /// Advance one sample and return the orbit position.
    #[inline]
    pub fn next_position(&mut self) -> StereoPosition {
        if self.sample_rate <= 0.0 {
            return StereoPosition::ORIGIN;
        }
        let mut pos = StereoPosition::ORIGIN;
        for i in 0..self.params.unison() {
            let phase = wrap_pi(self.phases[i] + self.phase_incs[i]);
            self.phases[i] = phase;
            let x = cosine_for_phase_and_tones(phase, self.tones);
            let y = sine_for_phase_and_tones(phase, self.tones);
            pos.x_l += self.gains_l[i] * x;
            pos.y_l += self.gains_l[i] * y;
            pos.x_r += self.gains_r[i] * x;
            pos.y_r += self.gains_r[i] * y;
        }
        pos * self.norm
    }

    /// Fill `out` with consecutive positions.
    pub fn render(&mut self, out: &mut [StereoPosition]) {
        for p in out.iter_mut() {
            *p = self.next_position();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn osc_with(voices: usize, detune: f32, pan: f32, spread: f32) -> QuadOscillator {
        let mut osc = QuadOscillator::new();
        osc.set_sample_rate(48000.0);
        osc.set_params(
            440.0,
            QuadOscParams {
                voices,
                detune,
                pan,
                spread,
                ..QuadOscParams::default()
            },
        );
        osc
    }

    #[test]
    fn test_pan_gains_sum_to_one() {
        for voices in 1..=MAX_UNISON {
            for &pan in &[-1.0, -0.3, 0.0, 0.7, 1.0] {
                for &spread in &[0.0, 0.25, 1.0] {
                    let osc = osc_with(voices, 0.2, pan, spread);
                    let (l, r) = osc.pan_gains();
                    for i in 0..voices {
                        assert!(
                            (l[i] + r[i] - 1.0).abs() < 1e-6,
                            "voices={voices} pan={pan} spread={spread} i={i}"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_single_voice_is_finite() {
        let mut osc = osc_with(1, 0.5, 0.0, 1.0);
        let incs = osc.phase_increments();
        assert!(incs[0].is_finite());
        assert!((incs[0] - TAU * 440.0 / 48000.0).abs() < 1e-6);
        for _ in 0..1000 {
            let p = osc.next_position();
            assert!(p.x_l.is_finite() && p.y_r.is_finite());
        }
    }

    #[test]
    fn test_detune_is_symmetric() {
        let osc = osc_with(4, 0.5, 0.0, 0.0);
        let incs = osc.phase_increments();
        let centre = TAU * 440.0 / 48000.0;
        let low = incs[0] / centre;
        let high = incs[3] / centre;
        assert!((low * high - 1.0).abs() < 1e-4, "low {low} high {high}");
        assert!(incs[0] < incs[1] && incs[1] < incs[2] && incs[2] < incs[3]);
    }

    #[test]
    fn test_full_spread_reaches_both_sides() {
        let osc = osc_with(4, 0.0, 0.0, 1.0);
        let (l, r) = osc.pan_gains();
        assert_eq!(l[0], 1.0);
        assert_eq!(r[3], 1.0);
    }

    #[test]
    fn test_single_partial_on_unit_circle() {
        let mut osc = osc_with(1, 0.0, 0.0, 0.0);
        for _ in 0..500 {
            let p = osc.next_position();
            assert!((p.radius_left() - 1.0).abs() < 1e-3);
            assert!((p.radius_right() - 1.0).abs() < 1e-3);
        }
    }

    #[test]
    fn test_recalculate_idempotent() {
        let mut osc = osc_with(3, 0.3, 0.1, 0.4);
        let first = osc.phase_increments();
        osc.set_sample_rate(48000.0);
        osc.set_sample_rate(48000.0);
        assert_eq!(first, osc.phase_increments());
    }

    #[test]
    fn test_silent_without_sample_rate() {
        let mut osc = QuadOscillator::new();
        osc.set_params(440.0, QuadOscParams::default());
        assert_eq!(osc.next_position(), StereoPosition::ORIGIN);
    }

    #[test]
    fn test_note_on_sets_phase() {
        let mut osc = osc_with(2, 0.0, 0.0, 0.0);
        for _ in 0..37 {
            osc.next_position();
        }
        osc.note_on(0.25);
        for p in osc.phases() {
            assert!((p - core::f32::consts::FRAC_PI_2).abs() < 1e-6);
        }
    }

    #[test]
    fn test_saw_uses_all_partials() {
        let params = QuadOscParams {
            saw: true,
            tones: 1.0,
            ..QuadOscParams::default()
        };
        assert_eq!(params.effective_tones(), MAX_PARTIALS as f32);
    }
}
