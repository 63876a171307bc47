//! State variable filters.
//!
//! [`Svf`] is a 2-pole topology-preserving-transform SVF (Zavalishin, "The Art
//! of VA Filter Design", ch. 3). It stays stable while the cutoff moves every
//! sub-block, which is what both the voice filter and the lane filters do.
//!
//! [`MultimodeFilter`] wraps a stereo pair of two-stage cascades and selects
//! one of the eight [`FilterKind`]s (low/high/band/notch × 12/24 dB).

use core::f32::consts::PI;
use libm::tanf;

use crate::Effect;
use crate::flush_denormal;

/// Which response a single SVF stage outputs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SvfOutput {
    /// Low-pass.
    #[default]
    Lowpass,
    /// High-pass.
    Highpass,
    /// Band-pass.
    Bandpass,
    /// Band-reject.
    Notch,
}

/// Filter type and slope.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FilterKind {
    /// Low-pass, 12 dB/oct.
    #[default]
    Lp12,
    /// Low-pass, 24 dB/oct.
    Lp24,
    /// High-pass, 12 dB/oct.
    Hp12,
    /// High-pass, 24 dB/oct.
    Hp24,
    /// Band-pass, one stage.
    Bp12,
    /// Band-pass, two stages.
    Bp24,
    /// Notch, one stage.
    Notch12,
    /// Notch, two stages.
    Notch24,
}

impl FilterKind {
    /// All kinds in parameter order.
    pub const ALL: [FilterKind; 8] = [
        FilterKind::Lp12,
        FilterKind::Lp24,
        FilterKind::Hp12,
        FilterKind::Hp24,
        FilterKind::Bp12,
        FilterKind::Bp24,
        FilterKind::Notch12,
        FilterKind::Notch24,
    ];

    /// Display labels in parameter order.
    pub const LABELS: &'static [&'static str] =
        &["LP12", "LP24", "HP12", "HP24", "BP12", "BP24", "NT12", "NT24"];

    /// Kind for a parameter value; `None` past the end.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Response of each stage.
    pub const fn output(self) -> SvfOutput {
        match self {
            Self::Lp12 | Self::Lp24 => SvfOutput::Lowpass,
            Self::Hp12 | Self::Hp24 => SvfOutput::Highpass,
            Self::Bp12 | Self::Bp24 => SvfOutput::Bandpass,
            Self::Notch12 | Self::Notch24 => SvfOutput::Notch,
        }
    }

    /// True for the two-stage (24 dB) variants.
    pub const fn is_four_pole(self) -> bool {
        matches!(self, Self::Lp24 | Self::Hp24 | Self::Bp24 | Self::Notch24)
    }
}

/// Resonance control (0..100) to Q: `0.7071 / (1 − res/100 × 0.99)`.
///
/// ```rust
/// use orrery_core::resonance_to_q;
///
/// assert!((resonance_to_q(0.0) - 0.7071).abs() < 1e-4);
/// assert!((resonance_to_q(100.0) - 70.71).abs() < 0.01);
/// ```
#[inline]
pub fn resonance_to_q(resonance: f32) -> f32 {
    0.7071 / (1.0 - resonance.clamp(0.0, 100.0) * 0.01 * 0.99)
}

/// Two-pole TPT state variable filter.
#[derive(Debug, Clone)]
pub struct Svf {
    ic1eq: f32,
    ic2eq: f32,
    g: f32,
    k: f32,
    sample_rate: f32,
    cutoff: f32,
    q: f32,
}

impl Default for Svf {
    fn default() -> Self {
        Self::new(48000.0)
    }
}

impl Svf {
    /// 1 kHz, Q 0.7071.
    pub fn new(sample_rate: f32) -> Self {
        let mut svf = Self {
            ic1eq: 0.0,
            ic2eq: 0.0,
            g: 0.0,
            k: 0.0,
            sample_rate,
            cutoff: 1000.0,
            q: 0.7071,
        };
        svf.update_coefficients();
        svf
    }

    /// Set cutoff (clamped to 20 Hz .. 0.49·fs) and Q (clamped to 0.1..100).
    pub fn set_params(&mut self, cutoff: f32, q: f32) {
        self.cutoff = cutoff.clamp(20.0, self.sample_rate * 0.49);
        self.q = q.clamp(0.1, 100.0);
        self.update_coefficients();
    }

    /// Cutoff in Hz.
    pub fn cutoff(&self) -> f32 {
        self.cutoff
    }

    /// Q factor.
    pub fn q(&self) -> f32 {
        self.q
    }

    /// Change sample rate, keeping cutoff and Q.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.cutoff = self.cutoff.min(sample_rate * 0.49);
        self.update_coefficients();
    }

    /// Clear the integrators.
    pub fn reset(&mut self) {
        self.ic1eq = 0.0;
        self.ic2eq = 0.0;
    }

    fn update_coefficients(&mut self) {
        self.g = tanf(PI * self.cutoff / self.sample_rate);
        self.k = 1.0 / self.q;
    }

    /// One sample; returns (low, high, band, notch).
    #[inline]
    pub fn process_all(&mut self, input: f32) -> (f32, f32, f32, f32) {
        let v3 = input - self.ic2eq;
        let v1 = (self.g * v3 + self.ic1eq) / (1.0 + self.g * (self.g + self.k));
        let v2 = self.ic2eq + self.g * v1;
        self.ic1eq = flush_denormal(2.0 * v1 - self.ic1eq);
        self.ic2eq = flush_denormal(2.0 * v2 - self.ic2eq);
        let hp = input - self.k * v1 - v2;
        (v2, hp, v1, v2 + hp)
    }

    /// One sample of the selected response.
    #[inline]
    pub fn process(&mut self, input: f32, output: SvfOutput) -> f32 {
        let (lp, hp, bp, notch) = self.process_all(input);
        match output {
            SvfOutput::Lowpass => lp,
            SvfOutput::Highpass => hp,
            SvfOutput::Bandpass => bp,
            SvfOutput::Notch => notch,
        }
    }
}

/// Stereo filter with all eight [`FilterKind`]s.
///
/// Each channel owns two [`Svf`] stages. The 12 dB kinds use the first stage
/// only; the 24 dB kinds run both with the same cutoff and Q. Switching kind
/// keeps the integrator state, as the lane filter may change type mid-note.
///
/// ```rust
/// use orrery_core::{Effect, FilterKind, MultimodeFilter};
///
/// let mut f = MultimodeFilter::new(48000.0);
/// f.set_kind(FilterKind::Hp24);
/// f.set_params(200.0, 0.7071);
/// let (l, r) = f.process_stereo(0.5, 0.5);
/// assert!(l.is_finite() && r.is_finite());
/// ```
#[derive(Debug, Clone)]
pub struct MultimodeFilter {
    stages: [[Svf; 2]; 2],
    kind: FilterKind,
}

impl Default for MultimodeFilter {
    fn default() -> Self {
        Self::new(48000.0)
    }
}

impl MultimodeFilter {
    /// Low-pass 12 dB at 1 kHz.
    pub fn new(sample_rate: f32) -> Self {
        let stage = Svf::new(sample_rate);
        Self {
            stages: [[stage.clone(), stage.clone()], [stage.clone(), stage]],
            kind: FilterKind::Lp12,
        }
    }

    /// Select type and slope.
    pub fn set_kind(&mut self, kind: FilterKind) {
        self.kind = kind;
    }

    /// Current type and slope.
    pub fn kind(&self) -> FilterKind {
        self.kind
    }

    /// Cutoff in Hz and Q for every stage.
    pub fn set_params(&mut self, cutoff: f32, q: f32) {
        for channel in &mut self.stages {
            for stage in channel {
                stage.set_params(cutoff, q);
            }
        }
    }

    /// Cutoff in Hz.
    pub fn cutoff(&self) -> f32 {
        self.stages[0][0].cutoff()
    }

    #[inline]
    fn run(stages: &mut [Svf; 2], kind: FilterKind, input: f32) -> f32 {
        let output = kind.output();
        let first = stages[0].process(input, output);
        if kind.is_four_pole() {
            stages[1].process(first, output)
        } else {
            first
        }
    }

    /// Filter one mono sample through the left channel's stages.
    #[inline]
    pub fn process_mono(&mut self, input: f32) -> f32 {
        Self::run(&mut self.stages[0], self.kind, input)
    }
}

impl Effect for MultimodeFilter {
    #[inline]
    fn process_stereo(&mut self, left: f32, right: f32) -> (f32, f32) {
        let [l_stages, r_stages] = &mut self.stages;
        (
            Self::run(l_stages, self.kind, left),
            Self::run(r_stages, self.kind, right),
        )
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        for channel in &mut self.stages {
            for stage in channel {
                stage.set_sample_rate(sample_rate);
            }
        }
    }

    fn reset(&mut self) {
        for channel in &mut self.stages {
            for stage in channel {
                stage.reset();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine_rms(filter: &mut MultimodeFilter, freq: f32, sr: f32) -> f32 {
        let mut sum = 0.0;
        let n = 4800;
        for i in 0..(n * 2) {
            let x = libm::sinf(2.0 * PI * freq * i as f32 / sr);
            let (y, _) = filter.process_stereo(x, x);
            if i >= n {
                sum += y * y;
            }
        }
        libm::sqrtf(sum / n as f32)
    }

    #[test]
    fn test_lowpass_passes_dc() {
        let mut svf = Svf::new(48000.0);
        svf.set_params(1000.0, 0.7071);
        let mut y = 0.0;
        for _ in 0..2000 {
            y = svf.process(1.0, SvfOutput::Lowpass);
        }
        assert!((y - 1.0).abs() < 0.01, "LP DC gain {y}");
    }

    #[test]
    fn test_highpass_blocks_dc() {
        let mut svf = Svf::new(48000.0);
        svf.set_params(1000.0, 0.7071);
        let mut y = 1.0;
        for _ in 0..5000 {
            y = svf.process(1.0, SvfOutput::Highpass);
        }
        assert!(y.abs() < 0.01, "HP DC output {y}");
    }

    #[test]
    fn test_24db_steeper_than_12db() {
        let sr = 48000.0;
        let mut f12 = MultimodeFilter::new(sr);
        f12.set_params(500.0, 0.7071);
        let mut f24 = f12.clone();
        f24.set_kind(FilterKind::Lp24);
        let a12 = sine_rms(&mut f12, 4000.0, sr);
        let a24 = sine_rms(&mut f24, 4000.0, sr);
        assert!(a24 < a12 * 0.5, "24 dB {a24} vs 12 dB {a12}");
    }

    #[test]
    fn test_notch_rejects_centre() {
        let sr = 48000.0;
        let mut f = MultimodeFilter::new(sr);
        f.set_kind(FilterKind::Notch12);
        f.set_params(1000.0, 2.0);
        let rms = sine_rms(&mut f, 1000.0, sr);
        assert!(rms < 0.05, "notch rms {rms}");
    }

    #[test]
    fn test_from_index() {
        assert_eq!(FilterKind::from_index(3), Some(FilterKind::Hp24));
        assert_eq!(FilterKind::from_index(8), None);
        assert_eq!(FilterKind::LABELS.len(), FilterKind::ALL.len());
    }

    #[test]
    fn test_high_resonance_stays_finite() {
        let mut f = MultimodeFilter::new(48000.0);
        f.set_kind(FilterKind::Bp24);
        f.set_params(5000.0, resonance_to_q(100.0));
        for i in 0..48000 {
            let x = if i % 100 == 0 { 1.0 } else { 0.0 };
            let (l, r) = f.process_stereo(x, -x);
            assert!(l.is_finite() && r.is_finite());
        }
    }
}
