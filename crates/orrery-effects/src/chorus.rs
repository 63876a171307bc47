//! Stereo chorus with quadrature modulation.
//!
//! Each channel has its own delay line swept around a centre delay. The
//! right sweep runs 90° behind the left one, which keeps the two sides
//! decorrelated without a second rate control.

use core::f32::consts::TAU;
use libm::{ceilf, cosf, sinf};
use orrery_core::{DelayLine, Effect, SmoothedParam, flush_denormal};

/// Longest centre delay in milliseconds.
const MAX_DELAY_MS: f32 = 40.0;

/// Sweep at full depth, as a fraction of the centre delay.
const MAX_SWEEP: f32 = 0.5;

/// Chorus settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChorusParams {
    /// Sweep rate in Hz.
    pub rate_hz: f32,
    /// Sweep depth, 0..1.
    pub depth: f32,
    /// Centre delay in milliseconds.
    pub delay_ms: f32,
    /// Feedback, 0..0.95.
    pub feedback: f32,
    /// Dry level.
    pub dry: f32,
    /// Wet level.
    pub wet: f32,
}

impl Default for ChorusParams {
    fn default() -> Self {
        Self {
            rate_hz: 0.05,
            depth: 0.5,
            delay_ms: 20.0,
            feedback: 0.25,
            dry: 1.0,
            wet: 0.25,
        }
    }
}

/// Stereo chorus.
///
/// # Example
///
/// ```rust
/// use orrery_core::Effect;
/// use orrery_effects::{Chorus, ChorusParams};
///
/// let mut chorus = Chorus::new(44100.0);
/// chorus.set_params(&ChorusParams { rate_hz: 2.0, depth: 0.7, ..ChorusParams::default() });
///
/// let (l, r) = chorus.process_stereo(0.5, 0.5);
/// assert!(l.is_finite() && r.is_finite());
/// ```
#[derive(Debug, Clone)]
pub struct Chorus {
    params: ChorusParams,
    lines: [DelayLine; 2],
    phase: f32,
    delay_ms: SmoothedParam,
    depth: SmoothedParam,
    feedback: SmoothedParam,
    dry: SmoothedParam,
    wet: SmoothedParam,
    sample_rate: f32,
}

fn capacity(sample_rate: f32) -> usize {
    // centre plus the widest sweep, plus interpolation headroom
    ceilf(MAX_DELAY_MS * (1.0 + MAX_SWEEP) * 0.001 * sample_rate) as usize + 2
}

impl Chorus {
    /// Chorus with default settings.
    pub fn new(sample_rate: f32) -> Self {
        let params = ChorusParams::default();
        let line = DelayLine::new(capacity(sample_rate));
        Self {
            params,
            lines: [line.clone(), line],
            phase: 0.0,
            delay_ms: SmoothedParam::standard(params.delay_ms, sample_rate),
            depth: SmoothedParam::standard(params.depth, sample_rate),
            feedback: SmoothedParam::fast(params.feedback, sample_rate),
            dry: SmoothedParam::fast(params.dry, sample_rate),
            wet: SmoothedParam::fast(params.wet, sample_rate),
            sample_rate,
        }
    }

    /// Apply new settings.
    pub fn set_params(&mut self, params: &ChorusParams) {
        self.params = *params;
        self.delay_ms.set_target(params.delay_ms.clamp(1.0, MAX_DELAY_MS));
        self.depth.set_target(params.depth.clamp(0.0, 1.0));
        self.feedback.set_target(params.feedback.clamp(0.0, 0.95));
        self.dry.set_target(params.dry);
        self.wet.set_target(params.wet);
    }

    /// Current settings.
    pub fn params(&self) -> &ChorusParams {
        &self.params
    }
}

impl Effect for Chorus {
    #[inline]
    fn process_stereo(&mut self, left: f32, right: f32) -> (f32, f32) {
        let centre = self.delay_ms.advance() * 0.001 * self.sample_rate;
        let sweep = centre * MAX_SWEEP * self.depth.advance();
        let feedback = self.feedback.advance();
        let dry = self.dry.advance();
        let wet = self.wet.advance();

        let angle = self.phase * TAU;
        let delay_l = centre + sweep * sinf(angle);
        let delay_r = centre + sweep * cosf(angle);
        self.phase += self.params.rate_hz / self.sample_rate;
        self.phase -= libm::floorf(self.phase);

        let wet_l = self.lines[0].read(delay_l);
        let wet_r = self.lines[1].read(delay_r);
        self.lines[0].write(flush_denormal(left + wet_l * feedback));
        self.lines[1].write(flush_denormal(right + wet_r * feedback));

        (left * dry + wet_l * wet, right * dry + wet_r * wet)
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        let capacity = capacity(sample_rate);
        for line in &mut self.lines {
            line.resize(capacity);
        }
        for p in [
            &mut self.delay_ms,
            &mut self.depth,
            &mut self.feedback,
            &mut self.dry,
            &mut self.wet,
        ] {
            p.set_sample_rate(sample_rate);
        }
    }

    fn reset(&mut self) {
        for line in &mut self.lines {
            line.clear();
        }
        self.phase = 0.0;
        for p in [
            &mut self.delay_ms,
            &mut self.depth,
            &mut self.feedback,
            &mut self.dry,
            &mut self.wet,
        ] {
            p.snap_to_target();
        }
    }
}
