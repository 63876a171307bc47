//! Curved ADSR envelope with repeat modes.
//!
//! Each segment follows the same exponential family,
//!
//! ```text
//! shape(t, c) = (1 - e^(-k·c·t)) / (1 - e^(-k·c)),   k = 5
//! ```
//!
//! where `t` is the segment progress in 0..1 and `c` the curve amount in
//! −1..1 (0 is linear, positive bows fast-then-slow). The attack uses
//! `attack_curve`; decay and release share `decay_curve`, with the sign
//! flipped so that −1 gives the familiar fast-falling analog shape.
//!
//! While the gate is held an envelope can retrigger itself, either on a
//! tempo-synced note duration ([`RepeatMode::Sync`]) or every fixed number
//! of seconds ([`RepeatMode::Free`]). The caller resolves the duration into
//! [`EnvelopeParams::repeat_seconds`].

use libm::expf;

const CURVE_K: f32 = 5.0;

/// Envelope stages.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EnvelopeState {
    /// Output is zero.
    #[default]
    Idle,
    /// Rising toward 1.
    Attack,
    /// Falling from 1 toward the sustain level.
    Decay,
    /// Holding the sustain level while the gate is held.
    Sustain,
    /// Falling to zero after the gate closes.
    Release,
}

/// Self-retrigger behaviour while the gate is held.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RepeatMode {
    /// Play once.
    #[default]
    Off,
    /// Retrigger every tempo-synced note duration.
    Sync,
    /// Retrigger every `time` seconds.
    Free,
}

impl RepeatMode {
    /// Choice labels in parameter order.
    pub const LABELS: &'static [&'static str] = &["Off", "Sync", "Free"];

    /// Mode for a parameter value; out-of-range values fall back to `Off`.
    pub fn from_value(value: f32) -> Self {
        match libm::roundf(value) as i32 {
            1 => Self::Sync,
            2 => Self::Free,
            _ => Self::Off,
        }
    }
}

/// Envelope settings, refreshed once per sub-block.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EnvelopeParams {
    /// Attack time in seconds.
    pub attack: f32,
    /// Decay time in seconds.
    pub decay: f32,
    /// Sustain level, 0..1.
    pub sustain: f32,
    /// Release time in seconds.
    pub release: f32,
    /// Attack curve, −1..1.
    pub attack_curve: f32,
    /// Decay and release curve, −1..1.
    pub decay_curve: f32,
    /// Retrigger mode.
    pub repeat: RepeatMode,
    /// Retrigger period in seconds, already resolved for the mode.
    pub repeat_seconds: f32,
}

impl Default for EnvelopeParams {
    fn default() -> Self {
        Self {
            attack: 0.01,
            decay: 0.07,
            sustain: 0.5,
            release: 0.1,
            attack_curve: 1.0,
            decay_curve: -1.0,
            repeat: RepeatMode::Off,
            repeat_seconds: 0.1,
        }
    }
}

/// Normalised curve `shape(t, c)`; `t` and the result are in 0..1.
#[inline]
pub fn curve_shape(t: f32, curve: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    if curve.abs() < 1e-3 {
        return t;
    }
    let kc = CURVE_K * curve;
    (1.0 - expf(-kc * t)) / (1.0 - expf(-kc))
}

/// ADSR envelope generator.
///
/// ```rust
/// use orrery_synth::{Envelope, EnvelopeParams, EnvelopeState};
///
/// let mut env = Envelope::new(48000.0);
/// env.set_params(EnvelopeParams { attack: 0.001, ..EnvelopeParams::default() });
/// env.note_on();
/// for _ in 0..100 {
///     env.advance();
/// }
/// assert_eq!(env.state(), EnvelopeState::Decay);
/// ```
#[derive(Debug, Clone)]
pub struct Envelope {
    state: EnvelopeState,
    level: f32,
    start_level: f32,
    elapsed: u32,
    sample_rate: f32,
    params: EnvelopeParams,
    gate: bool,
    repeat_elapsed: u32,
}

impl Default for Envelope {
    fn default() -> Self {
        Self::new(48000.0)
    }
}

impl Envelope {
    /// Idle envelope with default settings.
    pub fn new(sample_rate: f32) -> Self {
        Self {
            state: EnvelopeState::Idle,
            level: 0.0,
            start_level: 0.0,
            elapsed: 0,
            sample_rate,
            params: EnvelopeParams::default(),
            gate: false,
            repeat_elapsed: 0,
        }
    }

    /// Change the sample rate; the current stage continues.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
    }

    /// Replace the settings.
    pub fn set_params(&mut self, params: EnvelopeParams) {
        self.params = params;
    }

    /// Current settings.
    pub fn params(&self) -> &EnvelopeParams {
        &self.params
    }

    /// Open the gate. Restarts the attack from the current level.
    pub fn note_on(&mut self) {
        self.gate = true;
        self.repeat_elapsed = 0;
        self.enter(EnvelopeState::Attack);
    }

    /// Close the gate.
    pub fn note_off(&mut self) {
        self.gate = false;
        if self.state != EnvelopeState::Idle {
            self.enter(EnvelopeState::Release);
        }
    }

    /// Jump to idle at zero.
    pub fn reset(&mut self) {
        self.state = EnvelopeState::Idle;
        self.level = 0.0;
        self.start_level = 0.0;
        self.elapsed = 0;
        self.gate = false;
        self.repeat_elapsed = 0;
    }

    /// Current stage.
    pub fn state(&self) -> EnvelopeState {
        self.state
    }

    /// Current output.
    pub fn level(&self) -> f32 {
        self.level
    }

    /// Not idle.
    pub fn is_active(&self) -> bool {
        self.state != EnvelopeState::Idle
    }

    fn enter(&mut self, state: EnvelopeState) {
        self.state = state;
        self.start_level = self.level;
        self.elapsed = 0;
    }

    #[inline]
    fn samples_for(&self, seconds: f32) -> u32 {
        libm::roundf(seconds.max(0.0) * self.sample_rate) as u32
    }

    // progress through the current segment, 1 when finished
    #[inline]
    fn step_segment(&mut self, seconds: f32) -> f32 {
        self.elapsed = self.elapsed.saturating_add(1);
        let len = self.samples_for(seconds);
        if self.elapsed >= len {
            1.0
        } else {
            self.elapsed as f32 / len as f32
        }
    }

    /// Advance one sample and return the level.
    #[inline]
    pub fn advance(&mut self) -> f32 {
        if self.gate && self.params.repeat != RepeatMode::Off {
            let period = self.samples_for(self.params.repeat_seconds);
            self.repeat_elapsed += 1;
            if period > 0 && self.repeat_elapsed >= period {
                self.repeat_elapsed = 0;
                self.enter(EnvelopeState::Attack);
            }
        }

        let falling = -self.params.decay_curve;
        match self.state {
            EnvelopeState::Idle => {
                self.level = 0.0;
            }
            EnvelopeState::Attack => {
                let t = self.step_segment(self.params.attack);
                let shape = curve_shape(t, self.params.attack_curve);
                self.level = self.start_level + (1.0 - self.start_level) * shape;
                if t >= 1.0 {
                    self.level = 1.0;
                    self.enter(EnvelopeState::Decay);
                }
            }
            EnvelopeState::Decay => {
                let sustain = self.params.sustain.clamp(0.0, 1.0);
                let t = self.step_segment(self.params.decay);
                let shape = curve_shape(t, falling);
                self.level = 1.0 + (sustain - 1.0) * shape;
                if t >= 1.0 {
                    self.level = sustain;
                    self.enter(EnvelopeState::Sustain);
                }
            }
            EnvelopeState::Sustain => {
                self.level = self.params.sustain.clamp(0.0, 1.0);
            }
            EnvelopeState::Release => {
                let t = self.step_segment(self.params.release);
                let shape = curve_shape(t, falling);
                self.level = self.start_level * (1.0 - shape);
                if t >= 1.0 {
                    self.level = 0.0;
                    self.state = EnvelopeState::Idle;
                }
            }
        }
        self.level
    }

    /// Advance `samples` samples and return the final level.
    pub fn process(&mut self, samples: usize) -> f32 {
        for _ in 0..samples {
            self.advance();
        }
        self.level
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 1000.0;

    fn quick_env() -> Envelope {
        let mut env = Envelope::new(SR);
        env.set_params(EnvelopeParams {
            attack: 0.01,
            decay: 0.01,
            sustain: 0.5,
            release: 0.01,
            attack_curve: 0.0,
            decay_curve: 0.0,
            ..EnvelopeParams::default()
        });
        env
    }

    #[test]
    fn test_curve_shape_endpoints() {
        for &c in &[-1.0, -0.5, 0.0, 0.3, 1.0] {
            assert!(curve_shape(0.0, c).abs() < 1e-6, "c={c}");
            assert!((curve_shape(1.0, c) - 1.0).abs() < 1e-6, "c={c}");
        }
        assert!(curve_shape(0.5, 1.0) > 0.5, "positive curve bows up");
        assert!(curve_shape(0.5, -1.0) < 0.5, "negative curve bows down");
    }

    #[test]
    fn test_idle_outputs_zero() {
        let mut env = quick_env();
        assert_eq!(env.advance(), 0.0);
        assert!(!env.is_active());
    }

    #[test]
    fn test_stage_sequence() {
        let mut env = quick_env();
        env.note_on();
        env.process(10);
        assert_eq!(env.state(), EnvelopeState::Decay);
        assert!((env.level() - 1.0).abs() < 1e-6);
        env.process(10);
        assert_eq!(env.state(), EnvelopeState::Sustain);
        env.process(5);
        assert!((env.level() - 0.5).abs() < 1e-6);
        env.note_off();
        assert_eq!(env.state(), EnvelopeState::Release);
        env.process(10);
        assert_eq!(env.state(), EnvelopeState::Idle);
        assert_eq!(env.level(), 0.0);
    }

    #[test]
    fn test_linear_attack_midpoint() {
        let mut env = quick_env();
        env.note_on();
        env.process(5);
        assert!((env.level() - 0.5).abs() < 1e-4, "level {}", env.level());
    }

    #[test]
    fn test_retrigger_from_current_level() {
        let mut env = quick_env();
        env.note_on();
        env.process(30);
        env.note_off();
        env.process(5);
        let before = env.level();
        env.note_on();
        let after = env.advance();
        assert!(after >= before, "retrigger must not drop to zero: {before} -> {after}");
    }

    #[test]
    fn test_zero_times_jump() {
        let mut env = Envelope::new(SR);
        env.set_params(EnvelopeParams {
            attack: 0.0,
            decay: 0.0,
            sustain: 0.25,
            release: 0.0,
            ..EnvelopeParams::default()
        });
        env.note_on();
        assert_eq!(env.advance(), 1.0);
        assert_eq!(env.advance(), 0.25);
        env.note_off();
        assert_eq!(env.advance(), 0.0);
        assert!(!env.is_active());
    }

    #[test]
    fn test_free_repeat_retriggers() {
        let mut env = quick_env();
        env.set_params(EnvelopeParams {
            repeat: RepeatMode::Free,
            repeat_seconds: 0.05,
            ..*env.params()
        });
        env.note_on();
        env.process(45);
        assert_eq!(env.state(), EnvelopeState::Sustain);
        env.process(6);
        assert_eq!(env.state(), EnvelopeState::Attack, "repeat after 50 ms");
    }

    #[test]
    fn test_repeat_stops_after_release() {
        let mut env = quick_env();
        env.set_params(EnvelopeParams {
            repeat: RepeatMode::Sync,
            repeat_seconds: 0.02,
            ..*env.params()
        });
        env.note_on();
        env.process(5);
        env.note_off();
        env.process(200);
        assert!(!env.is_active());
    }

    #[test]
    fn test_output_bounded() {
        let mut env = Envelope::new(48000.0);
        env.note_on();
        for i in 0..48000 {
            if i == 30000 {
                env.note_off();
            }
            let l = env.advance();
            assert!((0.0..=1.0).contains(&l), "level {l} at {i}");
        }
    }

    #[test]
    fn test_repeat_mode_from_value() {
        assert_eq!(RepeatMode::from_value(1.0), RepeatMode::Sync);
        assert_eq!(RepeatMode::from_value(2.2), RepeatMode::Free);
        assert_eq!(RepeatMode::from_value(7.0), RepeatMode::Off);
    }
}
