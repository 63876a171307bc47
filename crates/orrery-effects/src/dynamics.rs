//! Dynamics processor: compressor, limiter, expander and gate.
//!
//! A feed-forward design with linked stereo detection.
//!
//! # Signal Flow
//!
//! ```text
//! Input × in gain ─┬──────────────────────────────→ × gain × out gain → Output
//!                  ↓                                   ↑
//!   (or sidechain) → max(|L|, |R|) → Envelope Follower → Gain Computer
//! ```
//!
//! All four modes share the detector; they differ only in the static curve
//! the gain computer applies around the threshold.

use orrery_core::{Effect, EnvelopeFollower, SmoothedParam, fast_db_to_linear, fast_linear_to_db};

/// Deepest attenuation the gain computer applies, in dB.
const FLOOR_DB: f32 = -80.0;

/// Expansion ratio used by the gate.
const GATE_RATIO: f32 = 50.0;

/// Static curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DynamicsMode {
    /// Downward compression above the threshold.
    #[default]
    Compressor,
    /// Infinite-ratio compression.
    Limiter,
    /// Downward expansion below the threshold.
    Expander,
    /// Steep expansion below the threshold.
    Gate,
}

impl DynamicsMode {
    /// Every mode, in parameter order.
    pub const ALL: [Self; 4] = [Self::Compressor, Self::Limiter, Self::Expander, Self::Gate];

    /// Display labels in parameter order.
    pub const LABELS: &'static [&'static str] = &["Compressor", "Limiter", "Expander", "Gate"];

    /// Mode for a parameter value; `None` past the end.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

/// Dynamics settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DynamicsParams {
    /// Threshold in dB, −60..0.
    pub threshold_db: f32,
    /// Ratio, 1..20. Ignored by the limiter and gate.
    pub ratio: f32,
    /// Attack in seconds.
    pub attack: f32,
    /// Release in seconds.
    pub release: f32,
    /// Soft knee width in dB.
    pub knee_db: f32,
    /// Linear input gain, 0..5.
    pub input_gain: f32,
    /// Linear output gain, 0..5.
    pub output_gain: f32,
    /// Static curve.
    pub mode: DynamicsMode,
}

impl Default for DynamicsParams {
    fn default() -> Self {
        Self {
            threshold_db: -12.0,
            ratio: 2.0,
            attack: 0.0005,
            release: 0.1,
            knee_db: 6.0,
            input_gain: 1.0,
            output_gain: 1.0,
            mode: DynamicsMode::Compressor,
        }
    }
}

/// Gain change in dB (never positive) for a detector level in dB.
fn gain_db(params: &DynamicsParams, level_db: f32) -> f32 {
    let half_knee = params.knee_db * 0.5;
    let (distance, slope) = match params.mode {
        DynamicsMode::Compressor => (
            level_db - params.threshold_db,
            1.0 - 1.0 / params.ratio.max(1.0),
        ),
        DynamicsMode::Limiter => (level_db - params.threshold_db, 1.0),
        DynamicsMode::Expander => (params.threshold_db - level_db, params.ratio.max(1.0) - 1.0),
        DynamicsMode::Gate => (params.threshold_db - level_db, GATE_RATIO),
    };

    let reduction = if distance <= -half_knee {
        0.0
    } else if distance >= half_knee {
        distance * slope
    } else {
        // quadratic blend across the knee
        let x = distance + half_knee;
        slope * x * x / (2.0 * params.knee_db)
    };
    (-reduction).max(FLOOR_DB)
}

/// Stereo dynamics processor.
///
/// # Example
///
/// ```rust
/// use orrery_core::Effect;
/// use orrery_effects::{Dynamics, DynamicsParams};
///
/// let mut comp = Dynamics::new(44100.0);
/// comp.set_params(&DynamicsParams { threshold_db: -20.0, ratio: 4.0, ..DynamicsParams::default() });
///
/// let (l, r) = comp.process_stereo(0.5, 0.5);
/// assert!(l.abs() <= 0.5 && r.abs() <= 0.5);
/// ```
#[derive(Debug, Clone)]
pub struct Dynamics {
    params: DynamicsParams,
    follower: EnvelopeFollower,
    input_gain: SmoothedParam,
    output_gain: SmoothedParam,
    last_gain_db: f32,
}

impl Dynamics {
    /// Compressor with default settings.
    pub fn new(sample_rate: f32) -> Self {
        let params = DynamicsParams::default();
        Self {
            params,
            follower: EnvelopeFollower::with_times(sample_rate, params.attack, params.release),
            input_gain: SmoothedParam::fast(params.input_gain, sample_rate),
            output_gain: SmoothedParam::fast(params.output_gain, sample_rate),
            last_gain_db: 0.0,
        }
    }

    /// Apply new settings.
    pub fn set_params(&mut self, params: &DynamicsParams) {
        self.params = *params;
        self.follower.set_attack(params.attack);
        self.follower.set_release(params.release);
        self.input_gain.set_target(params.input_gain);
        self.output_gain.set_target(params.output_gain);
    }

    /// Current settings.
    pub fn params(&self) -> &DynamicsParams {
        &self.params
    }

    /// Gain change applied to the last frame, in dB (0 or negative).
    pub fn gain_reduction_db(&self) -> f32 {
        self.last_gain_db
    }

    /// Process one frame, detecting on `detector` instead of the input.
    #[inline]
    pub fn process_with_detector(
        &mut self,
        left: f32,
        right: f32,
        detector: (f32, f32),
    ) -> (f32, f32) {
        let input_gain = self.input_gain.advance();
        let output_gain = self.output_gain.advance();
        let level = detector.0.abs().max(detector.1.abs());
        let envelope = self.follower.process(level);
        let g = gain_db(&self.params, fast_linear_to_db(envelope));
        self.last_gain_db = g;
        let gain = fast_db_to_linear(g) * input_gain * output_gain;
        (left * gain, right * gain)
    }

    /// Process a block in place, detecting on `sidechain`.
    pub fn process_block_sidechain(
        &mut self,
        left: &mut [f32],
        right: &mut [f32],
        sidechain: (&[f32], &[f32]),
    ) {
        let (sc_left, sc_right) = sidechain;
        for (((l, r), &sl), &sr) in left.iter_mut().zip(right.iter_mut()).zip(sc_left).zip(sc_right) {
            (*l, *r) = self.process_with_detector(*l, *r, (sl, sr));
        }
    }
}

impl Effect for Dynamics {
    #[inline]
    fn process_stereo(&mut self, left: f32, right: f32) -> (f32, f32) {
        let g = self.input_gain.get();
        self.process_with_detector(left, right, (left * g, right * g))
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.follower.set_sample_rate(sample_rate);
        self.input_gain.set_sample_rate(sample_rate);
        self.output_gain.set_sample_rate(sample_rate);
    }

    fn reset(&mut self) {
        self.follower.reset();
        self.input_gain.snap_to_target();
        self.output_gain.snap_to_target();
        self.last_gain_db = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(mode: DynamicsMode) -> DynamicsParams {
        DynamicsParams {
            threshold_db: -20.0,
            ratio: 4.0,
            knee_db: 0.0,
            mode,
            ..DynamicsParams::default()
        }
    }

    #[test]
    fn test_compressor_curve() {
        let p = params(DynamicsMode::Compressor);
        assert_eq!(gain_db(&p, -30.0), 0.0);
        // 8 dB over at 4:1 leaves 2 dB over
        assert!((gain_db(&p, -12.0) + 6.0).abs() < 1e-5);
    }

    #[test]
    fn test_limiter_curve_holds_threshold() {
        let p = params(DynamicsMode::Limiter);
        assert!((gain_db(&p, -5.0) + 15.0).abs() < 1e-5);
    }

    #[test]
    fn test_expander_and_gate_act_below_threshold() {
        let e = params(DynamicsMode::Expander);
        assert_eq!(gain_db(&e, -10.0), 0.0);
        assert!((gain_db(&e, -30.0) + 30.0).abs() < 1e-5, "10 dB under at 4:1");
        let g = params(DynamicsMode::Gate);
        assert_eq!(gain_db(&g, -40.0), FLOOR_DB);
    }

    #[test]
    fn test_soft_knee_is_continuous() {
        let p = DynamicsParams {
            knee_db: 10.0,
            ..params(DynamicsMode::Compressor)
        };
        let below = gain_db(&p, -25.0 - 1e-3);
        let at = gain_db(&p, -25.0);
        assert!((below - at).abs() < 1e-3);
        let inner = gain_db(&p, -15.0 - 1e-3);
        let outer = gain_db(&p, -15.0 + 1e-3);
        assert!((inner - outer).abs() < 1e-2);
    }

    #[test]
    fn test_compresses_loud_signal() {
        let mut comp = Dynamics::new(48000.0);
        comp.set_params(&params(DynamicsMode::Compressor));
        comp.reset();
        let mut out = 0.0;
        for _ in 0..4800 {
            out = comp.process_stereo(0.9, 0.9).0;
        }
        assert!(out < 0.5, "steady 0.9 input should be reduced, got {out}");
        assert!(comp.gain_reduction_db() < -3.0);
    }

    #[test]
    fn test_sidechain_drives_gain() {
        let mut comp = Dynamics::new(48000.0);
        comp.set_params(&params(DynamicsMode::Compressor));
        comp.reset();
        let mut left = vec![0.1; 4800];
        let mut right = vec![0.1; 4800];
        let loud = vec![1.0; 4800];
        comp.process_block_sidechain(&mut left, &mut right, (&loud, &loud));
        assert!(left[4799] < 0.05, "quiet input ducked by loud key");

        let mut comp = Dynamics::new(48000.0);
        comp.set_params(&params(DynamicsMode::Compressor));
        comp.reset();
        let (l, _) = comp.process_stereo(0.1, 0.1);
        assert!((l - 0.1).abs() < 1e-4, "quiet input alone is untouched");
    }
}
