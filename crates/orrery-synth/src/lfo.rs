//! Control-rate LFO with seventeen shapes.
//!
//! The same [`Lfo`] type serves both roles: four mono LFOs owned by the
//! processor run freely across notes, and four poly LFOs per voice restart at
//! note-on. Both are advanced once per sub-block with
//! [`process`](Lfo::process), and their output is read as a modulation source
//! value.
//!
//! Output is `offset + depth × fade × shape(phase)`. During the initial
//! `delay` the output sits at `offset`. A positive `fade` ramps the shape in
//! over that many seconds after the delay; a negative one ramps it out.

use orrery_core::Xorshift32;

/// Waveform of an [`Lfo`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LfoShape {
    /// Sine.
    #[default]
    Sine,
    /// Triangle starting at zero.
    Triangle,
    /// Rising ramp.
    SawUp,
    /// Falling ramp.
    SawDown,
    /// Bipolar square.
    Square,
    /// Unipolar square, 1 then 0.
    SquarePos,
    /// New random value each cycle.
    SampleAndHold,
    /// Random values joined by straight lines.
    Noise,
    /// Three rising steps.
    StepUp3,
    /// Four rising steps.
    StepUp4,
    /// Eight rising steps.
    StepUp8,
    /// Three falling steps.
    StepDown3,
    /// Four falling steps.
    StepDown4,
    /// Eight falling steps.
    StepDown8,
    /// Up and down over three levels.
    Pyramid3,
    /// Up and down over five levels.
    Pyramid5,
    /// Up and down over nine levels.
    Pyramid9,
}

impl LfoShape {
    /// Every shape in parameter order; the `wave` parameter is 1-based.
    pub const ALL: [LfoShape; 17] = [
        LfoShape::Sine,
        LfoShape::Triangle,
        LfoShape::SawUp,
        LfoShape::SawDown,
        LfoShape::Square,
        LfoShape::SquarePos,
        LfoShape::SampleAndHold,
        LfoShape::Noise,
        LfoShape::StepUp3,
        LfoShape::StepUp4,
        LfoShape::StepUp8,
        LfoShape::StepDown3,
        LfoShape::StepDown4,
        LfoShape::StepDown8,
        LfoShape::Pyramid3,
        LfoShape::Pyramid5,
        LfoShape::Pyramid9,
    ];

    /// Display labels in parameter order.
    pub const LABELS: &'static [&'static str] = &[
        "Sine",
        "Triangle",
        "Saw Up",
        "Saw Down",
        "Square",
        "Square+",
        "S&H",
        "Noise",
        "Step Up 3",
        "Step Up 4",
        "Step Up 8",
        "Step Down 3",
        "Step Down 4",
        "Step Down 8",
        "Pyramid 3",
        "Pyramid 5",
        "Pyramid 9",
    ];

    /// Shape for a 1-based `wave` parameter value, clamped into range.
    pub fn from_value(value: f32) -> Self {
        let idx = (libm::roundf(value) as i32 - 1).clamp(0, 16) as usize;
        Self::ALL[idx]
    }

    /// Deterministic shapes evaluated at `t` in 0..1.
    ///
    /// The random shapes return 0 here; [`Lfo`] keeps their state.
    pub fn evaluate(self, t: f32) -> f32 {
        match self {
            Self::Sine => libm::sinf(core::f32::consts::TAU * t),
            Self::Triangle => {
                if t < 0.25 {
                    4.0 * t
                } else if t < 0.75 {
                    2.0 - 4.0 * t
                } else {
                    4.0 * t - 4.0
                }
            }
            Self::SawUp => 2.0 * t - 1.0,
            Self::SawDown => 1.0 - 2.0 * t,
            Self::Square => {
                if t < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Self::SquarePos => {
                if t < 0.5 {
                    1.0
                } else {
                    0.0
                }
            }
            Self::SampleAndHold | Self::Noise => 0.0,
            Self::StepUp3 => steps(t, 3),
            Self::StepUp4 => steps(t, 4),
            Self::StepUp8 => steps(t, 8),
            Self::StepDown3 => -steps(t, 3),
            Self::StepDown4 => -steps(t, 4),
            Self::StepDown8 => -steps(t, 8),
            Self::Pyramid3 => pyramid(t, 3),
            Self::Pyramid5 => pyramid(t, 5),
            Self::Pyramid9 => pyramid(t, 9),
        }
    }
}

// n levels spread over −1..1, rising
fn steps(t: f32, n: usize) -> f32 {
    let idx = ((t * n as f32) as usize).min(n - 1);
    idx as f32 / (n - 1) as f32 * 2.0 - 1.0
}

// n levels up then back down, 2n − 2 segments per cycle
fn pyramid(t: f32, n: usize) -> f32 {
    let segments = 2 * n - 2;
    let k = ((t * segments as f32) as usize).min(segments - 1);
    let idx = if k < n { k } else { segments - k };
    idx as f32 / (n - 1) as f32 * 2.0 - 1.0
}

/// LFO settings, refreshed once per sub-block.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LfoParams {
    /// Waveform.
    pub shape: LfoShape,
    /// Rate in Hz, already resolved from tempo when synced.
    pub frequency: f32,
    /// Phase offset in cycles, −1..1.
    pub phase: f32,
    /// Added to the output.
    pub offset: f32,
    /// Output scale, −1..1.
    pub depth: f32,
    /// Seconds of silence before the shape starts.
    pub delay: f32,
    /// Fade-in (positive) or fade-out (negative) time in seconds.
    pub fade: f32,
}

impl Default for LfoParams {
    fn default() -> Self {
        Self {
            shape: LfoShape::Sine,
            frequency: 1.0,
            phase: 0.0,
            offset: 0.0,
            depth: 1.0,
            delay: 0.0,
            fade: 0.0,
        }
    }
}

/// Low frequency oscillator.
///
/// ```rust
/// use orrery_synth::{Lfo, LfoParams, LfoShape};
///
/// let mut lfo = Lfo::new(48000.0, 1);
/// lfo.set_params(LfoParams { shape: LfoShape::SawUp, frequency: 1.0, ..LfoParams::default() });
/// let v = lfo.process(24000);
/// assert!(v.abs() < 1e-3);
/// ```
#[derive(Debug, Clone)]
pub struct Lfo {
    sample_rate: f32,
    params: LfoParams,
    phase: f32,
    elapsed: f32,
    output: f32,
    rng: Xorshift32,
    held: f32,
    previous: f32,
}

impl Lfo {
    /// LFO at rest. `seed` feeds the random shapes.
    pub fn new(sample_rate: f32, seed: u32) -> Self {
        let mut rng = Xorshift32::new(seed);
        let held = rng.next_bipolar();
        Self {
            sample_rate,
            params: LfoParams::default(),
            phase: 0.0,
            elapsed: 0.0,
            output: 0.0,
            rng,
            held,
            previous: 0.0,
        }
    }

    /// Change the sample rate.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
    }

    /// Replace the settings.
    pub fn set_params(&mut self, params: LfoParams) {
        self.params = params;
    }

    /// Current settings.
    pub fn params(&self) -> &LfoParams {
        &self.params
    }

    /// Restart from phase zero, including delay and fade.
    pub fn reset(&mut self) {
        self.phase = 0.0;
        self.elapsed = 0.0;
        self.previous = self.held;
        self.held = self.rng.next_bipolar();
        self.output = self.compute();
    }

    /// Restart at note-on.
    pub fn note_on(&mut self) {
        self.reset();
    }

    /// Last computed output.
    pub fn output(&self) -> f32 {
        self.output
    }

    /// Phase in cycles, 0..1.
    pub fn phase(&self) -> f32 {
        self.phase
    }

    /// Advance by `samples` and return the new output.
    pub fn process(&mut self, samples: usize) -> f32 {
        if self.sample_rate <= 0.0 {
            return self.output;
        }
        let dt = samples as f32 / self.sample_rate;
        self.elapsed += dt;
        if self.elapsed > self.params.delay {
            let advanced = self.phase + self.params.frequency.max(0.0) * dt;
            if advanced >= 1.0 {
                self.previous = self.held;
                self.held = self.rng.next_bipolar();
            }
            self.phase = advanced - libm::floorf(advanced);
        }
        self.output = self.compute();
        self.output
    }

    fn fade_gain(&self) -> f32 {
        let running = self.elapsed - self.params.delay;
        let fade = self.params.fade;
        if fade > 0.0 {
            (running / fade).clamp(0.0, 1.0)
        } else if fade < 0.0 {
            (1.0 - running / -fade).clamp(0.0, 1.0)
        } else {
            1.0
        }
    }

    fn compute(&self) -> f32 {
        if self.elapsed < self.params.delay {
            return self.params.offset;
        }
        let shifted = self.phase + self.params.phase;
        let t = shifted - libm::floorf(shifted);
        let raw = match self.params.shape {
            LfoShape::SampleAndHold => self.held,
            LfoShape::Noise => self.previous + (self.held - self.previous) * t,
            shape => shape.evaluate(t),
        };
        self.params.offset + self.params.depth * self.fade_gain() * raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_value_is_one_based() {
        assert_eq!(LfoShape::from_value(1.0), LfoShape::Sine);
        assert_eq!(LfoShape::from_value(17.0), LfoShape::Pyramid9);
        assert_eq!(LfoShape::from_value(0.0), LfoShape::Sine);
        assert_eq!(LfoShape::from_value(40.0), LfoShape::Pyramid9);
        assert_eq!(LfoShape::LABELS.len(), LfoShape::ALL.len());
    }

    #[test]
    fn test_deterministic_shapes_bounded() {
        for shape in LfoShape::ALL {
            for i in 0..1000 {
                let v = shape.evaluate(i as f32 / 1000.0);
                assert!((-1.0..=1.0).contains(&v), "{shape:?} gave {v}");
            }
        }
    }

    #[test]
    fn test_step_levels() {
        assert_eq!(LfoShape::StepUp3.evaluate(0.1), -1.0);
        assert_eq!(LfoShape::StepUp3.evaluate(0.5), 0.0);
        assert_eq!(LfoShape::StepUp3.evaluate(0.9), 1.0);
        assert_eq!(LfoShape::StepDown4.evaluate(0.0), 1.0);
    }

    #[test]
    fn test_pyramid_goes_up_and_down() {
        let levels: Vec<f32> = (0..4)
            .map(|k| LfoShape::Pyramid3.evaluate(k as f32 * 0.25 + 0.1))
            .collect();
        assert_eq!(levels, vec![-1.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_square_pos_unipolar() {
        assert_eq!(LfoShape::SquarePos.evaluate(0.2), 1.0);
        assert_eq!(LfoShape::SquarePos.evaluate(0.7), 0.0);
    }

    #[test]
    fn test_delay_holds_offset() {
        let mut lfo = Lfo::new(1000.0, 3);
        lfo.set_params(LfoParams {
            offset: 0.25,
            delay: 0.5,
            ..LfoParams::default()
        });
        lfo.reset();
        assert_eq!(lfo.process(100), 0.25);
        assert_eq!(lfo.phase(), 0.0, "phase frozen during delay");
    }

    #[test]
    fn test_fade_in_scales_depth() {
        let mut lfo = Lfo::new(1000.0, 3);
        lfo.set_params(LfoParams {
            shape: LfoShape::Square,
            frequency: 0.1,
            fade: 1.0,
            ..LfoParams::default()
        });
        lfo.reset();
        let v = lfo.process(500);
        assert!((v - 0.5).abs() < 1e-3, "half faded: {v}");
        let v = lfo.process(1000);
        assert!((v - 1.0).abs() < 1e-3, "fully faded in: {v}");
    }

    #[test]
    fn test_fade_out_reaches_zero() {
        let mut lfo = Lfo::new(1000.0, 3);
        lfo.set_params(LfoParams {
            shape: LfoShape::Square,
            frequency: 0.1,
            fade: -1.0,
            offset: 0.1,
            ..LfoParams::default()
        });
        lfo.reset();
        let v = lfo.process(2000);
        assert!((v - 0.1).abs() < 1e-6, "faded out to offset: {v}");
    }

    #[test]
    fn test_sample_and_hold_changes_per_cycle() {
        let mut lfo = Lfo::new(1000.0, 9);
        lfo.set_params(LfoParams {
            shape: LfoShape::SampleAndHold,
            frequency: 10.0,
            ..LfoParams::default()
        });
        lfo.reset();
        let a = lfo.process(10);
        let b = lfo.process(10);
        assert_eq!(a, b, "held within a cycle");
        let c = lfo.process(100);
        assert_ne!(b, c, "new value after wrapping");
    }

    #[test]
    fn test_phase_offset_shifts_shape() {
        let mut lfo = Lfo::new(1000.0, 1);
        lfo.set_params(LfoParams {
            shape: LfoShape::SawUp,
            frequency: 1.0,
            phase: 0.5,
            ..LfoParams::default()
        });
        lfo.reset();
        assert!(lfo.output().abs() < 1e-6);
    }
}
