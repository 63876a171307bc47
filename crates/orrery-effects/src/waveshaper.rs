//! Waveshaper with seventeen transfer functions.
//!
//! # Signal Flow
//!
//! ```text
//! in → drive → high shelf (pre-emphasis) → f(x) → low-pass → gain ─┐
//!  └────────────────────────── dry ─────────────────────────────── + → out
//! ```
//!
//! The shelf boosts the top end before the nonlinearity so bright content
//! distorts harder; the low-pass after it tames the aliasing that produces.

use libm::{atanf, floorf, sinf, tanhf};
use orrery_core::{
    Biquad, BiquadCoefficients, Effect, SmoothedParam, Xorshift32, db_to_linear, foldback,
    hard_clip,
};

/// Linear boost of the pre-emphasis shelf.
const SHELF_GAIN: f32 = 2.0;

/// Transfer function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShaperFunction {
    /// `sin(x)`
    #[default]
    Sine,
    /// Arctangent, slope 2.
    Atan2,
    /// Arctangent, slope 4.
    Atan4,
    /// Arctangent, slope 6.
    Atan6,
    /// Hyperbolic tangent, slope 2.
    Tanh2,
    /// Hyperbolic tangent, slope 4.
    Tanh4,
    /// Hyperbolic tangent, slope 6.
    Tanh6,
    /// `1.5x − 0.5x³`, flat past ±1.
    CubicMid,
    /// `x³`, clipped at ±1.
    Cubic,
    /// Chebyshev polynomial T3.
    Cheb3,
    /// Chebyshev polynomial T5.
    Cheb5,
    /// Half-wave rectifier.
    Halfwave,
    /// Hard clip at ±1.
    Clipping,
    /// Quantise to 16 levels.
    Bitcrush,
    /// Amplitude-scaled noise added to the signal.
    Noise,
    /// Full-wave rectifier.
    Fullwave,
    /// Fold back at ±1.
    Wavefolder,
}

impl ShaperFunction {
    /// Every function, in parameter order.
    pub const ALL: [Self; 17] = [
        Self::Sine,
        Self::Atan2,
        Self::Atan4,
        Self::Atan6,
        Self::Tanh2,
        Self::Tanh4,
        Self::Tanh6,
        Self::CubicMid,
        Self::Cubic,
        Self::Cheb3,
        Self::Cheb5,
        Self::Halfwave,
        Self::Clipping,
        Self::Bitcrush,
        Self::Noise,
        Self::Fullwave,
        Self::Wavefolder,
    ];

    /// Display labels in parameter order.
    pub const LABELS: &'static [&'static str] = &[
        "Sine",
        "Atan 2",
        "Atan 4",
        "Atan 6",
        "Tanh 2",
        "Tanh 4",
        "Tanh 6",
        "Cubic mid",
        "Cubic",
        "Cheb 3",
        "Cheb 5",
        "Halfwave",
        "Clipping",
        "Bitcrush",
        "Noise",
        "Fullwave",
        "Wavefolder",
    ];

    /// Function for a parameter value; `None` past the end.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Shape one sample. `noise` supplies the [`Noise`](Self::Noise) function.
    #[inline]
    pub fn apply(self, x: f32, noise: &mut Xorshift32) -> f32 {
        const TWO_OVER_PI: f32 = core::f32::consts::FRAC_2_PI;
        match self {
            Self::Sine => sinf(x),
            Self::Atan2 => atanf(2.0 * x) * TWO_OVER_PI,
            Self::Atan4 => atanf(4.0 * x) * TWO_OVER_PI,
            Self::Atan6 => atanf(6.0 * x) * TWO_OVER_PI,
            Self::Tanh2 => tanhf(2.0 * x),
            Self::Tanh4 => tanhf(4.0 * x),
            Self::Tanh6 => tanhf(6.0 * x),
            Self::CubicMid => {
                let c = x.clamp(-1.0, 1.0);
                1.5 * c - 0.5 * c * c * c
            }
            Self::Cubic => {
                let c = x.clamp(-1.0, 1.0);
                c * c * c
            }
            Self::Cheb3 => {
                let c = x.clamp(-1.0, 1.0);
                4.0 * c * c * c - 3.0 * c
            }
            Self::Cheb5 => {
                let c = x.clamp(-1.0, 1.0);
                let c2 = c * c;
                c * (16.0 * c2 * c2 - 20.0 * c2 + 5.0)
            }
            Self::Halfwave => x.max(0.0),
            Self::Clipping => hard_clip(x, 1.0),
            Self::Bitcrush => floorf(x.clamp(-1.0, 1.0) * 8.0 + 0.5) / 8.0,
            Self::Noise => x + x.abs() * noise.next_bipolar() * 0.5,
            Self::Fullwave => x.abs(),
            Self::Wavefolder => foldback(x, 1.0),
        }
    }
}

/// Waveshaper settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaveshaperParams {
    /// Input drive in dB, 0..60.
    pub drive_db: f32,
    /// Shaped-signal gain in dB, −12..12.
    pub gain_db: f32,
    /// Dry level, 0..1.
    pub dry: f32,
    /// Wet level, 0..1.
    pub wet: f32,
    /// Transfer function.
    pub function: ShaperFunction,
    /// Pre-emphasis shelf corner in Hz.
    pub high_shelf_hz: f32,
    /// Pre-emphasis shelf Q.
    pub shelf_q: f32,
    /// Post low-pass corner in Hz.
    pub lowpass_hz: f32,
}

impl Default for WaveshaperParams {
    fn default() -> Self {
        Self {
            drive_db: 0.0,
            gain_db: 0.0,
            dry: 1.0,
            wet: 0.25,
            function: ShaperFunction::Sine,
            high_shelf_hz: 6500.0,
            shelf_q: 0.7071,
            lowpass_hz: 20_000.0,
        }
    }
}

/// Stereo waveshaper.
///
/// # Example
///
/// ```rust
/// use orrery_core::Effect;
/// use orrery_effects::{ShaperFunction, Waveshaper, WaveshaperParams};
///
/// let mut ws = Waveshaper::new(48000.0);
/// ws.set_params(&WaveshaperParams {
///     drive_db: 12.0,
///     function: ShaperFunction::Tanh4,
///     ..WaveshaperParams::default()
/// });
/// let (l, r) = ws.process_stereo(0.3, -0.3);
/// assert!(l.is_finite() && r.is_finite());
/// ```
#[derive(Debug, Clone)]
pub struct Waveshaper {
    params: WaveshaperParams,
    drive: SmoothedParam,
    gain: SmoothedParam,
    dry: SmoothedParam,
    wet: SmoothedParam,
    shelf: [Biquad; 2],
    lowpass: [Biquad; 2],
    noise: Xorshift32,
    sample_rate: f32,
}

impl Waveshaper {
    /// Waveshaper with default settings.
    pub fn new(sample_rate: f32) -> Self {
        let params = WaveshaperParams::default();
        let mut ws = Self {
            params,
            drive: SmoothedParam::fast(db_to_linear(params.drive_db), sample_rate),
            gain: SmoothedParam::fast(db_to_linear(params.gain_db), sample_rate),
            dry: SmoothedParam::fast(params.dry, sample_rate),
            wet: SmoothedParam::fast(params.wet, sample_rate),
            shelf: [Biquad::new(), Biquad::new()],
            lowpass: [Biquad::new(), Biquad::new()],
            noise: Xorshift32::new(0x5EED_0001),
            sample_rate,
        };
        ws.update_filters();
        ws
    }

    /// Apply new settings. Filters are redesigned only when their corner or
    /// Q moved.
    pub fn set_params(&mut self, params: &WaveshaperParams) {
        let filters_moved = params.high_shelf_hz != self.params.high_shelf_hz
            || params.shelf_q != self.params.shelf_q
            || params.lowpass_hz != self.params.lowpass_hz;
        self.params = *params;
        self.drive.set_target(db_to_linear(params.drive_db));
        self.gain.set_target(db_to_linear(params.gain_db));
        self.dry.set_target(params.dry);
        self.wet.set_target(params.wet);
        if filters_moved {
            self.update_filters();
        }
    }

    /// Current settings.
    pub fn params(&self) -> &WaveshaperParams {
        &self.params
    }

    fn update_filters(&mut self) {
        let shelf = BiquadCoefficients::high_shelf(
            self.params.high_shelf_hz,
            self.params.shelf_q,
            SHELF_GAIN,
            self.sample_rate,
        );
        let lowpass = BiquadCoefficients::lowpass(self.params.lowpass_hz, 0.7071, self.sample_rate);
        for (s, l) in self.shelf.iter_mut().zip(&mut self.lowpass) {
            s.set_coefficients(shelf);
            l.set_coefficients(lowpass);
        }
    }

    #[inline]
    fn shape(&mut self, channel: usize, x: f32, drive: f32) -> f32 {
        let emphasised = self.shelf[channel].process(x * drive);
        let shaped = self.params.function.apply(emphasised, &mut self.noise);
        self.lowpass[channel].process(shaped)
    }
}

impl Effect for Waveshaper {
    #[inline]
    fn process_stereo(&mut self, left: f32, right: f32) -> (f32, f32) {
        let drive = self.drive.advance();
        let gain = self.gain.advance();
        let dry = self.dry.advance();
        let wet = self.wet.advance() * gain;

        let l = self.shape(0, left, drive);
        let r = self.shape(1, right, drive);
        (left * dry + l * wet, right * dry + r * wet)
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        for p in [&mut self.drive, &mut self.gain, &mut self.dry, &mut self.wet] {
            p.set_sample_rate(sample_rate);
        }
        self.update_filters();
    }

    fn reset(&mut self) {
        for f in self.shelf.iter_mut().chain(&mut self.lowpass) {
            f.clear();
        }
        for p in [&mut self.drive, &mut self.gain, &mut self.dry, &mut self.wet] {
            p.snap_to_target();
        }
    }
}
