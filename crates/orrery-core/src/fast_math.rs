//! Fast approximations used on the per-sample path.
//!
//! | Function | Replaces | Max error |
//! |----------|----------|-----------|
//! | [`poly_sin`] | `libm::sinf` on (−π, π] | < 4e-6 |
//! | [`semitone_power`] | `2^(x/12)` for \|x\| ≤ 2 | < 1e-6 |
//! | [`fast_exp2`] | `libm::exp2f` | < 0.2% |
//! | [`fast_log2`] | `libm::log2f` | < 0.2% |
//! | [`fast_db_to_linear`] | [`db_to_linear`](crate::db_to_linear) | < 0.05 dB |
//! | [`fast_linear_to_db`] | [`linear_to_db`](crate::linear_to_db) | < 0.05 dB |
//!
//! The oscillator calls [`sine_for_phase_and_tones`] twelve times per unison
//! voice per sample, so its inner sine must stay cheap and branch-light.

use core::f32::consts::{FRAC_PI_2, PI, TAU};
use libm::floorf;

/// Number of partials summed by [`sine_for_phase_and_tones`].
pub const MAX_PARTIALS: usize = 6;

/// Partial weights, a truncated sawtooth series.
pub const PARTIAL_WEIGHTS: [f32; MAX_PARTIALS] = [1.0, 0.5, 0.33, 0.25, 0.2, 0.16];

/// Wrap an angle to (−π, π].
#[inline]
pub fn wrap_pi(x: f32) -> f32 {
    if x > -PI && x <= PI {
        return x;
    }
    let wrapped = x - TAU * floorf((x + PI) / TAU);
    // floorf puts exact odd multiples of π at −π
    if wrapped <= -PI { wrapped + TAU } else { wrapped }
}

/// Sine of an angle in (−π, π].
///
/// Folds into [−π/2, π/2] and evaluates an odd degree-9 polynomial.
/// Inputs outside (−π, π] must be wrapped first with [`wrap_pi`].
///
/// ```rust
/// use orrery_core::fast_math::poly_sin;
///
/// assert!((poly_sin(core::f32::consts::FRAC_PI_2) - 1.0).abs() < 1e-5);
/// assert!(poly_sin(0.0).abs() < 1e-7);
/// ```
#[inline]
pub fn poly_sin(x: f32) -> f32 {
    let x = if x > FRAC_PI_2 {
        PI - x
    } else if x < -FRAC_PI_2 {
        -PI - x
    } else {
        x
    };
    let x2 = x * x;
    x * (1.0
        + x2 * (-1.666_666_7e-1
            + x2 * (8.333_333e-3 + x2 * (-1.984_127e-4 + x2 * 2.755_731_9e-6))))
}

/// `2^(x/12)`, the frequency ratio of `x` semitones.
///
/// Degree-4 Taylor expansion of `e^(x·ln2/12)`, accurate to 1e-6 over the
/// detune range (|x| ≤ 2).
#[inline]
pub fn semitone_power(x: f32) -> f32 {
    let mut u = 4.638_598_1e-7;
    u = u * x + 3.212_211e-5;
    u = u * x + 1.668_239_6e-3;
    u = u * x + 5.776_226_5e-2;
    u * x + 1.0
}

/// Amplitude of partial `k` (0-based) for a fractional partial count.
///
/// The fundamental is always present. Partial `k` fades in linearly as
/// `tones` goes from `k` to `k + 1`, so the sum is continuous in `tones`.
#[inline]
pub fn partial_amplitude(k: usize, tones: f32) -> f32 {
    if k == 0 {
        1.0
    } else {
        (tones - k as f32).clamp(0.0, 1.0)
    }
}

/// Additive sine for `tones` partials at `phase` (radians, (−π, π]).
///
/// ```rust
/// use orrery_core::fast_math::sine_for_phase_and_tones;
///
/// let a = sine_for_phase_and_tones(0.7, 2.999);
/// let b = sine_for_phase_and_tones(0.7, 3.0);
/// assert!((a - b).abs() < 1e-3);
/// ```
#[inline]
pub fn sine_for_phase_and_tones(phase: f32, tones: f32) -> f32 {
    let mut value = poly_sin(phase);
    for k in 1..MAX_PARTIALS {
        let amp = partial_amplitude(k, tones);
        if amp <= 0.0 {
            break;
        }
        let harmonic = wrap_pi(phase * (k + 1) as f32);
        value += poly_sin(harmonic) * PARTIAL_WEIGHTS[k] * amp;
    }
    value
}

/// Quadrature partner of [`sine_for_phase_and_tones`]: each partial's cosine.
#[inline]
pub fn cosine_for_phase_and_tones(phase: f32, tones: f32) -> f32 {
    let mut value = poly_sin(wrap_pi(phase + FRAC_PI_2));
    for k in 1..MAX_PARTIALS {
        let amp = partial_amplitude(k, tones);
        if amp <= 0.0 {
            break;
        }
        let harmonic = wrap_pi(phase * (k + 1) as f32 + FRAC_PI_2);
        value += poly_sin(harmonic) * PARTIAL_WEIGHTS[k] * amp;
    }
    value
}

/// Fast base-2 logarithm from the float's exponent and a quadratic on the
/// mantissa. `x` must be positive.
#[inline]
pub fn fast_log2(x: f32) -> f32 {
    let bits = x.to_bits();
    let exponent = ((bits >> 23) & 0xFF) as i32 - 127;
    let m = f32::from_bits((bits & 0x007F_FFFF) | 0x3F80_0000);
    exponent as f32 + (m * (m * -0.344_845_6 + 2.024_094) - 1.674_094)
}

/// Fast `2^x`: exact integer part through the exponent bits, cubic on the
/// fraction. Input is clamped to ±126.
#[inline]
pub fn fast_exp2(x: f32) -> f32 {
    let x = x.clamp(-126.0, 126.0);
    let i = floorf(x) as i32;
    let f = x - i as f32;
    let p = 1.0 + f * (core::f32::consts::LN_2 + f * (0.240_226 + f * 0.055_504_1));
    f32::from_bits(((i + 127) as u32) << 23) * p
}

/// Fast dB to linear gain.
#[inline]
pub fn fast_db_to_linear(db: f32) -> f32 {
    const FACTOR: f32 = core::f32::consts::LOG2_10 / 20.0;
    fast_exp2(db * FACTOR)
}

/// Fast linear gain to dB. Input is floored at 1e-10.
#[inline]
pub fn fast_linear_to_db(linear: f32) -> f32 {
    const FACTOR: f32 = 20.0 / core::f32::consts::LOG2_10;
    fast_log2(linear.max(1e-10)) * FACTOR
}
