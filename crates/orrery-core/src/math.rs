//! Scalar helpers shared by the synth and the effects.
//!
//! - Level: [`db_to_linear`], [`linear_to_db`]
//! - Pitch: [`midi_note_to_hz`], [`hz_to_midi_note`]
//! - Shaping: [`hard_clip`], [`foldback`], [`lerp`]
//! - Pan law: [`lane_pan_gains`]
//! - Hygiene: [`flush_denormal`], [`sanitize`]

use libm::{expf, logf};

/// Convert decibels to linear gain.
///
/// ```rust
/// use orrery_core::db_to_linear;
///
/// assert!((db_to_linear(0.0) - 1.0).abs() < 1e-6);
/// assert!((db_to_linear(-6.02) - 0.5).abs() < 0.01);
/// ```
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    const FACTOR: f32 = core::f32::consts::LN_10 / 20.0;
    expf(db * FACTOR)
}

/// Convert linear gain to decibels. Input is floored at 1e-10.
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    const FACTOR: f32 = 20.0 / core::f32::consts::LN_10;
    logf(linear.max(1e-10)) * FACTOR
}

/// Equal-tempered note number to Hz, A4 (69) = 440 Hz. Fractional notes allowed.
#[inline]
pub fn midi_note_to_hz(note: f32) -> f32 {
    440.0 * libm::exp2f((note - 69.0) / 12.0)
}

/// Inverse of [`midi_note_to_hz`].
#[inline]
pub fn hz_to_midi_note(hz: f32) -> f32 {
    69.0 + 12.0 * libm::log2f(hz.max(1e-6) / 440.0)
}

/// Clamp to `±threshold`.
#[inline]
pub fn hard_clip(x: f32, threshold: f32) -> f32 {
    x.clamp(-threshold, threshold)
}

/// Fold the signal back at `±threshold` until it lies inside.
///
/// ```rust
/// use orrery_core::foldback;
///
/// assert_eq!(foldback(0.5, 1.0), 0.5);
/// assert!((foldback(1.25, 1.0) - 0.75).abs() < 1e-6);
/// assert!((foldback(3.5, 1.0) + 0.5).abs() < 1e-6);
/// ```
#[inline]
pub fn foldback(x: f32, threshold: f32) -> f32 {
    if threshold <= 0.0 {
        return 0.0;
    }
    if x.abs() <= threshold {
        return x;
    }
    // triangle wave of period 4·threshold
    let period = 4.0 * threshold;
    let shifted = x + threshold;
    let m = shifted - period * libm::floorf(shifted / period);
    if m < 2.0 * threshold {
        m - threshold
    } else {
        3.0 * threshold - m
    }
}

/// Linear interpolation, `t = 0` gives `a`.
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Lane gain split: `gain × min(1 − pan, 1)` on the left and
/// `gain × min(1 + pan, 1)` on the right.
///
/// Centre keeps full gain on both sides; hard left mutes the right channel.
#[inline]
pub fn lane_pan_gains(gain: f32, pan: f32) -> (f32, f32) {
    let pan = pan.clamp(-1.0, 1.0);
    (gain * (1.0 - pan).min(1.0), gain * (1.0 + pan).min(1.0))
}

/// Zero anything below 1e-20 in magnitude.
#[allow(clippy::inline_always)]
#[inline(always)]
pub fn flush_denormal(x: f32) -> f32 {
    if x.abs() < 1e-20 { 0.0 } else { x }
}

/// Replace NaN and infinities with 0 and flush denormals.
#[inline]
pub fn sanitize(x: f32) -> f32 {
    if x.is_finite() { flush_denormal(x) } else { 0.0 }
}
