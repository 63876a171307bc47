//! Biquad filter with RBJ cookbook designs.
//!
//! Coefficients are computed into a [`BiquadCoefficients`] value, already
//! normalised by `a0`, and loaded into a [`Biquad`] with
//! [`Biquad::set_coefficients`]. Designs taking a gain take it as a linear
//! amplitude factor, which is how the multiband filter and shelves are
//! parameterised.
//!
//! Reference: R. Bristow-Johnson, "Cookbook formulae for audio EQ biquad
//! filter coefficients".

use core::f32::consts::PI;
use libm::{cosf, sinf, sqrtf};

use crate::flush_denormal;

/// Normalised biquad coefficients (`a0 = 1`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoefficients {
    /// Feed-forward x\[n\].
    pub b0: f32,
    /// Feed-forward x\[n-1\].
    pub b1: f32,
    /// Feed-forward x\[n-2\].
    pub b2: f32,
    /// Feedback y\[n-1\].
    pub a1: f32,
    /// Feedback y\[n-2\].
    pub a2: f32,
}

impl BiquadCoefficients {
    /// Unity pass-through.
    pub const IDENTITY: Self = Self {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };

    fn normalised(b0: f32, b1: f32, b2: f32, a0: f32, a1: f32, a2: f32) -> Self {
        let inv = 1.0 / a0;
        Self {
            b0: b0 * inv,
            b1: b1 * inv,
            b2: b2 * inv,
            a1: a1 * inv,
            a2: a2 * inv,
        }
    }

    /// Second-order low-pass.
    pub fn lowpass(frequency: f32, q: f32, sample_rate: f32) -> Self {
        let (cos_w, alpha) = omega(frequency, q, sample_rate);
        let b = (1.0 - cos_w) * 0.5;
        Self::normalised(b, 1.0 - cos_w, b, 1.0 + alpha, -2.0 * cos_w, 1.0 - alpha)
    }

    /// Second-order high-pass.
    pub fn highpass(frequency: f32, q: f32, sample_rate: f32) -> Self {
        let (cos_w, alpha) = omega(frequency, q, sample_rate);
        let b = (1.0 + cos_w) * 0.5;
        Self::normalised(b, -(1.0 + cos_w), b, 1.0 + alpha, -2.0 * cos_w, 1.0 - alpha)
    }

    /// Peaking bell with linear gain at the centre.
    pub fn peak(frequency: f32, q: f32, gain: f32, sample_rate: f32) -> Self {
        let (cos_w, alpha) = omega(frequency, q, sample_rate);
        let a = sqrtf(gain.max(1e-6));
        Self::normalised(
            1.0 + alpha * a,
            -2.0 * cos_w,
            1.0 - alpha * a,
            1.0 + alpha / a,
            -2.0 * cos_w,
            1.0 - alpha / a,
        )
    }

    /// Low shelf with linear gain below the corner.
    pub fn low_shelf(frequency: f32, q: f32, gain: f32, sample_rate: f32) -> Self {
        let (cos_w, alpha) = omega(frequency, q, sample_rate);
        let a = sqrtf(gain.max(1e-6));
        let two_sqrt_a_alpha = 2.0 * sqrtf(a) * alpha;
        Self::normalised(
            a * ((a + 1.0) - (a - 1.0) * cos_w + two_sqrt_a_alpha),
            2.0 * a * ((a - 1.0) - (a + 1.0) * cos_w),
            a * ((a + 1.0) - (a - 1.0) * cos_w - two_sqrt_a_alpha),
            (a + 1.0) + (a - 1.0) * cos_w + two_sqrt_a_alpha,
            -2.0 * ((a - 1.0) + (a + 1.0) * cos_w),
            (a + 1.0) + (a - 1.0) * cos_w - two_sqrt_a_alpha,
        )
    }

    /// High shelf with linear gain above the corner.
    pub fn high_shelf(frequency: f32, q: f32, gain: f32, sample_rate: f32) -> Self {
        let (cos_w, alpha) = omega(frequency, q, sample_rate);
        let a = sqrtf(gain.max(1e-6));
        let two_sqrt_a_alpha = 2.0 * sqrtf(a) * alpha;
        Self::normalised(
            a * ((a + 1.0) + (a - 1.0) * cos_w + two_sqrt_a_alpha),
            -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w),
            a * ((a + 1.0) + (a - 1.0) * cos_w - two_sqrt_a_alpha),
            (a + 1.0) - (a - 1.0) * cos_w + two_sqrt_a_alpha,
            2.0 * ((a - 1.0) - (a + 1.0) * cos_w),
            (a + 1.0) - (a - 1.0) * cos_w - two_sqrt_a_alpha,
        )
    }
}

// (cos ω, α) with the frequency kept below Nyquist
fn omega(frequency: f32, q: f32, sample_rate: f32) -> (f32, f32) {
    let f = frequency.clamp(1.0, sample_rate * 0.49);
    let w = 2.0 * PI * f / sample_rate;
    (cosf(w), sinf(w) / (2.0 * q.max(0.01)))
}

/// Transposed direct form II biquad.
#[derive(Debug, Clone)]
pub struct Biquad {
    coeffs: BiquadCoefficients,
    s1: f32,
    s2: f32,
}

impl Biquad {
    /// Pass-through biquad.
    pub fn new() -> Self {
        Self {
            coeffs: BiquadCoefficients::IDENTITY,
            s1: 0.0,
            s2: 0.0,
        }
    }

    /// Biquad initialised with `coeffs`.
    pub fn with_coefficients(coeffs: BiquadCoefficients) -> Self {
        Self {
            coeffs,
            s1: 0.0,
            s2: 0.0,
        }
    }

    /// Load new coefficients, keeping state.
    #[inline]
    pub fn set_coefficients(&mut self, coeffs: BiquadCoefficients) {
        self.coeffs = coeffs;
    }

    /// Current coefficients.
    pub fn coefficients(&self) -> BiquadCoefficients {
        self.coeffs
    }

    /// Filter one sample.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let c = &self.coeffs;
        let y = c.b0 * input + self.s1;
        self.s1 = flush_denormal(c.b1 * input - c.a1 * y + self.s2);
        self.s2 = flush_denormal(c.b2 * input - c.a2 * y);
        y
    }

    /// Zero the state.
    pub fn clear(&mut self) {
        self.s1 = 0.0;
        self.s2 = 0.0;
    }
}

impl Default for Biquad {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steady_gain(coeffs: BiquadCoefficients, freq: f32, sr: f32) -> f32 {
        let mut bq = Biquad::with_coefficients(coeffs);
        let mut peak: f32 = 0.0;
        for i in 0..(sr as usize) {
            let y = bq.process(sinf(2.0 * PI * freq * i as f32 / sr));
            if i > sr as usize / 2 {
                peak = peak.max(y.abs());
            }
        }
        peak
    }

    #[test]
    fn test_passthrough() {
        let mut bq = Biquad::new();
        for i in 0..10 {
            let x = i as f32 * 0.1;
            assert_eq!(bq.process(x), x);
        }
    }

    #[test]
    fn test_lowpass_dc() {
        let mut bq = Biquad::with_coefficients(BiquadCoefficients::lowpass(1000.0, 0.7071, 44100.0));
        let mut y = 0.0;
        for _ in 0..2000 {
            y = bq.process(1.0);
        }
        assert!((y - 1.0).abs() < 1e-3, "DC gain {y}");
    }

    #[test]
    fn test_highpass_5hz_blocks_dc() {
        let mut bq = Biquad::with_coefficients(BiquadCoefficients::highpass(5.0, 0.7071, 48000.0));
        let mut y = 1.0;
        for _ in 0..96000 {
            y = bq.process(0.5);
        }
        assert!(y.abs() < 1e-3, "residual DC {y}");
    }

    #[test]
    fn test_shelf_gains() {
        let sr = 48000.0;
        let low = BiquadCoefficients::low_shelf(200.0, 0.7071, 4.0, sr);
        assert!((steady_gain(low, 30.0, sr) - 4.0).abs() < 0.2);
        assert!((steady_gain(low, 8000.0, sr) - 1.0).abs() < 0.05);
        let high = BiquadCoefficients::high_shelf(2000.0, 0.7071, 0.25, sr);
        assert!((steady_gain(high, 15000.0, sr) - 0.25).abs() < 0.05);
        assert!((steady_gain(high, 50.0, sr) - 1.0).abs() < 0.05);
    }

    #[test]
    fn test_peak_unity_gain_is_flat() {
        let c = BiquadCoefficients::peak(1000.0, 2.0, 1.0, 48000.0);
        assert!((steady_gain(c, 1000.0, 48000.0) - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_clear() {
        let mut bq = Biquad::with_coefficients(BiquadCoefficients::lowpass(100.0, 0.7, 48000.0));
        for _ in 0..10 {
            bq.process(1.0);
        }
        bq.clear();
        assert_eq!(bq.s1, 0.0);
        assert_eq!(bq.s2, 0.0);
    }
}
