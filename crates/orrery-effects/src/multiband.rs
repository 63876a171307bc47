//! Three-band equaliser: low shelf, peak and high shelf in series.
//!
//! RBJ cookbook biquads per channel. Gains are linear, so 1.0 leaves a band
//! flat. Coefficients are recomputed only when a band's settings change.

use orrery_core::{Biquad, BiquadCoefficients, Effect};

/// Frequency, linear gain and Q of one band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandParams {
    /// Corner or centre frequency in Hz.
    pub freq: f32,
    /// Linear gain, 0.01..6.
    pub gain: f32,
    /// Quality factor.
    pub q: f32,
}

impl BandParams {
    /// Band at `freq` Hz with linear `gain` and quality `q`.
    pub const fn new(freq: f32, gain: f32, q: f32) -> Self {
        Self { freq, gain, q }
    }
}

/// Settings for all three bands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MultibandParams {
    /// Low shelf.
    pub low: BandParams,
    /// Peak.
    pub peak: BandParams,
    /// High shelf.
    pub high: BandParams,
}

impl Default for MultibandParams {
    fn default() -> Self {
        Self {
            low: BandParams::new(200.0, 1.0, 1.0),
            peak: BandParams::new(1000.0, 1.0, 1.0),
            high: BandParams::new(5000.0, 1.0, 1.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Band {
    Low,
    Peak,
    High,
}

impl Band {
    fn coefficients(self, p: BandParams, sample_rate: f32) -> BiquadCoefficients {
        let freq = p.freq.clamp(10.0, sample_rate * 0.49);
        let gain = p.gain.clamp(0.01, 6.0);
        let q = p.q.clamp(0.1, 20.0);
        match self {
            Self::Low => BiquadCoefficients::low_shelf(freq, q, gain, sample_rate),
            Self::Peak => BiquadCoefficients::peak(freq, q, gain, sample_rate),
            Self::High => BiquadCoefficients::high_shelf(freq, q, gain, sample_rate),
        }
    }
}

/// Stereo three-band equaliser.
///
/// ```rust
/// use orrery_core::Effect;
/// use orrery_effects::{BandParams, MultibandFilter, MultibandParams};
///
/// let mut eq = MultibandFilter::new(48000.0);
/// eq.set_params(&MultibandParams {
///     low: BandParams::new(120.0, 2.0, 0.7),
///     ..MultibandParams::default()
/// });
/// let (l, _) = eq.process_stereo(0.25, 0.25);
/// assert!(l.is_finite());
/// ```
#[derive(Debug, Clone)]
pub struct MultibandFilter {
    params: MultibandParams,
    filters: [[Biquad; 3]; 2],
    sample_rate: f32,
}

impl MultibandFilter {
    /// Flat equaliser.
    pub fn new(sample_rate: f32) -> Self {
        let mut eq = Self {
            params: MultibandParams::default(),
            filters: Default::default(),
            sample_rate,
        };
        eq.redesign_all();
        eq
    }

    /// Apply new settings.
    pub fn set_params(&mut self, params: &MultibandParams) {
        let old = self.params;
        self.params = *params;
        for (i, (band, new, old)) in [
            (Band::Low, params.low, old.low),
            (Band::Peak, params.peak, old.peak),
            (Band::High, params.high, old.high),
        ]
        .into_iter()
        .enumerate()
        {
            if new != old {
                let coeffs = band.coefficients(new, self.sample_rate);
                for channel in &mut self.filters {
                    channel[i].set_coefficients(coeffs);
                }
            }
        }
    }

    /// Current settings.
    pub fn params(&self) -> &MultibandParams {
        &self.params
    }

    fn redesign_all(&mut self) {
        let p = self.params;
        let coeffs = [
            Band::Low.coefficients(p.low, self.sample_rate),
            Band::Peak.coefficients(p.peak, self.sample_rate),
            Band::High.coefficients(p.high, self.sample_rate),
        ];
        for channel in &mut self.filters {
            for (filter, c) in channel.iter_mut().zip(coeffs) {
                filter.set_coefficients(c);
            }
        }
    }
}

impl Effect for MultibandFilter {
    #[inline]
    fn process_stereo(&mut self, left: f32, right: f32) -> (f32, f32) {
        let [l, r] = &mut self.filters;
        let left = l.iter_mut().fold(left, |x, f| f.process(x));
        let right = r.iter_mut().fold(right, |x, f| f.process(x));
        (left, right)
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.redesign_all();
    }

    fn reset(&mut self) {
        for filter in self.filters.iter_mut().flatten() {
            filter.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rms_at(eq: &mut MultibandFilter, freq: f32) -> f32 {
        eq.reset();
        let sr = 48000.0;
        let mut sum = 0.0;
        let n = 9600;
        for i in 0..n {
            let x = libm::sinf(core::f32::consts::TAU * freq * i as f32 / sr);
            let (l, _) = eq.process_stereo(x, x);
            if i >= n / 2 {
                sum += l * l;
            }
        }
        libm::sqrtf(sum / (n / 2) as f32) * core::f32::consts::SQRT_2
    }

    #[test]
    fn test_flat_at_unity_gain() {
        let mut eq = MultibandFilter::new(48000.0);
        for freq in [60.0, 1000.0, 10_000.0] {
            let level = rms_at(&mut eq, freq);
            assert!((level - 1.0).abs() < 0.02, "{freq} Hz: {level}");
        }
    }

    #[test]
    fn test_low_shelf_boosts_lows_only() {
        let mut eq = MultibandFilter::new(48000.0);
        eq.set_params(&MultibandParams {
            low: BandParams::new(200.0, 4.0, 0.7071),
            ..MultibandParams::default()
        });
        assert!(rms_at(&mut eq, 40.0) > 3.0);
        assert!((rms_at(&mut eq, 8000.0) - 1.0).abs() < 0.1);
    }

    #[test]
    fn test_peak_cuts_centre() {
        let mut eq = MultibandFilter::new(48000.0);
        eq.set_params(&MultibandParams {
            peak: BandParams::new(1000.0, 0.1, 2.0),
            ..MultibandParams::default()
        });
        assert!(rms_at(&mut eq, 1000.0) < 0.2);
        assert!(rms_at(&mut eq, 100.0) > 0.9);
    }
}
