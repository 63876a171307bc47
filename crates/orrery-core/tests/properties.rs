//! Property-based tests for orrery-core primitives.
//!
//! Filter stability under random settings, smoothing convergence, and the
//! continuity guarantees of the additive oscillator math.

use proptest::prelude::*;
use orrery_core::{
    Biquad, BiquadCoefficients, DelayLine, Effect, FilterKind, LinearSmoothedParam,
    MultimodeFilter, SmoothedParam, resonance_to_q, semitone_power, sine_for_phase_and_tones,
    wrap_pi,
};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    /// Every filter kind stays finite for any cutoff and resonance.
    #[test]
    fn multimode_filter_stability(
        cutoff in 20.0f32..20000.0f32,
        res in 0.0f32..100.0f32,
        kind in 0usize..8,
        input in prop::array::uniform32(-1.0f32..=1.0f32),
    ) {
        let mut filter = MultimodeFilter::new(48000.0);
        filter.set_kind(FilterKind::from_index(kind).unwrap());
        filter.set_params(cutoff, resonance_to_q(res));
        for _ in 0..32 {
            for &x in &input {
                let (l, r) = filter.process_stereo(x, -x);
                prop_assert!(l.is_finite() && r.is_finite(),
                    "kind {kind} cutoff {cutoff} res {res} produced {l}/{r}");
            }
        }
    }

    /// Shelves and peaks with any linear gain in the multiband range stay finite.
    #[test]
    fn eq_biquad_stability(
        freq in 20.0f32..20000.0f32,
        q in 0.1f32..20.0f32,
        gain in 0.01f32..6.0f32,
        input in prop::array::uniform32(-1.0f32..=1.0f32),
    ) {
        let sr = 48000.0;
        for coeffs in [
            BiquadCoefficients::low_shelf(freq, q, gain, sr),
            BiquadCoefficients::peak(freq, q, gain, sr),
            BiquadCoefficients::high_shelf(freq, q, gain, sr),
        ] {
            let mut bq = Biquad::with_coefficients(coeffs);
            for _ in 0..16 {
                for &x in &input {
                    prop_assert!(bq.process(x).is_finite());
                }
            }
        }
    }

    /// One-pole smoothing always ends within tolerance of the target.
    #[test]
    fn smoothed_param_converges(
        start in -100.0f32..100.0f32,
        target in -100.0f32..100.0f32,
        time_ms in 0.1f32..50.0f32,
    ) {
        let mut p = SmoothedParam::with_config(start, 48000.0, time_ms);
        p.set_target(target);
        for _ in 0..(48 * 50 * 12) {
            p.advance();
        }
        prop_assert!((p.get() - target).abs() < 1e-3 * (1.0 + target.abs()));
    }

    /// A linear ramp never overshoots and lands exactly.
    #[test]
    fn linear_ramp_monotone(start in -10.0f32..10.0f32, target in -10.0f32..10.0f32) {
        let mut p = LinearSmoothedParam::with_config(start, 48000.0, 0.02);
        p.set_target(target);
        let lo = start.min(target) - 1e-4;
        let hi = start.max(target) + 1e-4;
        for _ in 0..960 {
            let v = p.advance();
            prop_assert!(v >= lo && v <= hi);
        }
        prop_assert_eq!(p.get(), target);
    }

    /// Reads at integer delays return exactly what was written.
    #[test]
    fn delay_line_integrity(values in prop::collection::vec(-1.0f32..1.0f32, 1..64)) {
        let mut d = DelayLine::new(128);
        for &v in &values {
            d.write(v);
        }
        for (i, &v) in values.iter().rev().enumerate() {
            prop_assert_eq!(d.read(i as f32), v);
        }
    }

    /// The additive sine is continuous in `tones` everywhere.
    #[test]
    fn tones_continuity(phase in -3.14f32..3.14f32, tones in 1.0f32..5.99f32) {
        let a = sine_for_phase_and_tones(phase, tones);
        let b = sine_for_phase_and_tones(phase, tones + 0.001);
        prop_assert!((a - b).abs() < 2e-3, "jump at tones {tones}: {a} vs {b}");
    }

    /// wrap_pi preserves the angle and lands in (−π, π].
    #[test]
    fn wrap_pi_preserves_angle(x in -100.0f32..100.0f32) {
        let w = wrap_pi(x);
        prop_assert!(w > -core::f32::consts::PI - 1e-5 && w <= core::f32::consts::PI + 1e-5);
        prop_assert!((libm::sinf(w) - libm::sinf(x)).abs() < 1e-3);
    }

    /// semitone_power(a) · semitone_power(−a) ≈ 1 over the detune range.
    #[test]
    fn semitone_power_inverse(x in -2.0f32..2.0f32) {
        prop_assert!((semitone_power(x) * semitone_power(-x) - 1.0).abs() < 1e-5);
    }
}
