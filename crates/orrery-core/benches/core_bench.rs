//! Criterion benchmarks for orrery-core primitives.
//!
//! Run with: cargo bench -p orrery-core
#![allow(missing_docs)]

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use orrery_core::{
    Biquad, BiquadCoefficients, CombFilter, DelayLine, Effect, FilterKind, MultimodeFilter,
    SmoothedParam, poly_sin, semitone_power, sine_for_phase_and_tones,
};

const SAMPLE_RATE: f32 = 48000.0;
const BLOCK_SIZES: &[usize] = &[32, 128, 512];

fn test_signal(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| (std::f32::consts::TAU * 440.0 * i as f32 / SAMPLE_RATE).sin() * 0.5)
        .collect()
}

fn bench_fast_math(c: &mut Criterion) {
    let mut group = c.benchmark_group("FastMath");
    group.bench_function("poly_sin", |b| {
        b.iter(|| black_box(poly_sin(black_box(1.234))));
    });
    group.bench_function("libm_sinf", |b| {
        b.iter(|| black_box(libm::sinf(black_box(1.234))));
    });
    group.bench_function("semitone_power", |b| {
        b.iter(|| black_box(semitone_power(black_box(0.37))));
    });
    for tones in [1.0f32, 3.5, 5.9] {
        group.bench_with_input(
            BenchmarkId::new("sine_for_phase_and_tones", tones),
            &tones,
            |b, &t| b.iter(|| black_box(sine_for_phase_and_tones(black_box(0.8), t))),
        );
    }
    group.finish();
}

fn bench_filters(c: &mut Criterion) {
    let mut group = c.benchmark_group("Filters");
    for &size in BLOCK_SIZES {
        let input = test_signal(size);
        group.bench_with_input(BenchmarkId::new("multimode_lp24", size), &size, |b, _| {
            let mut f = MultimodeFilter::new(SAMPLE_RATE);
            f.set_kind(FilterKind::Lp24);
            f.set_params(1200.0, 2.0);
            let mut l = input.clone();
            let mut r = input.clone();
            b.iter(|| f.process_block_stereo(black_box(&mut l), black_box(&mut r)));
        });
        group.bench_with_input(BenchmarkId::new("biquad_peak", size), &size, |b, _| {
            let mut bq =
                Biquad::with_coefficients(BiquadCoefficients::peak(1000.0, 1.0, 2.0, SAMPLE_RATE));
            b.iter(|| {
                for &x in &input {
                    black_box(bq.process(black_box(x)));
                }
            });
        });
    }
    group.finish();
}

fn bench_delay(c: &mut Criterion) {
    let mut group = c.benchmark_group("Delay");
    let input = test_signal(512);
    group.bench_function("delay_line_fractional", |b| {
        let mut d = DelayLine::from_time(SAMPLE_RATE, 1.0);
        b.iter(|| {
            for &x in &input {
                black_box(d.read_write(x, black_box(1234.5)));
            }
        });
    });
    group.bench_function("comb", |b| {
        let mut comb = CombFilter::new(1557);
        comb.set_feedback(0.84);
        b.iter(|| {
            for &x in &input {
                black_box(comb.process(x));
            }
        });
    });
    group.finish();
}

fn bench_smoothing(c: &mut Criterion) {
    c.bench_function("smoothed_param_advance", |b| {
        let mut p = SmoothedParam::standard(0.0, SAMPLE_RATE);
        p.set_target(1.0);
        b.iter(|| black_box(p.advance()));
    });
}

criterion_group!(benches, bench_fast_math, bench_filters, bench_delay, bench_smoothing);
criterion_main!(benches);
