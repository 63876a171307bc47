//! Algorithmic stereo reverb.
//!
//! Freeverb topology: eight parallel damped combs into four series
//! allpasses per channel, the right channel detuned by a fixed spread.
//! A predelay sits in front and a low-pass shapes the tail.

use libm::{ceilf, expf, roundf};
use orrery_core::{
    AllpassFilter, Biquad, BiquadCoefficients, CombFilter, DelayLine, Effect, SmoothedParam,
};

/// Freeverb comb lengths at 44.1 kHz. Mutually prime to avoid stacked resonances.
const COMB_TUNINGS_44K: [usize; 8] = [1116, 1188, 1277, 1356, 1422, 1491, 1557, 1617];

/// Freeverb allpass lengths at 44.1 kHz.
const ALLPASS_TUNINGS_44K: [usize; 4] = [556, 441, 341, 225];

/// Extra length of every right-channel line at 44.1 kHz.
const STEREO_SPREAD_44K: usize = 23;

const REFERENCE_RATE: f32 = 44100.0;

/// Longest predelay in seconds.
pub const MAX_PREDELAY_SECONDS: f32 = 0.1;

/// Largest room size; lengths scale by `0.5 + 0.5 × size`.
const MAX_SIZE: f32 = 2.0;

const INPUT_GAIN: f32 = 0.015;
const WET_SCALE: f32 = 3.0;

fn scale_to_rate(samples: usize, target_rate: f32) -> f32 {
    (samples as f32 * target_rate / REFERENCE_RATE).max(1.0)
}

fn size_factor(size: f32) -> f32 {
    0.5 + 0.5 * size.clamp(0.0, MAX_SIZE)
}

/// Reverb settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReverbParams {
    /// Room size, 0..2. Scales every line length.
    pub size: f32,
    /// Tail length, 0..1.
    pub decay: f32,
    /// Corner of the damping inside the comb loops, in Hz.
    pub damping_hz: f32,
    /// Corner of the low-pass on the wet output, in Hz.
    pub lowpass_hz: f32,
    /// Predelay in seconds.
    pub predelay: f32,
    /// Dry level.
    pub dry: f32,
    /// Wet level.
    pub wet: f32,
}

impl Default for ReverbParams {
    fn default() -> Self {
        Self {
            size: 1.0,
            decay: 0.5,
            damping_hz: 10_000.0,
            lowpass_hz: 20_000.0,
            predelay: 0.002,
            dry: 1.0,
            wet: 0.08,
        }
    }
}

#[derive(Debug, Clone)]
struct Channel {
    combs: [CombFilter; 8],
    allpasses: [AllpassFilter; 4],
    lowpass: Biquad,
    spread: usize,
}

impl Channel {
    fn new(sample_rate: f32, spread: usize) -> Self {
        let longest = size_factor(MAX_SIZE);
        Self {
            combs: core::array::from_fn(|i| {
                let len = scale_to_rate(COMB_TUNINGS_44K[i] + spread, sample_rate) * longest;
                CombFilter::new(ceilf(len) as usize + 1)
            }),
            allpasses: core::array::from_fn(|i| {
                let len = scale_to_rate(ALLPASS_TUNINGS_44K[i] + spread, sample_rate);
                let mut ap = AllpassFilter::new(roundf(len) as usize);
                ap.set_feedback(0.5);
                ap
            }),
            lowpass: Biquad::new(),
            spread,
        }
    }

    fn set_size(&mut self, size: f32, sample_rate: f32) {
        let factor = size_factor(size);
        for (comb, tuning) in self.combs.iter_mut().zip(COMB_TUNINGS_44K) {
            comb.set_length(roundf(scale_to_rate(tuning + self.spread, sample_rate) * factor));
        }
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let mut out = 0.0;
        for comb in &mut self.combs {
            out += comb.process(input);
        }
        for ap in &mut self.allpasses {
            out = ap.process(out);
        }
        self.lowpass.process(out)
    }

    fn clear(&mut self) {
        for comb in &mut self.combs {
            comb.clear();
        }
        for ap in &mut self.allpasses {
            ap.clear();
        }
        self.lowpass.clear();
    }
}

/// Freeverb-style stereo reverb.
///
/// # Example
///
/// ```rust
/// use orrery_core::Effect;
/// use orrery_effects::{Reverb, ReverbParams};
///
/// let mut reverb = Reverb::new(48000.0);
/// reverb.set_params(&ReverbParams { decay: 0.8, wet: 0.5, ..ReverbParams::default() });
///
/// let (l, r) = reverb.process_stereo(0.5, 0.5);
/// assert!(l.is_finite() && r.is_finite());
/// ```
#[derive(Debug, Clone)]
pub struct Reverb {
    params: ReverbParams,
    channels: [Channel; 2],
    predelay_lines: [DelayLine; 2],
    predelay: SmoothedParam,
    dry: SmoothedParam,
    wet: SmoothedParam,
    sample_rate: f32,
}

impl Reverb {
    /// Reverb with default settings.
    pub fn new(sample_rate: f32) -> Self {
        let params = ReverbParams::default();
        let predelay = DelayLine::from_time(sample_rate, MAX_PREDELAY_SECONDS);
        let mut reverb = Self {
            params,
            channels: [Channel::new(sample_rate, 0), Channel::new(sample_rate, STEREO_SPREAD_44K)],
            predelay_lines: [predelay.clone(), predelay],
            predelay: SmoothedParam::slow(params.predelay * sample_rate, sample_rate),
            dry: SmoothedParam::fast(params.dry, sample_rate),
            wet: SmoothedParam::fast(params.wet, sample_rate),
            sample_rate,
        };
        reverb.apply_network(&params);
        reverb
    }

    /// Apply new settings.
    pub fn set_params(&mut self, params: &ReverbParams) {
        if *params != self.params {
            self.apply_network(params);
            self.params = *params;
        }
        self.predelay
            .set_target(params.predelay.clamp(0.0, MAX_PREDELAY_SECONDS) * self.sample_rate);
        self.dry.set_target(params.dry);
        self.wet.set_target(params.wet);
    }

    /// Current settings.
    pub fn params(&self) -> &ReverbParams {
        &self.params
    }

    fn apply_network(&mut self, params: &ReverbParams) {
        let feedback = 0.7 + 0.28 * params.decay.clamp(0.0, 1.0);
        let nyquist = self.sample_rate * 0.49;
        let damp = expf(-core::f32::consts::TAU * params.damping_hz.clamp(20.0, nyquist) / self.sample_rate);
        let lowpass = BiquadCoefficients::lowpass(
            params.lowpass_hz.clamp(20.0, nyquist),
            core::f32::consts::FRAC_1_SQRT_2,
            self.sample_rate,
        );
        for channel in &mut self.channels {
            channel.set_size(params.size, self.sample_rate);
            for comb in &mut channel.combs {
                comb.set_feedback(feedback);
                comb.set_damp(damp);
            }
            channel.lowpass.set_coefficients(lowpass);
        }
    }
}

impl Effect for Reverb {
    #[inline]
    fn process_stereo(&mut self, left: f32, right: f32) -> (f32, f32) {
        let predelay = self.predelay.advance();
        let dry = self.dry.advance();
        let wet = self.wet.advance() * WET_SCALE;

        let send = [left, right].map(|x| x * INPUT_GAIN);
        let mut out = [0.0; 2];
        for ch in 0..2 {
            // write first so a zero predelay passes straight through
            self.predelay_lines[ch].write(send[ch]);
            let delayed = self.predelay_lines[ch].read(predelay);
            out[ch] = self.channels[ch].process(delayed);
        }

        (left * dry + out[0] * wet, right * dry + out[1] * wet)
    }

    /// Rebuilds every line; call only while audio is stopped.
    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.channels = [Channel::new(sample_rate, 0), Channel::new(sample_rate, STEREO_SPREAD_44K)];
        let capacity = (sample_rate * MAX_PREDELAY_SECONDS) as usize + 2;
        for line in &mut self.predelay_lines {
            line.resize(capacity);
        }
        let params = self.params;
        self.apply_network(&params);
        self.predelay.set_sample_rate(sample_rate);
        self.predelay
            .set_immediate(params.predelay.clamp(0.0, MAX_PREDELAY_SECONDS) * sample_rate);
        self.dry.set_sample_rate(sample_rate);
        self.wet.set_sample_rate(sample_rate);
    }

    fn reset(&mut self) {
        for channel in &mut self.channels {
            channel.clear();
        }
        for line in &mut self.predelay_lines {
            line.clear();
        }
        self.predelay.snap_to_target();
        self.dry.snap_to_target();
        self.wet.snap_to_target();
    }
}
