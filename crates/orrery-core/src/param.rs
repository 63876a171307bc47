//! Per-sample parameter smoothing.
//!
//! Resolved parameter values arrive once per sub-block. Anything that feeds a
//! gain, a delay time or a filter cutoff is glided between those updates so a
//! jump in the control value never reaches the audio as a step.
//!
//! - [`SmoothedParam`]: one-pole exponential approach, used for gains and mixes.
//! - [`LinearSmoothedParam`]: fixed-duration linear ramp with block skipping,
//!   used where a control must arrive at its target after a known time (lane
//!   filter cutoffs, portamento).
//!
//! ```rust
//! use orrery_core::SmoothedParam;
//!
//! let mut gain = SmoothedParam::standard(1.0, 48000.0);
//! gain.set_target(0.5);
//! for _ in 0..4800 {
//!     gain.advance();
//! }
//! assert!((gain.get() - 0.5).abs() < 1e-3);
//! ```

use libm::expf;

/// One-pole smoothed value.
#[derive(Debug, Clone)]
pub struct SmoothedParam {
    current: f32,
    target: f32,
    coeff: f32,
    sample_rate: f32,
    time_ms: f32,
}

impl SmoothedParam {
    /// Unsmoothed parameter; every target is reached on the next sample.
    pub fn new(initial: f32) -> Self {
        Self {
            current: initial,
            target: initial,
            coeff: 1.0,
            sample_rate: 48000.0,
            time_ms: 0.0,
        }
    }

    /// Smoothed parameter with an explicit time constant.
    pub fn with_config(initial: f32, sample_rate: f32, time_ms: f32) -> Self {
        let mut param = Self::new(initial);
        param.sample_rate = sample_rate;
        param.time_ms = time_ms;
        param.update_coeff();
        param
    }

    /// 5 ms time constant.
    pub fn fast(initial: f32, sample_rate: f32) -> Self {
        Self::with_config(initial, sample_rate, 5.0)
    }

    /// 10 ms time constant.
    pub fn standard(initial: f32, sample_rate: f32) -> Self {
        Self::with_config(initial, sample_rate, 10.0)
    }

    /// 50 ms time constant, for delay times and other pitch-sensitive values.
    pub fn slow(initial: f32, sample_rate: f32) -> Self {
        Self::with_config(initial, sample_rate, 50.0)
    }

    /// Set the value to approach.
    #[inline]
    pub fn set_target(&mut self, target: f32) {
        self.target = target;
    }

    /// Jump straight to `value`.
    #[inline]
    pub fn set_immediate(&mut self, value: f32) {
        self.target = value;
        self.current = value;
    }

    /// Change the sample rate, keeping the time constant.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.update_coeff();
    }

    /// Change the time constant in milliseconds. Zero disables smoothing.
    pub fn set_smoothing_time_ms(&mut self, time_ms: f32) {
        self.time_ms = time_ms;
        self.update_coeff();
    }

    /// Advance one sample and return the new value.
    #[inline]
    pub fn advance(&mut self) -> f32 {
        self.current += self.coeff * (self.target - self.current);
        self.current
    }

    /// Current value without advancing.
    #[inline]
    pub fn get(&self) -> f32 {
        self.current
    }

    /// Value being approached.
    #[inline]
    pub fn target(&self) -> f32 {
        self.target
    }

    /// True once the value is within 1e-6 of the target.
    #[inline]
    pub fn is_settled(&self) -> bool {
        (self.current - self.target).abs() < 1e-6
    }

    /// Jump to the target.
    #[inline]
    pub fn snap_to_target(&mut self) {
        self.current = self.target;
    }

    // coeff = 1 - exp(-1 / (tau * fs)); tau in seconds
    fn update_coeff(&mut self) {
        self.coeff = if self.time_ms <= 0.0 || self.sample_rate <= 0.0 {
            1.0
        } else {
            1.0 - expf(-1.0 / (self.time_ms * 0.001 * self.sample_rate))
        };
    }
}

impl Default for SmoothedParam {
    fn default() -> Self {
        Self::new(0.0)
    }
}

/// Linear ramp that reaches each new target after a fixed duration.
///
/// Calling [`set_target`](Self::set_target) restarts the ramp from the current
/// value. [`skip`](Self::skip) advances a whole block at once, which is how the
/// lane filters consume it: read [`get`](Self::get) at the start of a sub-block,
/// then skip past it.
#[derive(Debug, Clone)]
pub struct LinearSmoothedParam {
    current: f32,
    target: f32,
    step: f32,
    remaining: u32,
    ramp_samples: u32,
    sample_rate: f32,
    ramp_seconds: f32,
}

impl LinearSmoothedParam {
    /// Parameter with no ramp.
    pub fn new(initial: f32) -> Self {
        Self {
            current: initial,
            target: initial,
            step: 0.0,
            remaining: 0,
            ramp_samples: 0,
            sample_rate: 48000.0,
            ramp_seconds: 0.0,
        }
    }

    /// Parameter whose ramps last `ramp_seconds`.
    pub fn with_config(initial: f32, sample_rate: f32, ramp_seconds: f32) -> Self {
        let mut param = Self::new(initial);
        param.reset(sample_rate, ramp_seconds);
        param
    }

    /// Reconfigure sample rate and ramp length and stop any ramp in flight.
    pub fn reset(&mut self, sample_rate: f32, ramp_seconds: f32) {
        self.sample_rate = sample_rate;
        self.ramp_seconds = ramp_seconds.max(0.0);
        self.ramp_samples = (self.ramp_seconds * sample_rate) as u32;
        self.current = self.target;
        self.remaining = 0;
    }

    /// Change only the ramp length; takes effect on the next target.
    pub fn set_ramp_seconds(&mut self, ramp_seconds: f32) {
        self.ramp_seconds = ramp_seconds.max(0.0);
        self.ramp_samples = (self.ramp_seconds * self.sample_rate) as u32;
    }

    /// Start a ramp toward `target`. Repeating the current target is a no-op.
    pub fn set_target(&mut self, target: f32) {
        if target == self.target {
            return;
        }
        self.target = target;
        if self.ramp_samples == 0 {
            self.current = target;
            self.remaining = 0;
        } else {
            self.remaining = self.ramp_samples;
            self.step = (target - self.current) / self.ramp_samples as f32;
        }
    }

    /// Jump to `value` and cancel any ramp.
    pub fn set_immediate(&mut self, value: f32) {
        self.target = value;
        self.current = value;
        self.remaining = 0;
    }

    /// Advance one sample.
    #[inline]
    pub fn advance(&mut self) -> f32 {
        if self.remaining > 0 {
            self.remaining -= 1;
            self.current = if self.remaining == 0 {
                self.target
            } else {
                self.current + self.step
            };
        }
        self.current
    }

    /// Advance `samples` samples at once and return the value reached.
    pub fn skip(&mut self, samples: u32) -> f32 {
        if samples >= self.remaining {
            self.current = self.target;
            self.remaining = 0;
        } else {
            self.current += self.step * samples as f32;
            self.remaining -= samples;
        }
        self.current
    }

    /// Current value.
    #[inline]
    pub fn get(&self) -> f32 {
        self.current
    }

    /// Ramp destination.
    #[inline]
    pub fn target(&self) -> f32 {
        self.target
    }

    /// True when no ramp is running.
    #[inline]
    pub fn is_settled(&self) -> bool {
        self.remaining == 0
    }
}

impl Default for LinearSmoothedParam {
    fn default() -> Self {
        Self::new(0.0)
    }
}
