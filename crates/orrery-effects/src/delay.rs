//! Stereo delay with damped feedback, ping-pong and freeze.
//!
//! # Signal Flow
//!
//! ```text
//!            ┌──────── one-pole LP × feedback ◄───────┐
//!            ↓           (crossed when ping-pong)     │
//! in ──┬──→ (+) ──→ [delay line L/R] ─────────────────┴─→ × wet ─┐
//!      └───────────────────────────────────────────────→ × dry ─ + → out
//! ```
//!
//! While frozen nothing is written: the last `time` seconds of each line
//! play back as a loop and new input only reaches the dry path.

use orrery_core::{DelayLine, Effect, OnePole, SmoothedParam, flush_denormal};

/// Longest delay time in seconds.
pub const MAX_DELAY_SECONDS: f32 = 10.0;

/// Delay settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DelayParams {
    /// Left time in seconds.
    pub time_left: f32,
    /// Right time in seconds.
    pub time_right: f32,
    /// Feedback, 0..1.
    pub feedback: f32,
    /// Wet level.
    pub wet: f32,
    /// Dry level.
    pub dry: f32,
    /// Feedback low-pass corner in Hz.
    pub cutoff_hz: f32,
    /// Feed each side's echo into the other side.
    pub ping_pong: bool,
    /// Loop the buffer without writing.
    pub freeze: bool,
}

impl Default for DelayParams {
    fn default() -> Self {
        Self {
            time_left: 0.5,
            time_right: 0.5,
            feedback: 0.5,
            wet: 0.25,
            dry: 1.0,
            cutoff_hz: 10_000.0,
            ping_pong: false,
            freeze: false,
        }
    }
}

/// Stereo delay.
///
/// ```rust
/// use orrery_core::Effect;
/// use orrery_effects::{DelayParams, StereoDelay};
///
/// let mut delay = StereoDelay::new(1000.0);
/// delay.set_params(&DelayParams { time_left: 0.01, time_right: 0.01, dry: 0.0, wet: 1.0, ..DelayParams::default() });
/// delay.reset();
///
/// let mut first_echo = None;
/// for n in 0..20 {
///     let (l, _) = delay.process_stereo(if n == 0 { 1.0 } else { 0.0 }, 0.0);
///     if l > 0.5 && first_echo.is_none() {
///         first_echo = Some(n);
///     }
/// }
/// assert_eq!(first_echo, Some(10));
/// ```
#[derive(Debug, Clone)]
pub struct StereoDelay {
    params: DelayParams,
    lines: [DelayLine; 2],
    time: [SmoothedParam; 2],
    feedback: SmoothedParam,
    wet: SmoothedParam,
    dry: SmoothedParam,
    damping: [OnePole; 2],
    loop_len: [usize; 2],
    loop_pos: [usize; 2],
    sample_rate: f32,
}

impl StereoDelay {
    /// Delay with room for [`MAX_DELAY_SECONDS`] at `sample_rate`.
    pub fn new(sample_rate: f32) -> Self {
        let params = DelayParams::default();
        let line = DelayLine::from_time(sample_rate, MAX_DELAY_SECONDS);
        Self {
            params,
            lines: [line.clone(), line],
            time: [
                SmoothedParam::slow(params.time_left * sample_rate, sample_rate),
                SmoothedParam::slow(params.time_right * sample_rate, sample_rate),
            ],
            feedback: SmoothedParam::fast(params.feedback, sample_rate),
            wet: SmoothedParam::fast(params.wet, sample_rate),
            dry: SmoothedParam::fast(params.dry, sample_rate),
            damping: [
                OnePole::new(sample_rate, params.cutoff_hz),
                OnePole::new(sample_rate, params.cutoff_hz),
            ],
            loop_len: [1; 2],
            loop_pos: [0; 2],
            sample_rate,
        }
    }

    /// Apply new settings.
    pub fn set_params(&mut self, params: &DelayParams) {
        if params.freeze && !self.params.freeze {
            self.loop_len = [self.delay_samples(params.time_left), self.delay_samples(params.time_right)];
            self.loop_pos = [0; 2];
        }
        self.params = *params;
        self.time[0].set_target(params.time_left.clamp(0.0, MAX_DELAY_SECONDS) * self.sample_rate);
        self.time[1].set_target(params.time_right.clamp(0.0, MAX_DELAY_SECONDS) * self.sample_rate);
        self.feedback.set_target(params.feedback.clamp(0.0, 0.99));
        self.wet.set_target(params.wet);
        self.dry.set_target(params.dry);
        for filter in &mut self.damping {
            filter.set_frequency(params.cutoff_hz);
        }
    }

    /// Current settings.
    pub fn params(&self) -> &DelayParams {
        &self.params
    }

    fn delay_samples(&self, seconds: f32) -> usize {
        let samples = libm::roundf(seconds.clamp(0.0, MAX_DELAY_SECONDS) * self.sample_rate) as usize;
        samples.clamp(1, self.lines[0].capacity() - 1)
    }

    #[inline]
    fn frozen(&mut self) -> (f32, f32) {
        let mut out = [0.0; 2];
        for ch in 0..2 {
            let len = self.loop_len[ch];
            out[ch] = self.lines[ch].read((len - 1 - self.loop_pos[ch]) as f32);
            self.loop_pos[ch] = (self.loop_pos[ch] + 1) % len;
        }
        (out[0], out[1])
    }
}

impl Effect for StereoDelay {
    #[inline]
    fn process_stereo(&mut self, left: f32, right: f32) -> (f32, f32) {
        let time_l = self.time[0].advance();
        let time_r = self.time[1].advance();
        let feedback = self.feedback.advance();
        let wet = self.wet.advance();
        let dry = self.dry.advance();

        let (echo_l, echo_r) = if self.params.freeze {
            self.frozen()
        } else {
            // read before write, so one sample less reaches back `time`
            let echo_l = self.lines[0].read(time_l - 1.0);
            let echo_r = self.lines[1].read(time_r - 1.0);
            let fb_l = self.damping[0].process(echo_l) * feedback;
            let fb_r = self.damping[1].process(echo_r) * feedback;
            let (fb_l, fb_r) = if self.params.ping_pong { (fb_r, fb_l) } else { (fb_l, fb_r) };
            self.lines[0].write(flush_denormal(left + fb_l));
            self.lines[1].write(flush_denormal(right + fb_r));
            (echo_l, echo_r)
        };

        (left * dry + echo_l * wet, right * dry + echo_r * wet)
    }

    /// Reallocates the delay lines; call only while audio is stopped.
    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        let capacity = (sample_rate * MAX_DELAY_SECONDS) as usize + 2;
        for line in &mut self.lines {
            line.resize(capacity);
        }
        for filter in &mut self.damping {
            filter.set_sample_rate(sample_rate);
        }
        for p in [&mut self.feedback, &mut self.wet, &mut self.dry] {
            p.set_sample_rate(sample_rate);
        }
        let params = self.params;
        for (p, seconds) in self.time.iter_mut().zip([params.time_left, params.time_right]) {
            p.set_sample_rate(sample_rate);
            p.set_immediate(seconds.clamp(0.0, MAX_DELAY_SECONDS) * sample_rate);
        }
    }

    fn reset(&mut self) {
        for line in &mut self.lines {
            line.clear();
        }
        for filter in &mut self.damping {
            filter.reset();
        }
        for p in &mut self.time {
            p.snap_to_target();
        }
        self.feedback.snap_to_target();
        self.wet.snap_to_target();
        self.dry.snap_to_target();
        self.loop_pos = [0; 2];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delay(params: DelayParams) -> StereoDelay {
        let mut d = StereoDelay::new(1000.0);
        d.set_params(&params);
        d.reset();
        d
    }

    fn wet_only() -> DelayParams {
        DelayParams {
            time_left: 0.01,
            time_right: 0.02,
            feedback: 0.0,
            dry: 0.0,
            wet: 1.0,
            cutoff_hz: 400.0,
            ..DelayParams::default()
        }
    }

    #[test]
    fn test_independent_channel_times() {
        let mut d = delay(wet_only());
        let mut out = Vec::new();
        for n in 0..30 {
            let x = if n == 0 { 1.0 } else { 0.0 };
            out.push(d.process_stereo(x, x));
        }
        assert_eq!(out[10].0, 1.0);
        assert_eq!(out[10].1, 0.0);
        assert_eq!(out[20].1, 1.0);
    }

    #[test]
    fn test_ping_pong_crosses_feedback() {
        let mut d = delay(DelayParams {
            time_right: 0.01,
            feedback: 0.9,
            ping_pong: true,
            ..wet_only()
        });
        let mut right_energy = 0.0;
        for n in 0..40 {
            let (_, r) = d.process_stereo(if n == 0 { 1.0 } else { 0.0 }, 0.0);
            right_energy += r * r;
        }
        assert!(right_energy > 1e-4, "left impulse should bounce to the right");
    }

    #[test]
    fn test_feedback_decays() {
        let mut d = delay(DelayParams {
            feedback: 0.5,
            ..wet_only()
        });
        let mut peaks = [0.0f32; 3];
        for n in 0..35 {
            let (l, _) = d.process_stereo(if n == 0 { 1.0 } else { 0.0 }, 0.0);
            if (10..35).contains(&n) {
                let slot = (n - 10) / 10;
                if slot < 3 {
                    peaks[slot] = peaks[slot].max(l.abs());
                }
            }
        }
        assert!(peaks[0] > peaks[1] && peaks[1] > peaks[2]);
    }

    #[test]
    fn test_freeze_loops_without_writing() {
        let mut d = delay(wet_only());
        for n in 0..10 {
            d.process_stereo(n as f32, n as f32);
        }
        d.set_params(&DelayParams {
            freeze: true,
            ..wet_only()
        });
        // loop of the last 10 samples, oldest first
        let first: Vec<f32> = (0..10).map(|_| d.process_stereo(100.0, 100.0).0).collect();
        let second: Vec<f32> = (0..10).map(|_| d.process_stereo(-5.0, -5.0).0).collect();
        assert_eq!(first, (0..10).map(|n| n as f32).collect::<Vec<_>>());
        assert_eq!(first, second, "input never enters a frozen loop");
    }
}
