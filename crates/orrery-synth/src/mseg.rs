//! Multi-segment envelope generator.
//!
//! An [`MsegData`] table is a breakpoint curve over one cycle: points at
//! times 0..1 with values 0..1, each segment bent by the curve of its start
//! point. Tables are patch state, not parameters; the processor owns four and
//! lends them to every voice's [`Mseg`] players.

use alloc::vec;
use alloc::vec::Vec;

use crate::envelope::curve_shape;
use crate::state::StateError;

/// Most breakpoints a table may hold.
pub const MAX_MSEG_POINTS: usize = 64;

/// One breakpoint.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MsegPoint {
    /// Position in the cycle, 0..1.
    pub time: f32,
    /// Level, 0..1.
    pub value: f32,
    /// Bend of the segment starting here, −1..1.
    #[cfg_attr(feature = "serde", serde(default))]
    pub curve: f32,
}

impl MsegPoint {
    /// Breakpoint with a straight outgoing segment.
    pub const fn new(time: f32, value: f32) -> Self {
        Self {
            time,
            value,
            curve: 0.0,
        }
    }
}

/// A breakpoint table.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MsegData {
    /// Points ordered by time, first at 0 and last at 1.
    pub points: Vec<MsegPoint>,
}

impl Default for MsegData {
    fn default() -> Self {
        Self {
            points: vec![
                MsegPoint::new(0.0, 0.0),
                MsegPoint::new(0.5, 1.0),
                MsegPoint::new(1.0, 0.0),
            ],
        }
    }
}

impl MsegData {
    /// Restore the default triangle.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Check ordering, bounds and size.
    pub fn validate(&self) -> Result<(), StateError> {
        let invalid = |reason: &'static str| Err(StateError::InvalidMseg { reason });
        let n = self.points.len();
        if n < 2 {
            return invalid("fewer than two points");
        }
        if n > MAX_MSEG_POINTS {
            return invalid("too many points");
        }
        if self.points[0].time != 0.0 || self.points[n - 1].time != 1.0 {
            return invalid("first point must be at 0 and last at 1");
        }
        let mut last = 0.0;
        for p in &self.points {
            if !(p.time.is_finite() && p.value.is_finite() && p.curve.is_finite()) {
                return invalid("non-finite point");
            }
            if p.time < last {
                return invalid("points out of order");
            }
            if !(0.0..=1.0).contains(&p.value) || !(-1.0..=1.0).contains(&p.curve) {
                return invalid("point out of range");
            }
            last = p.time;
        }
        Ok(())
    }

    /// Curve value at cycle position `t` (clamped to 0..1).
    pub fn value_at(&self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        let Some(first) = self.points.first() else {
            return 0.0;
        };
        if t <= first.time {
            return first.value;
        }
        for pair in self.points.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if t <= b.time {
                let span = b.time - a.time;
                if span <= 0.0 {
                    return b.value;
                }
                let shape = curve_shape((t - a.time) / span, a.curve);
                return a.value + (b.value - a.value) * shape;
            }
        }
        self.points.last().map_or(0.0, |p| p.value)
    }
}

/// MSEG playback settings, refreshed once per sub-block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MsegParams {
    /// Cycles per second, already resolved from tempo when synced.
    pub frequency: f32,
    /// Output scale, −1..1.
    pub depth: f32,
    /// Read offset in cycles, −1..1.
    pub phase: f32,
    /// Added to the output.
    pub offset: f32,
    /// Wrap at the end of the table instead of holding.
    pub looping: bool,
}

impl Default for MsegParams {
    fn default() -> Self {
        Self {
            frequency: 1.0,
            depth: 1.0,
            phase: 0.0,
            offset: 0.0,
            looping: false,
        }
    }
}

/// Per-voice player for an [`MsegData`] table.
///
/// ```rust
/// use orrery_synth::{Mseg, MsegData, MsegParams};
///
/// let data = MsegData::default();
/// let mut mseg = Mseg::new(1000.0);
/// mseg.set_params(MsegParams { frequency: 1.0, ..MsegParams::default() });
/// mseg.note_on(&data);
/// let v = mseg.process(500, &data);
/// assert!((v - 1.0).abs() < 1e-6);
/// ```
#[derive(Debug, Clone)]
pub struct Mseg {
    sample_rate: f32,
    params: MsegParams,
    position: f32,
    output: f32,
}

impl Mseg {
    /// Player at the start of the cycle.
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            params: MsegParams::default(),
            position: 0.0,
            output: 0.0,
        }
    }

    /// Change the sample rate.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
    }

    /// Replace the settings.
    pub fn set_params(&mut self, params: MsegParams) {
        self.params = params;
    }

    /// Restart the cycle.
    pub fn note_on(&mut self, data: &MsegData) {
        self.position = 0.0;
        self.output = self.read(data);
    }

    /// Last output.
    pub fn output(&self) -> f32 {
        self.output
    }

    /// Position in the cycle, 0..1.
    pub fn position(&self) -> f32 {
        self.position
    }

    /// One-shot playback has reached the end.
    pub fn is_finished(&self) -> bool {
        !self.params.looping && self.position >= 1.0
    }

    /// Advance by `samples` and return the new output.
    pub fn process(&mut self, samples: usize, data: &MsegData) -> f32 {
        if self.sample_rate > 0.0 {
            let advanced = self.position + self.params.frequency.max(0.0) * samples as f32 / self.sample_rate;
            self.position = if self.params.looping {
                advanced - libm::floorf(advanced)
            } else {
                advanced.min(1.0)
            };
        }
        self.output = self.read(data);
        self.output
    }

    fn read(&self, data: &MsegData) -> f32 {
        let shifted = self.position + self.params.phase;
        let t = if self.params.looping {
            shifted - libm::floorf(shifted)
        } else {
            shifted.clamp(0.0, 1.0)
        };
        self.params.offset + self.params.depth * data.value_at(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_triangle() {
        let data = MsegData::default();
        assert!(data.validate().is_ok());
        assert_eq!(data.value_at(0.0), 0.0);
        assert!((data.value_at(0.25) - 0.5).abs() < 1e-6);
        assert_eq!(data.value_at(0.5), 1.0);
        assert_eq!(data.value_at(1.0), 0.0);
    }

    #[test]
    fn test_validate_rejects_bad_tables() {
        let mut data = MsegData::default();
        data.points.truncate(1);
        assert!(data.validate().is_err());

        let mut data = MsegData::default();
        data.points.swap(0, 1);
        assert!(data.validate().is_err());

        let mut data = MsegData::default();
        data.points[1].value = 2.0;
        assert!(data.validate().is_err());

        let mut data = MsegData::default();
        data.points[1].curve = f32::NAN;
        assert!(data.validate().is_err());
    }

    #[test]
    fn test_curved_segment() {
        let data = MsegData {
            points: vec![
                MsegPoint {
                    time: 0.0,
                    value: 0.0,
                    curve: 1.0,
                },
                MsegPoint::new(1.0, 1.0),
            ],
        };
        assert!(data.value_at(0.5) > 0.5);
    }

    #[test]
    fn test_one_shot_holds_end() {
        let data = MsegData::default();
        let mut mseg = Mseg::new(1000.0);
        mseg.note_on(&data);
        mseg.process(5000, &data);
        assert!(mseg.is_finished());
        assert_eq!(mseg.output(), 0.0);
    }

    #[test]
    fn test_loop_wraps() {
        let data = MsegData::default();
        let mut mseg = Mseg::new(1000.0);
        mseg.set_params(MsegParams {
            looping: true,
            ..MsegParams::default()
        });
        mseg.note_on(&data);
        mseg.process(1500, &data);
        assert!((mseg.position() - 0.5).abs() < 1e-5);
        assert!((mseg.output() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_phase_offset_and_depth() {
        let data = MsegData::default();
        let mut mseg = Mseg::new(1000.0);
        mseg.set_params(MsegParams {
            phase: 0.5,
            depth: -1.0,
            offset: 0.5,
            ..MsegParams::default()
        });
        mseg.note_on(&data);
        assert!((mseg.output() + 0.5).abs() < 1e-6);
    }
}
