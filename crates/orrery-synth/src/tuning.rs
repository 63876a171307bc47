//! Note-to-frequency mapping.
//!
//! An external tuning master may replace equal temperament. The processor
//! asks the provider once per block whether a master is connected and
//! falls back to [`EqualTemperament`] semantics when none is.

use alloc::string::String;

use orrery_core::midi_note_to_hz;

/// Source of note frequencies.
pub trait TuningProvider: Send {
    /// A tuning master is connected and active.
    fn has_master(&self) -> bool;

    /// Name of the active scale.
    fn scale_name(&self) -> &str;

    /// Frequency of a (possibly fractional) note on `channel`.
    fn note_to_hz(&self, note: f32, channel: u8) -> f32;
}

/// Standard 12-TET, A4 = 440 Hz.
#[derive(Debug, Clone, Copy, Default)]
pub struct EqualTemperament;

impl TuningProvider for EqualTemperament {
    fn has_master(&self) -> bool {
        false
    }

    fn scale_name(&self) -> &str {
        "12-TET"
    }

    fn note_to_hz(&self, note: f32, _channel: u8) -> f32 {
        midi_note_to_hz(note)
    }
}

/// A 128-entry frequency table, as delivered by a tuning master.
///
/// Fractional notes interpolate in log-frequency between table entries.
///
/// ```rust
/// use orrery_synth::{TuningProvider, TuningTable};
///
/// let mut table = TuningTable::equal("flat");
/// table.set_frequency(60, 256.0);
/// assert_eq!(table.note_to_hz(60.0, 0), 256.0);
/// assert!(table.has_master());
/// ```
#[derive(Debug, Clone)]
pub struct TuningTable {
    name: String,
    frequencies: [f32; 128],
    active: bool,
}

impl TuningTable {
    /// Table filled with 12-TET frequencies.
    pub fn equal(name: &str) -> Self {
        Self {
            name: String::from(name),
            frequencies: core::array::from_fn(|n| midi_note_to_hz(n as f32)),
            active: true,
        }
    }

    /// Override one note. Non-positive or non-finite values are ignored.
    pub fn set_frequency(&mut self, note: u8, hz: f32) {
        if hz.is_finite() && hz > 0.0 {
            if let Some(slot) = self.frequencies.get_mut(usize::from(note)) {
                *slot = hz;
            }
        }
    }

    /// Mark the master as connected or gone.
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }
}

impl TuningProvider for TuningTable {
    fn has_master(&self) -> bool {
        self.active
    }

    fn scale_name(&self) -> &str {
        &self.name
    }

    fn note_to_hz(&self, note: f32, _channel: u8) -> f32 {
        if !self.active {
            return midi_note_to_hz(note);
        }
        let clamped = note.clamp(0.0, 127.0);
        let lo = libm::floorf(clamped) as usize;
        let hi = (lo + 1).min(127);
        let t = clamped - lo as f32;
        let (a, b) = (self.frequencies[lo], self.frequencies[hi]);
        if t == 0.0 {
            a
        } else {
            a * libm::powf(b / a, t)
        }
    }
}
