//! Note durations and host transport.
//!
//! Tempo-synced envelopes, LFOs, MSEGs and delay times pick a
//! [`NoteDuration`] by index from a fixed 24-entry table running from a
//! sixty-fourth-note triplet to eight bars. Index 13 is a quarter note.

/// A musical duration measured in quarter-note beats.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteDuration {
    /// Display label, e.g. `"1/8d"`.
    pub label: &'static str,
    /// Length in quarter notes.
    pub beats: f32,
}

impl NoteDuration {
    const fn new(label: &'static str, numerator: f32, denominator: f32, modifier: f32) -> Self {
        Self {
            label,
            beats: 4.0 * numerator / denominator * modifier,
        }
    }

    /// Length in seconds at `bpm`.
    #[inline]
    pub fn to_seconds(&self, bpm: f32) -> f32 {
        self.beats * 60.0 / bpm.max(1.0)
    }

    /// Repetition rate in Hz at `bpm`.
    #[inline]
    pub fn to_hz(&self, bpm: f32) -> f32 {
        1.0 / self.to_seconds(bpm)
    }
}

const T: f32 = 2.0 / 3.0;
const D: f32 = 1.5;

/// Every selectable duration, shortest first.
pub const NOTE_DURATIONS: [NoteDuration; 24] = [
    NoteDuration::new("1/64t", 1.0, 64.0, T),
    NoteDuration::new("1/64", 1.0, 64.0, 1.0),
    NoteDuration::new("1/64d", 1.0, 64.0, D),
    NoteDuration::new("1/32t", 1.0, 32.0, T),
    NoteDuration::new("1/32", 1.0, 32.0, 1.0),
    NoteDuration::new("1/32d", 1.0, 32.0, D),
    NoteDuration::new("1/16t", 1.0, 16.0, T),
    NoteDuration::new("1/16", 1.0, 16.0, 1.0),
    NoteDuration::new("1/16d", 1.0, 16.0, D),
    NoteDuration::new("1/8t", 1.0, 8.0, T),
    NoteDuration::new("1/8", 1.0, 8.0, 1.0),
    NoteDuration::new("1/8d", 1.0, 8.0, D),
    NoteDuration::new("1/4t", 1.0, 4.0, T),
    NoteDuration::new("1/4", 1.0, 4.0, 1.0),
    NoteDuration::new("1/4d", 1.0, 4.0, D),
    NoteDuration::new("1/2t", 1.0, 2.0, T),
    NoteDuration::new("1/2", 1.0, 2.0, 1.0),
    NoteDuration::new("1/2d", 1.0, 2.0, D),
    NoteDuration::new("1/1t", 1.0, 1.0, T),
    NoteDuration::new("1/1", 1.0, 1.0, 1.0),
    NoteDuration::new("1/1d", 1.0, 1.0, D),
    NoteDuration::new("2/1", 2.0, 1.0, 1.0),
    NoteDuration::new("4/1", 4.0, 1.0, 1.0),
    NoteDuration::new("8/1", 8.0, 1.0, 1.0),
];

/// Labels of [`NOTE_DURATIONS`], for choice parameters.
pub const NOTE_DURATION_LABELS: &[&str] = &[
    "1/64t", "1/64", "1/64d", "1/32t", "1/32", "1/32d", "1/16t", "1/16", "1/16d", "1/8t", "1/8",
    "1/8d", "1/4t", "1/4", "1/4d", "1/2t", "1/2", "1/2d", "1/1t", "1/1", "1/1d", "2/1", "4/1",
    "8/1",
];

/// Index of the quarter note.
pub const QUARTER_NOTE_INDEX: usize = 13;

/// Duration for a (possibly fractional or out-of-range) parameter value.
///
/// ```rust
/// use orrery_core::note_duration;
///
/// assert_eq!(note_duration(13.2).label, "1/4");
/// assert_eq!(note_duration(99.0).label, "8/1");
/// ```
#[inline]
pub fn note_duration(value: f32) -> &'static NoteDuration {
    let idx = libm::roundf(value.max(0.0)) as usize;
    &NOTE_DURATIONS[idx.min(NOTE_DURATIONS.len() - 1)]
}

/// Host playhead, supplied once per block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transport {
    /// Tempo in beats per minute.
    pub bpm: f32,
    /// Whether the host is playing.
    pub playing: bool,
    /// Playhead in quarter notes since the song start.
    pub position_beats: f64,
}

impl Default for Transport {
    fn default() -> Self {
        Self {
            bpm: 120.0,
            playing: false,
            position_beats: 0.0,
        }
    }
}

impl Transport {
    /// Advance the playhead by `samples` if playing.
    pub fn advance(&mut self, samples: usize, sample_rate: f32) {
        if self.playing && sample_rate > 0.0 {
            self.position_beats +=
                samples as f64 * f64::from(self.bpm) / (60.0 * f64::from(sample_rate));
        }
    }
}
