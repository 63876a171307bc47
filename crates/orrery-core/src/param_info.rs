//! Parameter descriptors.
//!
//! A [`ParamDescriptor`] is plain data: an identity, a skewed range, a
//! [`ParamKind`] tag, a [`ValueConversion`] from the user value to the value the
//! DSP consumes, and an optional formatter function pointer. Nothing here
//! allocates or dispatches dynamically, so descriptors can be consulted on the
//! audio thread.
//!
//! # Ranges
//!
//! Normalisation follows a skewed range:
//!
//! - `normalize(v) = ((v - min) / (max - min))^skew`
//! - `denormalize(n) = min + (max - min) * n^(1/skew)`
//!
//! A skew below 1 gives more travel to the low end (envelope times use 0.2),
//! a skew above 1 favours the high end.
//!
//! # Example
//!
//! ```rust
//! use orrery_core::{ParamDescriptor, ParamUnit, ValueConversion};
//!
//! let level = ParamDescriptor::continuous("level", "Level", "Lvl", -100.0, 12.0, 0.0)
//!     .with_unit(ParamUnit::Decibels)
//!     .with_conversion(ValueConversion::DecibelsToGain);
//!
//! assert!((level.convert(0.0) - 1.0).abs() < 1e-6);
//! assert_eq!(level.clamp(20.0), 12.0);
//! ```

use core::fmt;

use crate::math::{db_to_linear, midi_note_to_hz};

/// Dense numeric parameter index, assigned in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParamId(pub u32);

impl ParamId {
    /// Index into per-parameter tables.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Shape of a parameter's value set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Any value in range.
    Continuous,
    /// Values snap to multiples of `step` above `min`.
    Stepped,
    /// 0 or 1.
    Toggle,
    /// Integer index into a label list.
    Choice(&'static [&'static str]),
}

/// Mapping from the user-facing value to the value the DSP reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueConversion {
    /// Processed value equals the user value.
    #[default]
    Identity,
    /// dB to linear gain.
    DecibelsToGain,
    /// 0..100 to 0..1.
    PercentToUnit,
    /// MIDI note number (fractional) to Hz.
    MidiNoteToHz,
}

impl ValueConversion {
    /// Apply the conversion.
    #[inline]
    pub fn apply(self, value: f32) -> f32 {
        match self {
            Self::Identity => value,
            Self::DecibelsToGain => db_to_linear(value),
            Self::PercentToUnit => value * 0.01,
            Self::MidiNoteToHz => midi_note_to_hz(value),
        }
    }
}

/// Capability flags.
///
/// ```rust
/// use orrery_core::ParamFlags;
///
/// let flags = ParamFlags::AUTOMATABLE.union(ParamFlags::INTERNAL);
/// assert!(flags.contains(ParamFlags::INTERNAL));
/// assert!(!flags.contains(ParamFlags::MONO));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamFlags(u8);

impl ParamFlags {
    /// No flags.
    pub const NONE: Self = Self(0);
    /// Host can automate the parameter.
    pub const AUTOMATABLE: Self = Self(1 << 0);
    /// Never registered as a modulation destination.
    pub const INTERNAL: Self = Self(1 << 1);
    /// Resolved once per sub-block for the whole instrument rather than per voice.
    pub const MONO: Self = Self(1 << 2);
    /// Hidden from generic parameter listings.
    pub const HIDDEN: Self = Self(1 << 3);

    /// True if every bit of `other` is set.
    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Bitwise union.
    #[inline]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl Default for ParamFlags {
    fn default() -> Self {
        Self::AUTOMATABLE
    }
}

/// Display unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamUnit {
    /// dB
    Decibels,
    /// Hz
    Hertz,
    /// s
    Seconds,
    /// ms
    Milliseconds,
    /// %
    Percent,
    /// st
    Semitones,
    /// n:1
    Ratio,
    /// Dimensionless.
    None,
}

impl ParamUnit {
    /// Suffix appended when formatting.
    ///
    /// ```rust
    /// use orrery_core::ParamUnit;
    ///
    /// assert_eq!(ParamUnit::Seconds.suffix(), " s");
    /// assert_eq!(ParamUnit::None.suffix(), "");
    /// ```
    pub const fn suffix(&self) -> &'static str {
        match self {
            ParamUnit::Decibels => " dB",
            ParamUnit::Hertz => " Hz",
            ParamUnit::Seconds => " s",
            ParamUnit::Milliseconds => " ms",
            ParamUnit::Percent => "%",
            ParamUnit::Semitones => " st",
            ParamUnit::Ratio => ":1",
            ParamUnit::None => "",
        }
    }
}

/// Custom text formatter for a parameter value.
pub type ValueFormatter = fn(f32, &mut dyn fmt::Write) -> fmt::Result;

/// Everything the host, the matrix and the UI need to know about a control.
#[derive(Debug, Clone, Copy)]
pub struct ParamDescriptor {
    /// Index in the parameter table. Assigned by the layout at registration.
    pub id: ParamId,
    /// Stable textual id used in patches (e.g. `"osc1coarse"`).
    pub string_id: &'static str,
    /// Full display name.
    pub name: &'static str,
    /// Short name for narrow displays.
    pub short_name: &'static str,
    /// Display unit.
    pub unit: ParamUnit,
    /// Lower bound.
    pub min: f32,
    /// Upper bound.
    pub max: f32,
    /// Value at construction and after reset.
    pub default: f32,
    /// Snap interval for [`ParamKind::Stepped`]; 0 for continuous.
    pub step: f32,
    /// Range skew, 1 for linear.
    pub skew: f32,
    /// Value set.
    pub kind: ParamKind,
    /// User value to processed value.
    pub conversion: ValueConversion,
    /// Capability flags.
    pub flags: ParamFlags,
    /// Overrides the default text.
    pub formatter: Option<ValueFormatter>,
}

impl ParamDescriptor {
    /// Continuous parameter, linear range.
    pub const fn continuous(
        string_id: &'static str,
        name: &'static str,
        short_name: &'static str,
        min: f32,
        max: f32,
        default: f32,
    ) -> Self {
        Self {
            id: ParamId(0),
            string_id,
            name,
            short_name,
            unit: ParamUnit::None,
            min,
            max,
            default,
            step: 0.0,
            skew: 1.0,
            kind: ParamKind::Continuous,
            conversion: ValueConversion::Identity,
            flags: ParamFlags::AUTOMATABLE,
            formatter: None,
        }
    }

    /// Integer-stepped parameter.
    pub const fn stepped(
        string_id: &'static str,
        name: &'static str,
        short_name: &'static str,
        min: f32,
        max: f32,
        default: f32,
    ) -> Self {
        let mut d = Self::continuous(string_id, name, short_name, min, max, default);
        d.step = 1.0;
        d.kind = ParamKind::Stepped;
        d
    }

    /// On/off switch.
    pub const fn toggle(
        string_id: &'static str,
        name: &'static str,
        short_name: &'static str,
        default: bool,
    ) -> Self {
        let mut d = Self::continuous(
            string_id,
            name,
            short_name,
            0.0,
            1.0,
            if default { 1.0 } else { 0.0 },
        );
        d.step = 1.0;
        d.kind = ParamKind::Toggle;
        d
    }

    /// Selection from a label list; the value is the label index.
    pub const fn choice(
        string_id: &'static str,
        name: &'static str,
        short_name: &'static str,
        labels: &'static [&'static str],
        default: usize,
    ) -> Self {
        let max = if labels.is_empty() {
            0.0
        } else {
            (labels.len() - 1) as f32
        };
        let mut d = Self::continuous(string_id, name, short_name, 0.0, max, default as f32);
        d.step = 1.0;
        d.kind = ParamKind::Choice(labels);
        d
    }

    /// Set the table index.
    pub const fn with_id(mut self, id: ParamId) -> Self {
        self.id = id;
        self
    }

    /// Set the display unit.
    pub const fn with_unit(mut self, unit: ParamUnit) -> Self {
        self.unit = unit;
        self
    }

    /// Set the range skew.
    pub const fn with_skew(mut self, skew: f32) -> Self {
        self.skew = skew;
        self
    }

    /// Set the snap interval and make the parameter stepped.
    pub const fn with_step(mut self, step: f32) -> Self {
        self.step = step;
        self.kind = ParamKind::Stepped;
        self
    }

    /// Set the processed-value conversion.
    pub const fn with_conversion(mut self, conversion: ValueConversion) -> Self {
        self.conversion = conversion;
        self
    }

    /// Replace the flags.
    pub const fn with_flags(mut self, flags: ParamFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Add `INTERNAL` to the flags.
    pub const fn internal(mut self) -> Self {
        self.flags = self.flags.union(ParamFlags::INTERNAL);
        self
    }

    /// Set a custom formatter.
    pub const fn with_formatter(mut self, formatter: ValueFormatter) -> Self {
        self.formatter = Some(formatter);
        self
    }

    /// Not visible to the modulation matrix.
    #[inline]
    pub const fn is_internal(&self) -> bool {
        self.flags.contains(ParamFlags::INTERNAL)
    }

    /// Resolved once per sub-block for all voices.
    #[inline]
    pub const fn is_mono(&self) -> bool {
        self.flags.contains(ParamFlags::MONO)
    }

    /// Stepped, toggle and choice parameters snap to integers of `step`.
    #[inline]
    pub const fn is_discrete(&self) -> bool {
        !matches!(self.kind, ParamKind::Continuous)
    }

    /// Clamp to `[min, max]`.
    #[inline]
    pub fn clamp(&self, value: f32) -> f32 {
        if value < self.min {
            self.min
        } else if value > self.max {
            self.max
        } else {
            value
        }
    }

    /// Clamp, then snap discrete parameters to the step grid.
    #[inline]
    pub fn constrain(&self, value: f32) -> f32 {
        let v = self.clamp(value);
        if self.is_discrete() && self.step > 0.0 {
            self.clamp(self.min + libm::roundf((v - self.min) / self.step) * self.step)
        } else {
            v
        }
    }

    /// Plain value to `[0, 1]`.
    ///
    /// ```rust
    /// use orrery_core::ParamDescriptor;
    ///
    /// let d = ParamDescriptor::continuous("a", "A", "A", 0.0, 60.0, 0.0).with_skew(0.5);
    /// assert!((d.normalize(15.0) - 0.5).abs() < 1e-6);
    /// assert!((d.denormalize(0.5) - 15.0).abs() < 1e-4);
    /// ```
    #[inline]
    pub fn normalize(&self, value: f32) -> f32 {
        let range = self.max - self.min;
        if range <= 0.0 {
            return 0.0;
        }
        let linear = ((self.clamp(value) - self.min) / range).clamp(0.0, 1.0);
        if self.skew == 1.0 {
            linear
        } else {
            libm::powf(linear, self.skew)
        }
    }

    /// `[0, 1]` to plain value. Discrete parameters snap.
    #[inline]
    pub fn denormalize(&self, normalized: f32) -> f32 {
        let n = normalized.clamp(0.0, 1.0);
        let curved = if self.skew == 1.0 || self.skew <= 0.0 {
            n
        } else {
            libm::powf(n, 1.0 / self.skew)
        };
        let value = self.min + curved * (self.max - self.min);
        if self.is_discrete() {
            self.constrain(value)
        } else {
            value
        }
    }

    /// Processed value for a user value.
    #[inline]
    pub fn convert(&self, value: f32) -> f32 {
        self.conversion.apply(value)
    }

    /// Label for a choice value, if this is a choice parameter.
    pub fn choice_label(&self, value: f32) -> Option<&'static str> {
        match self.kind {
            ParamKind::Choice(labels) => {
                let idx = libm::roundf(self.clamp(value) - self.min) as usize;
                labels.get(idx).copied()
            }
            _ => None,
        }
    }

    /// Write display text for `value`.
    ///
    /// Uses the custom formatter when set, choice labels for choices,
    /// "On"/"Off" for toggles, otherwise the number with the unit suffix.
    pub fn format_value(&self, value: f32, out: &mut dyn fmt::Write) -> fmt::Result {
        if let Some(formatter) = self.formatter {
            return formatter(value, out);
        }
        match self.kind {
            ParamKind::Choice(_) => match self.choice_label(value) {
                Some(label) => out.write_str(label),
                None => write!(out, "{value:.0}"),
            },
            ParamKind::Toggle => out.write_str(if value >= 0.5 { "On" } else { "Off" }),
            ParamKind::Stepped if self.step >= 1.0 => {
                write!(out, "{value:.0}{}", self.unit.suffix())
            }
            _ => {
                let abs = value.abs();
                if abs >= 100.0 {
                    write!(out, "{value:.0}{}", self.unit.suffix())
                } else if abs >= 10.0 {
                    write!(out, "{value:.1}{}", self.unit.suffix())
                } else {
                    write!(out, "{value:.2}{}", self.unit.suffix())
                }
            }
        }
    }
}
