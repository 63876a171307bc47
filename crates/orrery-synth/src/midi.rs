//! Channel voice messages consumed by the voice allocator.

/// Decoded MIDI message. Channels are 0-based.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MidiMessage {
    /// Key pressed. Velocity 0..1.
    NoteOn {
        /// Channel, 0..15.
        channel: u8,
        /// Note number, 0..127.
        note: u8,
        /// Strike velocity, 0..1.
        velocity: f32,
    },
    /// Key released.
    NoteOff {
        /// Channel, 0..15.
        channel: u8,
        /// Note number, 0..127.
        note: u8,
    },
    /// 14-bit bend, −8192..8191.
    PitchBend {
        /// Channel, 0..15.
        channel: u8,
        /// Signed bend amount.
        value: i16,
    },
    /// Controller change. Value 0..1.
    ControlChange {
        /// Channel, 0..15.
        channel: u8,
        /// Controller number.
        controller: u8,
        /// Value, 0..1.
        value: f32,
    },
    /// Channel pressure, 0..1.
    ChannelPressure {
        /// Channel, 0..15.
        channel: u8,
        /// Pressure, 0..1.
        value: f32,
    },
    /// Per-key pressure, 0..1.
    PolyAftertouch {
        /// Channel, 0..15.
        channel: u8,
        /// Note number.
        note: u8,
        /// Pressure, 0..1.
        value: f32,
    },
    /// CC 123 or CC 120.
    AllNotesOff {
        /// Channel, 0..15.
        channel: u8,
    },
}

/// Mod wheel controller.
pub const CC_MOD_WHEEL: u8 = 1;
/// MPE timbre controller.
pub const CC_TIMBRE: u8 = 74;
/// Sustain pedal.
pub const CC_SUSTAIN: u8 = 64;
/// All sound off.
pub const CC_ALL_SOUND_OFF: u8 = 120;
/// All notes off.
pub const CC_ALL_NOTES_OFF: u8 = 123;

impl MidiMessage {
    /// Decode a raw three-byte message. Running status and system messages
    /// are not handled.
    ///
    /// ```rust
    /// use orrery_synth::MidiMessage;
    ///
    /// let msg = MidiMessage::from_bytes(&[0x91, 60, 127]);
    /// assert_eq!(msg, Some(MidiMessage::NoteOn { channel: 1, note: 60, velocity: 1.0 }));
    /// assert_eq!(
    ///     MidiMessage::from_bytes(&[0x90, 60, 0]),
    ///     Some(MidiMessage::NoteOff { channel: 0, note: 60 })
    /// );
    /// ```
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let status = *bytes.first()?;
        let channel = status & 0x0F;
        let data = |i: usize| bytes.get(i).map(|b| b & 0x7F);
        let unit = |b: u8| f32::from(b) / 127.0;

        Some(match status & 0xF0 {
            0x80 => Self::NoteOff {
                channel,
                note: data(1)?,
            },
            0x90 => {
                let note = data(1)?;
                let velocity = data(2)?;
                if velocity == 0 {
                    Self::NoteOff { channel, note }
                } else {
                    Self::NoteOn {
                        channel,
                        note,
                        velocity: unit(velocity),
                    }
                }
            }
            0xA0 => Self::PolyAftertouch {
                channel,
                note: data(1)?,
                value: unit(data(2)?),
            },
            0xB0 => {
                let controller = data(1)?;
                let value = data(2)?;
                if controller == CC_ALL_NOTES_OFF || controller == CC_ALL_SOUND_OFF {
                    Self::AllNotesOff { channel }
                } else {
                    Self::ControlChange {
                        channel,
                        controller,
                        value: unit(value),
                    }
                }
            }
            0xD0 => Self::ChannelPressure {
                channel,
                value: unit(data(1)?),
            },
            0xE0 => {
                let lsb = i16::from(data(1)?);
                let msb = i16::from(data(2)?);
                Self::PitchBend {
                    channel,
                    value: ((msb << 7) | lsb) - 8192,
                }
            }
            _ => return None,
        })
    }

    /// Channel the message was sent on.
    pub fn channel(&self) -> u8 {
        match *self {
            Self::NoteOn { channel, .. }
            | Self::NoteOff { channel, .. }
            | Self::PitchBend { channel, .. }
            | Self::ControlChange { channel, .. }
            | Self::ChannelPressure { channel, .. }
            | Self::PolyAftertouch { channel, .. }
            | Self::AllNotesOff { channel } => channel,
        }
    }
}

/// A message stamped with its offset in the current block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MidiEvent {
    /// Sample index within the block passed to `process_block`.
    pub sample_offset: usize,
    /// The message.
    pub message: MidiMessage,
}

impl MidiEvent {
    /// Event at `sample_offset`.
    pub const fn new(sample_offset: usize, message: MidiMessage) -> Self {
        Self {
            sample_offset,
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pitch_bend_range() {
        assert_eq!(
            MidiMessage::from_bytes(&[0xE0, 0x00, 0x40]),
            Some(MidiMessage::PitchBend { channel: 0, value: 0 })
        );
        assert_eq!(
            MidiMessage::from_bytes(&[0xE3, 0x7F, 0x7F]),
            Some(MidiMessage::PitchBend { channel: 3, value: 8191 })
        );
        assert_eq!(
            MidiMessage::from_bytes(&[0xE0, 0x00, 0x00]),
            Some(MidiMessage::PitchBend { channel: 0, value: -8192 })
        );
    }

    #[test]
    fn test_control_change_and_all_notes_off() {
        assert_eq!(
            MidiMessage::from_bytes(&[0xB2, 1, 127]),
            Some(MidiMessage::ControlChange { channel: 2, controller: 1, value: 1.0 })
        );
        assert_eq!(
            MidiMessage::from_bytes(&[0xB0, 123, 0]),
            Some(MidiMessage::AllNotesOff { channel: 0 })
        );
    }

    #[test]
    fn test_pressure_messages() {
        assert_eq!(
            MidiMessage::from_bytes(&[0xD5, 0]),
            Some(MidiMessage::ChannelPressure { channel: 5, value: 0.0 })
        );
        assert_eq!(
            MidiMessage::from_bytes(&[0xA0, 64, 127]),
            Some(MidiMessage::PolyAftertouch { channel: 0, note: 64, value: 1.0 })
        );
    }

    #[test]
    fn test_truncated_and_unknown() {
        assert_eq!(MidiMessage::from_bytes(&[]), None);
        assert_eq!(MidiMessage::from_bytes(&[0x90, 60]), None);
        assert_eq!(MidiMessage::from_bytes(&[0xF8]), None);
        assert_eq!(MidiMessage::from_bytes(&[0xC0, 5]), None, "program change ignored");
    }

    #[test]
    fn test_channel_accessor() {
        let msg = MidiMessage::from_bytes(&[0x8F, 10, 0]).unwrap();
        assert_eq!(msg.channel(), 15);
    }
}
