//! Note-to-voice allocation.
//!
//! Poly mode takes a free voice first and otherwise steals, preferring
//! voices already in their release tail and then the oldest note. Mono
//! mode plays the newest held key on voice 0 and falls back down the held
//! stack when it is released.
//!
//! In MPE mode channel 0 is the master channel: its bend moves every voice
//! by the global pitch-bend range, while bend, pressure and CC74 on the
//! member channels only reach the voices sounding on them.

use alloc::vec::Vec;

use crate::midi::{CC_MOD_WHEEL, CC_SUSTAIN, CC_TIMBRE, MidiMessage};
use crate::voice::{MPE_BEND_RANGE, Voice};

/// Upper bound on the voice pool.
pub const MAX_VOICES: usize = 8;

const CHANNELS: usize = 16;

/// Held keys remembered in mono mode; the oldest is forgotten past this.
const MAX_HELD: usize = 128;

/// How a new note reaches its pitch from the previous one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GlideMode {
    /// Jump.
    #[default]
    Off,
    /// Slide in semitone steps.
    Glissando,
    /// Slide continuously.
    Portamento,
}

impl GlideMode {
    /// Mode for a choice index; out-of-range indices are `Off`.
    pub fn from_index(index: usize) -> Self {
        match index {
            1 => Self::Glissando,
            2 => Self::Portamento,
            _ => Self::Off,
        }
    }
}

/// Performance flags pushed from the parameter table once per block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerformanceSettings {
    /// One voice, newest key wins.
    pub mono: bool,
    /// In mono mode, move between held keys without retriggering.
    pub legato: bool,
    /// Glide behaviour.
    pub glide: GlideMode,
    /// Glide time in seconds.
    pub glide_seconds: f32,
    /// Poly voice count, 2..=8.
    pub voices: usize,
    /// Per-channel expression.
    pub mpe: bool,
    /// Global bend range in semitones.
    pub pitchbend_range: f32,
}

impl Default for PerformanceSettings {
    fn default() -> Self {
        Self {
            mono: false,
            legato: false,
            glide: GlideMode::Off,
            glide_seconds: 0.3,
            voices: MAX_VOICES,
            mpe: false,
            pitchbend_range: 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct HeldKey {
    note: u8,
    channel: u8,
    velocity: f32,
}

/// Owns the voice pool and routes note and expression messages to it.
///
/// ```rust
/// use orrery_synth::{MidiMessage, PerformanceSettings, VoiceAllocator};
///
/// let mut alloc = VoiceAllocator::new();
/// alloc.set_sample_rate(48000.0);
/// alloc.apply_settings(PerformanceSettings { voices: 2, ..PerformanceSettings::default() });
/// for note in [60, 64, 67] {
///     alloc.handle(&MidiMessage::NoteOn { channel: 0, note, velocity: 1.0 });
/// }
/// assert_eq!(alloc.active_count(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct VoiceAllocator {
    voices: Vec<Voice>,
    pedal_held: Vec<bool>,
    settings: PerformanceSettings,
    age_counter: u64,
    held: Vec<HeldKey>,
    sustain: bool,
    last_note: Option<f32>,
    bend: f32,
    channel_bend: [f32; CHANNELS],
    channel_pressure: [f32; CHANNELS],
    channel_timbre: [f32; CHANNELS],
    mod_wheel: f32,
}

impl Default for VoiceAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl VoiceAllocator {
    /// A pool of [`MAX_VOICES`] idle voices.
    pub fn new() -> Self {
        Self {
            voices: (0..MAX_VOICES).map(Voice::new).collect(),
            pedal_held: alloc::vec![false; MAX_VOICES],
            settings: PerformanceSettings::default(),
            age_counter: 0,
            held: Vec::with_capacity(MAX_HELD),
            sustain: false,
            last_note: None,
            bend: 0.0,
            channel_bend: [0.0; CHANNELS],
            channel_pressure: [0.0; CHANNELS],
            channel_timbre: [0.0; CHANNELS],
            mod_wheel: 0.0,
        }
    }

    /// Set the sample rate of every voice. Silences the pool.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        for voice in &mut self.voices {
            voice.set_sample_rate(sample_rate);
        }
        self.clear_keys();
    }

    /// Apply performance flags. Voices beyond a reduced count are released,
    /// and switching between mono and poly releases everything.
    pub fn apply_settings(&mut self, settings: PerformanceSettings) {
        let settings = PerformanceSettings {
            voices: settings.voices.clamp(2, MAX_VOICES),
            ..settings
        };
        if settings.mono != self.settings.mono {
            self.all_notes_off();
        }
        if settings.voices < self.settings.voices {
            for voice in &mut self.voices[settings.voices..] {
                voice.note_off();
            }
        }
        self.settings = settings;
    }

    /// Current performance flags.
    pub fn settings(&self) -> &PerformanceSettings {
        &self.settings
    }

    /// The whole pool.
    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    /// The whole pool, mutably.
    pub fn voices_mut(&mut self) -> &mut [Voice] {
        &mut self.voices
    }

    /// Voices currently sounding.
    pub fn active_count(&self) -> usize {
        self.voices.iter().filter(|v| v.is_active()).count()
    }

    /// Global pitch bend in semitones.
    pub fn pitch_bend_semitones(&self) -> f32 {
        self.bend * self.settings.pitchbend_range
    }

    /// Global pitch bend, −1..1.
    pub fn pitch_bend(&self) -> f32 {
        self.bend
    }

    /// Mod wheel, 0..1.
    pub fn mod_wheel(&self) -> f32 {
        self.mod_wheel
    }

    /// Sustain pedal is down.
    pub fn sustain(&self) -> bool {
        self.sustain
    }

    /// Route one message.
    pub fn handle(&mut self, message: &MidiMessage) {
        match *message {
            MidiMessage::NoteOn {
                channel,
                note,
                velocity,
            } => self.note_on(note, velocity, channel),
            MidiMessage::NoteOff { channel, note } => self.note_off(note, channel),
            MidiMessage::PitchBend { channel, value } => {
                let normalized = (f32::from(value) / 8192.0).clamp(-1.0, 1.0);
                if self.settings.mpe && channel != 0 {
                    let semitones = normalized * MPE_BEND_RANGE;
                    self.channel_bend[usize::from(channel) % CHANNELS] = semitones;
                    self.for_channel(channel, |v| v.set_pitch_bend(semitones));
                } else {
                    self.bend = normalized;
                }
            }
            MidiMessage::ChannelPressure { channel, value } => {
                if self.settings.mpe {
                    self.channel_pressure[usize::from(channel) % CHANNELS] = value;
                    self.for_channel(channel, |v| v.set_pressure(value));
                } else {
                    for voice in &mut self.voices {
                        voice.set_pressure(value);
                    }
                }
            }
            MidiMessage::PolyAftertouch {
                channel,
                note,
                value,
            } => {
                for voice in &mut self.voices {
                    if voice.is_active() && voice.note() == note && voice.channel() == channel {
                        voice.set_pressure(value);
                    }
                }
            }
            MidiMessage::ControlChange {
                channel,
                controller,
                value,
            } => match controller {
                CC_MOD_WHEEL => self.mod_wheel = value,
                CC_SUSTAIN => self.set_sustain(value >= 0.5),
                CC_TIMBRE => {
                    if self.settings.mpe {
                        self.channel_timbre[usize::from(channel) % CHANNELS] = value;
                        self.for_channel(channel, |v| v.set_timbre(value));
                    } else {
                        for voice in &mut self.voices {
                            voice.set_timbre(value);
                        }
                    }
                }
                _ => {}
            },
            MidiMessage::AllNotesOff { .. } => self.all_notes_off(),
        }
    }

    fn for_channel(&mut self, channel: u8, mut f: impl FnMut(&mut Voice)) {
        for voice in &mut self.voices {
            if voice.is_active() && voice.channel() == channel {
                f(voice);
            }
        }
    }

    /// Start a note.
    pub fn note_on(&mut self, note: u8, velocity: f32, channel: u8) {
        if self.settings.mono {
            self.mono_note_on(HeldKey {
                note,
                channel,
                velocity,
            });
        } else {
            self.poly_note_on(note, velocity, channel);
        }
    }

    /// Release a note, or defer the release while the pedal is down.
    pub fn note_off(&mut self, note: u8, channel: u8) {
        if self.settings.mono {
            self.mono_note_off(note, channel);
            return;
        }
        for (voice, pedal) in self.voices.iter_mut().zip(self.pedal_held.iter_mut()) {
            if voice.is_active() && !voice.is_released() && voice.note() == note && voice.channel() == channel {
                if self.sustain {
                    *pedal = true;
                } else {
                    voice.note_off();
                }
            }
        }
    }

    /// Release every voice and forget held keys and the pedal.
    pub fn all_notes_off(&mut self) {
        for voice in &mut self.voices {
            voice.note_off();
        }
        self.clear_keys();
    }

    /// Silence every voice immediately.
    pub fn kill_all(&mut self) {
        for voice in &mut self.voices {
            voice.kill();
        }
        self.clear_keys();
        self.bend = 0.0;
        self.channel_bend = [0.0; CHANNELS];
        self.channel_pressure = [0.0; CHANNELS];
        self.channel_timbre = [0.0; CHANNELS];
    }

    fn clear_keys(&mut self) {
        self.held.clear();
        self.pedal_held.fill(false);
        self.sustain = false;
    }

    fn set_sustain(&mut self, down: bool) {
        self.sustain = down;
        if down {
            return;
        }
        for (voice, pedal) in self.voices.iter_mut().zip(self.pedal_held.iter_mut()) {
            if core::mem::take(pedal) {
                voice.note_off();
            }
        }
    }

    fn next_age(&mut self) -> u64 {
        self.age_counter += 1;
        self.age_counter
    }

    /// Index of the voice to use for a new note.
    fn allocate(&self, note: u8, channel: u8) -> usize {
        let pool = &self.voices[..self.settings.voices];
        if let Some(i) = pool
            .iter()
            .position(|v| v.is_active() && v.note() == note && v.channel() == channel)
        {
            return i;
        }
        if let Some(i) = pool.iter().position(|v| !v.is_active()) {
            return i;
        }
        let oldest = |released: bool| {
            pool.iter()
                .enumerate()
                .filter(|(_, v)| v.is_released() == released)
                .min_by_key(|(_, v)| v.age())
                .map(|(i, _)| i)
        };
        oldest(true).or_else(|| oldest(false)).unwrap_or(0)
    }

    fn poly_note_on(&mut self, note: u8, velocity: f32, channel: u8) {
        let idx = self.allocate(note, channel);
        let age = self.next_age();
        let glide = self.settings.glide;
        let seconds = self.settings.glide_seconds;
        let from = self.last_note;
        let mpe = self.settings.mpe;
        let ch = usize::from(channel) % CHANNELS;
        let (bend, pressure, timbre) = (
            self.channel_bend[ch],
            self.channel_pressure[ch],
            self.channel_timbre[ch],
        );

        #[cfg(feature = "tracing")]
        if self.voices[idx].is_active() {
            tracing::trace!(voice = idx, stolen = self.voices[idx].note(), note, "voice stolen");
        }

        self.pedal_held[idx] = false;
        let voice = &mut self.voices[idx];
        voice.start_note(note, velocity, channel, age);
        if let (GlideMode::Glissando | GlideMode::Portamento, Some(from)) = (glide, from) {
            voice.set_glide(from, glide, seconds);
        }
        if mpe {
            voice.set_pitch_bend(bend);
            voice.set_pressure(pressure);
            voice.set_timbre(timbre);
        }
        self.last_note = Some(f32::from(note));
    }

    fn mono_note_on(&mut self, key: HeldKey) {
        self.held.retain(|k| k.note != key.note || k.channel != key.channel);
        if self.held.len() >= MAX_HELD {
            self.held.remove(0);
        }
        self.held.push(key);
        self.mono_play(key);
    }

    fn mono_play(&mut self, key: HeldKey) {
        let age = self.next_age();
        let glide = self.settings.glide;
        let seconds = self.settings.glide_seconds;
        let legato = self.settings.legato;
        self.pedal_held[0] = false;
        let voice = &mut self.voices[0];
        let gliding_from = voice.is_active().then(|| voice.current_note());

        if legato && voice.is_active() && !voice.is_released() {
            voice.legato_to(key.note, glide, seconds);
        } else {
            voice.start_note(key.note, key.velocity, key.channel, age);
            if let (GlideMode::Glissando | GlideMode::Portamento, Some(from)) = (glide, gliding_from) {
                voice.set_glide(from, glide, seconds);
            }
        }
        self.last_note = Some(f32::from(key.note));
    }

    fn mono_note_off(&mut self, note: u8, channel: u8) {
        let was_top = self
            .held
            .last()
            .is_some_and(|k| k.note == note && k.channel == channel);
        self.held.retain(|k| k.note != note || k.channel != channel);
        if !was_top {
            return;
        }
        if let Some(&previous) = self.held.last() {
            self.mono_play(previous);
        } else if self.sustain {
            self.pedal_held[0] = true;
        } else {
            self.voices[0].note_off();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allocator(settings: PerformanceSettings) -> VoiceAllocator {
        let mut a = VoiceAllocator::new();
        a.set_sample_rate(48000.0);
        a.apply_settings(settings);
        a
    }

    fn on(note: u8) -> MidiMessage {
        MidiMessage::NoteOn {
            channel: 0,
            note,
            velocity: 0.8,
        }
    }

    fn off(note: u8) -> MidiMessage {
        MidiMessage::NoteOff { channel: 0, note }
    }

    fn sounding(a: &VoiceAllocator) -> Vec<u8> {
        let mut notes: Vec<u8> = a
            .voices()
            .iter()
            .filter(|v| v.is_active() && !v.is_released())
            .map(Voice::note)
            .collect();
        notes.sort_unstable();
        notes
    }

    #[test]
    fn test_steals_oldest_when_full() {
        let mut a = allocator(PerformanceSettings {
            voices: 3,
            ..PerformanceSettings::default()
        });
        for note in [60, 62, 64, 65] {
            a.handle(&on(note));
        }
        assert_eq!(a.active_count(), 3, "never more voices than configured");
        assert_eq!(sounding(&a), [62, 64, 65], "oldest note stolen");
    }

    #[test]
    fn test_steals_released_before_held() {
        let mut a = allocator(PerformanceSettings {
            voices: 2,
            ..PerformanceSettings::default()
        });
        a.handle(&on(60));
        a.handle(&on(62));
        a.handle(&off(62));
        a.handle(&on(64));
        assert_eq!(sounding(&a), [60, 64], "released voice reused first");
    }

    #[test]
    fn test_same_note_reuses_voice() {
        let mut a = allocator(PerformanceSettings::default());
        a.handle(&on(60));
        a.handle(&on(60));
        assert_eq!(a.active_count(), 1);
    }

    #[test]
    fn test_voice_count_clamped() {
        let a = allocator(PerformanceSettings {
            voices: 100,
            ..PerformanceSettings::default()
        });
        assert_eq!(a.settings().voices, MAX_VOICES);
    }

    #[test]
    fn test_sustain_defers_release() {
        let mut a = allocator(PerformanceSettings::default());
        a.handle(&on(60));
        a.handle(&MidiMessage::ControlChange {
            channel: 0,
            controller: CC_SUSTAIN,
            value: 1.0,
        });
        a.handle(&off(60));
        assert_eq!(sounding(&a), [60], "pedal holds the note");
        a.handle(&MidiMessage::ControlChange {
            channel: 0,
            controller: CC_SUSTAIN,
            value: 0.0,
        });
        assert!(sounding(&a).is_empty());
        assert!(a.voices()[0].is_released());
    }

    #[test]
    fn test_held_keys_never_grow_past_limit() {
        let mut a = allocator(PerformanceSettings {
            mono: true,
            mpe: true,
            ..PerformanceSettings::default()
        });
        let capacity = a.held.capacity();
        for channel in 0..16 {
            for note in 0..=127 {
                a.handle(&MidiMessage::NoteOn {
                    channel,
                    note,
                    velocity: 0.5,
                });
            }
        }
        assert_eq!(a.held.len(), MAX_HELD);
        assert_eq!(a.held.capacity(), capacity, "held keys reallocated");
        assert_eq!(a.voices()[0].note(), 127);
    }

    #[test]
    fn test_mono_returns_to_held_note() {
        let mut a = allocator(PerformanceSettings {
            mono: true,
            ..PerformanceSettings::default()
        });
        a.handle(&on(60));
        a.handle(&on(67));
        assert_eq!(a.voices()[0].note(), 67);
        assert_eq!(a.active_count(), 1);
        a.handle(&off(67));
        assert_eq!(a.voices()[0].note(), 60, "falls back to the held key");
        a.handle(&off(60));
        assert!(a.voices()[0].is_released());
    }

    #[test]
    fn test_legato_keeps_envelope() {
        let mut a = allocator(PerformanceSettings {
            mono: true,
            legato: true,
            ..PerformanceSettings::default()
        });
        a.handle(&on(60));
        let age = a.voices()[0].age();
        a.handle(&on(62));
        assert_eq!(a.voices()[0].note(), 62);
        assert_eq!(a.voices()[0].age(), age, "legato does not restart the voice");
    }

    #[test]
    fn test_mpe_bend_is_per_channel() {
        let mut a = allocator(PerformanceSettings {
            mpe: true,
            ..PerformanceSettings::default()
        });
        a.handle(&MidiMessage::NoteOn { channel: 1, note: 60, velocity: 1.0 });
        a.handle(&MidiMessage::NoteOn { channel: 2, note: 64, velocity: 1.0 });
        a.handle(&MidiMessage::PitchBend { channel: 1, value: 4096 });
        assert_eq!(a.pitch_bend(), 0.0, "member channel bend is not global");

        let ids = crate::voice::PolySourceIds {
            mpe_bend: crate::ModSourceId(0),
            mpe_timbre: crate::ModSourceId(1),
            pressure: crate::ModSourceId(1),
            note: crate::ModSourceId(1),
            velocity: crate::ModSourceId(1),
            lfo: [crate::ModSourceId(1); 4],
            env: [crate::ModSourceId(1); 4],
            mseg: [crate::ModSourceId(1); 4],
        };
        let mut out = [0.0; 2];
        a.voices()[0].fill_poly_sources(&ids, &mut out);
        assert!((out[0] - 0.5).abs() < 1e-6);
        a.voices()[1].fill_poly_sources(&ids, &mut out);
        assert_eq!(out[0], 0.0);

        a.handle(&MidiMessage::PitchBend { channel: 0, value: -8192 });
        assert_eq!(a.pitch_bend_semitones(), -2.0, "master channel bends globally");
    }

    #[test]
    fn test_all_notes_off_releases() {
        let mut a = allocator(PerformanceSettings::default());
        a.handle(&on(60));
        a.handle(&on(64));
        a.handle(&MidiMessage::AllNotesOff { channel: 0 });
        assert!(sounding(&a).is_empty());
        a.kill_all();
        assert_eq!(a.active_count(), 0);
    }

    #[test]
    fn test_mod_wheel() {
        let mut a = allocator(PerformanceSettings::default());
        a.handle(&MidiMessage::ControlChange {
            channel: 0,
            controller: CC_MOD_WHEEL,
            value: 0.5,
        });
        assert_eq!(a.mod_wheel(), 0.5);
    }
}
