//! The instrument's parameter table.
//!
//! [`ParamLayout::build`] registers every control in a fixed order and hands
//! back typed indices plus the descriptor list. Controls up to `velsens` are
//! polyphonic; from `mono` onwards every descriptor carries
//! [`ParamFlags::MONO`] and is resolved once per sub-block for the whole
//! instrument.
//!
//! [`ParamStore`] holds the user values as `f32` bits in `AtomicU32`s so a
//! control thread can write while the audio thread reads, without locks.

use alloc::vec::Vec;
use core::fmt;
use core::sync::atomic::{AtomicU32, Ordering};

use orrery_core::{
    FilterKind, NOTE_DURATION_LABELS, ParamDescriptor, ParamFlags, ParamId, ParamUnit,
    QUARTER_NOTE_INDEX, ValueConversion, hz_to_midi_note, midi_note_to_hz,
};
use orrery_effects::{DynamicsMode, FxSlot, ShaperFunction};

use crate::envelope::RepeatMode;
use crate::lfo::LfoShape;

/// Oscillators, envelopes, LFOs and MSEGs per voice.
pub const UNITS: usize = 4;

/// Number of macro knobs.
pub const MACROS: usize = 4;

/// Algorithm labels, "(n)" marks an observed output.
pub const ALGORITHM_LABELS: &[&str] = &[
    "1-2-3-(4)",
    "1-2-(3), 2-(4)",
    "1-(2), 1-3-(4)",
    "1-(2), 1-(3), 1-(4)",
];

/// Glide mode labels.
pub const GLIDE_LABELS: &[&str] = &["Off", "Glissando", "Portamento"];

const ENV_SELECT_LABELS: &[&str] = &["Env 1", "Env 2", "Env 3", "Env 4"];

const OSC_COARSE: [f32; UNITS] = [1.0, 2.0, 3.0, 4.0];
const OSC_VOLUME: [f32; UNITS] = [0.5, 0.5, 0.35, 0.2];
const OSC_PHASE: [f32; UNITS] = [0.15, 0.3, 0.65, 0.85];
const ENV_DECAY: [f32; UNITS] = [0.07, 0.45, 0.07, 0.07];

/// Four string literals differing only in the unit number.
macro_rules! quad {
    ($prefix:literal, $suffix:literal) => {
        [
            concat!($prefix, "1", $suffix),
            concat!($prefix, "2", $suffix),
            concat!($prefix, "3", $suffix),
            concat!($prefix, "4", $suffix),
        ]
    };
}

/// Shows envelope and glide times in ms below one second.
fn format_seconds(value: f32, out: &mut dyn fmt::Write) -> fmt::Result {
    if value < 1.0 {
        write!(out, "{:.0} ms", value * 1000.0)
    } else {
        write!(out, "{value:.2} s")
    }
}

/// Filter cutoffs are stored as note numbers and shown in Hz.
fn format_note_hz(value: f32, out: &mut dyn fmt::Write) -> fmt::Result {
    let hz = midi_note_to_hz(value);
    if hz >= 1000.0 {
        write!(out, "{:.2} kHz", hz / 1000.0)
    } else {
        write!(out, "{hz:.0} Hz")
    }
}

fn format_lfo_wave(value: f32, out: &mut dyn fmt::Write) -> fmt::Result {
    let idx = (libm::roundf(value) as i32 - 1).clamp(0, 16) as usize;
    out.write_str(LfoShape::LABELS.get(idx).copied().unwrap_or("?"))
}

fn format_cc(value: f32, out: &mut dyn fmt::Write) -> fmt::Result {
    if value < 0.0 {
        out.write_str("None")
    } else {
        write!(out, "CC {value:.0}")
    }
}

/// Oscillator controls.
#[derive(Debug, Clone, Copy)]
#[allow(missing_docs)]
pub struct OscParamIds {
    pub coarse: ParamId,
    pub fine: ParamId,
    pub volume: ParamId,
    pub phase: ParamId,
    pub tones: ParamId,
    pub detune: ParamId,
    pub spread: ParamId,
    pub pan: ParamId,
    pub voices: ParamId,
    pub env: ParamId,
    pub saw: ParamId,
    pub fixed: ParamId,
}

/// Envelope controls.
#[derive(Debug, Clone, Copy)]
#[allow(missing_docs)]
pub struct EnvParamIds {
    pub attack: ParamId,
    pub decay: ParamId,
    pub sustain: ParamId,
    pub release: ParamId,
    pub attack_curve: ParamId,
    pub decay_curve: ParamId,
    pub repeat: ParamId,
    pub time: ParamId,
    pub beat: ParamId,
}

/// LFO controls, shared by the poly LFO and the mono LFO of the same number.
#[derive(Debug, Clone, Copy)]
#[allow(missing_docs)]
pub struct LfoParamIds {
    pub enable: ParamId,
    pub sync: ParamId,
    pub wave: ParamId,
    pub rate: ParamId,
    pub beat: ParamId,
    pub depth: ParamId,
    pub phase: ParamId,
    pub offset: ParamId,
    pub fade: ParamId,
    pub delay: ParamId,
}

/// Orbit observation controls.
#[derive(Debug, Clone, Copy)]
#[allow(missing_docs)]
pub struct TimbreParamIds {
    pub equant: ParamId,
    pub pitch: ParamId,
    pub blend: ParamId,
    pub demod_mix: ParamId,
    pub algorithm: ParamId,
    pub demod_vol: ParamId,
}

/// Voice filter controls.
#[derive(Debug, Clone, Copy)]
#[allow(missing_docs)]
pub struct FilterParamIds {
    pub enable: ParamId,
    pub kind: ParamId,
    pub key: ParamId,
    pub freq: ParamId,
    pub res: ParamId,
}

/// Performance and output controls.
#[derive(Debug, Clone, Copy)]
#[allow(missing_docs)]
pub struct GlobalParamIds {
    pub vel_sens: ParamId,
    pub mono: ParamId,
    pub glide_mode: ParamId,
    pub glide_rate: ParamId,
    pub legato: ParamId,
    pub level: ParamId,
    pub voices: ParamId,
    pub mpe: ParamId,
    pub pitchbend_range: ParamId,
    pub sidechain: ParamId,
}

/// Waveshaper slot.
#[derive(Debug, Clone, Copy)]
#[allow(missing_docs)]
pub struct WaveshaperParamIds {
    pub drive: ParamId,
    pub gain: ParamId,
    pub dry: ParamId,
    pub wet: ParamId,
    pub function: ParamId,
    pub high_shelf: ParamId,
    pub shelf_q: ParamId,
    pub lowpass: ParamId,
}

/// Dynamics slot.
#[derive(Debug, Clone, Copy)]
#[allow(missing_docs)]
pub struct DynamicsParamIds {
    pub threshold: ParamId,
    pub ratio: ParamId,
    pub attack: ParamId,
    pub release: ParamId,
    pub knee: ParamId,
    pub input: ParamId,
    pub output: ParamId,
    pub mode: ParamId,
}

/// Stereo delay slot.
#[derive(Debug, Clone, Copy)]
#[allow(missing_docs)]
pub struct DelayParamIds {
    pub time_left: ParamId,
    pub time_right: ParamId,
    pub beats_left: ParamId,
    pub beats_right: ParamId,
    pub sync: ParamId,
    pub freeze: ParamId,
    pub ping_pong: ParamId,
    pub feedback: ParamId,
    pub wet: ParamId,
    pub dry: ParamId,
    pub cutoff: ParamId,
}

/// Chorus slot.
#[derive(Debug, Clone, Copy)]
#[allow(missing_docs)]
pub struct ChorusParamIds {
    pub rate: ParamId,
    pub depth: ParamId,
    pub delay: ParamId,
    pub feedback: ParamId,
    pub dry: ParamId,
    pub wet: ParamId,
}

/// Reverb slot.
#[derive(Debug, Clone, Copy)]
#[allow(missing_docs)]
pub struct ReverbParamIds {
    pub size: ParamId,
    pub decay: ParamId,
    pub damping: ParamId,
    pub lowpass: ParamId,
    pub predelay: ParamId,
    pub dry: ParamId,
    pub wet: ParamId,
}

/// Multiband filter slot.
#[derive(Debug, Clone, Copy)]
#[allow(missing_docs)]
pub struct MultibandParamIds {
    pub low_freq: ParamId,
    pub low_gain: ParamId,
    pub low_q: ParamId,
    pub peak_freq: ParamId,
    pub peak_gain: ParamId,
    pub peak_q: ParamId,
    pub high_freq: ParamId,
    pub high_gain: ParamId,
    pub high_q: ParamId,
}

/// Ring modulator slot.
#[derive(Debug, Clone, Copy)]
#[allow(missing_docs)]
pub struct RingModParamIds {
    pub freq: [ParamId; 2],
    pub shape: [ParamId; 2],
    pub mix: [ParamId; 2],
    pub spread: ParamId,
    pub low_cut: ParamId,
    pub high_cut: ParamId,
}

/// One effect lane: four slot selectors plus filter, gain and pan.
#[derive(Debug, Clone, Copy)]
#[allow(missing_docs)]
pub struct LaneParamIds {
    pub slots: [ParamId; 4],
    pub gain: ParamId,
    pub kind: ParamId,
    pub freq: ParamId,
    pub res: ParamId,
    pub pan: ParamId,
    /// Off runs the filter, gain and pan before the slots, on after them.
    pub post: ParamId,
}

/// Effect routing.
#[derive(Debug, Clone, Copy)]
pub struct FxOrderParamIds {
    /// Lane A and lane B.
    pub lanes: [LaneParamIds; 2],
    /// Series (on) or parallel (off).
    pub chain_a_to_b: ParamId,
}

/// MSEG playback controls.
#[derive(Debug, Clone, Copy)]
#[allow(missing_docs)]
pub struct MsegParamIds {
    pub sync: ParamId,
    pub rate: ParamId,
    pub beat: ParamId,
    pub depth: ParamId,
    pub phase: ParamId,
    pub offset: ParamId,
    pub looping: ParamId,
    pub enable: ParamId,
}

/// Macro knobs and their MIDI learn state.
#[derive(Debug, Clone, Copy)]
pub struct MacroParamIds {
    /// Knob values, 0..1.
    pub values: [ParamId; MACROS],
    /// Macro armed for MIDI learn, −1 for none.
    pub learn: ParamId,
    /// Assigned controller per macro, −1 for none.
    pub cc: [ParamId; MACROS],
}

/// Typed index of every parameter.
#[derive(Debug, Clone, Copy)]
#[allow(missing_docs)]
pub struct ParamLayout {
    pub osc: [OscParamIds; UNITS],
    pub env: [EnvParamIds; UNITS],
    pub lfo: [LfoParamIds; UNITS],
    pub timbre: TimbreParamIds,
    pub filter: FilterParamIds,
    pub global: GlobalParamIds,
    pub fx_gain: ParamId,
    pub waveshaper: WaveshaperParamIds,
    pub dynamics: DynamicsParamIds,
    pub delay: DelayParamIds,
    pub chorus: ChorusParamIds,
    pub reverb: ReverbParamIds,
    pub multiband: MultibandParamIds,
    pub ring_mod: RingModParamIds,
    pub fx_order: FxOrderParamIds,
    pub mseg: [MsegParamIds; UNITS],
    pub macros: MacroParamIds,
    /// First mono parameter.
    pub mono_start: ParamId,
}

struct Registrar {
    descriptors: Vec<ParamDescriptor>,
    mono: bool,
}

impl Registrar {
    fn add(&mut self, descriptor: ParamDescriptor) -> ParamId {
        let id = ParamId(self.descriptors.len() as u32);
        let mut descriptor = descriptor.with_id(id);
        if self.mono {
            descriptor.flags = descriptor.flags.union(ParamFlags::MONO);
        }
        self.descriptors.push(descriptor);
        id
    }

    fn percent(&mut self, string_id: &'static str, name: &'static str, short: &'static str, default: f32) -> ParamId {
        self.add(
            ParamDescriptor::continuous(string_id, name, short, 0.0, 100.0, default)
                .with_unit(ParamUnit::Percent)
                .with_conversion(ValueConversion::PercentToUnit),
        )
    }

    fn unit(&mut self, string_id: &'static str, name: &'static str, short: &'static str, default: f32) -> ParamId {
        self.add(ParamDescriptor::continuous(string_id, name, short, 0.0, 1.0, default))
    }

    fn bipolar(&mut self, string_id: &'static str, name: &'static str, short: &'static str, default: f32) -> ParamId {
        self.add(ParamDescriptor::continuous(string_id, name, short, -1.0, 1.0, default))
    }

    fn hertz(&mut self, string_id: &'static str, name: &'static str, short: &'static str, min: f32, max: f32, default: f32) -> ParamId {
        self.add(
            ParamDescriptor::continuous(string_id, name, short, min, max, default)
                .with_unit(ParamUnit::Hertz)
                .with_skew(0.3),
        )
    }

    fn seconds(&mut self, string_id: &'static str, name: &'static str, short: &'static str, max: f32, default: f32) -> ParamId {
        self.add(
            ParamDescriptor::continuous(string_id, name, short, 0.0, max, default)
                .with_unit(ParamUnit::Seconds)
                .with_skew(0.2)
                .with_formatter(format_seconds),
        )
    }

    fn beat(&mut self, string_id: &'static str, name: &'static str) -> ParamId {
        self.add(ParamDescriptor::choice(string_id, name, "Beat", NOTE_DURATION_LABELS, QUARTER_NOTE_INDEX))
    }

    fn decibels(&mut self, string_id: &'static str, name: &'static str, short: &'static str, min: f32, max: f32, default: f32) -> ParamId {
        self.add(
            ParamDescriptor::continuous(string_id, name, short, min, max, default)
                .with_unit(ParamUnit::Decibels)
                .with_conversion(ValueConversion::DecibelsToGain),
        )
    }

    /// Frequency, linear gain and Q of one multiband filter band.
    fn band(&mut self, ids: [&'static str; 3], names: [&'static str; 3], freq: f32) -> (ParamId, ParamId, ParamId) {
        (
            self.hertz(ids[0], names[0], "Freq", 20.0, 20_000.0, freq),
            self.add(ParamDescriptor::continuous(ids[1], names[1], "Gain", 0.01, 6.0, 1.0).with_skew(0.5)),
            self.add(ParamDescriptor::continuous(ids[2], names[2], "Q", 0.1, 20.0, 1.0).with_skew(0.5)),
        )
    }
}

impl ParamLayout {
    /// Register every parameter and return the layout and descriptor table.
    #[allow(clippy::too_many_lines)]
    pub fn build() -> (Self, Vec<ParamDescriptor>) {
        let mut r = Registrar {
            descriptors: Vec::with_capacity(320),
            mono: false,
        };
        let max_note = hz_to_midi_note(20_000.0);

        let osc = core::array::from_fn(|i| OscParamIds {
            coarse: r.add(ParamDescriptor::stepped(quad!("osc", "coarse")[i], quad!("OSC", " Coarse")[i], "Coarse", 1.0, 24.0, OSC_COARSE[i]).with_unit(ParamUnit::Ratio)),
            fine: {
                let min = if i == 0 { 0.0 } else { -2.0 };
                let max = if i == 0 { 4.0 } else { 2.0 };
                r.add(ParamDescriptor::continuous(quad!("osc", "fine")[i], quad!("OSC", " Fine")[i], "Fine", min, max, 0.0))
            },
            volume: r.unit(quad!("osc", "volume")[i], quad!("OSC", " Volume")[i], "Vol", OSC_VOLUME[i]),
            phase: r.unit(quad!("osc", "phase")[i], quad!("OSC", " Phase")[i], "Phase", OSC_PHASE[i]),
            tones: r.add(ParamDescriptor::continuous(quad!("osc", "tones")[i], quad!("OSC", " Tones")[i], "Tones", 1.0, 5.9, 1.0)),
            detune: r.add(
                ParamDescriptor::continuous(quad!("osc", "detune")[i], quad!("OSC", " Detune")[i], "Detune", 0.0, 0.5, 0.0)
                    .with_unit(ParamUnit::Semitones),
            ),
            spread: r.percent(quad!("osc", "spread")[i], quad!("OSC", " Spread")[i], "Spread", 0.0),
            pan: r.bipolar(quad!("osc", "pan")[i], quad!("OSC", " Pan")[i], "Pan", 0.0),
            voices: r.add(ParamDescriptor::stepped(quad!("osc", "voices")[i], quad!("OSC", " Voices")[i], "Voices", 1.0, 4.0, 4.0)),
            env: r.add(ParamDescriptor::choice(quad!("osc", "env")[i], quad!("OSC", " Envelope")[i], "Env", ENV_SELECT_LABELS, i)),
            saw: r.add(ParamDescriptor::toggle(quad!("osc", "saw")[i], quad!("OSC", " Saw")[i], "Saw", false)),
            fixed: r.add(ParamDescriptor::toggle(quad!("osc", "fixed")[i], quad!("OSC", " Fixed")[i], "Fixed", false)),
        });

        let env = core::array::from_fn(|i| EnvParamIds {
            attack: r.seconds(quad!("env", "attack")[i], quad!("ENV", " Attack")[i], "A", 60.0, 0.01),
            decay: r.seconds(quad!("env", "decay")[i], quad!("ENV", " Decay")[i], "D", 60.0, ENV_DECAY[i]),
            sustain: r.percent(quad!("env", "sustain")[i], quad!("ENV", " Sustain")[i], "S", 50.0),
            release: r.seconds(quad!("env", "release")[i], quad!("ENV", " Release")[i], "R", 60.0, 0.1),
            attack_curve: r.bipolar(quad!("env", "acurve")[i], quad!("ENV", " Attack Curve")[i], "ACurve", 1.0),
            decay_curve: r.bipolar(quad!("env", "drcurve")[i], quad!("ENV", " Decay Curve")[i], "DCurve", -1.0),
            repeat: r.add(ParamDescriptor::choice(quad!("env", "syncrepeat")[i], quad!("ENV", " Repeat")[i], "Repeat", RepeatMode::LABELS, 0)),
            time: r.seconds(quad!("env", "time")[i], quad!("ENV", " Repeat Time")[i], "Time", 60.0, 0.1),
            beat: r.beat(quad!("env", "beat")[i], quad!("ENV", " Repeat Beat")[i]),
        });

        let lfo = core::array::from_fn(|i| LfoParamIds {
            enable: r.add(ParamDescriptor::toggle(quad!("lfo", "enable")[i], quad!("LFO", " Enable")[i], "On", true).internal()),
            sync: r.add(ParamDescriptor::toggle(quad!("lfo", "sync")[i], quad!("LFO", " Sync")[i], "Sync", true)),
            wave: r.add(
                ParamDescriptor::stepped(quad!("lfo", "wave")[i], quad!("LFO", " Wave")[i], "Wave", 1.0, 17.0, 1.0)
                    .with_formatter(format_lfo_wave),
            ),
            rate: r.hertz(quad!("lfo", "rate")[i], quad!("LFO", " Rate")[i], "Rate", 0.0, 50.0, 10.0),
            beat: r.beat(quad!("lfo", "beat")[i], quad!("LFO", " Beat")[i]),
            depth: r.bipolar(quad!("lfo", "depth")[i], quad!("LFO", " Depth")[i], "Depth", 1.0),
            phase: r.bipolar(quad!("lfo", "phase")[i], quad!("LFO", " Phase")[i], "Phase", 0.0),
            offset: r.bipolar(quad!("lfo", "offset")[i], quad!("LFO", " Offset")[i], "Offset", 0.0),
            fade: r.add(
                ParamDescriptor::continuous(quad!("lfo", "fade")[i], quad!("LFO", " Fade")[i], "Fade", -60.0, 60.0, 0.0)
                    .with_unit(ParamUnit::Seconds),
            ),
            delay: r.seconds(quad!("lfo", "delay")[i], quad!("LFO", " Delay")[i], "Delay", 60.0, 0.0),
        });

        let timbre = TimbreParamIds {
            equant: r.add(ParamDescriptor::continuous("equant", "Equant", "Equant", -0.5, 0.5, 0.0)),
            pitch: r.add(ParamDescriptor::continuous("pitch", "Pitch", "Pitch", 0.01, 4.0, 1.0).with_unit(ParamUnit::Ratio)),
            blend: r.unit("blend", "Blend", "Blend", 0.0),
            demod_mix: r.unit("demodmix", "Demodulate", "Demod", 0.0),
            algorithm: r.add(ParamDescriptor::choice("algo", "Algorithm", "Algo", ALGORITHM_LABELS, 0)),
            demod_vol: r.add(ParamDescriptor::continuous("demodvol", "Demod Volume", "DVol", 0.0, 4.0, 2.0)),
        };

        let filter = FilterParamIds {
            enable: r.add(ParamDescriptor::toggle("fltenable", "Filter Enable", "On", true).internal()),
            kind: r.add(ParamDescriptor::choice("flttype", "Filter Type", "Type", FilterKind::LABELS, 0)),
            key: r.percent("fltkey", "Filter Key Tracking", "Key", 0.0),
            freq: r.add(ParamDescriptor::continuous("fltfreq", "Filter Cutoff", "Freq", 0.0, max_note, 95.0).with_formatter(format_note_hz)),
            res: r.add(ParamDescriptor::continuous("fltres", "Filter Resonance", "Res", 0.0, 100.0, 0.0)),
        };

        let vel_sens = r.percent("velsens", "Velocity Sensitivity", "Vel", 100.0);
        r.mono = true;
        let mono_start = ParamId(r.descriptors.len() as u32);
        let global = GlobalParamIds {
            vel_sens,
            mono: r.add(ParamDescriptor::toggle("mono", "Mono", "Mono", false).internal()),
            glide_mode: r.add(ParamDescriptor::choice("gmode", "Glide Mode", "Glide", GLIDE_LABELS, 0).internal()),
            glide_rate: r.add(
                ParamDescriptor::continuous("grate", "Glide Rate", "Rate", 0.001, 20.0, 0.3)
                    .with_unit(ParamUnit::Seconds)
                    .with_skew(0.3)
                    .with_formatter(format_seconds),
            ),
            legato: r.add(ParamDescriptor::toggle("legato", "Legato", "Legato", false).internal()),
            level: r.decibels("level", "Level", "Level", -100.0, 12.0, 0.0),
            voices: r.add(ParamDescriptor::stepped("voices", "Voices", "Voices", 2.0, 8.0, 8.0).internal()),
            mpe: r.add(ParamDescriptor::toggle("mpe", "MPE", "MPE", false).internal()),
            pitchbend_range: r.add(
                ParamDescriptor::stepped("pbrange", "Pitchbend Range", "PB", 0.0, 96.0, 2.0)
                    .with_unit(ParamUnit::Semitones)
                    .internal(),
            ),
            sidechain: r.add(ParamDescriptor::toggle("sidechain", "Sidechain", "SC", false).internal()),
        };

        let fx_gain = r.decibels("fxgain", "Output Gain", "Gain", -60.0, 40.0, 0.0);

        let waveshaper = WaveshaperParamIds {
            drive: r.add(ParamDescriptor::continuous("wsdrive", "Drive", "Drive", 0.0, 60.0, 0.0).with_unit(ParamUnit::Decibels)),
            gain: r.add(ParamDescriptor::continuous("wsgain", "Shaper Gain", "Gain", -12.0, 12.0, 0.0).with_unit(ParamUnit::Decibels)),
            dry: r.unit("wsdry", "Shaper Dry", "Dry", 1.0),
            wet: r.unit("wswet", "Shaper Wet", "Wet", 0.25),
            function: r.add(ParamDescriptor::choice("wsfunc", "Function", "Func", ShaperFunction::LABELS, 0)),
            high_shelf: r.add(
                ParamDescriptor::continuous("wshighshelf", "Shaper High Shelf", "Shelf", 3000.0, 12_000.0, 6500.0)
                    .with_unit(ParamUnit::Hertz)
                    .with_skew(1.3),
            ),
            shelf_q: r.add(ParamDescriptor::continuous("wshsq", "Shaper Shelf Q", "Q", 0.5, 5.0, 0.7071)),
            lowpass: r.hertz("wslp", "Shaper Low Pass", "LP", 20.0, 20_000.0, 20_000.0),
        };

        let dynamics = DynamicsParamIds {
            threshold: r.add(ParamDescriptor::continuous("cpthreshold", "Threshold", "Thresh", -60.0, 0.0, -12.0).with_unit(ParamUnit::Decibels)),
            ratio: r.add(ParamDescriptor::continuous("cpratio", "Ratio", "Ratio", 1.0, 20.0, 2.0).with_unit(ParamUnit::Ratio).with_skew(0.5)),
            attack: r.add(
                ParamDescriptor::continuous("cpattack", "Attack", "Att", 0.00002, 0.1, 0.0005)
                    .with_unit(ParamUnit::Seconds)
                    .with_skew(0.3)
                    .with_formatter(format_seconds),
            ),
            release: r.add(
                ParamDescriptor::continuous("cprelease", "Release", "Rel", 0.05, 1.0, 0.1)
                    .with_unit(ParamUnit::Seconds)
                    .with_skew(0.5)
                    .with_formatter(format_seconds),
            ),
            knee: r.add(ParamDescriptor::continuous("cpknee", "Knee", "Knee", 0.0, 20.0, 6.0).with_unit(ParamUnit::Decibels)),
            input: r.add(ParamDescriptor::continuous("cpinput", "Input Gain", "In", 0.0, 5.0, 1.0)),
            output: r.add(ParamDescriptor::continuous("cpoutput", "Output Gain", "Out", 0.0, 5.0, 1.0)),
            mode: r.add(ParamDescriptor::choice("cptype", "Dynamics Type", "Type", DynamicsMode::LABELS, 0)),
        };

        let delay = DelayParamIds {
            time_left: r.add(
                ParamDescriptor::continuous("dltimeleft", "Delay Time Left", "TimeL", 0.001, 10.0, 0.5)
                    .with_unit(ParamUnit::Seconds)
                    .with_skew(0.3),
            ),
            time_right: r.add(
                ParamDescriptor::continuous("dltimeright", "Delay Time Right", "TimeR", 0.001, 10.0, 0.5)
                    .with_unit(ParamUnit::Seconds)
                    .with_skew(0.3),
            ),
            beats_left: r.beat("dlbeatsleft", "Delay Beats Left"),
            beats_right: r.beat("dlbeatsright", "Delay Beats Right"),
            sync: r.add(ParamDescriptor::toggle("dltemposync", "Delay Sync", "Sync", true).internal()),
            freeze: r.add(ParamDescriptor::toggle("dlfreeze", "Delay Freeze", "Freeze", false).internal()),
            ping_pong: r.add(ParamDescriptor::toggle("dlpingpong", "Ping Pong", "PP", false).internal()),
            feedback: r.unit("dlfeedback", "Delay Feedback", "Fdbk", 0.5),
            wet: r.unit("dlwet", "Delay Wet", "Wet", 0.25),
            dry: r.unit("dldry", "Delay Dry", "Dry", 1.0),
            cutoff: r.hertz("dlcutoff", "Delay Cutoff", "Cutoff", 20.0, 20_000.0, 10_000.0),
        };

        let chorus = ChorusParamIds {
            rate: r.hertz("chrate", "Chorus Rate", "Rate", 0.005, 20.0, 0.05),
            depth: r.unit("chdepth", "Chorus Depth", "Depth", 0.5),
            delay: r.add(ParamDescriptor::continuous("chdelay", "Chorus Delay", "Delay", 10.0, 40.0, 20.0).with_unit(ParamUnit::Milliseconds)),
            feedback: r.add(ParamDescriptor::continuous("chfeedback", "Chorus Feedback", "Fdbk", 0.0, 0.95, 0.25)),
            dry: r.unit("chdry", "Chorus Dry", "Dry", 1.0),
            wet: r.unit("chwet", "Chorus Wet", "Wet", 0.25),
        };

        let reverb = ReverbParamIds {
            size: r.add(ParamDescriptor::continuous("rvsize", "Reverb Size", "Size", 0.0, 2.0, 1.0)),
            decay: r.unit("rvdecay", "Reverb Decay", "Decay", 0.5),
            damping: r.hertz("rvdamping", "Reverb Damping", "Damp", 20.0, 20_000.0, 10_000.0),
            lowpass: r.hertz("rvlowpass", "Reverb Low Pass", "LP", 20.0, 20_000.0, 20_000.0),
            predelay: r.add(
                ParamDescriptor::continuous("rvpredelay", "Reverb Predelay", "Pre", 0.0, 0.1, 0.002)
                    .with_unit(ParamUnit::Seconds)
                    .with_formatter(format_seconds),
            ),
            dry: r.unit("rvdry", "Reverb Dry", "Dry", 1.0),
            wet: r.unit("rvwet", "Reverb Wet", "Wet", 0.08),
        };

        let (low_freq, low_gain, low_q) = r.band(
            ["mblowshelffreq", "mblowshelfgain", "mblowshelfq"],
            ["Low Shelf Freq", "Low Shelf Gain", "Low Shelf Q"],
            20.0,
        );
        let (peak_freq, peak_gain, peak_q) = r.band(
            ["mbpeakfreq", "mbpeakgain", "mbpeakq"],
            ["Peak Freq", "Peak Gain", "Peak Q"],
            1000.0,
        );
        let (high_freq, high_gain, high_q) = r.band(
            ["mbhighshelffreq", "mbhighshelfgain", "mbhighshelfq"],
            ["High Shelf Freq", "High Shelf Gain", "High Shelf Q"],
            20_000.0,
        );
        let multiband = MultibandParamIds {
            low_freq,
            low_gain,
            low_q,
            peak_freq,
            peak_gain,
            peak_q,
            high_freq,
            high_gain,
            high_q,
        };

        let rm_freq1 = r.hertz("rmmodfreq1", "Ring Mod Freq 1", "Freq1", 1.0, 12_000.0, 40.0);
        let rm_shape1 = r.unit("rmshape1", "Ring Mod Shape 1", "Shape1", 0.0);
        let rm_mix1 = r.unit("rmmix1", "Ring Mod Mix 1", "Mix1", 0.0);
        let rm_freq2 = r.hertz("rmmodfreq2", "Ring Mod Freq 2", "Freq2", 1.0, 12_000.0, 40.0);
        let rm_shape2 = r.unit("rmshape2", "Ring Mod Shape 2", "Shape2", 0.0);
        let rm_mix2 = r.unit("rmmix2", "Ring Mod Mix 2", "Mix2", 0.0);
        let ring_mod = RingModParamIds {
            freq: [rm_freq1, rm_freq2],
            shape: [rm_shape1, rm_shape2],
            mix: [rm_mix1, rm_mix2],
            spread: r.unit("rmspread", "Ring Mod Spread", "Spread", 0.03),
            low_cut: r.hertz("rmlowcut", "Ring Mod Low Cut", "LoCut", 20.0, 20_000.0, 20.0),
            high_cut: r.hertz("rmhighcut", "Ring Mod High Cut", "HiCut", 20.0, 20_000.0, 20_000.0),
        };

        let slot_ids = [quad!("fxa", ""), quad!("fxb", "")];
        let slot_names = [quad!("Lane A Slot ", ""), quad!("Lane B Slot ", "")];
        let slots: [[ParamId; 4]; 2] = core::array::from_fn(|lane| {
            core::array::from_fn(|s| {
                r.add(ParamDescriptor::choice(slot_ids[lane][s], slot_names[lane][s], "Slot", FxSlot::LABELS, 0).internal())
            })
        });
        let chain_a_to_b = r.add(ParamDescriptor::toggle("chainatob", "Chain A to B", "A>B", true).internal());
        let gain = [
            r.decibels("laneagain", "Lane A Gain", "Gain", -60.0, 40.0, 0.0),
            r.decibels("lanebgain", "Lane B Gain", "Gain", -60.0, 40.0, 0.0),
        ];
        let kind = [
            r.add(ParamDescriptor::choice("laneatype", "Lane A Filter Type", "Type", FilterKind::LABELS, 0)),
            r.add(ParamDescriptor::choice("lanebtype", "Lane B Filter Type", "Type", FilterKind::LABELS, 0)),
        ];
        let freq = [
            r.add(
                ParamDescriptor::continuous("laneafreq", "Lane A Filter Freq", "Freq", 0.0, max_note, max_note)
                    .with_conversion(ValueConversion::MidiNoteToHz)
                    .with_formatter(format_note_hz),
            ),
            r.add(
                ParamDescriptor::continuous("lanebfreq", "Lane B Filter Freq", "Freq", 0.0, max_note, max_note)
                    .with_conversion(ValueConversion::MidiNoteToHz)
                    .with_formatter(format_note_hz),
            ),
        ];
        let res = [
            r.add(ParamDescriptor::continuous("laneares", "Lane A Resonance", "Res", 0.0, 100.0, 0.0)),
            r.add(ParamDescriptor::continuous("lanebres", "Lane B Resonance", "Res", 0.0, 100.0, 0.0)),
        ];
        let pan = [
            r.bipolar("laneapan", "Lane A Pan", "Pan", 0.0),
            r.bipolar("lanebpan", "Lane B Pan", "Pan", 0.0),
        ];
        let post = [
            r.add(ParamDescriptor::toggle("laneaprepost", "Lane A Post Filter", "Post", false).internal()),
            r.add(ParamDescriptor::toggle("lanebprepost", "Lane B Post Filter", "Post", false).internal()),
        ];
        let fx_order = FxOrderParamIds {
            lanes: core::array::from_fn(|l| LaneParamIds {
                slots: slots[l],
                gain: gain[l],
                kind: kind[l],
                freq: freq[l],
                res: res[l],
                pan: pan[l],
                post: post[l],
            }),
            chain_a_to_b,
        };

        let mseg = core::array::from_fn(|i| MsegParamIds {
            sync: r.add(ParamDescriptor::toggle(quad!("mseg", "sync")[i], quad!("MSEG", " Sync")[i], "Sync", true)),
            rate: r.hertz(quad!("mseg", "rate")[i], quad!("MSEG", " Rate")[i], "Rate", 0.0, 50.0, 10.0),
            beat: r.beat(quad!("mseg", "beat")[i], quad!("MSEG", " Beat")[i]),
            depth: r.bipolar(quad!("mseg", "depth")[i], quad!("MSEG", " Depth")[i], "Depth", 1.0),
            phase: r.bipolar(quad!("mseg", "phase")[i], quad!("MSEG", " Phase")[i], "Phase", 0.5),
            offset: r.bipolar(quad!("mseg", "offset")[i], quad!("MSEG", " Offset")[i], "Offset", 0.0),
            looping: r.add(ParamDescriptor::toggle(quad!("mseg", "loop")[i], quad!("MSEG", " Loop")[i], "Loop", false)),
            enable: r.add(ParamDescriptor::toggle(quad!("mseg", "enable")[i], quad!("MSEG", " Enable")[i], "On", true).internal()),
        });

        let values = core::array::from_fn(|i| r.unit(quad!("macro", "")[i], quad!("Macro ", "")[i], "Macro", 0.0));
        let learn = r.add(ParamDescriptor::stepped("learn", "Macro Learn", "Learn", -1.0, 3.0, -1.0).internal());
        let cc = core::array::from_fn(|i| {
            r.add(
                ParamDescriptor::stepped(quad!("macro", "cc")[i], quad!("Macro ", " CC")[i], "CC", -1.0, 127.0, -1.0)
                    .with_formatter(format_cc)
                    .internal(),
            )
        });
        let macros = MacroParamIds { values, learn, cc };

        let layout = Self {
            osc,
            env,
            lfo,
            timbre,
            filter,
            global,
            fx_gain,
            waveshaper,
            dynamics,
            delay,
            chorus,
            reverb,
            multiband,
            ring_mod,
            fx_order,
            mseg,
            macros,
            mono_start,
        };
        (layout, r.descriptors)
    }
}

/// Wait-free parameter values shared between the control and audio threads.
///
/// ```rust
/// use orrery_synth::{ParamLayout, ParamStore};
///
/// let (layout, descriptors) = ParamLayout::build();
/// let store = ParamStore::new(descriptors);
/// store.set_value(layout.timbre.pitch, 9.0);
/// assert_eq!(store.value(layout.timbre.pitch), 4.0);
/// ```
#[derive(Debug)]
pub struct ParamStore {
    descriptors: Vec<ParamDescriptor>,
    values: Vec<AtomicU32>,
}

impl ParamStore {
    /// Store holding every descriptor's default.
    pub fn new(descriptors: Vec<ParamDescriptor>) -> Self {
        let values = descriptors
            .iter()
            .map(|d| AtomicU32::new(d.default.to_bits()))
            .collect();
        Self {
            descriptors,
            values,
        }
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// True when no parameters are registered.
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Descriptor for `id`.
    pub fn descriptor(&self, id: ParamId) -> Option<&ParamDescriptor> {
        self.descriptors.get(id.index())
    }

    /// All descriptors in registration order.
    pub fn descriptors(&self) -> &[ParamDescriptor] {
        &self.descriptors
    }

    /// Current user value; 0 for an unknown id.
    #[inline]
    pub fn value(&self, id: ParamId) -> f32 {
        self.values
            .get(id.index())
            .map_or(0.0, |v| f32::from_bits(v.load(Ordering::Relaxed)))
    }

    /// Current value after the descriptor's conversion, ignoring modulation.
    pub fn processed(&self, id: ParamId) -> f32 {
        self.descriptor(id).map_or(0.0, |d| d.convert(self.value(id)))
    }

    /// Store a user value, constrained to the descriptor. Non-finite values are ignored.
    pub fn set_value(&self, id: ParamId, value: f32) {
        if !value.is_finite() {
            return;
        }
        if let (Some(d), Some(slot)) = (self.descriptors.get(id.index()), self.values.get(id.index())) {
            slot.store(d.constrain(value).to_bits(), Ordering::Relaxed);
        }
    }

    /// Normalised value, 0..1.
    pub fn normalized(&self, id: ParamId) -> f32 {
        self.descriptor(id).map_or(0.0, |d| d.normalize(self.value(id)))
    }

    /// Store from a normalised 0..1 value.
    pub fn set_normalized(&self, id: ParamId, normalized: f32) {
        if let Some(d) = self.descriptor(id) {
            self.set_value(id, d.denormalize(normalized));
        }
    }

    /// Put every parameter back to its default.
    pub fn reset_to_defaults(&self) {
        for (d, slot) in self.descriptors.iter().zip(&self.values) {
            slot.store(d.default.to_bits(), Ordering::Relaxed);
        }
    }

    /// Look up a parameter by its patch id.
    pub fn find(&self, string_id: &str) -> Option<ParamId> {
        self.descriptors
            .iter()
            .find(|d| d.string_id == string_id)
            .map(|d| d.id)
    }
}
