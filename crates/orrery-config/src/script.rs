//! Render scripts for offline rendering.
//!
//! A script fixes the engine settings, optionally names a patch file,
//! overrides parameters, adds modulation routes and lists the notes to play.
//!
//! # TOML Format
//!
//! ```toml
//! sample_rate = 48000
//! block_size = 256
//! bpm = 100
//! duration = 4.0
//! patch = "pads/glass.toml"
//!
//! [params]
//! blend = 0.4
//!
//! [[connections]]
//! source = "lfo1"
//! param = "equant"
//! depth = 0.3
//!
//! [[notes]]
//! note = 60
//! start = 0.0
//! length = 2.0
//! velocity = 0.8
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use orrery_synth::{
    AudioProcessor, MidiEvent, MidiMessage, ModConnection, PatchState, StateError, Transport,
};

use crate::error::ConfigError;
use crate::patch::load_patch;

const MIN_SAMPLE_RATE: u32 = 8000;
const MAX_SAMPLE_RATE: u32 = 384_000;
const MAX_BLOCK_SIZE: usize = 8192;

/// One note of a render script. Times are in seconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ScriptNote {
    /// MIDI note number, 0..127.
    pub note: u8,
    /// Note-on time.
    pub start: f32,
    /// Time until note-off.
    pub length: f32,
    /// Strike velocity, 0..1.
    #[serde(default = "default_velocity")]
    pub velocity: f32,
    /// MIDI channel, 0..15.
    #[serde(default)]
    pub channel: u8,
}

fn default_velocity() -> f32 {
    0.8
}

/// Everything needed to render a file offline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RenderScript {
    /// Output sample rate in Hz.
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Host block size handed to the processor.
    #[serde(default = "default_block_size")]
    pub block_size: usize,

    /// Tempo for tempo-synced modulators.
    #[serde(default = "default_bpm")]
    pub bpm: f32,

    /// Rendered length in seconds, including any release tail.
    pub duration: f32,

    /// Patch file to start from, relative to the script.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<PathBuf>,

    /// Parameter overrides by string id, in user units.
    #[serde(default)]
    pub params: BTreeMap<String, f32>,

    /// Routes added on top of the patch.
    #[serde(default)]
    pub connections: Vec<ModConnection>,

    /// Notes to play.
    #[serde(default)]
    pub notes: Vec<ScriptNote>,
}

fn default_sample_rate() -> u32 {
    48000
}

fn default_block_size() -> usize {
    256
}

fn default_bpm() -> f32 {
    120.0
}

impl RenderScript {
    /// A script that renders `duration` seconds of the default patch.
    pub fn new(duration: f32) -> Self {
        Self {
            sample_rate: default_sample_rate(),
            block_size: default_block_size(),
            bpm: default_bpm(),
            duration,
            patch: None,
            params: BTreeMap::new(),
            connections: Vec::new(),
            notes: Vec::new(),
        }
    }

    /// Add a note.
    pub fn with_note(mut self, note: u8, start: f32, length: f32, velocity: f32) -> Self {
        self.notes.push(ScriptNote {
            note,
            start,
            length,
            velocity,
            channel: 0,
        });
        self
    }

    /// Override a parameter.
    pub fn with_param(mut self, id: impl Into<String>, value: f32) -> Self {
        self.params.insert(id.into(), value);
        self
    }

    /// Load and validate a script file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        Self::from_toml(&content)
    }

    /// Parse and validate a script.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let script: Self = toml::from_str(toml_str)?;
        script.validate()?;
        Ok(script)
    }

    /// Serialize to TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check engine settings and every note.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&self.sample_rate) {
            return Err(ConfigError::invalid_script(format!(
                "sample_rate {} outside {MIN_SAMPLE_RATE}..={MAX_SAMPLE_RATE}",
                self.sample_rate
            )));
        }
        if !(1..=MAX_BLOCK_SIZE).contains(&self.block_size) {
            return Err(ConfigError::invalid_script(format!(
                "block_size {} outside 1..={MAX_BLOCK_SIZE}",
                self.block_size
            )));
        }
        if !(self.bpm.is_finite() && self.bpm > 0.0) {
            return Err(ConfigError::invalid_script("bpm must be positive"));
        }
        if !(self.duration.is_finite() && self.duration > 0.0) {
            return Err(ConfigError::invalid_script("duration must be positive"));
        }
        if let Some((id, _)) = self.params.iter().find(|(_, v)| !v.is_finite()) {
            return Err(ConfigError::invalid_script(format!(
                "parameter '{id}' is not finite"
            )));
        }
        for (i, n) in self.notes.iter().enumerate() {
            let reason = if n.note > 127 {
                Some("note above 127")
            } else if n.channel > 15 {
                Some("channel above 15")
            } else if !(0.0..=1.0).contains(&n.velocity) {
                Some("velocity outside 0..1")
            } else if !(n.start.is_finite() && n.start >= 0.0) {
                Some("negative start")
            } else if !(n.length.is_finite() && n.length > 0.0) {
                Some("length must be positive")
            } else {
                None
            };
            if let Some(reason) = reason {
                return Err(ConfigError::invalid_script(format!("note {i}: {reason}")));
            }
        }
        Ok(())
    }

    /// Rendered length in samples.
    pub fn total_samples(&self) -> usize {
        (f64::from(self.duration) * f64::from(self.sample_rate)).round() as usize
    }

    /// Host transport for the render.
    pub fn transport(&self) -> Transport {
        Transport {
            bpm: self.bpm,
            playing: true,
            position_beats: 0.0,
        }
    }

    /// Path of the referenced patch, resolved against `script_dir`.
    pub fn patch_path(&self, script_dir: &Path) -> Option<PathBuf> {
        self.patch.as_ref().map(|p| {
            if p.is_absolute() {
                p.clone()
            } else {
                script_dir.join(p)
            }
        })
    }

    /// The patch to render: the referenced file (or the default patch),
    /// then the script's overrides and routes.
    pub fn resolve_patch(&self, script_dir: &Path) -> Result<PatchState, ConfigError> {
        let base = match self.patch_path(script_dir) {
            Some(path) => load_patch(path)?,
            None => PatchState::default(),
        };
        Ok(self.overlay(base))
    }

    /// Apply the overrides and routes to `patch`.
    pub fn overlay(&self, mut patch: PatchState) -> PatchState {
        for (id, &value) in &self.params {
            patch.set(id, value);
        }
        patch.connections.extend(self.connections.iter().cloned());
        patch
    }

    /// A processor prepared at the script's rate and block size with
    /// `patch` loaded.
    pub fn build_processor(&self, patch: &PatchState) -> Result<AudioProcessor, ConfigError> {
        let mut processor = AudioProcessor::new().map_err(StateError::from)?;
        processor.prepare(self.sample_rate as f32, self.block_size);
        processor.load_state(patch)?;
        processor.set_transport(self.transport());
        Ok(processor)
    }

    /// Note events in sample time, sorted by offset. At equal offsets
    /// note-offs come first so a repeated note retriggers.
    pub fn midi_events(&self) -> Vec<MidiEvent> {
        let sr = f64::from(self.sample_rate);
        let at = |seconds: f32| (f64::from(seconds) * sr).round() as usize;

        let mut keyed: Vec<(usize, bool, MidiEvent)> = Vec::with_capacity(self.notes.len() * 2);
        for n in &self.notes {
            let on = at(n.start);
            let off = at(n.start + n.length).max(on + 1);
            keyed.push((
                on,
                true,
                MidiEvent::new(
                    on,
                    MidiMessage::NoteOn {
                        channel: n.channel,
                        note: n.note,
                        velocity: n.velocity,
                    },
                ),
            ));
            keyed.push((
                off,
                false,
                MidiEvent::new(
                    off,
                    MidiMessage::NoteOff {
                        channel: n.channel,
                        note: n.note,
                    },
                ),
            ));
        }
        keyed.sort_by_key(|&(offset, is_on, _)| (offset, is_on));
        keyed.into_iter().map(|(_, _, event)| event).collect()
    }
}
