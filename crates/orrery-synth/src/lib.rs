//! Orrery Synth - orbital synthesis engine for the orrery instrument
//!
//! Each voice runs four quadrature oscillators whose outputs are points
//! moving on circles. An algorithm composes those points into a planetary
//! path and an observer, optionally displaced to an equant, turns the path
//! into audio.
//!
//! # Core Components
//!
//! ## Oscillators
//!
//! - [`QuadOscillator`] - additive sine/cosine pair with unison, pan and spread
//! - [`StereoPosition`] - a point per channel on the orbital plane
//!
//! ```rust
//! use orrery_synth::{QuadOscParams, QuadOscillator};
//!
//! let mut osc = QuadOscillator::new();
//! osc.set_sample_rate(48000.0);
//! osc.set_params(220.0, QuadOscParams::default());
//! osc.note_on(0.0);
//! let p = osc.next_position();
//! assert!(p.radius_left().is_finite());
//! ```
//!
//! ## Modulators
//!
//! - [`Envelope`] - curved ADSR with repeat modes
//! - [`Lfo`] - seventeen shapes, delay and fade-in
//! - [`Mseg`] / [`MsegData`] - drawable multi-segment shapes
//!
//! ## Modulation
//!
//! - [`ModMatrix`] - sources routed to parameters in normalised space, with
//!   a mono phase for instrument-wide sources and a poly phase per voice
//! - [`ParamLayout`] / [`ParamStore`] - every parameter and its lock-free value
//!
//! ## Voices and the Processor
//!
//! - [`Voice`] - oscillators, modulators, observer and filter for one note
//! - [`VoiceAllocator`] - polyphony, stealing, mono/legato, MPE
//! - [`AudioProcessor`] - the whole instrument, including the effect chain
//!
//! ```rust
//! use orrery_synth::{AudioProcessor, MidiEvent, MidiMessage};
//!
//! let mut synth = AudioProcessor::new().unwrap();
//! synth.prepare(44100.0, 128);
//!
//! let chord = [60, 64, 67].map(|note| {
//!     MidiEvent::new(0, MidiMessage::NoteOn { channel: 0, note, velocity: 0.8 })
//! });
//! let mut left = vec![0.0; 128];
//! let mut right = vec![0.0; 128];
//! synth.process_block(&mut left, &mut right, &chord);
//! assert_eq!(synth.active_voice_count(), 3);
//! ```
//!
//! # no_std Support
//!
//! This crate is `no_std` compatible (with `alloc`). Disable the default
//! `std` feature:
//!
//! ```toml
//! [dependencies]
//! orrery-synth = { version = "0.1", default-features = false }
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod allocator;
pub mod envelope;
pub mod level;
pub mod lfo;
pub mod midi;
pub mod mod_matrix;
pub mod mseg;
pub mod params;
pub mod processor;
pub mod quad_osc;
pub mod state;
pub mod tuning;
pub mod voice;

// Re-export main types at crate root
pub use allocator::{GlideMode, MAX_VOICES, PerformanceSettings, VoiceAllocator};
pub use envelope::{Envelope, EnvelopeParams, EnvelopeState, RepeatMode};
pub use level::LevelMeter;
pub use lfo::{Lfo, LfoParams, LfoShape};
pub use midi::{MidiEvent, MidiMessage};
pub use mod_matrix::{
    Connection, ModCurve, ModMatrix, ModMatrixBuilder, ModMatrixError, ModSource, ModSourceId,
    MonoView,
};
pub use mseg::{MAX_MSEG_POINTS, Mseg, MsegData, MsegParams, MsegPoint};
pub use params::{MACROS, ParamLayout, ParamStore, UNITS};
pub use processor::{AudioProcessor, PresetHandle, SUB_BLOCK, SourceIds};
pub use quad_osc::{MAX_UNISON, QuadOscParams, QuadOscillator, StereoPosition};
pub use state::{ModConnection, PatchState, StateError};
pub use tuning::{EqualTemperament, TuningProvider, TuningTable};
pub use voice::{Observer, PolySourceIds, Voice, VoiceContext, compose};

// Re-export commonly used types from orrery-core
pub use orrery_core::{ParamDescriptor, ParamId, Transport};
