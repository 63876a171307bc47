//! Orrery Core: DSP primitives for the orrery synthesizer.
//!
//! Everything here is allocation-free once constructed and safe to call from
//! the audio thread.
//!
//! # Contents
//!
//! - [`Effect`], [`EffectExt`], [`Chain`]: the stereo effect interface
//! - [`SmoothedParam`], [`LinearSmoothedParam`]: per-sample smoothing
//! - [`ParamDescriptor`]: tagged-variant parameter metadata with skewed ranges
//! - [`Svf`], [`MultimodeFilter`], [`FilterKind`]: TPT state variable filters
//! - [`Biquad`], [`BiquadCoefficients`]: RBJ designs incl. shelves
//! - [`DelayLine`], [`CombFilter`], [`AllpassFilter`]: delay-based building blocks
//! - [`OnePole`], [`EnvelopeFollower`]
//! - [`fast_math`]: polynomial sine, semitone power, additive partials
//! - [`NoteDuration`], [`Transport`]: tempo sync
//! - [`Xorshift32`]: noise
//!
//! # no_std
//!
//! Disable the default `std` feature to build without the standard library;
//! `alloc` is still required for delay buffers.
//!
//! ```toml
//! [dependencies]
//! orrery-core = { version = "0.1", default-features = false }
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod allpass;
pub mod biquad;
pub mod comb;
pub mod delay;
pub mod effect;
pub mod envelope;
pub mod fast_math;
pub mod math;
pub mod one_pole;
pub mod param;
pub mod param_info;
pub mod rng;
pub mod svf;
pub mod tempo;

pub use allpass::AllpassFilter;
pub use biquad::{Biquad, BiquadCoefficients};
pub use comb::CombFilter;
pub use delay::DelayLine;
pub use effect::{Chain, Effect, EffectExt};
pub use envelope::EnvelopeFollower;
pub use fast_math::{
    cosine_for_phase_and_tones, fast_db_to_linear, fast_linear_to_db, poly_sin, semitone_power,
    sine_for_phase_and_tones, wrap_pi,
};
pub use math::{
    db_to_linear, flush_denormal, foldback, hard_clip, hz_to_midi_note, lane_pan_gains, lerp,
    linear_to_db, midi_note_to_hz, sanitize,
};
pub use one_pole::OnePole;
pub use param::{LinearSmoothedParam, SmoothedParam};
pub use param_info::{
    ParamDescriptor, ParamFlags, ParamId, ParamKind, ParamUnit, ValueConversion, ValueFormatter,
};
pub use rng::Xorshift32;
pub use svf::{FilterKind, MultimodeFilter, Svf, SvfOutput, resonance_to_q};
pub use tempo::{
    NOTE_DURATION_LABELS, NOTE_DURATIONS, NoteDuration, QUARTER_NOTE_INDEX, Transport,
    note_duration,
};
