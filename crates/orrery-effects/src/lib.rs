//! Orrery Effects - slot effects and the dual-lane router
//!
//! Every effect here implements [`orrery_core::Effect`] and takes its
//! settings as one plain `*Params` struct per sub-block:
//!
//! - [`Waveshaper`] - seventeen transfer functions with pre-emphasis
//! - [`Dynamics`] - compressor, limiter, expander and gate with sidechain
//! - [`StereoDelay`] - independent L/R times, ping-pong and freeze
//! - [`Chorus`] - quadrature-modulated stereo chorus
//! - [`MultibandFilter`] - low shelf, peak and high shelf
//! - [`Reverb`] - Freeverb-style stereo reverb
//! - [`RingModulator`] - two morphing carriers with stereo spread
//! - [`SlotGain`] - smoothed gain
//!
//! [`FxChain`] runs them in two lanes of four slots, in series or in
//! parallel, and finishes with the [`PostChain`].
//!
//! ## Example
//!
//! ```rust
//! use orrery_effects::{FxChain, FxParams, FxSlot, LaneParams};
//!
//! let mut fx = FxChain::new();
//! fx.prepare(48000.0, 32);
//!
//! let mut params = FxParams::default();
//! params.lanes[0] = LaneParams {
//!     slots: [FxSlot::Waveshaper, FxSlot::Chorus, FxSlot::None, FxSlot::None],
//!     ..LaneParams::default()
//! };
//! params.lanes[1].slots[0] = FxSlot::Reverb;
//! fx.set_params(&params);
//!
//! let mut left = vec![0.1; 128];
//! let mut right = vec![0.1; 128];
//! fx.process(&mut left, &mut right, None);
//! assert!(left.iter().all(|s| s.abs() <= 1.0));
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod chain;
pub mod chorus;
pub mod delay;
pub mod dynamics;
pub mod gain;
pub mod multiband;
pub mod post;
pub mod reverb;
pub mod ring_mod;
pub mod waveshaper;

// Re-export main types at crate root
pub use chain::{FxChain, FxParams, FxSlot, LANE_CUTOFF_RAMP_SECONDS, LaneParams, SLOTS_PER_LANE};
pub use chorus::{Chorus, ChorusParams};
pub use delay::{DelayParams, MAX_DELAY_SECONDS, StereoDelay};
pub use dynamics::{Dynamics, DynamicsMode, DynamicsParams};
pub use gain::SlotGain;
pub use multiband::{BandParams, MultibandFilter, MultibandParams};
pub use post::{DC_CUTOFF_HZ, LIMITER_RELEASE_SECONDS, LIMITER_THRESHOLD_DB, Limiter, PostChain};
pub use reverb::{MAX_PREDELAY_SECONDS, Reverb, ReverbParams};
pub use ring_mod::{RingModParams, RingModulator};
pub use waveshaper::{ShaperFunction, Waveshaper, WaveshaperParams};
