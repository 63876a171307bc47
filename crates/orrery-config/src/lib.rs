//! Patch and render script files for the orrery synthesizer.
//!
//! - **Patches**: [`orrery_synth::PatchState`] as TOML or JSON, picked by extension
//! - **Render scripts**: engine settings, overrides and notes for offline renders
//!
//! # Example
//!
//! ```rust,no_run
//! use orrery_config::{RenderScript, load_patch, save_patch};
//!
//! let mut patch = load_patch("pads/glass.toml").unwrap();
//! patch.set("blend", 0.6);
//! save_patch(&patch, "pads/glass-bright.json").unwrap();
//!
//! let script = RenderScript::new(4.0)
//!     .with_param("level", -6.0)
//!     .with_note(60, 0.0, 2.0, 0.8);
//! let mut synth = script.build_processor(&script.overlay(patch)).unwrap();
//! # let _ = &mut synth;
//! ```

mod error;
mod patch;
mod script;

pub use error::ConfigError;
pub use patch::{PatchFormat, load_patch, save_patch};
pub use script::{RenderScript, ScriptNote};
