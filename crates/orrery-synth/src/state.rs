//! Patch state: everything needed to recall a sound.
//!
//! Parameter values are keyed by their string ids so patches survive
//! changes to the registration order. Connections name their source and
//! parameter the same way. MSEG tables are carried alongside because they
//! are not parameters.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

use crate::mod_matrix::{ModCurve, ModMatrixError};
use crate::mseg::MsegData;

/// Errors raised while applying a patch.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StateError {
    /// No parameter has this string id.
    #[error("unknown parameter `{0}`")]
    UnknownParameter(String),
    /// No modulation source has this id.
    #[error("unknown modulation source `{0}`")]
    UnknownSource(String),
    /// A stored value is NaN or infinite.
    #[error("parameter `{param}` has a non-finite value")]
    NonFiniteValue {
        /// Offending parameter.
        param: String,
    },
    /// An MSEG table failed validation.
    #[error("invalid MSEG data: {reason}")]
    InvalidMseg {
        /// What was wrong.
        reason: &'static str,
    },
    /// The matrix refused a connection.
    #[error(transparent)]
    Matrix(#[from] ModMatrixError),
}

/// A modulation route by name.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ModConnection {
    /// Source id, e.g. `"lfo1"`.
    pub source: String,
    /// Parameter string id, e.g. `"fltfreq"`.
    pub param: String,
    /// Depth, −1..1.
    pub depth: f32,
    /// Response curve.
    #[cfg_attr(feature = "serde", serde(default))]
    pub curve: ModCurve,
}

/// A complete patch.
///
/// ```rust
/// use orrery_synth::PatchState;
///
/// let mut patch = PatchState::default();
/// patch.set("blend", 0.5);
/// assert_eq!(patch.get("blend"), Some(0.5));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PatchState {
    /// User values by parameter string id. Missing ids keep their defaults.
    #[cfg_attr(feature = "serde", serde(default))]
    pub values: BTreeMap<String, f32>,
    /// Modulation routes.
    #[cfg_attr(feature = "serde", serde(default))]
    pub connections: Vec<ModConnection>,
    /// MSEG tables, at most one per MSEG. Missing tables reset to default.
    #[cfg_attr(feature = "serde", serde(default))]
    pub msegs: Vec<MsegData>,
}

impl PatchState {
    /// Set a value by string id.
    pub fn set(&mut self, param: &str, value: f32) {
        self.values.insert(String::from(param), value);
    }

    /// Value stored for `param`, if any.
    pub fn get(&self, param: &str) -> Option<f32> {
        self.values.get(param).copied()
    }

    /// Add a route.
    pub fn connect(&mut self, source: &str, param: &str, depth: f32, curve: ModCurve) {
        self.connections.push(ModConnection {
            source: String::from(source),
            param: String::from(param),
            depth,
            curve,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_overwrites() {
        let mut patch = PatchState::default();
        patch.set("pitch", 1.0);
        patch.set("pitch", 2.0);
        assert_eq!(patch.values.len(), 1);
        assert_eq!(patch.get("pitch"), Some(2.0));
        assert_eq!(patch.get("missing"), None);
    }

    #[test]
    fn test_matrix_error_converts() {
        let err: StateError = ModMatrixError::AlreadyBuilt.into();
        assert!(matches!(err, StateError::Matrix(ModMatrixError::AlreadyBuilt)));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_missing_sections_default() {
        let json = r#"{ "values": { "blend": 0.25 } }"#;
        let patch: PatchState = serde_json::from_str(json).unwrap();
        assert_eq!(patch.get("blend"), Some(0.25));
        assert!(patch.connections.is_empty());
        assert!(patch.msegs.is_empty());
    }
}
