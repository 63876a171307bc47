//! Patch files.
//!
//! A patch is an [`orrery_synth::PatchState`] written as TOML or JSON; the
//! format follows the file extension.
//!
//! # TOML Format
//!
//! ```toml
//! [values]
//! blend = 0.25
//! level = -6.0
//!
//! [[connections]]
//! source = "lfo1"
//! param = "equant"
//! depth = 0.5
//! curve = "quad_in"
//!
//! [[msegs]]
//! [[msegs.points]]
//! time = 0.0
//! value = 0.0
//! [[msegs.points]]
//! time = 1.0
//! value = 1.0
//! ```

use std::path::Path;

use orrery_synth::PatchState;

use crate::error::ConfigError;

/// On-disk encoding of a patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchFormat {
    /// `.toml`
    Toml,
    /// `.json`
    Json,
}

impl PatchFormat {
    /// Pick the format from the file extension, ignoring case.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("toml") => Ok(Self::Toml),
            Some("json") => Ok(Self::Json),
            _ => Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        }
    }

    /// Decode a patch from text.
    pub fn parse(self, content: &str) -> Result<PatchState, ConfigError> {
        Ok(match self {
            Self::Toml => toml::from_str(content)?,
            Self::Json => serde_json::from_str(content)?,
        })
    }

    /// Encode a patch as text.
    pub fn render(self, patch: &PatchState) -> Result<String, ConfigError> {
        Ok(match self {
            Self::Toml => toml::to_string_pretty(patch)?,
            Self::Json => serde_json::to_string_pretty(patch)?,
        })
    }
}

/// Load a patch from a `.toml` or `.json` file.
pub fn load_patch(path: impl AsRef<Path>) -> Result<PatchState, ConfigError> {
    let path = path.as_ref();
    let format = PatchFormat::from_path(path)?;
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
    format.parse(&content)
}

/// Save a patch, creating the parent directory if needed.
pub fn save_patch(patch: &PatchState, path: impl AsRef<Path>) -> Result<(), ConfigError> {
    let path = path.as_ref();
    let content = PatchFormat::from_path(path)?.render(patch)?;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
    }

    std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use orrery_synth::{ModCurve, MsegData, MsegPoint};

    fn sample_patch() -> PatchState {
        let mut patch = PatchState::default();
        patch.set("blend", 0.25);
        patch.set("level", -6.0);
        patch.connect("lfo1", "equant", 0.5, ModCurve::QuadIn);
        patch.msegs.push(MsegData {
            points: vec![MsegPoint::new(0.0, 0.0), MsegPoint::new(1.0, 1.0)],
        });
        patch
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(PatchFormat::from_path("a/b.toml").unwrap(), PatchFormat::Toml);
        assert_eq!(PatchFormat::from_path("B.JSON").unwrap(), PatchFormat::Json);
        assert!(matches!(
            PatchFormat::from_path("patch.yaml"),
            Err(ConfigError::UnsupportedFormat(_))
        ));
        assert!(PatchFormat::from_path("patch").is_err());
    }

    #[test]
    fn test_toml_text_round_trip() {
        let patch = sample_patch();
        let text = PatchFormat::Toml.render(&patch).unwrap();
        assert!(text.contains("curve = \"quad_in\""), "got:\n{text}");
        assert_eq!(PatchFormat::Toml.parse(&text).unwrap(), patch);
    }

    #[test]
    fn test_json_text_round_trip() {
        let patch = sample_patch();
        let text = PatchFormat::Json.render(&patch).unwrap();
        assert_eq!(PatchFormat::Json.parse(&text).unwrap(), patch);
    }

    #[test]
    fn test_hand_written_toml() {
        let patch = PatchFormat::Toml
            .parse(
                r#"
                [values]
                voices = 4
                blend = 0.5

                [[connections]]
                source = "mw"
                param = "blend"
                depth = 1.0
                "#,
            )
            .unwrap();
        assert_eq!(patch.get("voices"), Some(4.0), "integers read as floats");
        assert_eq!(patch.connections[0].curve, ModCurve::Linear, "curve defaults");
        assert!(patch.msegs.is_empty());
    }

    #[test]
    fn test_bad_toml_is_parse_error() {
        let err = PatchFormat::Toml.parse("[values\nblend = ").unwrap_err();
        assert!(matches!(err, ConfigError::TomlParse(_)));
    }
}
