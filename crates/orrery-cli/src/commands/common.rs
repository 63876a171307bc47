//! Shared CLI helpers used across multiple commands.

use orrery_synth::PatchState;

/// Parse a `key=value` override for clap's `value_parser`.
pub fn parse_key_val(s: &str) -> Result<(String, f32), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("Invalid parameter format: '{s}' (expected key=value)"))?;
    let value: f32 = value
        .trim()
        .parse()
        .map_err(|_| format!("Invalid value for '{key}': '{value}' is not a number"))?;
    if !value.is_finite() {
        return Err(format!("Invalid value for '{key}': must be finite"));
    }
    Ok((key.trim().to_string(), value))
}

/// Write `key=value` overrides into a patch.
pub fn apply_overrides(patch: &mut PatchState, overrides: &[(String, f32)]) {
    for (key, value) in overrides {
        patch.set(key, *value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_val() {
        assert_eq!(parse_key_val("blend=0.5"), Ok(("blend".to_string(), 0.5)));
        assert_eq!(parse_key_val(" level = -6 "), Ok(("level".to_string(), -6.0)));
        assert!(parse_key_val("blend").is_err());
        assert!(parse_key_val("blend=loud").is_err());
        assert!(parse_key_val("blend=inf").is_err());
    }

    #[test]
    fn test_apply_overrides_last_wins() {
        let mut patch = PatchState::default();
        apply_overrides(
            &mut patch,
            &[("blend".to_string(), 0.1), ("blend".to_string(), 0.7)],
        );
        assert_eq!(patch.get("blend"), Some(0.7));
    }
}
