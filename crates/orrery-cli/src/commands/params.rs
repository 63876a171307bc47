//! Parameter listing command.

#![allow(clippy::print_literal)] // Table headers use literal strings intentionally

use clap::Args;
use orrery_core::ParamFlags;
use orrery_synth::{AudioProcessor, ParamDescriptor};

#[derive(Args)]
pub struct ParamsArgs {
    /// Only list parameters whose id or name contains this text
    #[arg(long, value_name = "TEXT")]
    filter: Option<String>,

    /// Only list modulation destinations
    #[arg(long)]
    modulatable: bool,
}

/// Descriptors matching `filter`, case-insensitively, in registration order.
pub fn matching<'a>(
    descriptors: &'a [ParamDescriptor],
    filter: Option<&str>,
    modulatable_only: bool,
) -> Vec<&'a ParamDescriptor> {
    let needle = filter.map(str::to_ascii_lowercase);
    descriptors
        .iter()
        .filter(|d| !d.flags.contains(ParamFlags::HIDDEN))
        .filter(|d| !modulatable_only || is_modulatable(d))
        .filter(|d| {
            needle.as_deref().is_none_or(|n| {
                d.string_id.to_ascii_lowercase().contains(n) || d.name.to_ascii_lowercase().contains(n)
            })
        })
        .collect()
}

fn is_modulatable(descriptor: &ParamDescriptor) -> bool {
    !descriptor.flags.contains(ParamFlags::INTERNAL)
}

fn formatted(descriptor: &ParamDescriptor, value: f32) -> String {
    let mut text = String::new();
    if descriptor.format_value(value, &mut text).is_err() {
        text = format!("{value}");
    }
    text
}

pub fn run(args: ParamsArgs) -> anyhow::Result<()> {
    let synth = AudioProcessor::new()?;
    let params = matching(
        synth.params().descriptors(),
        args.filter.as_deref(),
        args.modulatable,
    );

    if params.is_empty() {
        anyhow::bail!(
            "No parameters match '{}'",
            args.filter.as_deref().unwrap_or_default()
        );
    }

    println!(
        "  {:14}  {:28}  {:3}  {:14}  {}",
        "Id", "Name", "Mod", "Default", "Range"
    );
    println!(
        "  {:14}  {:28}  {:3}  {:14}  {}",
        "--", "----", "---", "-------", "-----"
    );
    for d in &params {
        println!(
            "  {:14}  {:28}  {:3}  {:14}  {} .. {}",
            d.string_id,
            d.name,
            if is_modulatable(d) { "yes" } else { "" },
            formatted(d, d.default),
            formatted(d, d.min),
            formatted(d, d.max)
        );
    }
    println!();
    println!("{} parameters", params.len());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_matches_id_and_name() {
        let synth = AudioProcessor::new().unwrap();
        let all = synth.params().descriptors();

        let blend = matching(all, Some("BLEND"), false);
        assert!(blend.iter().any(|d| d.string_id == "blend"));
        assert!(blend.len() < all.len());

        assert_eq!(matching(all, None, false).len(), all.len());
        assert!(matching(all, Some("no such parameter"), false).is_empty());
    }

    #[test]
    fn test_modulatable_skips_internal() {
        let synth = AudioProcessor::new().unwrap();
        let all = synth.params().descriptors();
        let destinations = matching(all, None, true);
        assert!(destinations.iter().any(|d| d.string_id == "blend"));
        assert!(destinations.iter().all(|d| d.string_id != "mono"));
    }
}
