//! Default patch export command.

use clap::Args;
use orrery_config::save_patch;
use orrery_synth::AudioProcessor;
use std::path::PathBuf;

use super::common::{apply_overrides, parse_key_val};

#[derive(Args)]
pub struct PatchArgs {
    /// Output file, .toml or .json
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,

    /// Override a value before writing (e.g. --set blend=0.4)
    #[arg(long = "set", value_name = "ID=VALUE", value_parser = parse_key_val)]
    overrides: Vec<(String, f32)>,
}

pub fn run(args: PatchArgs) -> anyhow::Result<()> {
    let mut synth = AudioProcessor::new()?;
    let mut patch = synth.state();
    apply_overrides(&mut patch, &args.overrides);

    // round-trip through the processor so unknown ids and bad values are caught
    synth.load_state(&patch)?;
    let patch = synth.state();

    save_patch(&patch, &args.output)?;
    tracing::info!(
        path = %args.output.display(),
        values = patch.values.len(),
        "patch written"
    );
    println!("Wrote {}", args.output.display());
    Ok(())
}
