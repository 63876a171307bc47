//! Offline render command.

use clap::Args;
use orrery_config::RenderScript;
use orrery_synth::{AudioProcessor, MidiEvent, PatchState};
use std::path::{Path, PathBuf};

use super::common::{apply_overrides, parse_key_val};

#[derive(Args)]
pub struct RenderArgs {
    /// Render script (TOML)
    #[arg(value_name = "SCRIPT")]
    script: PathBuf,

    /// Output WAV file
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,

    /// Override a parameter after the script (e.g. --set level=-6)
    #[arg(long = "set", value_name = "ID=VALUE", value_parser = parse_key_val)]
    overrides: Vec<(String, f32)>,
}

/// Events in `[start, start + len)`, rebased to the block.
fn block_events(events: &[MidiEvent], start: usize, len: usize) -> Vec<MidiEvent> {
    let first = events.partition_point(|e| e.sample_offset < start);
    let last = events.partition_point(|e| e.sample_offset < start + len);
    events[first..last]
        .iter()
        .map(|e| MidiEvent::new(e.sample_offset - start, e.message))
        .collect()
}

/// Run `script` through `synth` block by block.
pub fn render(synth: &mut AudioProcessor, script: &RenderScript) -> (Vec<f32>, Vec<f32>) {
    let total = script.total_samples();
    let events = script.midi_events();
    let mut left = vec![0.0; total];
    let mut right = vec![0.0; total];

    let mut start = 0;
    while start < total {
        let len = script.block_size.min(total - start);
        let block = block_events(&events, start, len);
        synth.process_block(
            &mut left[start..start + len],
            &mut right[start..start + len],
            &block,
        );
        start += len;
    }

    (left, right)
}

/// Write interleaved 32-bit float stereo.
pub fn write_wav(
    path: &Path,
    sample_rate: u32,
    left: &[f32],
    right: &[f32],
) -> Result<(), hound::Error> {
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for (l, r) in left.iter().zip(right) {
        writer.write_sample(*l)?;
        writer.write_sample(*r)?;
    }
    writer.finalize()
}

fn peak_db(samples: &[f32]) -> f32 {
    let peak = samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
    orrery_core::linear_to_db(peak)
}

pub fn run(args: RenderArgs) -> anyhow::Result<()> {
    let script = RenderScript::load(&args.script)?;
    let script_dir = args.script.parent().unwrap_or_else(|| Path::new("."));
    let mut patch: PatchState = script.resolve_patch(script_dir)?;
    apply_overrides(&mut patch, &args.overrides);

    let mut synth = script.build_processor(&patch)?;
    tracing::info!(
        sample_rate = script.sample_rate,
        block_size = script.block_size,
        notes = script.notes.len(),
        seconds = script.duration,
        "rendering"
    );

    let (left, right) = render(&mut synth, &script);
    write_wav(&args.output, script.sample_rate, &left, &right)?;

    let peak = peak_db(&left).max(peak_db(&right));
    tracing::info!(path = %args.output.display(), peak_db = peak, "render finished");
    println!(
        "Rendered {:.2} s to {} (peak {:.1} dBFS)",
        script.duration,
        args.output.display(),
        peak
    );
    Ok(())
}
