//! Integration tests for the orrery-synth processor.
//!
//! Tests drive [`AudioProcessor`] through its public surface: MIDI in,
//! parameters through the shared store, patches through [`PatchState`].

use orrery_synth::{AudioProcessor, MidiEvent, MidiMessage, ModCurve, PatchState};

const SR: f32 = 48000.0;
const BLOCK: usize = 256;

fn prepared() -> AudioProcessor {
    let mut synth = AudioProcessor::new().unwrap();
    synth.prepare(SR, BLOCK);
    synth
}

fn note_on(offset: usize, note: u8) -> MidiEvent {
    MidiEvent::new(
        offset,
        MidiMessage::NoteOn {
            channel: 0,
            note,
            velocity: 0.9,
        },
    )
}

fn render(synth: &mut AudioProcessor, len: usize, midi: &[MidiEvent]) -> (Vec<f32>, Vec<f32>) {
    let mut left = vec![0.0; len];
    let mut right = vec![0.0; len];
    synth.process_block(&mut left, &mut right, midi);
    (left, right)
}

fn set(synth: &AudioProcessor, id: &str, value: f32) {
    let param = synth.params().find(id).unwrap();
    synth.params().set_value(param, value);
}

fn sounding_notes(synth: &AudioProcessor) -> Vec<u8> {
    let mut notes: Vec<u8> = synth
        .allocator()
        .voices()
        .iter()
        .filter(|v| v.is_active())
        .map(|v| v.note())
        .collect();
    notes.sort_unstable();
    notes
}

// ---------------------------------------------------------------------------
// Polyphony
// ---------------------------------------------------------------------------

#[test]
fn test_voice_limit_steals_oldest() {
    let mut synth = prepared();
    set(&synth, "voices", 2.0);

    render(&mut synth, BLOCK, &[note_on(0, 60), note_on(10, 64)]);
    assert_eq!(synth.active_voice_count(), 2);

    render(&mut synth, BLOCK, &[note_on(0, 67)]);
    assert_eq!(synth.active_voice_count(), 2, "count stays at the limit");
    assert_eq!(sounding_notes(&synth), [64, 67], "oldest note was stolen");
}

#[test]
fn test_full_pool_plays_chord() {
    let mut synth = prepared();
    let chord: Vec<MidiEvent> = (0..8).map(|i| note_on(i, 48 + 3 * i as u8)).collect();
    let (left, right) = render(&mut synth, 2048, &chord);

    assert_eq!(synth.active_voice_count(), 8);
    assert!(left.iter().chain(&right).all(|s| s.is_finite() && s.abs() <= 1.0));
}

#[test]
fn test_mono_mode_keeps_one_voice() {
    let mut synth = prepared();
    set(&synth, "mono", 1.0);

    render(&mut synth, BLOCK, &[note_on(0, 60), note_on(50, 64), note_on(100, 67)]);
    assert_eq!(synth.active_voice_count(), 1);
    assert_eq!(sounding_notes(&synth), [67], "last note wins");
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

#[test]
fn test_rendering_is_deterministic() {
    let midi = [note_on(0, 57), note_on(300, 61), note_on(700, 64)];
    let mut a = prepared();
    let mut b = prepared();
    let (left_a, right_a) = render(&mut a, 4096, &midi);
    let (left_b, right_b) = render(&mut b, 4096, &midi);

    assert_eq!(left_a, left_b);
    assert_eq!(right_a, right_b);
}

#[test]
fn test_block_size_does_not_change_output() {
    let midi = [note_on(0, 60)];
    let mut whole = prepared();
    let (expected, _) = render(&mut whole, 2048, &midi);

    // same total length, delivered in four host blocks
    let mut split = prepared();
    let mut actual = Vec::with_capacity(2048);
    for block in 0..4 {
        let events: &[MidiEvent] = if block == 0 { &midi } else { &[] };
        let (left, _) = render(&mut split, 512, events);
        actual.extend_from_slice(&left);
    }

    for (n, (a, e)) in actual.iter().zip(&expected).enumerate() {
        assert!((a - e).abs() < 1e-6, "sample {n}: {a} vs {e}");
    }
}

#[test]
fn test_uneven_host_blocks_match_single_render() {
    // 261 exceeds the prepared maximum; the rest leave partial sub-blocks
    const SIZES: [usize; 13] = [37, 101, 118, 255, 1, 261, 64, 100, 250, 100, 256, 256, 249];
    let total: usize = SIZES.iter().sum();
    assert_eq!(total, 2048);

    let mut whole = prepared();
    let (expected_left, expected_right) = render(&mut whole, total, &[note_on(0, 60), note_on(600, 67)]);

    let mut split = prepared();
    let mut left = Vec::with_capacity(total);
    let mut right = Vec::with_capacity(total);
    let mut start = 0;
    for size in SIZES {
        let events: Vec<MidiEvent> = [note_on(0, 60), note_on(600, 67)]
            .into_iter()
            .filter(|e| (start..start + size).contains(&e.sample_offset))
            .map(|e| MidiEvent::new(e.sample_offset - start, e.message))
            .collect();
        let (l, r) = render(&mut split, size, &events);
        left.extend_from_slice(&l);
        right.extend_from_slice(&r);
        start += size;
    }

    assert_eq!(split.active_voice_count(), 2);
    for (n, (a, e)) in left.iter().zip(&expected_left).enumerate() {
        assert!((a - e).abs() < 1e-6, "left sample {n}: {a} vs {e}");
    }
    for (n, (a, e)) in right.iter().zip(&expected_right).enumerate() {
        assert!((a - e).abs() < 1e-6, "right sample {n}: {a} vs {e}");
    }
}

#[test]
fn test_prepare_again_silences_and_keeps_working() {
    let mut synth = prepared();
    render(&mut synth, BLOCK, &[note_on(0, 60)]);
    assert_eq!(synth.active_voice_count(), 1);

    synth.prepare(44100.0, 128);
    assert_eq!(synth.active_voice_count(), 0);
    assert_eq!(synth.sample_rate(), 44100.0);

    let (left, _) = render(&mut synth, 1024, &[note_on(0, 72)]);
    assert!(left.iter().any(|&s| s.abs() > 1e-4));
}

#[test]
fn test_level_param_scales_output() {
    let mut loud = prepared();
    let mut quiet = prepared();
    set(&quiet, "level", -100.0);

    let (loud_left, _) = render(&mut loud, 2048, &[note_on(0, 60)]);
    let (quiet_left, _) = render(&mut quiet, 2048, &[note_on(0, 60)]);

    let peak = |s: &[f32]| s.iter().fold(0.0f32, |m, x| m.max(x.abs()));
    assert!(peak(&loud_left) > 1e-3);
    assert!(peak(&quiet_left) < peak(&loud_left) * 1e-3);
}

// ---------------------------------------------------------------------------
// Patches
// ---------------------------------------------------------------------------

#[test]
fn test_patch_survives_json() {
    let mut synth = prepared();
    set(&synth, "blend", 0.25);
    synth.connect("lfo1", "equant", -0.5, ModCurve::Linear).unwrap();
    let state = synth.state();

    let json = serde_json::to_string(&state).unwrap();
    let decoded: PatchState = serde_json::from_str(&json).unwrap();
    assert_eq!(decoded, state);

    let mut other = prepared();
    other.load_state(&decoded).unwrap();
    assert_eq!(other.state(), state);
}

#[test]
fn test_reloaded_patch_renders_identically() {
    let mut synth = prepared();
    set(&synth, "blend", 0.35);
    set(&synth, "equant", 0.2);
    set(&synth, "demodmix", 0.5);
    synth.connect("mlfo1", "equant", 0.4, ModCurve::Linear).unwrap();
    synth.connect("lfo1", "equant", -0.3, ModCurve::Sine).unwrap();
    synth.connect("env1", "blend", 0.6, ModCurve::QuadIn).unwrap();
    let state = synth.state();
    assert_ne!(state, prepared().state(), "patch differs from the defaults");

    let json = serde_json::to_string_pretty(&state).unwrap();
    let decoded: PatchState = serde_json::from_str(&json).unwrap();

    let mut saved = prepared();
    saved.load_state(&state).unwrap();
    let mut reloaded = prepared();
    reloaded.load_state(&decoded).unwrap();

    let off = MidiEvent::new(40, MidiMessage::NoteOff { channel: 0, note: 60 });
    for block in 0..20 {
        let midi: Vec<MidiEvent> = match block {
            0 => vec![note_on(0, 60)],
            3 => vec![note_on(17, 64)],
            10 => vec![off],
            _ => Vec::new(),
        };
        let (left_a, right_a) = render(&mut saved, BLOCK, &midi);
        let (left_b, right_b) = render(&mut reloaded, BLOCK, &midi);
        assert_eq!(left_a, left_b, "left differs in block {block}");
        assert_eq!(right_a, right_b, "right differs in block {block}");
    }
    assert_eq!(reloaded.state(), saved.state());
}

#[test]
fn test_sparse_patch_restores_defaults() {
    let mut synth = prepared();
    let defaults = synth.state();
    set(&synth, "blend", 0.9);

    let mut sparse = PatchState::default();
    sparse.set("level", -6.0);
    synth.load_state(&sparse).unwrap();

    let state = synth.state();
    assert_eq!(state.get("level"), Some(-6.0));
    assert_eq!(state.get("blend"), defaults.get("blend"));
}

#[test]
fn test_loading_patch_silences_next_block() {
    let mut synth = prepared();
    render(&mut synth, BLOCK, &[note_on(0, 60), note_on(0, 64)]);
    assert_eq!(synth.active_voice_count(), 2);

    let state = synth.state();
    synth.load_state(&state).unwrap();
    render(&mut synth, BLOCK, &[]);
    assert_eq!(synth.active_voice_count(), 0);
}
