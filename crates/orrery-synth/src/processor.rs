//! The audio processor: parameters, modulation, voices and effects.
//!
//! # Block flow
//!
//! ```text
//! process_block
//!   ├─ consume pending reset (preset load)
//!   ├─ query tuning master
//!   └─ per prepared-size chunk
//!        ├─ capture sidechain, clear output
//!        ├─ push performance flags to the allocator
//!        └─ per sub-block (≤ 32 samples)
//!             ├─ resolve mono sources → effect params → poly params per voice
//!             ├─ render voices between MIDI events
//!             ├─ effect chain
//!             └─ matrix.finish_block
//! ```
//!
//! Nothing in this path allocates; scratch buffers are sized in
//! [`AudioProcessor::prepare`].

use alloc::boxed::Box;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, Ordering};

use orrery_core::{FilterKind, ParamId, Transport, note_duration};
use orrery_effects::{
    BandParams, ChorusParams, DelayParams, DynamicsMode, DynamicsParams, FxChain, FxParams,
    FxSlot, LaneParams, MultibandParams, ReverbParams, RingModParams, ShaperFunction,
    WaveshaperParams,
};

use crate::allocator::{GlideMode, MAX_VOICES, PerformanceSettings, VoiceAllocator};
use crate::level::LevelMeter;
use crate::lfo::{Lfo, LfoParams, LfoShape};
use crate::midi::{MidiEvent, MidiMessage};
use crate::mod_matrix::{ModCurve, ModMatrix, ModMatrixBuilder, ModMatrixError, ModSourceId};
use crate::mseg::MsegData;
use crate::params::{MACROS, ParamLayout, ParamStore, UNITS};
use crate::state::{ModConnection, PatchState, StateError};
use crate::tuning::{EqualTemperament, TuningProvider};
use crate::voice::{PolySourceIds, VoiceContext};

/// Largest number of samples rendered between modulation updates.
pub const SUB_BLOCK: usize = 32;

const MONO_LFO_IDS: [&str; UNITS] = ["mlfo1", "mlfo2", "mlfo3", "mlfo4"];
const MONO_LFO_NAMES: [&str; UNITS] = ["Mono LFO 1", "Mono LFO 2", "Mono LFO 3", "Mono LFO 4"];
const LFO_IDS: [&str; UNITS] = ["lfo1", "lfo2", "lfo3", "lfo4"];
const LFO_NAMES: [&str; UNITS] = ["LFO 1", "LFO 2", "LFO 3", "LFO 4"];
const ENV_IDS: [&str; UNITS] = ["env1", "env2", "env3", "env4"];
const ENV_NAMES: [&str; UNITS] = ["Envelope 1", "Envelope 2", "Envelope 3", "Envelope 4"];
const MSEG_IDS: [&str; UNITS] = ["mseg1", "mseg2", "mseg3", "mseg4"];
const MSEG_NAMES: [&str; UNITS] = ["MSEG 1", "MSEG 2", "MSEG 3", "MSEG 4"];
const MACRO_IDS: [&str; MACROS] = ["macro1", "macro2", "macro3", "macro4"];
const MACRO_NAMES: [&str; MACROS] = ["Macro 1", "Macro 2", "Macro 3", "Macro 4"];

/// Every registered modulation source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceIds {
    /// Sources each voice provides.
    pub poly: PolySourceIds,
    /// CC1.
    pub mod_wheel: ModSourceId,
    /// Global pitch bend, −1..1.
    pub pitch_bend: ModSourceId,
    /// Free-running instrument LFOs.
    pub mono_lfo: [ModSourceId; UNITS],
    /// Macro knobs.
    pub macros: [ModSourceId; MACROS],
}

fn register(
    builder: &mut ModMatrixBuilder,
    ids: &[&'static str; UNITS],
    names: &[&'static str; UNITS],
    poly: bool,
    bipolar: bool,
) -> Result<[ModSourceId; UNITS], ModMatrixError> {
    let mut out = [ModSourceId(0); UNITS];
    for (slot, (id, name)) in out.iter_mut().zip(ids.iter().zip(names)) {
        *slot = if poly {
            builder.add_poly_source(*id, *name, bipolar)?
        } else {
            builder.add_mono_source(*id, *name, bipolar)?
        };
    }
    Ok(out)
}

fn build_matrix(
    layout: &ParamLayout,
    descriptors: &[orrery_core::ParamDescriptor],
) -> Result<(ModMatrix, SourceIds), ModMatrixError> {
    let mut b = ModMatrixBuilder::new(descriptors);
    let mpe_bend = b.add_poly_source("mpep", "MPE Pitchbend", true)?;
    let mpe_timbre = b.add_poly_source("mpet", "MPE Timbre", false)?;
    let mod_wheel = b.add_mono_source("mw", "Mod Wheel", false)?;
    let pitch_bend = b.add_mono_source("pb", "Pitch Bend", true)?;
    let pressure = b.add_poly_source("polyAT", "Poly Aftertouch", false)?;
    let note = b.add_poly_source("note", "MIDI Note Number", false)?;
    let velocity = b.add_poly_source("vel", "MIDI Velocity", false)?;
    let mono_lfo = register(&mut b, &MONO_LFO_IDS, &MONO_LFO_NAMES, false, true)?;
    let lfo = register(&mut b, &LFO_IDS, &LFO_NAMES, true, true)?;
    let env = register(&mut b, &ENV_IDS, &ENV_NAMES, true, false)?;
    let mseg = register(&mut b, &MSEG_IDS, &MSEG_NAMES, true, false)?;
    let macros = register(&mut b, &MACRO_IDS, &MACRO_NAMES, false, false)?;

    for d in descriptors.iter().filter(|d| !d.is_internal()) {
        b.add_parameter(d.id, !d.is_mono())?;
    }
    for (source, ids) in mono_lfo.iter().zip(&layout.lfo) {
        b.set_source_inputs(
            *source,
            &[ids.sync, ids.wave, ids.rate, ids.beat, ids.depth, ids.phase, ids.offset],
        )?;
    }
    for (source, &param) in macros.iter().zip(&layout.macros.values) {
        b.set_source_inputs(*source, &[param])?;
    }

    let matrix = b.build()?;
    let sources = SourceIds {
        poly: PolySourceIds {
            mpe_bend,
            mpe_timbre,
            pressure,
            note,
            velocity,
            lfo,
            env,
            mseg,
        },
        mod_wheel,
        pitch_bend,
        mono_lfo,
        macros,
    };
    Ok((matrix, sources))
}

/// Control-thread handle for parameter writes and preset loads.
///
/// Cloneable and `Send + Sync`; every operation is wait-free.
#[derive(Debug, Clone)]
pub struct PresetHandle {
    store: Arc<ParamStore>,
    pending_reset: Arc<AtomicBool>,
}

impl PresetHandle {
    /// The shared parameter table.
    pub fn params(&self) -> &ParamStore {
        &self.store
    }

    /// Silence every voice at the start of the next block.
    pub fn request_reset(&self) {
        self.pending_reset.store(true, Ordering::Release);
    }

    /// A reset is waiting for the audio thread.
    pub fn reset_pending(&self) -> bool {
        self.pending_reset.load(Ordering::Acquire)
    }
}

/// The complete instrument.
///
/// ```rust
/// use orrery_synth::{AudioProcessor, MidiEvent, MidiMessage};
///
/// let mut synth = AudioProcessor::new().unwrap();
/// synth.prepare(48000.0, 256);
/// let mut left = vec![0.0; 256];
/// let mut right = vec![0.0; 256];
/// let midi = [MidiEvent::new(0, MidiMessage::NoteOn { channel: 0, note: 60, velocity: 1.0 })];
/// synth.process_block(&mut left, &mut right, &midi);
/// assert!(left.iter().all(|s| s.is_finite()));
/// assert_eq!(synth.active_voice_count(), 1);
/// ```
pub struct AudioProcessor {
    layout: ParamLayout,
    store: Arc<ParamStore>,
    pending_reset: Arc<AtomicBool>,
    matrix: ModMatrix,
    sources: SourceIds,
    allocator: VoiceAllocator,
    mono_lfos: [Lfo; UNITS],
    fx: FxChain,
    tuning: Box<dyn TuningProvider>,
    had_master: bool,
    transport: Transport,
    msegs: [MsegData; UNITS],
    levels: Arc<LevelMeter>,
    sample_rate: f32,
    max_block: usize,
    sidechain_l: Vec<f32>,
    sidechain_r: Vec<f32>,
    poly_sources: Vec<f32>,
    voice_params: Vec<Vec<f32>>,
}

impl core::fmt::Debug for AudioProcessor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AudioProcessor")
            .field("sample_rate", &self.sample_rate)
            .field("max_block", &self.max_block)
            .field("active_voices", &self.allocator.active_count())
            .field("tuning", &self.tuning.scale_name())
            .finish_non_exhaustive()
    }
}

impl AudioProcessor {
    /// Register every parameter and modulation source. The processor is
    /// silent until [`prepare`](Self::prepare) is called.
    pub fn new() -> Result<Self, ModMatrixError> {
        let (layout, descriptors) = ParamLayout::build();
        let (matrix, sources) = build_matrix(&layout, &descriptors)?;
        let param_count = descriptors.len();
        let source_count = matrix.sources().len();
        Ok(Self {
            layout,
            store: Arc::new(ParamStore::new(descriptors)),
            pending_reset: Arc::new(AtomicBool::new(false)),
            matrix,
            sources,
            allocator: VoiceAllocator::new(),
            mono_lfos: core::array::from_fn(|i| Lfo::new(0.0, 0x9E37_79B9 ^ (i as u32 + 1))),
            fx: FxChain::new(),
            tuning: Box::new(EqualTemperament),
            had_master: false,
            transport: Transport::default(),
            msegs: Default::default(),
            levels: Arc::new(LevelMeter::new()),
            sample_rate: 0.0,
            max_block: 0,
            sidechain_l: Vec::new(),
            sidechain_r: Vec::new(),
            poly_sources: vec![0.0; source_count],
            voice_params: vec![vec![0.0; param_count]; MAX_VOICES],
        })
    }

    /// Size every buffer for `max_block` samples at `sample_rate` and reset.
    /// Call only while the audio thread is idle.
    pub fn prepare(&mut self, sample_rate: f32, max_block: usize) {
        self.sample_rate = sample_rate;
        self.max_block = max_block.max(1);
        self.sidechain_l = vec![0.0; self.max_block];
        self.sidechain_r = vec![0.0; self.max_block];
        self.allocator.set_sample_rate(sample_rate);
        for lfo in &mut self.mono_lfos {
            lfo.set_sample_rate(sample_rate);
        }
        self.fx.prepare(sample_rate, SUB_BLOCK);
        self.reset();

        #[cfg(feature = "tracing")]
        tracing::debug!(sample_rate, max_block = self.max_block, "processor prepared");
    }

    /// Silence voices, restart mono LFOs and clear effect tails.
    pub fn reset(&mut self) {
        self.allocator.kill_all();
        for lfo in &mut self.mono_lfos {
            lfo.reset();
        }
        self.fx.reset();
        self.matrix.start_block();
        self.levels.reset();
    }

    /// Sample rate passed to [`prepare`](Self::prepare); 0 before that.
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Parameter indices.
    pub fn layout(&self) -> &ParamLayout {
        &self.layout
    }

    /// The parameter table.
    pub fn params(&self) -> &ParamStore {
        &self.store
    }

    /// Handle for a control thread.
    pub fn preset_handle(&self) -> PresetHandle {
        PresetHandle {
            store: Arc::clone(&self.store),
            pending_reset: Arc::clone(&self.pending_reset),
        }
    }

    /// The modulation matrix.
    pub fn matrix(&self) -> &ModMatrix {
        &self.matrix
    }

    /// Source indices.
    pub fn sources(&self) -> &SourceIds {
        &self.sources
    }

    /// The voice pool.
    pub fn allocator(&self) -> &VoiceAllocator {
        &self.allocator
    }

    /// Voices currently sounding.
    pub fn active_voice_count(&self) -> usize {
        self.allocator.active_count()
    }

    /// Output peak meter, shareable with a UI thread.
    pub fn levels(&self) -> Arc<LevelMeter> {
        Arc::clone(&self.levels)
    }

    /// Host tempo and playhead for the next block.
    pub fn set_transport(&mut self, transport: Transport) {
        self.transport = transport;
    }

    /// Replace the note-to-frequency mapping.
    pub fn set_tuning(&mut self, tuning: Box<dyn TuningProvider>) {
        self.tuning = tuning;
    }

    /// MSEG table `index`.
    pub fn mseg(&self, index: usize) -> Option<&MsegData> {
        self.msegs.get(index)
    }

    /// Replace MSEG table `index` after validating it.
    pub fn set_mseg(&mut self, index: usize, data: MsegData) -> Result<(), StateError> {
        data.validate()?;
        if let Some(slot) = self.msegs.get_mut(index) {
            *slot = data;
        }
        Ok(())
    }

    /// Route a source to a parameter by their patch ids.
    pub fn connect(
        &mut self,
        source: &str,
        param: &str,
        depth: f32,
        curve: ModCurve,
    ) -> Result<(), StateError> {
        let (source, param) = self.lookup(source, param)?;
        self.matrix.connect(source, param, depth, curve)?;
        Ok(())
    }

    /// Remove a route by patch ids. Returns false if there was none.
    pub fn disconnect(&mut self, source: &str, param: &str) -> Result<bool, StateError> {
        let (source, param) = self.lookup(source, param)?;
        Ok(self.matrix.disconnect(source, param))
    }

    fn lookup(&self, source: &str, param: &str) -> Result<(ModSourceId, ParamId), StateError> {
        let source = self
            .matrix
            .find_source(source)
            .ok_or_else(|| StateError::UnknownSource(String::from(source)))?;
        let param = self
            .store
            .find(param)
            .ok_or_else(|| StateError::UnknownParameter(String::from(param)))?;
        Ok((source, param))
    }

    /// Snapshot of the current patch.
    pub fn state(&self) -> PatchState {
        let mut state = PatchState::default();
        self.update_state(&mut state);
        state
    }

    /// Write everything that defines the sound into `state`.
    pub fn update_state(&self, state: &mut PatchState) {
        state.values = self
            .store
            .descriptors()
            .iter()
            .map(|d| (String::from(d.string_id), self.store.value(d.id)))
            .collect();
        state.connections = self
            .matrix
            .connections()
            .iter()
            .filter_map(|c| {
                Some(ModConnection {
                    source: String::from(self.matrix.source(c.source)?.id),
                    param: String::from(self.store.descriptor(c.param)?.string_id),
                    depth: c.depth,
                    curve: c.curve,
                })
            })
            .collect();
        state.msegs = self.msegs.to_vec();
    }

    /// Apply a patch. On error nothing is changed.
    ///
    /// Parameters missing from the patch return to their defaults. Voices
    /// are silenced at the start of the next block.
    pub fn load_state(&mut self, state: &PatchState) -> Result<(), StateError> {
        let mut values = Vec::with_capacity(state.values.len());
        for (id, &value) in &state.values {
            let param = self
                .store
                .find(id)
                .ok_or_else(|| StateError::UnknownParameter(id.clone()))?;
            if !value.is_finite() {
                return Err(StateError::NonFiniteValue { param: id.clone() });
            }
            values.push((param, value));
        }
        let mut routes = Vec::with_capacity(state.connections.len());
        for c in &state.connections {
            let (source, param) = self.lookup(&c.source, &c.param)?;
            if !c.depth.is_finite() {
                return Err(StateError::NonFiniteValue {
                    param: c.param.clone(),
                });
            }
            routes.push((source, param, c.depth, c.curve));
        }
        for mseg in &state.msegs {
            mseg.validate()?;
        }

        let previous = self.matrix.connections().to_vec();
        self.matrix.clear_connections();
        for (source, param, depth, curve) in routes {
            if let Err(e) = self.matrix.connect(source, param, depth, curve) {
                self.matrix.clear_connections();
                for c in previous {
                    let restored = self.matrix.connect(c.source, c.param, c.depth, c.curve);
                    #[cfg(feature = "tracing")]
                    if let Err(error) = &restored {
                        tracing::warn!(%error, "previous connection not restored");
                    }
                    debug_assert!(restored.is_ok(), "previous connections were accepted before");
                }
                return Err(e.into());
            }
        }

        self.store.reset_to_defaults();
        for (param, value) in values {
            self.store.set_value(param, value);
        }
        for (i, slot) in self.msegs.iter_mut().enumerate() {
            *slot = state.msegs.get(i).cloned().unwrap_or_default();
        }
        self.state_updated();
        self.pending_reset.store(true, Ordering::Release);
        Ok(())
    }

    /// Re-derive state that is not parameter-backed after the parameter
    /// table changed underneath the processor.
    pub fn state_updated(&mut self) {
        for mseg in &mut self.msegs {
            if mseg.validate().is_err() {
                mseg.reset();
            }
        }
        #[cfg(feature = "tracing")]
        tracing::debug!(connections = self.matrix.connections().len(), "patch state applied");
    }

    /// Render one block. `left`/`right` carry the sidechain input on entry
    /// and the instrument output on return. `midi` must be sorted by
    /// `sample_offset`; events past the end of the block apply at its end.
    pub fn process_block(&mut self, left: &mut [f32], right: &mut [f32], midi: &[MidiEvent]) {
        let len = left.len().min(right.len());
        if self.pending_reset.swap(false, Ordering::AcqRel) {
            self.allocator.kill_all();
            self.fx.reset();
            #[cfg(feature = "tracing")]
            tracing::debug!("pending reset consumed");
        }

        let has_master = self.tuning.has_master();
        if has_master != self.had_master {
            self.had_master = has_master;
            #[cfg(feature = "tracing")]
            tracing::info!(
                connected = has_master,
                scale = self.tuning.scale_name(),
                "tuning master changed"
            );
        }

        if self.sample_rate <= 0.0 || self.max_block == 0 {
            left.fill(0.0);
            right.fill(0.0);
            return;
        }

        let mut start = 0;
        let mut first_event = 0;
        while start < len {
            let end = (start + self.max_block).min(len);
            let last = end == len;
            let split = if last {
                midi.len()
            } else {
                first_event + midi[first_event..].partition_point(|e| e.sample_offset < end)
            };
            self.process_chunk(
                &mut left[start..end],
                &mut right[start..end],
                &midi[first_event..split],
                start,
            );
            first_event = split;
            start = end;
        }

        self.levels.track(&left[..len], &right[..len], self.sample_rate);
    }

    fn process_chunk(
        &mut self,
        left: &mut [f32],
        right: &mut [f32],
        events: &[MidiEvent],
        base: usize,
    ) {
        let n = left.len();
        let sidechain = self.store.value(self.layout.global.sidechain) >= 0.5;
        if sidechain {
            self.sidechain_l[..n].copy_from_slice(left);
            self.sidechain_r[..n].copy_from_slice(&right[..n]);
        }
        left.fill(0.0);
        right.fill(0.0);

        let settings = self.performance_settings();
        self.allocator.apply_settings(settings);
        self.matrix.start_block();

        let mut next_event = 0;
        let mut pos = 0;
        while pos < n {
            let end = (pos + SUB_BLOCK).min(n);
            self.update_params(end - pos);

            let mut cursor = pos;
            while let Some(event) = events.get(next_event) {
                let offset = event.sample_offset.saturating_sub(base);
                if offset >= end && end < n {
                    break;
                }
                let at = offset.clamp(cursor, end);
                self.render_voices(&mut left[cursor..at], &mut right[cursor..at]);
                cursor = at;
                self.handle_midi(&event.message);
                self.refresh_started_voices(end - cursor);
                next_event += 1;
            }
            self.render_voices(&mut left[cursor..end], &mut right[cursor..end]);

            let sc = sidechain.then(|| (&self.sidechain_l[pos..end], &self.sidechain_r[pos..end]));
            self.fx.process(&mut left[pos..end], &mut right[pos..end], sc);
            self.matrix.finish_block(end - pos);
            pos = end;
        }
    }

    fn performance_settings(&self) -> PerformanceSettings {
        let g = &self.layout.global;
        let s = &self.store;
        PerformanceSettings {
            mono: s.value(g.mono) >= 0.5,
            legato: s.value(g.legato) >= 0.5,
            glide: GlideMode::from_index(libm::roundf(s.value(g.glide_mode).max(0.0)) as usize),
            glide_seconds: s.processed(g.glide_rate),
            voices: libm::roundf(s.value(g.voices).max(0.0)) as usize,
            mpe: s.value(g.mpe) >= 0.5,
            pitchbend_range: s.value(g.pitchbend_range),
        }
    }

    fn handle_midi(&mut self, message: &MidiMessage) {
        if let MidiMessage::ControlChange {
            controller, value, ..
        } = *message
        {
            let macros = &self.layout.macros;
            let learn = libm::roundf(self.store.value(macros.learn));
            if learn >= 0.0 {
                if let Some(&cc) = macros.cc.get(learn as usize) {
                    self.store.set_value(cc, f32::from(controller));
                }
                self.store.set_value(macros.learn, -1.0);
            }
            for (&cc, &target) in macros.cc.iter().zip(&macros.values) {
                if libm::roundf(self.store.value(cc)) == f32::from(controller) {
                    self.store.set_value(target, value);
                }
            }
        }
        self.allocator.handle(message);
    }

    /// Mono sources, effect parameters, then every active voice.
    fn update_params(&mut self, samples: usize) {
        let layout = &self.layout;
        let sources = self.sources;
        let bpm = self.transport.bpm;
        let mod_wheel = self.allocator.mod_wheel();
        let bend = self.allocator.pitch_bend();
        let mono_lfos = &mut self.mono_lfos;

        self.matrix.resolve_mono_sources(&self.store, |source, view| {
            if source == sources.mod_wheel {
                return mod_wheel;
            }
            if source == sources.pitch_bend {
                return bend;
            }
            if let Some(i) = sources.mono_lfo.iter().position(|&s| s == source) {
                let ids = &layout.lfo[i];
                let enabled = view.processed(ids.enable) >= 0.5;
                let frequency = if view.processed(ids.sync) >= 0.5 {
                    note_duration(view.processed(ids.beat)).to_hz(bpm)
                } else {
                    view.processed(ids.rate)
                };
                let lfo = &mut mono_lfos[i];
                lfo.set_params(LfoParams {
                    shape: LfoShape::from_value(view.processed(ids.wave)),
                    frequency,
                    phase: view.processed(ids.phase),
                    offset: if enabled { view.processed(ids.offset) } else { 0.0 },
                    depth: if enabled { view.processed(ids.depth) } else { 0.0 },
                    delay: 0.0,
                    fade: 0.0,
                });
                return lfo.process(samples);
            }
            if let Some(i) = sources.macros.iter().position(|&s| s == source) {
                return view.value(layout.macros.values[i]);
            }
            0.0
        });

        let fx = fx_params(&self.layout, &self.matrix, bpm);
        self.fx.set_params(&fx);

        for i in 0..self.allocator.voices().len() {
            if self.allocator.voices()[i].is_active() {
                self.refresh_voice(i, samples);
            }
        }
    }

    fn refresh_started_voices(&mut self, samples: usize) {
        for i in 0..self.allocator.voices().len() {
            if self.allocator.voices()[i].needs_update() {
                self.refresh_voice(i, samples);
            }
        }
    }

    fn refresh_voice(&mut self, index: usize, samples: usize) {
        let pitch_bend = self.allocator.pitch_bend_semitones();
        let Some(voice) = self.allocator.voices_mut().get_mut(index) else {
            return;
        };
        let Some(params) = self.voice_params.get_mut(index) else {
            return;
        };
        voice.fill_poly_sources(&self.sources.poly, &mut self.poly_sources);
        self.matrix.resolve_poly_destinations(&self.poly_sources, params);
        let ctx = VoiceContext {
            params: params.as_slice(),
            layout: &self.layout,
            tuning: self.tuning.as_ref(),
            transport: &self.transport,
            msegs: &self.msegs,
            pitch_bend,
        };
        voice.update_params(&ctx, samples);
    }

    fn render_voices(&mut self, left: &mut [f32], right: &mut [f32]) {
        if left.is_empty() {
            return;
        }
        let pitch_bend = self.allocator.pitch_bend_semitones();
        for (voice, params) in self.allocator.voices_mut().iter_mut().zip(&self.voice_params) {
            if !voice.is_active() {
                continue;
            }
            let ctx = VoiceContext {
                params: params.as_slice(),
                layout: &self.layout,
                tuning: self.tuning.as_ref(),
                transport: &self.transport,
                msegs: &self.msegs,
                pitch_bend,
            };
            voice.render(&ctx, left, right);
        }
    }
}

/// Effect settings for one sub-block from mono-resolved parameter values.
fn fx_params(layout: &ParamLayout, m: &ModMatrix, bpm: f32) -> FxParams {
    let p = |id: ParamId| m.processed(id);
    let on = |id: ParamId| m.processed(id) >= 0.5;
    let index = |id: ParamId| libm::roundf(m.processed(id).max(0.0)) as usize;

    let ws = &layout.waveshaper;
    let dy = &layout.dynamics;
    let dl = &layout.delay;
    let ch = &layout.chorus;
    let rv = &layout.reverb;
    let mb = &layout.multiband;
    let rm = &layout.ring_mod;

    let (time_left, time_right) = if on(dl.sync) {
        (
            note_duration(p(dl.beats_left)).to_seconds(bpm),
            note_duration(p(dl.beats_right)).to_seconds(bpm),
        )
    } else {
        (p(dl.time_left), p(dl.time_right))
    };

    let lane = |l: usize| {
        let ids = &layout.fx_order.lanes[l];
        LaneParams {
            slots: core::array::from_fn(|s| {
                let value = index(ids.slots[s]);
                debug_assert!(value < FxSlot::ALL.len(), "slot value {value} out of range");
                FxSlot::from_index(value).unwrap_or_default()
            }),
            gain: p(ids.gain),
            filter: FilterKind::from_index(index(ids.kind)).unwrap_or_default(),
            cutoff_hz: p(ids.freq),
            resonance: p(ids.res),
            pan: p(ids.pan),
            post: on(ids.post),
        }
    };

    FxParams {
        slot_gain: p(layout.fx_gain),
        output_gain: p(layout.global.level),
        waveshaper: WaveshaperParams {
            drive_db: p(ws.drive),
            gain_db: p(ws.gain),
            dry: p(ws.dry),
            wet: p(ws.wet),
            function: ShaperFunction::from_index(index(ws.function)).unwrap_or_default(),
            high_shelf_hz: p(ws.high_shelf),
            shelf_q: p(ws.shelf_q),
            lowpass_hz: p(ws.lowpass),
        },
        dynamics: DynamicsParams {
            threshold_db: p(dy.threshold),
            ratio: p(dy.ratio),
            attack: p(dy.attack),
            release: p(dy.release),
            knee_db: p(dy.knee),
            input_gain: p(dy.input),
            output_gain: p(dy.output),
            mode: DynamicsMode::from_index(index(dy.mode)).unwrap_or_default(),
        },
        delay: DelayParams {
            time_left,
            time_right,
            feedback: p(dl.feedback),
            wet: p(dl.wet),
            dry: p(dl.dry),
            cutoff_hz: p(dl.cutoff),
            ping_pong: on(dl.ping_pong),
            freeze: on(dl.freeze),
        },
        chorus: ChorusParams {
            rate_hz: p(ch.rate),
            depth: p(ch.depth),
            delay_ms: p(ch.delay),
            feedback: p(ch.feedback),
            dry: p(ch.dry),
            wet: p(ch.wet),
        },
        reverb: ReverbParams {
            size: p(rv.size),
            decay: p(rv.decay),
            damping_hz: p(rv.damping),
            lowpass_hz: p(rv.lowpass),
            predelay: p(rv.predelay),
            dry: p(rv.dry),
            wet: p(rv.wet),
        },
        multiband: MultibandParams {
            low: BandParams::new(p(mb.low_freq), p(mb.low_gain), p(mb.low_q)),
            peak: BandParams::new(p(mb.peak_freq), p(mb.peak_gain), p(mb.peak_q)),
            high: BandParams::new(p(mb.high_freq), p(mb.high_gain), p(mb.high_q)),
        },
        ring_mod: RingModParams {
            freq: [p(rm.freq[0]), p(rm.freq[1])],
            shape: [p(rm.shape[0]), p(rm.shape[1])],
            mix: [p(rm.mix[0]), p(rm.mix[1])],
            spread: p(rm.spread),
            low_cut: p(rm.low_cut),
            high_cut: p(rm.high_cut),
        },
        lanes: [lane(0), lane(1)],
        chain_a_to_b: on(layout.fx_order.chain_a_to_b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mseg::MsegPoint;

    fn prepared() -> AudioProcessor {
        let mut p = AudioProcessor::new().unwrap();
        p.prepare(48000.0, 512);
        p
    }

    fn note_on(offset: usize, note: u8) -> MidiEvent {
        MidiEvent::new(
            offset,
            MidiMessage::NoteOn {
                channel: 0,
                note,
                velocity: 1.0,
            },
        )
    }

    fn run(p: &mut AudioProcessor, len: usize, midi: &[MidiEvent]) -> (Vec<f32>, Vec<f32>) {
        let mut left = vec![0.0; len];
        let mut right = vec![0.0; len];
        p.process_block(&mut left, &mut right, midi);
        (left, right)
    }

    #[test]
    fn test_sources_registered_densely() {
        let p = AudioProcessor::new().unwrap();
        let ids: Vec<&str> = p.matrix().sources().iter().map(|s| s.id).collect();
        assert_eq!(ids.len(), 28);
        assert_eq!(&ids[..7], ["mpep", "mpet", "mw", "pb", "polyAT", "note", "vel"]);
        assert_eq!(ids[7], "mlfo1");
        assert_eq!(ids[27], "macro4");
        assert_eq!(p.sources().macros[3], ModSourceId(27));
    }

    #[test]
    fn test_internal_params_not_destinations() {
        let p = AudioProcessor::new().unwrap();
        assert!(!p.matrix().is_destination(p.layout().global.mono));
        assert!(p.matrix().is_destination(p.layout().timbre.blend));
    }

    #[test]
    fn test_silent_without_notes() {
        let mut p = prepared();
        let (left, right) = run(&mut p, 1024, &[]);
        assert!(left.iter().chain(&right).all(|&s| s == 0.0));
    }

    #[test]
    fn test_unprepared_is_silent() {
        let mut p = AudioProcessor::new().unwrap();
        let (left, _) = run(&mut p, 64, &[note_on(0, 60)]);
        assert!(left.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_note_renders_bounded_audio() {
        let mut p = prepared();
        let (left, right) = run(&mut p, 4096, &[note_on(0, 60)]);
        assert!(left.iter().chain(&right).all(|s| s.is_finite() && s.abs() <= 1.0));
        assert!(left.iter().any(|&s| s.abs() > 1e-3), "note should sound");
        assert!(p.levels().peak() > 0.0);
    }

    #[test]
    fn test_event_offset_is_sample_accurate() {
        let mut p = prepared();
        let (left, _) = run(&mut p, 256, &[note_on(100, 60)]);
        assert!(left[..100].iter().all(|&s| s == 0.0), "silent before the event");
        assert!(left[100..].iter().any(|&s| s != 0.0));
    }

    #[test]
    fn test_long_block_is_chunked() {
        let mut p = prepared();
        let (left, _) = run(&mut p, 2000, &[note_on(1500, 64)]);
        assert!(left[..1500].iter().all(|&s| s == 0.0));
        assert_eq!(p.active_voice_count(), 1);
    }

    #[test]
    fn test_pending_reset_kills_voices() {
        let mut p = prepared();
        run(&mut p, 128, &[note_on(0, 60)]);
        assert_eq!(p.active_voice_count(), 1);
        p.preset_handle().request_reset();
        assert!(p.preset_handle().reset_pending());
        run(&mut p, 128, &[]);
        assert_eq!(p.active_voice_count(), 0);
        assert!(!p.preset_handle().reset_pending());
    }

    #[test]
    fn test_state_round_trip() {
        let mut p = prepared();
        p.params().set_value(p.layout().timbre.blend, 0.4);
        p.connect("lfo1", "equant", 0.5, ModCurve::Linear).unwrap();
        let state = p.state();

        let mut q = prepared();
        q.load_state(&state).unwrap();
        assert_eq!(q.params().value(q.layout().timbre.blend), 0.4);
        assert_eq!(q.state(), state);
    }

    #[test]
    fn test_load_state_rejects_unknown_param() {
        let mut p = prepared();
        let mut state = PatchState::default();
        state.set("nonsense", 1.0);
        assert_eq!(
            p.load_state(&state),
            Err(StateError::UnknownParameter(String::from("nonsense")))
        );
        assert!(!p.preset_handle().reset_pending(), "failed load changes nothing");
    }

    #[test]
    fn test_load_state_rejects_poly_to_mono_and_keeps_routes() {
        let mut p = prepared();
        p.connect("macro1", "blend", 0.3, ModCurve::Linear).unwrap();
        let mut state = PatchState::default();
        state.connect("env1", "level", 1.0, ModCurve::Linear);
        assert!(matches!(
            p.load_state(&state),
            Err(StateError::Matrix(ModMatrixError::PolySourceToMonoParameter { .. }))
        ));
        let routes = p.matrix().connections();
        assert_eq!(routes.len(), 1, "earlier route restored");
        assert_eq!(routes[0].depth, 0.3);
    }

    #[test]
    fn test_mono_lfo_cannot_modulate_its_own_rate() {
        let mut p = prepared();
        let err = p.connect("mlfo1", "lfo1rate", 0.5, ModCurve::Linear);
        assert!(matches!(err, Err(StateError::Matrix(ModMatrixError::Cycle(_)))));
        p.connect("mlfo2", "lfo1rate", 0.5, ModCurve::Linear).unwrap();
    }

    #[test]
    fn test_macro_cc_learn() {
        let mut p = prepared();
        let macros = p.layout().macros;
        p.params().set_value(macros.learn, 2.0);
        let cc = |value| {
            MidiEvent::new(
                0,
                MidiMessage::ControlChange {
                    channel: 0,
                    controller: 20,
                    value,
                },
            )
        };
        run(&mut p, 32, &[cc(0.5)]);
        assert_eq!(p.params().value(macros.cc[2]), 20.0);
        assert_eq!(p.params().value(macros.learn), -1.0);
        run(&mut p, 32, &[cc(0.75)]);
        assert_eq!(p.params().value(macros.values[2]), 0.75);
    }

    #[test]
    fn test_macro_drives_parameter() {
        let mut p = prepared();
        p.params().set_value(p.layout().macros.values[0], 1.0);
        p.connect("macro1", "blend", 0.5, ModCurve::Linear).unwrap();
        run(&mut p, 32, &[]);
        assert!((p.matrix().value(p.layout().timbre.blend) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_invalid_mseg_rejected() {
        let mut p = prepared();
        let bad = MsegData {
            points: vec![MsegPoint::new(0.5, 0.0)],
        };
        assert!(p.set_mseg(0, bad).is_err());
        assert_eq!(p.mseg(0), Some(&MsegData::default()));
    }
}
