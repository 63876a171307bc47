//! The synth voice: four quadrature oscillators composed as epicycles.
//!
//! Each oscillator traces a circle whose radius is its volume times the
//! level of the envelope it selects. The algorithm decides which sums of
//! circles are observed; observed outputs are averaged into one position
//! per channel, and that position is then read either directly (a blend of
//! its `y` and `x` coordinates) or through the equant, where the sine of the
//! angle seen from a point offset along `x` is taken instead.
//!
//! ## Algorithms
//!
//! ```text
//! 0  1-2-3-(4)             p1 + p2 + p3 + p4
//! 1  1-2-(3), 2-(4)        p1 + p2 + (p3 + p4) / 2
//! 2  1-(2), 1-3-(4)        p1 + (p2 + p3 + p4) / 2
//! 3  1-(2), 1-(3), 1-(4)   p1 + (p2 + p3 + p4) / 3
//! ```

use orrery_core::{
    Effect, FilterKind, MultimodeFilter, Transport, flush_denormal, lerp, midi_note_to_hz,
    note_duration, resonance_to_q,
};

use crate::allocator::GlideMode;
use crate::envelope::{Envelope, EnvelopeParams, RepeatMode};
use crate::lfo::{Lfo, LfoParams, LfoShape};
use crate::mod_matrix::ModSourceId;
use crate::mseg::{Mseg, MsegData, MsegParams};
use crate::params::{ParamLayout, UNITS};
use crate::quad_osc::{QuadOscParams, QuadOscillator, StereoPosition};
use crate::tuning::TuningProvider;

/// Frequency of a fixed-pitch oscillator at ratio 1.
pub const FIXED_BASE_HZ: f32 = 100.0;

/// Range of per-note MPE pitch bend in semitones.
pub const MPE_BEND_RANGE: f32 = 48.0;

const OUTPUT_SCALE: f32 = 0.5;

/// Everything a voice reads while updating and rendering one sub-block.
#[derive(Clone, Copy)]
pub struct VoiceContext<'a> {
    /// Processed parameter values for this voice, indexed by [`ParamId`](orrery_core::ParamId).
    pub params: &'a [f32],
    /// Parameter indices.
    pub layout: &'a ParamLayout,
    /// Note-to-frequency mapping.
    pub tuning: &'a dyn TuningProvider,
    /// Host tempo.
    pub transport: &'a Transport,
    /// MSEG tables shared by all voices.
    pub msegs: &'a [MsegData; UNITS],
    /// Global pitch bend in semitones, added to every voice.
    pub pitch_bend: f32,
}

impl VoiceContext<'_> {
    #[inline]
    fn get(&self, id: orrery_core::ParamId) -> f32 {
        self.params.get(id.index()).copied().unwrap_or(0.0)
    }

    #[inline]
    fn flag(&self, id: orrery_core::ParamId) -> bool {
        self.get(id) >= 0.5
    }

    #[inline]
    fn index(&self, id: orrery_core::ParamId) -> usize {
        libm::roundf(self.get(id).max(0.0)) as usize
    }
}

/// Indices of the poly modulation sources a voice feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolySourceIds {
    /// Per-note pitch bend, −1..1 over ±48 semitones.
    pub mpe_bend: ModSourceId,
    /// Per-note timbre (CC74).
    pub mpe_timbre: ModSourceId,
    /// Per-note pressure.
    pub pressure: ModSourceId,
    /// Note number over 127.
    pub note: ModSourceId,
    /// Strike velocity.
    pub velocity: ModSourceId,
    /// Poly LFOs.
    pub lfo: [ModSourceId; UNITS],
    /// Envelopes.
    pub env: [ModSourceId; UNITS],
    /// MSEGs.
    pub mseg: [ModSourceId; UNITS],
}

/// Sum the oscillator contributions the way `algorithm` observes them.
///
/// Works for positions and for scalar radii alike.
#[inline]
pub fn compose<T>(algorithm: usize, p: [T; UNITS]) -> T
where
    T: Copy + core::ops::Add<Output = T> + core::ops::Mul<f32, Output = T>,
{
    let [p1, p2, p3, p4] = p;
    match algorithm {
        0 => p1 + p2 + p3 + p4,
        1 => p1 + p2 + (p3 + p4) * 0.5,
        2 => p1 + (p2 + p3 + p4) * 0.5,
        _ => p1 + (p2 + p3 + p4) * (1.0 / 3.0),
    }
}

/// Observation settings, cached once per sub-block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observer {
    /// Mix of `x` into the direct reading, 0..1.
    pub blend: f32,
    /// Equant offset as a fraction of the path radius.
    pub equant: f32,
    /// Mix of the demodulated reading, 0..1.
    pub demod_mix: f32,
    /// Gain of the demodulated reading.
    pub demod_vol: f32,
}

impl Default for Observer {
    fn default() -> Self {
        Self {
            blend: 0.0,
            equant: 0.0,
            demod_mix: 0.0,
            demod_vol: 2.0,
        }
    }
}

impl Observer {
    /// Read one channel of a composed position with the given path radius.
    ///
    /// ```rust
    /// use orrery_synth::Observer;
    ///
    /// let direct = Observer::default();
    /// assert_eq!(direct.observe(0.3, 0.4, 1.0), 0.4);
    ///
    /// let demod = Observer { demod_mix: 1.0, ..Observer::default() };
    /// assert!((demod.observe(0.0, 0.5, 1.0) - 1.0).abs() < 1e-6);
    /// ```
    #[inline]
    pub fn observe(&self, x: f32, y: f32, path_radius: f32) -> f32 {
        let raw = (1.0 - self.blend) * y + self.blend * x;
        if self.demod_mix <= 0.0 {
            return raw;
        }
        let dx = x - self.equant * path_radius;
        let len = libm::sqrtf(dx * dx + y * y);
        let demod = if len < 1e-9 {
            0.0
        } else {
            y / len * path_radius * self.demod_vol * 0.5
        };
        lerp(raw, demod, self.demod_mix)
    }
}

#[derive(Debug, Clone, Copy)]
struct Glide {
    mode: GlideMode,
    from: f32,
    to: f32,
    total: u32,
    elapsed: u32,
}

impl Glide {
    fn at(note: f32) -> Self {
        Self {
            mode: GlideMode::Off,
            from: note,
            to: note,
            total: 0,
            elapsed: 0,
        }
    }

    fn current(&self) -> f32 {
        if self.mode == GlideMode::Off || self.elapsed >= self.total {
            return self.to;
        }
        let t = self.elapsed as f32 / self.total as f32;
        match self.mode {
            GlideMode::Glissando => self.from + libm::roundf((self.to - self.from) * t),
            _ => lerp(self.from, self.to, t),
        }
    }
}

/// One unit of polyphony.
#[derive(Debug, Clone)]
pub struct Voice {
    oscs: [QuadOscillator; UNITS],
    envs: [Envelope; UNITS],
    lfos: [Lfo; UNITS],
    msegs: [Mseg; UNITS],
    filter: MultimodeFilter,
    sample_rate: f32,

    active: bool,
    released: bool,
    note: u8,
    channel: u8,
    velocity: f32,
    age: u64,
    glide: Glide,
    note_bend: f32,
    pressure: f32,
    timbre: f32,
    phase_reset_pending: bool,

    volume: [f32; UNITS],
    env_select: [usize; UNITS],
    algorithm: usize,
    observer: Observer,
    velocity_gain: f32,
    filter_enabled: bool,
}

impl Voice {
    /// Idle voice. `index` decorrelates its random LFO shapes from other voices.
    pub fn new(index: usize) -> Self {
        let seed = |i: usize| (index * UNITS + i + 1) as u32;
        Self {
            oscs: core::array::from_fn(|_| QuadOscillator::new()),
            envs: core::array::from_fn(|_| Envelope::new(0.0)),
            lfos: core::array::from_fn(|i| Lfo::new(0.0, seed(i))),
            msegs: core::array::from_fn(|_| Mseg::new(0.0)),
            filter: MultimodeFilter::default(),
            sample_rate: 0.0,
            active: false,
            released: false,
            note: 0,
            channel: 0,
            velocity: 0.0,
            age: 0,
            glide: Glide::at(0.0),
            note_bend: 0.0,
            pressure: 0.0,
            timbre: 0.0,
            phase_reset_pending: false,
            volume: [0.0; UNITS],
            env_select: [0, 1, 2, 3],
            algorithm: 0,
            observer: Observer::default(),
            velocity_gain: 1.0,
            filter_enabled: false,
        }
    }

    /// Change the sample rate of every component. Kills the voice.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        for osc in &mut self.oscs {
            osc.set_sample_rate(sample_rate);
        }
        for env in &mut self.envs {
            env.set_sample_rate(sample_rate);
        }
        for lfo in &mut self.lfos {
            lfo.set_sample_rate(sample_rate);
        }
        for mseg in &mut self.msegs {
            mseg.set_sample_rate(sample_rate);
        }
        if sample_rate > 0.0 {
            self.filter.set_sample_rate(sample_rate);
        }
        self.kill();
    }

    /// Begin a note. Phases reset at the next [`update_params`](Self::update_params).
    pub fn start_note(&mut self, note: u8, velocity: f32, channel: u8, age: u64) {
        self.active = true;
        self.released = false;
        self.note = note;
        self.channel = channel;
        self.velocity = velocity.clamp(0.0, 1.0);
        self.age = age;
        self.glide = Glide::at(f32::from(note));
        self.note_bend = 0.0;
        self.pressure = 0.0;
        self.timbre = 0.0;
        self.phase_reset_pending = true;
        for env in &mut self.envs {
            env.note_on();
        }
        for lfo in &mut self.lfos {
            lfo.note_on();
        }
    }

    /// Slide from `from_note` to the current note over `seconds`.
    pub fn set_glide(&mut self, from_note: f32, mode: GlideMode, seconds: f32) {
        let total = libm::roundf(seconds.max(0.0) * self.sample_rate) as u32;
        self.glide = Glide {
            mode,
            from: from_note,
            to: f32::from(self.note),
            total,
            elapsed: 0,
        };
    }

    /// Move to a new note without retriggering envelopes or phases.
    pub fn legato_to(&mut self, note: u8, mode: GlideMode, seconds: f32) {
        let from = self.glide.current();
        self.note = note;
        self.released = false;
        if mode == GlideMode::Off {
            self.glide = Glide::at(f32::from(note));
        } else {
            self.set_glide(from, mode, seconds);
        }
    }

    /// Release the envelopes.
    pub fn note_off(&mut self) {
        if !self.active || self.released {
            return;
        }
        self.released = true;
        for env in &mut self.envs {
            env.note_off();
        }
    }

    /// Silence immediately.
    pub fn kill(&mut self) {
        self.active = false;
        self.released = false;
        for env in &mut self.envs {
            env.reset();
        }
        self.filter.reset();
    }

    /// Sounding, including the release tail.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Started since the last parameter update, so phases and the filter
    /// have not been reset yet.
    pub fn needs_update(&self) -> bool {
        self.active && self.phase_reset_pending
    }

    /// Key released but the tail is still sounding.
    pub fn is_released(&self) -> bool {
        self.active && self.released
    }

    /// MIDI note.
    pub fn note(&self) -> u8 {
        self.note
    }

    /// MIDI channel the note arrived on.
    pub fn channel(&self) -> u8 {
        self.channel
    }

    /// Allocation stamp; larger is newer.
    pub fn age(&self) -> u64 {
        self.age
    }

    /// Strike velocity, 0..1.
    pub fn velocity(&self) -> f32 {
        self.velocity
    }

    /// Note including glide, before pitch bend.
    pub fn current_note(&self) -> f32 {
        self.glide.current()
    }

    /// Per-note pitch bend in semitones.
    pub fn set_pitch_bend(&mut self, semitones: f32) {
        self.note_bend = semitones.clamp(-MPE_BEND_RANGE, MPE_BEND_RANGE);
    }

    /// Per-note pressure, 0..1.
    pub fn set_pressure(&mut self, pressure: f32) {
        self.pressure = pressure.clamp(0.0, 1.0);
    }

    /// Per-note timbre, 0..1.
    pub fn set_timbre(&mut self, timbre: f32) {
        self.timbre = timbre.clamp(0.0, 1.0);
    }

    /// Envelope levels, for display and tests.
    pub fn envelope_levels(&self) -> [f32; UNITS] {
        core::array::from_fn(|i| self.envs[i].level())
    }

    /// Oscillator `index`.
    pub fn oscillator(&self, index: usize) -> Option<&QuadOscillator> {
        self.oscs.get(index)
    }

    /// Write this voice's poly source values into `out`, indexed by source.
    pub fn fill_poly_sources(&self, ids: &PolySourceIds, out: &mut [f32]) {
        let mut put = |id: ModSourceId, value: f32| {
            if let Some(slot) = out.get_mut(id.index()) {
                *slot = value;
            }
        };
        put(ids.mpe_bend, (self.note_bend / MPE_BEND_RANGE).clamp(-1.0, 1.0));
        put(ids.mpe_timbre, self.timbre);
        put(ids.pressure, self.pressure);
        put(ids.note, f32::from(self.note) / 127.0);
        put(ids.velocity, self.velocity);
        for i in 0..UNITS {
            put(ids.lfo[i], self.lfos[i].output());
            put(ids.env[i], self.envs[i].level());
            put(ids.mseg[i], self.msegs[i].output());
        }
    }

    /// Pull this sub-block's resolved parameters into the components and
    /// advance glide by `samples`.
    pub fn update_params(&mut self, ctx: &VoiceContext<'_>, samples: usize) {
        let layout = ctx.layout;
        let bpm = ctx.transport.bpm;

        for (i, env) in self.envs.iter_mut().enumerate() {
            let ids = &layout.env[i];
            let repeat = RepeatMode::from_value(ctx.get(ids.repeat));
            let repeat_seconds = match repeat {
                RepeatMode::Sync => note_duration(ctx.get(ids.beat)).to_seconds(bpm),
                _ => ctx.get(ids.time),
            };
            env.set_params(EnvelopeParams {
                attack: ctx.get(ids.attack),
                decay: ctx.get(ids.decay),
                sustain: ctx.get(ids.sustain),
                release: ctx.get(ids.release),
                attack_curve: ctx.get(ids.attack_curve),
                decay_curve: ctx.get(ids.decay_curve),
                repeat,
                repeat_seconds,
            });
        }

        for (i, lfo) in self.lfos.iter_mut().enumerate() {
            let ids = &layout.lfo[i];
            let enabled = ctx.flag(ids.enable);
            let frequency = if ctx.flag(ids.sync) {
                note_duration(ctx.get(ids.beat)).to_hz(bpm)
            } else {
                ctx.get(ids.rate)
            };
            lfo.set_params(LfoParams {
                shape: LfoShape::from_value(ctx.get(ids.wave)),
                frequency,
                phase: ctx.get(ids.phase),
                offset: if enabled { ctx.get(ids.offset) } else { 0.0 },
                depth: if enabled { ctx.get(ids.depth) } else { 0.0 },
                delay: ctx.get(ids.delay),
                fade: ctx.get(ids.fade),
            });
        }

        for (i, mseg) in self.msegs.iter_mut().enumerate() {
            let ids = &layout.mseg[i];
            let enabled = ctx.flag(ids.enable);
            let frequency = if ctx.flag(ids.sync) {
                note_duration(ctx.get(ids.beat)).to_hz(bpm)
            } else {
                ctx.get(ids.rate)
            };
            mseg.set_params(MsegParams {
                frequency,
                depth: if enabled { ctx.get(ids.depth) } else { 0.0 },
                phase: ctx.get(ids.phase),
                offset: if enabled { ctx.get(ids.offset) } else { 0.0 },
                looping: ctx.flag(ids.looping),
            });
        }

        let note = self.glide.current();
        let bent = note + self.note_bend + ctx.pitch_bend;
        let note_hz = ctx.tuning.note_to_hz(bent, self.channel);
        let pitch = ctx.get(layout.timbre.pitch);
        for (i, osc) in self.oscs.iter_mut().enumerate() {
            let ids = &layout.osc[i];
            let ratio = (ctx.get(ids.coarse) + ctx.get(ids.fine)).max(0.01);
            let frequency = if ctx.flag(ids.fixed) {
                FIXED_BASE_HZ * ratio
            } else {
                note_hz * ratio * pitch
            };
            osc.set_params(
                frequency,
                QuadOscParams {
                    voices: ctx.index(ids.voices),
                    saw: ctx.flag(ids.saw),
                    tones: ctx.get(ids.tones),
                    pan: ctx.get(ids.pan),
                    spread: ctx.get(ids.spread),
                    detune: ctx.get(ids.detune),
                    phase: ctx.get(ids.phase),
                },
            );
            self.volume[i] = ctx.get(ids.volume);
            self.env_select[i] = ctx.index(ids.env).min(UNITS - 1);
        }

        self.algorithm = ctx.index(layout.timbre.algorithm).min(UNITS - 1);
        self.observer = Observer {
            blend: ctx.get(layout.timbre.blend),
            equant: ctx.get(layout.timbre.equant),
            demod_mix: ctx.get(layout.timbre.demod_mix),
            demod_vol: ctx.get(layout.timbre.demod_vol),
        };
        let sensitivity = ctx.get(layout.global.vel_sens);
        self.velocity_gain = 1.0 - sensitivity + sensitivity * self.velocity;

        self.filter_enabled = ctx.flag(layout.filter.enable);
        if self.filter_enabled {
            if let Some(kind) = FilterKind::from_index(ctx.index(layout.filter.kind)) {
                self.filter.set_kind(kind);
            }
            // tracks the gliding pitch, not the target note
            let cutoff_note = ctx.get(layout.filter.freq) + (note - 60.0) * ctx.get(layout.filter.key);
            let nyquist_guard = (self.sample_rate * 0.45).min(20_000.0).max(20.0);
            let cutoff = midi_note_to_hz(cutoff_note).clamp(20.0, nyquist_guard);
            self.filter
                .set_params(cutoff, resonance_to_q(ctx.get(layout.filter.res)));
        }

        if self.phase_reset_pending {
            self.phase_reset_pending = false;
            for osc in &mut self.oscs {
                let phase = osc.params().phase;
                osc.note_on(phase);
            }
            for (mseg, data) in self.msegs.iter_mut().zip(ctx.msegs) {
                mseg.note_on(data);
            }
            self.filter.reset();
        }

        self.glide.elapsed = self
            .glide
            .elapsed
            .saturating_add(u32::try_from(samples).unwrap_or(u32::MAX));
    }

    /// Render and add into `left`/`right`. Advances the poly LFOs and MSEGs
    /// by the rendered length.
    pub fn render(&mut self, ctx: &VoiceContext<'_>, left: &mut [f32], right: &mut [f32]) {
        if !self.active || self.sample_rate <= 0.0 {
            return;
        }
        let len = left.len().min(right.len());

        for (l, r) in left[..len].iter_mut().zip(right[..len].iter_mut()) {
            let mut levels = [0.0; UNITS];
            for (level, env) in levels.iter_mut().zip(self.envs.iter_mut()) {
                *level = env.advance();
            }

            let mut positions = [StereoPosition::ORIGIN; UNITS];
            let mut radii = [0.0; UNITS];
            for i in 0..UNITS {
                radii[i] = self.volume[i] * levels[self.env_select[i]];
                positions[i] = self.oscs[i].next_position() * radii[i];
            }
            let p = compose(self.algorithm, positions);
            let path_radius = compose(self.algorithm, radii);

            let mut sample_l = self.observer.observe(p.x_l, p.y_l, path_radius);
            let mut sample_r = self.observer.observe(p.x_r, p.y_r, path_radius);
            if self.filter_enabled {
                (sample_l, sample_r) = self.filter.process_stereo(sample_l, sample_r);
            }
            let gain = OUTPUT_SCALE * self.velocity_gain;
            *l += flush_denormal(sample_l * gain);
            *r += flush_denormal(sample_r * gain);
        }

        for lfo in &mut self.lfos {
            lfo.process(len);
        }
        for (mseg, data) in self.msegs.iter_mut().zip(ctx.msegs) {
            mseg.process(len, data);
        }

        let sounding = self
            .env_select
            .iter()
            .any(|&sel| self.envs[sel].is_active());
        if !sounding {
            self.active = false;
            self.released = false;
            #[cfg(feature = "tracing")]
            tracing::trace!(note = self.note, "voice finished");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuning::EqualTemperament;
    use alloc::vec::Vec;
    use orrery_core::ParamDescriptor;

    struct Fixture {
        layout: ParamLayout,
        descriptors: Vec<ParamDescriptor>,
        values: Vec<f32>,
        transport: Transport,
        msegs: [MsegData; UNITS],
    }

    impl Fixture {
        fn new() -> Self {
            let (layout, descriptors) = ParamLayout::build();
            let values = descriptors.iter().map(|d| d.convert(d.default)).collect();
            Self {
                layout,
                descriptors,
                values,
                transport: Transport::default(),
                msegs: Default::default(),
            }
        }

        fn set(&mut self, id: orrery_core::ParamId, value: f32) {
            self.values[id.index()] = self.descriptors[id.index()].convert(value);
        }

        fn ctx(&self) -> VoiceContext<'_> {
            VoiceContext {
                params: &self.values,
                layout: &self.layout,
                tuning: &EqualTemperament,
                transport: &self.transport,
                msegs: &self.msegs,
                pitch_bend: 0.0,
            }
        }
    }

    fn render_block(voice: &mut Voice, fx: &Fixture, len: usize) -> (Vec<f32>, Vec<f32>) {
        let mut left = vec![0.0; len];
        let mut right = vec![0.0; len];
        for (l, r) in left.chunks_mut(32).zip(right.chunks_mut(32)) {
            voice.update_params(&fx.ctx(), l.len());
            voice.render(&fx.ctx(), l, r);
        }
        (left, right)
    }

    #[test]
    fn test_compose_algorithms() {
        let p = [1.0f32, 2.0, 4.0, 8.0];
        assert_eq!(compose(0, p), 15.0);
        assert_eq!(compose(1, p), 1.0 + 2.0 + 6.0);
        assert_eq!(compose(2, p), 1.0 + 7.0);
        assert!((compose(3, p) - (1.0 + 14.0 / 3.0)).abs() < 1e-6);
    }

    #[test]
    fn test_observe_blend_and_equant() {
        let obs = Observer {
            blend: 1.0,
            ..Observer::default()
        };
        assert_eq!(obs.observe(0.25, 0.75, 1.0), 0.25, "full blend reads x");

        // seen from an equant at (0.5, 0), the point (0.5, 0.5) is straight up
        let obs = Observer {
            equant: 0.5,
            demod_mix: 1.0,
            demod_vol: 2.0,
            blend: 0.0,
        };
        assert!((obs.observe(0.5, 0.5, 1.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_observe_degenerate_vector_is_silent() {
        let obs = Observer {
            demod_mix: 1.0,
            ..Observer::default()
        };
        assert_eq!(obs.observe(0.0, 0.0, 0.0), 0.0);
    }

    #[test]
    fn test_no_sample_rate_renders_nothing() {
        let fx = Fixture::new();
        let mut voice = Voice::new(0);
        voice.start_note(60, 1.0, 0, 1);
        let (left, right) = render_block(&mut voice, &fx, 256);
        assert!(left.iter().chain(&right).all(|&s| s == 0.0));
    }

    #[test]
    fn test_renders_finite_audio() {
        let fx = Fixture::new();
        let mut voice = Voice::new(0);
        voice.set_sample_rate(48000.0);
        voice.start_note(60, 1.0, 0, 1);
        let (left, right) = render_block(&mut voice, &fx, 2048);
        assert!(left.iter().chain(&right).all(|s| s.is_finite()));
        let peak = left.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(peak > 0.01, "voice should be audible, peak {peak}");
        assert!(voice.is_active());
    }

    #[test]
    fn test_release_ends_voice() {
        let fx = Fixture::new();
        let mut voice = Voice::new(0);
        voice.set_sample_rate(48000.0);
        voice.start_note(60, 1.0, 0, 1);
        render_block(&mut voice, &fx, 1024);
        voice.note_off();
        assert!(voice.is_released());
        render_block(&mut voice, &fx, 48000);
        assert!(!voice.is_active(), "all envelopes should be idle");
    }

    #[test]
    fn test_velocity_sensitivity() {
        let mut fx = Fixture::new();
        fx.set(fx.layout.global.vel_sens, 100.0);
        let mut loud = Voice::new(0);
        let mut soft = Voice::new(0);
        for (voice, vel) in [(&mut loud, 1.0), (&mut soft, 0.25)] {
            voice.set_sample_rate(48000.0);
            voice.start_note(60, vel, 0, 1);
        }
        let (a, _) = render_block(&mut loud, &fx, 512);
        let (b, _) = render_block(&mut soft, &fx, 512);
        for (x, y) in a.iter().zip(&b) {
            assert!((x * 0.25 - y).abs() < 1e-5);
        }
    }

    #[test]
    fn test_fixed_frequency_ignores_note() {
        let mut fx = Fixture::new();
        fx.set(fx.layout.osc[0].fixed, 1.0);
        let mut voice = Voice::new(0);
        voice.set_sample_rate(48000.0);
        voice.start_note(30, 1.0, 0, 1);
        voice.update_params(&fx.ctx(), 32);
        let osc = voice.oscillator(0).map(QuadOscillator::frequency);
        assert_eq!(osc, Some(FIXED_BASE_HZ));
    }

    #[test]
    fn test_portamento_glides() {
        let fx = Fixture::new();
        let mut voice = Voice::new(0);
        voice.set_sample_rate(1000.0);
        voice.start_note(60, 1.0, 0, 1);
        voice.set_glide(48.0, GlideMode::Portamento, 1.0);
        voice.update_params(&fx.ctx(), 500);
        assert!((voice.current_note() - 54.0).abs() < 1e-3);
        voice.update_params(&fx.ctx(), 600);
        assert_eq!(voice.current_note(), 60.0);
    }

    #[test]
    fn test_filter_key_tracking_follows_glide() {
        let mut fx = Fixture::new();
        fx.set(fx.layout.filter.freq, 60.0);
        fx.set(fx.layout.filter.key, 100.0);
        let mut voice = Voice::new(0);
        voice.set_sample_rate(1000.0);
        voice.start_note(60, 1.0, 0, 1);
        voice.set_glide(48.0, GlideMode::Portamento, 1.0);

        voice.update_params(&fx.ctx(), 500);
        let start = voice.filter.cutoff();
        assert!((start - midi_note_to_hz(48.0)).abs() < 0.01, "cutoff {start} at the glide start");

        voice.update_params(&fx.ctx(), 500);
        let middle = voice.filter.cutoff();
        assert!((middle - midi_note_to_hz(54.0)).abs() < 0.01, "cutoff {middle} halfway");
    }

    #[test]
    fn test_glissando_steps_in_semitones() {
        let fx = Fixture::new();
        let mut voice = Voice::new(0);
        voice.set_sample_rate(1000.0);
        voice.start_note(60, 1.0, 0, 1);
        voice.set_glide(48.0, GlideMode::Glissando, 1.0);
        voice.update_params(&fx.ctx(), 333);
        let note = voice.current_note();
        assert_eq!(note, libm::roundf(note), "glissando lands on semitones");
    }

    #[test]
    fn test_poly_sources() {
        let ids = PolySourceIds {
            mpe_bend: ModSourceId(0),
            mpe_timbre: ModSourceId(1),
            pressure: ModSourceId(2),
            note: ModSourceId(3),
            velocity: ModSourceId(4),
            lfo: [ModSourceId(5), ModSourceId(6), ModSourceId(7), ModSourceId(8)],
            env: [ModSourceId(9), ModSourceId(10), ModSourceId(11), ModSourceId(12)],
            mseg: [ModSourceId(13), ModSourceId(14), ModSourceId(15), ModSourceId(16)],
        };
        let mut voice = Voice::new(0);
        voice.start_note(127, 0.5, 3, 1);
        voice.set_pitch_bend(24.0);
        voice.set_timbre(0.75);
        let mut out = [0.0; 17];
        voice.fill_poly_sources(&ids, &mut out);
        assert_eq!(out[0], 0.5);
        assert_eq!(out[1], 0.75);
        assert_eq!(out[3], 1.0);
        assert_eq!(out[4], 0.5);
    }
}
