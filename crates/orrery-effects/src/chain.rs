//! Dual-lane effect router.
//!
//! # Signal Flow
//!
//! Series (`chain_a_to_b`):
//!
//! ```text
//! in → [lane A] → [lane B] → post chain → out
//! ```
//!
//! Parallel:
//!
//! ```text
//!      ┌→ [lane A] (gain × 0.5) ─┐
//! in ──┤                         + → post chain → out
//!      └→ [lane B] (gain × 0.5) ─┘
//! ```
//!
//! A lane is its filter and gain/pan stage, placed before or after four
//! effect slots. Every lane owns one instance of each effect type, so an
//! effect selected in both lanes keeps two independent states. Selecting the
//! same effect twice within a lane runs that lane's instance twice.

use alloc::vec;
use alloc::vec::Vec;

use orrery_core::{
    Effect, FilterKind, LinearSmoothedParam, MultimodeFilter, lane_pan_gains, resonance_to_q,
};

use crate::chorus::{Chorus, ChorusParams};
use crate::delay::{DelayParams, StereoDelay};
use crate::dynamics::{Dynamics, DynamicsParams};
use crate::gain::SlotGain;
use crate::multiband::{MultibandFilter, MultibandParams};
use crate::post::PostChain;
use crate::reverb::{Reverb, ReverbParams};
use crate::ring_mod::{RingModParams, RingModulator};
use crate::waveshaper::{Waveshaper, WaveshaperParams};

/// Slots per lane.
pub const SLOTS_PER_LANE: usize = 4;

/// Ramp time of the lane filter cutoff in seconds.
pub const LANE_CUTOFF_RAMP_SECONDS: f32 = 0.02;

const DEFAULT_SAMPLE_RATE: f32 = 48000.0;

/// Effect selected in a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FxSlot {
    /// Pass-through.
    #[default]
    None,
    /// [`Waveshaper`]
    Waveshaper,
    /// [`Dynamics`]
    Dynamics,
    /// [`StereoDelay`]
    Delay,
    /// [`Chorus`]
    Chorus,
    /// [`MultibandFilter`]
    MultibandFilter,
    /// [`Reverb`]
    Reverb,
    /// [`RingModulator`]
    RingModulator,
    /// [`SlotGain`]
    Gain,
}

impl FxSlot {
    /// Every slot value in parameter order.
    pub const ALL: [Self; 9] = [
        Self::None,
        Self::Waveshaper,
        Self::Dynamics,
        Self::Delay,
        Self::Chorus,
        Self::MultibandFilter,
        Self::Reverb,
        Self::RingModulator,
        Self::Gain,
    ];

    /// Display labels in parameter order.
    pub const LABELS: &'static [&'static str] = &[
        "--",
        "Waveshaper",
        "Dynamics",
        "Delay",
        "Chorus",
        "Multiband Filter",
        "Reverb",
        "Ring Modulator",
        "Gain",
    ];

    /// Slot for a parameter value; `None` past the end.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

/// One lane's routing settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LaneParams {
    /// Effects in processing order.
    pub slots: [FxSlot; SLOTS_PER_LANE],
    /// Linear lane gain.
    pub gain: f32,
    /// Lane filter type and slope.
    pub filter: FilterKind,
    /// Lane filter cutoff in Hz.
    pub cutoff_hz: f32,
    /// Lane filter resonance, 0..100.
    pub resonance: f32,
    /// Pan, −1..1.
    pub pan: f32,
    /// Filter and gain after the slots instead of before.
    pub post: bool,
}

impl Default for LaneParams {
    fn default() -> Self {
        Self {
            slots: [FxSlot::None; SLOTS_PER_LANE],
            gain: 1.0,
            filter: FilterKind::Lp12,
            cutoff_hz: 20_000.0,
            resonance: 0.0,
            pan: 0.0,
            post: false,
        }
    }
}

/// Everything the router needs for one sub-block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FxParams {
    /// Linear gain of the gain slot.
    pub slot_gain: f32,
    /// Linear gain at the head of the post chain.
    pub output_gain: f32,
    /// Waveshaper settings.
    pub waveshaper: WaveshaperParams,
    /// Dynamics settings.
    pub dynamics: DynamicsParams,
    /// Delay settings.
    pub delay: DelayParams,
    /// Chorus settings.
    pub chorus: ChorusParams,
    /// Reverb settings.
    pub reverb: ReverbParams,
    /// Multiband filter settings.
    pub multiband: MultibandParams,
    /// Ring modulator settings.
    pub ring_mod: RingModParams,
    /// Lanes A and B.
    pub lanes: [LaneParams; 2],
    /// Series when set, parallel otherwise.
    pub chain_a_to_b: bool,
}

impl Default for FxParams {
    fn default() -> Self {
        Self {
            slot_gain: 1.0,
            output_gain: 1.0,
            waveshaper: WaveshaperParams::default(),
            dynamics: DynamicsParams::default(),
            delay: DelayParams::default(),
            chorus: ChorusParams::default(),
            reverb: ReverbParams::default(),
            multiband: MultibandParams::default(),
            ring_mod: RingModParams::default(),
            lanes: [LaneParams::default(); 2],
            chain_a_to_b: true,
        }
    }
}

/// One instance of every slot effect.
#[derive(Debug, Clone)]
struct FxPool {
    waveshaper: Waveshaper,
    dynamics: Dynamics,
    delay: StereoDelay,
    chorus: Chorus,
    multiband: MultibandFilter,
    reverb: Reverb,
    ring_mod: RingModulator,
    gain: SlotGain,
}

impl FxPool {
    fn new(sample_rate: f32) -> Self {
        Self {
            waveshaper: Waveshaper::new(sample_rate),
            dynamics: Dynamics::new(sample_rate),
            delay: StereoDelay::new(sample_rate),
            chorus: Chorus::new(sample_rate),
            multiband: MultibandFilter::new(sample_rate),
            reverb: Reverb::new(sample_rate),
            ring_mod: RingModulator::new(sample_rate),
            gain: SlotGain::new(sample_rate),
        }
    }

    fn set_params(&mut self, params: &FxParams) {
        self.waveshaper.set_params(&params.waveshaper);
        self.dynamics.set_params(&params.dynamics);
        self.delay.set_params(&params.delay);
        self.chorus.set_params(&params.chorus);
        self.multiband.set_params(&params.multiband);
        self.reverb.set_params(&params.reverb);
        self.ring_mod.set_params(&params.ring_mod);
        self.gain.set_gain(params.slot_gain);
    }

    fn effects(&mut self) -> [&mut dyn Effect; 8] {
        [
            &mut self.waveshaper,
            &mut self.dynamics,
            &mut self.delay,
            &mut self.chorus,
            &mut self.multiband,
            &mut self.reverb,
            &mut self.ring_mod,
            &mut self.gain,
        ]
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        for effect in self.effects() {
            effect.set_sample_rate(sample_rate);
        }
    }

    fn reset(&mut self) {
        for effect in self.effects() {
            effect.reset();
        }
    }

    fn process(
        &mut self,
        slot: FxSlot,
        left: &mut [f32],
        right: &mut [f32],
        sidechain: Option<(&[f32], &[f32])>,
    ) {
        match slot {
            FxSlot::None => {}
            FxSlot::Waveshaper => self.waveshaper.process_block_stereo(left, right),
            FxSlot::Dynamics => match sidechain {
                Some(key) => self.dynamics.process_block_sidechain(left, right, key),
                None => self.dynamics.process_block_stereo(left, right),
            },
            FxSlot::Delay => self.delay.process_block_stereo(left, right),
            FxSlot::Chorus => self.chorus.process_block_stereo(left, right),
            FxSlot::MultibandFilter => self.multiband.process_block_stereo(left, right),
            FxSlot::Reverb => self.reverb.process_block_stereo(left, right),
            FxSlot::RingModulator => self.ring_mod.process_block_stereo(left, right),
            FxSlot::Gain => self.gain.process_block_stereo(left, right),
        }
    }
}

#[derive(Debug, Clone)]
struct Lane {
    params: LaneParams,
    pool: FxPool,
    filter: MultimodeFilter,
    cutoff: LinearSmoothedParam,
    primed: bool,
}

impl Lane {
    fn new(sample_rate: f32) -> Self {
        let params = LaneParams::default();
        Self {
            params,
            pool: FxPool::new(sample_rate),
            filter: MultimodeFilter::new(sample_rate),
            cutoff: LinearSmoothedParam::with_config(
                params.cutoff_hz,
                sample_rate,
                LANE_CUTOFF_RAMP_SECONDS,
            ),
            primed: false,
        }
    }

    fn set_params(&mut self, lane: &LaneParams, fx: &FxParams) {
        self.params = *lane;
        self.pool.set_params(fx);
        self.filter.set_kind(lane.filter);
        if self.primed {
            self.cutoff.set_target(lane.cutoff_hz);
        } else {
            // first settings after a reset land without a sweep
            self.cutoff.set_immediate(lane.cutoff_hz);
            self.primed = true;
        }
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.pool.set_sample_rate(sample_rate);
        self.filter.set_sample_rate(sample_rate);
        self.cutoff.reset(sample_rate, LANE_CUTOFF_RAMP_SECONDS);
    }

    fn reset(&mut self) {
        self.pool.reset();
        self.filter.reset();
        self.primed = false;
    }

    fn filter_and_gain(&mut self, left: &mut [f32], right: &mut [f32], scale: f32) {
        self.filter.process_block_stereo(left, right);
        let (gain_l, gain_r) = lane_pan_gains(self.params.gain * scale, self.params.pan);
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            *l *= gain_l;
            *r *= gain_r;
        }
    }

    fn process(
        &mut self,
        left: &mut [f32],
        right: &mut [f32],
        sidechain: Option<(&[f32], &[f32])>,
        scale: f32,
    ) {
        let q = resonance_to_q(self.params.resonance);
        self.filter.set_params(self.cutoff.get(), q);
        self.cutoff.skip(left.len() as u32);

        if !self.params.post {
            self.filter_and_gain(left, right, scale);
        }
        for slot in self.params.slots {
            self.pool.process(slot, left, right, sidechain);
        }
        if self.params.post {
            self.filter_and_gain(left, right, scale);
        }
    }
}

/// Two lanes of four slots followed by the post chain.
///
/// Call [`prepare`](Self::prepare) before processing; until then
/// [`process`](Self::process) leaves its input untouched.
///
/// # Example
///
/// ```rust
/// use orrery_effects::{FxChain, FxParams, FxSlot, LaneParams};
///
/// let mut fx = FxChain::new();
/// fx.prepare(48000.0, 32);
///
/// let mut params = FxParams::default();
/// params.slot_gain = 0.5;
/// params.lanes[0] = LaneParams { slots: [FxSlot::Gain, FxSlot::None, FxSlot::None, FxSlot::None], ..LaneParams::default() };
/// fx.set_params(&params);
///
/// let mut left = vec![0.0; 64];
/// let mut right = vec![0.0; 64];
/// fx.process(&mut left, &mut right, None);
/// assert!(left.iter().all(|&s| s == 0.0));
/// ```
#[derive(Debug, Clone)]
pub struct FxChain {
    params: FxParams,
    lanes: [Lane; 2],
    post: PostChain,
    scratch_left: Vec<f32>,
    scratch_right: Vec<f32>,
    sample_rate: f32,
}

impl Default for FxChain {
    fn default() -> Self {
        Self::new()
    }
}

impl FxChain {
    /// Unprepared chain.
    pub fn new() -> Self {
        Self {
            params: FxParams::default(),
            lanes: [Lane::new(DEFAULT_SAMPLE_RATE), Lane::new(DEFAULT_SAMPLE_RATE)],
            post: PostChain::new(DEFAULT_SAMPLE_RATE),
            scratch_left: Vec::new(),
            scratch_right: Vec::new(),
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }

    /// Size every buffer for `max_block` frames at `sample_rate` and reset.
    ///
    /// Allocates; call only while audio is stopped.
    pub fn prepare(&mut self, sample_rate: f32, max_block: usize) {
        self.sample_rate = sample_rate;
        for lane in &mut self.lanes {
            lane.set_sample_rate(sample_rate);
        }
        self.post.set_sample_rate(sample_rate);
        self.scratch_left = vec![0.0; max_block.max(1)];
        self.scratch_right = vec![0.0; max_block.max(1)];
        self.reset();
    }

    /// Clear every effect's state.
    pub fn reset(&mut self) {
        for lane in &mut self.lanes {
            lane.reset();
        }
        self.post.reset();
        let params = self.params;
        self.set_params(&params);
    }

    /// Apply settings for the coming sub-block.
    pub fn set_params(&mut self, params: &FxParams) {
        self.params = *params;
        for (lane, lane_params) in self.lanes.iter_mut().zip(&params.lanes) {
            lane.set_params(lane_params, params);
        }
        self.post.set_output_gain(params.output_gain);
    }

    /// Current settings.
    pub fn params(&self) -> &FxParams {
        &self.params
    }

    /// Sample rate from the last [`prepare`](Self::prepare).
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Process in place. `sidechain` keys the dynamics slot when present.
    pub fn process(
        &mut self,
        left: &mut [f32],
        right: &mut [f32],
        sidechain: Option<(&[f32], &[f32])>,
    ) {
        let chunk = self.scratch_left.len();
        if chunk == 0 {
            return;
        }
        let frames = left.len().min(right.len());
        let mut pos = 0;
        while pos < frames {
            let end = (pos + chunk).min(frames);
            let key = sidechain.and_then(|(l, r)| Some((l.get(pos..end)?, r.get(pos..end)?)));
            self.process_chunk(&mut left[pos..end], &mut right[pos..end], key);
            pos = end;
        }
    }

    fn process_chunk(
        &mut self,
        left: &mut [f32],
        right: &mut [f32],
        sidechain: Option<(&[f32], &[f32])>,
    ) {
        let [lane_a, lane_b] = &mut self.lanes;
        if self.params.chain_a_to_b {
            lane_a.process(left, right, sidechain, 1.0);
            lane_b.process(left, right, sidechain, 1.0);
        } else {
            let n = left.len();
            let copy_left = &mut self.scratch_left[..n];
            let copy_right = &mut self.scratch_right[..n];
            copy_left.copy_from_slice(left);
            copy_right.copy_from_slice(right);
            lane_a.process(left, right, sidechain, 0.5);
            lane_b.process(copy_left, copy_right, sidechain, 0.5);
            for (out, b) in left.iter_mut().zip(copy_left.iter()) {
                *out += *b;
            }
            for (out, b) in right.iter_mut().zip(copy_right.iter()) {
                *out += *b;
            }
        }
        self.post.process_block_stereo(left, right);
    }
}
