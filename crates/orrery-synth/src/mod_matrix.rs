//! Modulation matrix.
//!
//! Sources (macros, mod wheel, LFOs, envelopes, MSEGs, MPE signals) are
//! registered by name and receive dense [`ModSourceId`]s in registration
//! order. Destinations are parameters from the [`ParamStore`]. The shape of
//! the matrix is fixed by [`ModMatrixBuilder::build`]; connections stay
//! editable afterwards.
//!
//! # Resolution
//!
//! Modulation is summed in normalised space and mapped back through the
//! parameter's skewed range:
//!
//! ```text
//! resolved = denormalize(clamp(normalize(base) + Σ depth · curve(source), 0, 1))
//! ```
//!
//! Every sub-block runs two phases:
//!
//! 1. [`ModMatrix::resolve_mono_sources`] evaluates mono sources in
//!    dependency order (a mono LFO reads its own rate parameter, which a
//!    macro may modulate) and then resolves every parameter against mono
//!    sources only.
//! 2. [`ModMatrix::resolve_poly_destinations`] resolves, per voice, the
//!    polyphonic parameters that have poly connections.
//!
//! Mono sources may not depend on themselves through their inputs;
//! [`ModMatrix::connect`] rejects any connection that would close such a
//! loop.

use alloc::format;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use orrery_core::{ParamDescriptor, ParamId, sanitize};

use crate::params::ParamStore;

/// Dense index of a modulation source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModSourceId(pub u16);

impl ModSourceId {
    /// Index into per-source tables.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// A registered source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModSource {
    /// Patch id, e.g. `"lfo1"`.
    pub id: &'static str,
    /// Display name.
    pub name: &'static str,
    /// One value per voice rather than one for the instrument.
    pub poly: bool,
    /// Output spans −1..1 rather than 0..1.
    pub bipolar: bool,
}

/// Response curve applied to a source value before scaling by depth.
///
/// Curves act on the magnitude and keep the sign, so bipolar sources stay
/// symmetric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ModCurve {
    /// `x`
    #[default]
    Linear,
    /// `x²`
    QuadIn,
    /// `1 − (1 − x)²`
    QuadOut,
    /// `x³`
    CubicIn,
    /// `1 − (1 − x)³`
    CubicOut,
    /// Quarter sine.
    Sine,
    /// 0 below one half, 1 above.
    Threshold,
}

impl ModCurve {
    /// Display labels in declaration order.
    pub const LABELS: &'static [&'static str] = &[
        "Linear",
        "Quad In",
        "Quad Out",
        "Cubic In",
        "Cubic Out",
        "Sine",
        "Threshold",
    ];

    /// Shape `value`.
    ///
    /// ```rust
    /// use orrery_synth::ModCurve;
    ///
    /// assert_eq!(ModCurve::QuadIn.apply(-0.5), -0.25);
    /// assert_eq!(ModCurve::Threshold.apply(0.7), 1.0);
    /// ```
    #[inline]
    pub fn apply(self, value: f32) -> f32 {
        let x = value.abs().min(1.0);
        let y = match self {
            Self::Linear => x,
            Self::QuadIn => x * x,
            Self::QuadOut => 1.0 - (1.0 - x) * (1.0 - x),
            Self::CubicIn => x * x * x,
            Self::CubicOut => {
                let inv = 1.0 - x;
                1.0 - inv * inv * inv
            }
            Self::Sine => libm::sinf(x * core::f32::consts::FRAC_PI_2),
            Self::Threshold => {
                if x >= 0.5 {
                    1.0
                } else {
                    0.0
                }
            }
        };
        if value < 0.0 { -y } else { y }
    }
}

/// One source-to-parameter route.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Connection {
    /// Modulating source.
    pub source: ModSourceId,
    /// Destination parameter.
    pub param: ParamId,
    /// Scale in normalised units, −1..1.
    pub depth: f32,
    /// Response curve.
    pub curve: ModCurve,
}

/// Matrix registration and routing errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModMatrixError {
    /// A source id was registered twice.
    #[error("modulation source `{0}` registered twice")]
    DuplicateSource(&'static str),
    /// A parameter was registered twice.
    #[error("parameter {0} registered twice")]
    DuplicateParameter(u32),
    /// No source with this id or index.
    #[error("unknown modulation source `{0}`")]
    UnknownSource(String),
    /// The parameter is not a registered destination.
    #[error("parameter {0} is not a modulation destination")]
    UnknownParameter(u32),
    /// Voice-level sources cannot drive instrument-level parameters.
    #[error("poly source `{source_id}` cannot modulate mono parameter `{param}`")]
    PolySourceToMonoParameter {
        /// Offending source.
        source_id: &'static str,
        /// Offending parameter.
        param: &'static str,
    },
    /// The connection would make a mono source depend on itself.
    #[error("modulation cycle through source `{0}`")]
    Cycle(&'static str),
    /// `build` was called twice or the builder was used after building.
    #[error("modulation matrix already built")]
    AlreadyBuilt,
}

/// Collects sources and destinations, then freezes them into a [`ModMatrix`].
///
/// ```rust
/// use orrery_core::{ParamDescriptor, ParamId};
/// use orrery_synth::{ModCurve, ModMatrixBuilder};
///
/// let descriptors = vec![
///     ParamDescriptor::continuous("cutoff", "Cutoff", "Cut", 0.0, 100.0, 50.0).with_id(ParamId(0)),
/// ];
/// let mut builder = ModMatrixBuilder::new(&descriptors);
/// let wheel = builder.add_mono_source("mw", "Mod Wheel", false).unwrap();
/// builder.add_parameter(ParamId(0), true).unwrap();
/// let mut matrix = builder.build().unwrap();
///
/// matrix.connect(wheel, ParamId(0), 0.25, ModCurve::Linear).unwrap();
/// ```
#[derive(Debug)]
pub struct ModMatrixBuilder {
    descriptors: Vec<ParamDescriptor>,
    sources: Vec<ModSource>,
    params: Vec<(ParamId, bool)>,
    inputs: Vec<(ModSourceId, Vec<ParamId>)>,
    built: bool,
}

impl ModMatrixBuilder {
    /// Builder over the instrument's parameter table.
    pub fn new(descriptors: &[ParamDescriptor]) -> Self {
        Self {
            descriptors: descriptors.to_vec(),
            sources: Vec::new(),
            params: Vec::new(),
            inputs: Vec::new(),
            built: false,
        }
    }

    fn add_source(&mut self, source: ModSource) -> Result<ModSourceId, ModMatrixError> {
        if self.built {
            return Err(ModMatrixError::AlreadyBuilt);
        }
        let id = ModSourceId(self.sources.len() as u16);
        self.sources.push(source);
        Ok(id)
    }

    /// Register an instrument-wide source.
    pub fn add_mono_source(
        &mut self,
        id: &'static str,
        name: &'static str,
        bipolar: bool,
    ) -> Result<ModSourceId, ModMatrixError> {
        self.add_source(ModSource {
            id,
            name,
            poly: false,
            bipolar,
        })
    }

    /// Register a per-voice source.
    pub fn add_poly_source(
        &mut self,
        id: &'static str,
        name: &'static str,
        bipolar: bool,
    ) -> Result<ModSourceId, ModMatrixError> {
        self.add_source(ModSource {
            id,
            name,
            poly: true,
            bipolar,
        })
    }

    /// Register a destination. `poly` parameters may take poly sources.
    pub fn add_parameter(&mut self, param: ParamId, poly: bool) -> Result<(), ModMatrixError> {
        if self.built {
            return Err(ModMatrixError::AlreadyBuilt);
        }
        self.params.push((param, poly));
        Ok(())
    }

    /// Declare the parameters a mono source reads when it is evaluated.
    pub fn set_source_inputs(
        &mut self,
        source: ModSourceId,
        params: &[ParamId],
    ) -> Result<(), ModMatrixError> {
        if self.built {
            return Err(ModMatrixError::AlreadyBuilt);
        }
        self.inputs.push((source, params.to_vec()));
        Ok(())
    }

    /// Validate the registrations and produce the matrix.
    pub fn build(&mut self) -> Result<ModMatrix, ModMatrixError> {
        if self.built {
            return Err(ModMatrixError::AlreadyBuilt);
        }
        for (i, s) in self.sources.iter().enumerate() {
            if self.sources[..i].iter().any(|o| o.id == s.id) {
                return Err(ModMatrixError::DuplicateSource(s.id));
            }
        }

        let n = self.descriptors.len();
        let mut registered = vec![false; n];
        let mut poly_param = vec![false; n];
        for &(param, poly) in &self.params {
            let idx = param.index();
            if idx >= n {
                return Err(ModMatrixError::UnknownParameter(param.0));
            }
            if registered[idx] {
                return Err(ModMatrixError::DuplicateParameter(param.0));
            }
            registered[idx] = true;
            poly_param[idx] = poly;
        }

        let mut source_inputs = vec![Vec::new(); self.sources.len()];
        for (source, params) in &self.inputs {
            let slot = source_inputs
                .get_mut(source.index())
                .ok_or_else(|| ModMatrixError::UnknownSource(format!("#{}", source.0)))?;
            if let Some(p) = params.iter().find(|p| p.index() >= n) {
                return Err(ModMatrixError::UnknownParameter(p.0));
            }
            slot.extend_from_slice(params);
        }

        let base: Vec<f32> = self.descriptors.iter().map(|d| d.default).collect();
        let processed = self
            .descriptors
            .iter()
            .map(|d| d.convert(d.default))
            .collect();
        let mut matrix = ModMatrix {
            descriptors: core::mem::take(&mut self.descriptors),
            sources: core::mem::take(&mut self.sources),
            registered,
            poly_param,
            source_inputs,
            mono_order: Vec::new(),
            connections: Vec::new(),
            by_param: vec![Vec::new(); n],
            mono_resolved: base.clone(),
            base,
            processed,
            mono_source_values: Vec::new(),
            elapsed: 0,
        };
        matrix.mono_source_values = vec![0.0; matrix.sources.len()];
        let order = matrix
            .evaluation_order()
            .map_err(|s| ModMatrixError::Cycle(matrix.sources[s.index()].id))?;
        matrix.mono_order = order;
        self.built = true;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            sources = matrix.sources.len(),
            destinations = matrix.registered.iter().filter(|r| **r).count(),
            "modulation matrix built"
        );

        Ok(matrix)
    }
}

/// Read access to mono-resolved parameters while mono sources are evaluated.
pub struct MonoView<'a> {
    matrix: &'a ModMatrix,
}

impl MonoView<'_> {
    /// User value of `param` with the mono sources evaluated so far.
    pub fn value(&self, param: ParamId) -> f32 {
        self.matrix.modulated(param.index(), None)
    }

    /// [`value`](Self::value) after the parameter's conversion.
    pub fn processed(&self, param: ParamId) -> f32 {
        self.matrix
            .descriptors
            .get(param.index())
            .map_or(0.0, |d| d.convert(self.value(param)))
    }

    /// Latest value of a mono source.
    pub fn source(&self, source: ModSourceId) -> f32 {
        self.matrix.source_value(source)
    }
}

/// The built matrix: fixed sources and destinations, editable connections.
#[derive(Debug)]
pub struct ModMatrix {
    descriptors: Vec<ParamDescriptor>,
    sources: Vec<ModSource>,
    registered: Vec<bool>,
    poly_param: Vec<bool>,
    source_inputs: Vec<Vec<ParamId>>,
    mono_order: Vec<ModSourceId>,
    connections: Vec<Connection>,
    by_param: Vec<Vec<usize>>,
    base: Vec<f32>,
    mono_resolved: Vec<f32>,
    processed: Vec<f32>,
    mono_source_values: Vec<f32>,
    elapsed: usize,
}

impl ModMatrix {
    /// Registered sources in id order.
    pub fn sources(&self) -> &[ModSource] {
        &self.sources
    }

    /// Source by id.
    pub fn source(&self, id: ModSourceId) -> Option<&ModSource> {
        self.sources.get(id.index())
    }

    /// Look up a source by its patch id.
    pub fn find_source(&self, id: &str) -> Option<ModSourceId> {
        self.sources
            .iter()
            .position(|s| s.id == id)
            .map(|i| ModSourceId(i as u16))
    }

    /// Whether `param` is a destination.
    pub fn is_destination(&self, param: ParamId) -> bool {
        self.registered.get(param.index()).copied().unwrap_or(false)
    }

    /// Number of parameters in the table, destinations or not.
    pub fn param_count(&self) -> usize {
        self.descriptors.len()
    }

    /// Mono sources in evaluation order.
    pub fn mono_order(&self) -> &[ModSourceId] {
        &self.mono_order
    }

    /// Current connections.
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Route `source` to `param`, replacing an existing route between them.
    pub fn connect(
        &mut self,
        source: ModSourceId,
        param: ParamId,
        depth: f32,
        curve: ModCurve,
    ) -> Result<(), ModMatrixError> {
        let Some(src) = self.sources.get(source.index()).copied() else {
            return Err(ModMatrixError::UnknownSource(format!("#{}", source.0)));
        };
        if !self.is_destination(param) {
            return Err(ModMatrixError::UnknownParameter(param.0));
        }
        if src.poly && !self.poly_param[param.index()] {
            return Err(ModMatrixError::PolySourceToMonoParameter {
                source_id: src.id,
                param: self.descriptors[param.index()].string_id,
            });
        }
        let depth = if depth.is_finite() { depth.clamp(-1.0, 1.0) } else { 0.0 };

        if let Some(existing) = self
            .connections
            .iter_mut()
            .find(|c| c.source == source && c.param == param)
        {
            existing.depth = depth;
            existing.curve = curve;
            return Ok(());
        }

        self.connections.push(Connection {
            source,
            param,
            depth,
            curve,
        });
        self.reindex();
        match self.evaluation_order() {
            Ok(order) => {
                self.mono_order = order;
                Ok(())
            }
            Err(culprit) => {
                self.connections.pop();
                self.reindex();
                #[cfg(feature = "tracing")]
                tracing::warn!(source = src.id, "rejected modulation cycle");
                Err(ModMatrixError::Cycle(self.sources[culprit.index()].id))
            }
        }
    }

    /// Change the depth of an existing route. Returns false if there is none.
    pub fn set_depth(&mut self, source: ModSourceId, param: ParamId, depth: f32) -> bool {
        match self
            .connections
            .iter_mut()
            .find(|c| c.source == source && c.param == param)
        {
            Some(c) => {
                c.depth = if depth.is_finite() { depth.clamp(-1.0, 1.0) } else { 0.0 };
                true
            }
            None => false,
        }
    }

    /// Remove a route. Returns false if there was none.
    pub fn disconnect(&mut self, source: ModSourceId, param: ParamId) -> bool {
        let before = self.connections.len();
        self.connections
            .retain(|c| !(c.source == source && c.param == param));
        if self.connections.len() == before {
            return false;
        }
        self.reindex();
        // removing an edge cannot introduce a cycle
        if let Ok(order) = self.evaluation_order() {
            self.mono_order = order;
        }
        true
    }

    /// Remove every route.
    pub fn clear_connections(&mut self) {
        self.connections.clear();
        self.reindex();
        if let Ok(order) = self.evaluation_order() {
            self.mono_order = order;
        }
    }

    fn reindex(&mut self) {
        for list in &mut self.by_param {
            list.clear();
        }
        for (i, c) in self.connections.iter().enumerate() {
            self.by_param[c.param.index()].push(i);
        }
    }

    /// Mono sources ordered so that every source comes after the mono
    /// sources that modulate its inputs. `Err` names a source on a cycle.
    fn evaluation_order(&self) -> Result<Vec<ModSourceId>, ModSourceId> {
        let mut marks = vec![Mark::New; self.sources.len()];
        let mut order = Vec::with_capacity(self.sources.len());
        for (i, s) in self.sources.iter().enumerate() {
            if !s.poly {
                self.visit(i, &mut marks, &mut order)?;
            }
        }
        Ok(order)
    }

    fn visit(
        &self,
        source: usize,
        marks: &mut [Mark],
        order: &mut Vec<ModSourceId>,
    ) -> Result<(), ModSourceId> {
        match marks[source] {
            Mark::Done => return Ok(()),
            Mark::Visiting => return Err(ModSourceId(source as u16)),
            Mark::New => {}
        }
        marks[source] = Mark::Visiting;
        for param in &self.source_inputs[source] {
            for &c in &self.by_param[param.index()] {
                let dep = self.connections[c].source.index();
                if !self.sources[dep].poly {
                    self.visit(dep, marks, order)?;
                }
            }
        }
        marks[source] = Mark::Done;
        order.push(ModSourceId(source as u16));
        Ok(())
    }

    /// Reset the block-relative sample counter.
    pub fn start_block(&mut self) {
        self.elapsed = 0;
    }

    /// Advance the block-relative sample counter.
    pub fn finish_block(&mut self, samples: usize) {
        self.elapsed += samples;
    }

    /// Samples rendered since [`start_block`](Self::start_block).
    pub fn elapsed_block_samples(&self) -> usize {
        self.elapsed
    }

    /// Phase one: read base values, evaluate mono sources in order, then
    /// resolve every parameter against mono sources.
    ///
    /// `evaluate` is called once per mono source and returns its new value;
    /// the [`MonoView`] resolves any parameter with the sources evaluated so
    /// far.
    pub fn resolve_mono_sources<F>(&mut self, store: &ParamStore, mut evaluate: F)
    where
        F: FnMut(ModSourceId, &MonoView<'_>) -> f32,
    {
        for (i, base) in self.base.iter_mut().enumerate() {
            *base = store.value(ParamId(i as u32));
        }
        for k in 0..self.mono_order.len() {
            let source = self.mono_order[k];
            let value = evaluate(source, &MonoView { matrix: self });
            self.mono_source_values[source.index()] = sanitize(value);
        }
        for i in 0..self.descriptors.len() {
            let value = self.modulated(i, None);
            self.mono_resolved[i] = value;
            self.processed[i] = self.descriptors[i].convert(value);
        }
    }

    /// Phase two: processed values of every parameter for one voice.
    ///
    /// Poly parameters with connections are resolved against mono sources
    /// and `poly_source_values` (indexed by [`ModSourceId`]); everything
    /// else copies the phase-one result.
    pub fn resolve_poly_destinations(&self, poly_source_values: &[f32], out: &mut [f32]) {
        for (i, slot) in out.iter_mut().enumerate().take(self.descriptors.len()) {
            *slot = if self.poly_param[i] && !self.by_param[i].is_empty() {
                self.descriptors[i].convert(self.modulated(i, Some(poly_source_values)))
            } else {
                self.processed[i]
            };
        }
    }

    fn modulated(&self, idx: usize, poly: Option<&[f32]>) -> f32 {
        let Some(descriptor) = self.descriptors.get(idx) else {
            return 0.0;
        };
        let base = self.base[idx];
        let mut normalized = descriptor.normalize(base);
        let mut touched = false;
        for &c in &self.by_param[idx] {
            let conn = &self.connections[c];
            let s = conn.source.index();
            let value = if self.sources[s].poly {
                match poly {
                    Some(values) => values.get(s).copied().unwrap_or(0.0),
                    None => continue,
                }
            } else {
                self.mono_source_values[s]
            };
            normalized += conn.depth * conn.curve.apply(value);
            touched = true;
        }
        if touched {
            descriptor.denormalize(normalized.clamp(0.0, 1.0))
        } else {
            base
        }
    }

    /// User value after mono modulation.
    pub fn value(&self, param: ParamId) -> f32 {
        self.mono_resolved.get(param.index()).copied().unwrap_or(0.0)
    }

    /// Processed value after mono modulation.
    pub fn processed(&self, param: ParamId) -> f32 {
        self.processed.get(param.index()).copied().unwrap_or(0.0)
    }

    /// All processed values after mono modulation.
    pub fn processed_values(&self) -> &[f32] {
        &self.processed
    }

    /// Unmodulated value read at the last resolve.
    pub fn base(&self, param: ParamId) -> f32 {
        self.base.get(param.index()).copied().unwrap_or(0.0)
    }

    /// Latest value of a mono source; 0 for poly sources.
    pub fn source_value(&self, source: ModSourceId) -> f32 {
        self.mono_source_values
            .get(source.index())
            .copied()
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    New,
    Visiting,
    Done,
}

#[cfg(test)]
mod tests {
    use super::*;
    use orrery_core::ValueConversion;

    fn table() -> Vec<ParamDescriptor> {
        vec![
            ParamDescriptor::continuous("a", "A", "A", 0.0, 100.0, 50.0).with_id(ParamId(0)),
            ParamDescriptor::continuous("b", "B", "B", -60.0, 0.0, 0.0)
                .with_conversion(ValueConversion::DecibelsToGain)
                .with_id(ParamId(1)),
            ParamDescriptor::continuous("rate", "Rate", "Rate", 0.0, 10.0, 1.0).with_id(ParamId(2)),
            ParamDescriptor::stepped("steps", "Steps", "St", 0.0, 4.0, 0.0).with_id(ParamId(3)),
        ]
    }

    struct Fixture {
        matrix: ModMatrix,
        store: ParamStore,
        wheel: ModSourceId,
        lfo: ModSourceId,
        env: ModSourceId,
    }

    fn fixture() -> Fixture {
        let descriptors = table();
        let mut b = ModMatrixBuilder::new(&descriptors);
        let wheel = b.add_mono_source("mw", "Mod Wheel", false).unwrap();
        let lfo = b.add_mono_source("mlfo", "Mono LFO", true).unwrap();
        let env = b.add_poly_source("env", "Envelope", false).unwrap();
        b.add_parameter(ParamId(0), true).unwrap();
        b.add_parameter(ParamId(1), false).unwrap();
        b.add_parameter(ParamId(2), false).unwrap();
        b.add_parameter(ParamId(3), true).unwrap();
        b.set_source_inputs(lfo, &[ParamId(2)]).unwrap();
        let matrix = b.build().unwrap();
        Fixture {
            matrix,
            store: ParamStore::new(descriptors),
            wheel,
            lfo,
            env,
        }
    }

    #[test]
    fn test_dense_source_ids() {
        let f = fixture();
        assert_eq!(f.wheel, ModSourceId(0));
        assert_eq!(f.lfo, ModSourceId(1));
        assert_eq!(f.env, ModSourceId(2));
        assert_eq!(f.matrix.find_source("env"), Some(f.env));
        assert_eq!(f.matrix.find_source("nope"), None);
    }

    #[test]
    fn test_build_rejects_duplicates() {
        let descriptors = table();
        let mut b = ModMatrixBuilder::new(&descriptors);
        b.add_mono_source("x", "X", false).unwrap();
        b.add_poly_source("x", "X", false).unwrap();
        assert_eq!(b.build().unwrap_err(), ModMatrixError::DuplicateSource("x"));

        let mut b = ModMatrixBuilder::new(&descriptors);
        b.add_parameter(ParamId(1), true).unwrap();
        b.add_parameter(ParamId(1), true).unwrap();
        assert_eq!(b.build().unwrap_err(), ModMatrixError::DuplicateParameter(1));
    }

    #[test]
    fn test_build_twice_fails() {
        let descriptors = table();
        let mut b = ModMatrixBuilder::new(&descriptors);
        assert!(b.build().is_ok());
        assert_eq!(b.build().unwrap_err(), ModMatrixError::AlreadyBuilt);
        assert_eq!(
            b.add_mono_source("late", "Late", false).unwrap_err(),
            ModMatrixError::AlreadyBuilt
        );
    }

    #[test]
    fn test_unmodulated_passthrough() {
        let mut f = fixture();
        f.store.set_value(ParamId(0), 30.0);
        f.matrix.resolve_mono_sources(&f.store, |_, _| 0.0);
        assert_eq!(f.matrix.value(ParamId(0)), 30.0);
        assert!((f.matrix.processed(ParamId(1)) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_mono_modulation_sums_and_clamps() {
        let mut f = fixture();
        f.matrix
            .connect(f.wheel, ParamId(0), 0.25, ModCurve::Linear)
            .unwrap();
        let wheel = f.wheel;
        f.matrix
            .resolve_mono_sources(&f.store, |s, _| if s == wheel { 1.0 } else { 0.0 });
        assert!((f.matrix.value(ParamId(0)) - 75.0).abs() < 1e-3);

        f.matrix.set_depth(f.wheel, ParamId(0), 1.0);
        f.matrix
            .resolve_mono_sources(&f.store, |s, _| if s == wheel { 1.0 } else { 0.0 });
        assert_eq!(f.matrix.value(ParamId(0)), 100.0, "clamped at max");
    }

    #[test]
    fn test_conversion_after_modulation() {
        let mut f = fixture();
        f.store.set_value(ParamId(1), -60.0);
        f.matrix
            .connect(f.wheel, ParamId(1), 1.0, ModCurve::Linear)
            .unwrap();
        let wheel = f.wheel;
        f.matrix
            .resolve_mono_sources(&f.store, |s, _| if s == wheel { 1.0 } else { 0.0 });
        assert!((f.matrix.processed(ParamId(1)) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_stepped_destination_snaps() {
        let mut f = fixture();
        f.matrix
            .connect(f.wheel, ParamId(3), 0.3, ModCurve::Linear)
            .unwrap();
        let wheel = f.wheel;
        f.matrix
            .resolve_mono_sources(&f.store, |s, _| if s == wheel { 1.0 } else { 0.0 });
        assert_eq!(f.matrix.value(ParamId(3)), 1.0);
    }

    #[test]
    fn test_mono_source_sees_modulated_input() {
        let mut f = fixture();
        f.matrix
            .connect(f.wheel, ParamId(2), 0.5, ModCurve::Linear)
            .unwrap();
        assert_eq!(f.matrix.mono_order(), &[f.wheel, f.lfo]);
        let (wheel, lfo) = (f.wheel, f.lfo);
        let mut seen_rate = 0.0;
        f.matrix.resolve_mono_sources(&f.store, |s, view| {
            if s == wheel {
                1.0
            } else {
                if s == lfo {
                    seen_rate = view.value(ParamId(2));
                }
                0.0
            }
        });
        assert!((seen_rate - 6.0).abs() < 1e-4, "rate seen by the LFO: {seen_rate}");
    }

    #[test]
    fn test_cycle_rejected() {
        let mut f = fixture();
        let err = f
            .matrix
            .connect(f.lfo, ParamId(2), 0.5, ModCurve::Linear)
            .unwrap_err();
        assert_eq!(err, ModMatrixError::Cycle("mlfo"));
        assert!(f.matrix.connections().is_empty(), "rejected route removed");
    }

    #[test]
    fn test_poly_source_to_mono_param_rejected() {
        let mut f = fixture();
        let err = f
            .matrix
            .connect(f.env, ParamId(1), 0.5, ModCurve::Linear)
            .unwrap_err();
        assert!(matches!(
            err,
            ModMatrixError::PolySourceToMonoParameter { source_id: "env", param: "b" }
        ));
    }

    #[test]
    fn test_poly_resolution_per_voice() {
        let mut f = fixture();
        f.matrix
            .connect(f.env, ParamId(0), 0.5, ModCurve::Linear)
            .unwrap();
        f.matrix.resolve_mono_sources(&f.store, |_, _| 0.0);

        let mut out = vec![0.0; 4];
        let mut sources = vec![0.0; 3];
        sources[f.env.index()] = 1.0;
        f.matrix.resolve_poly_destinations(&sources, &mut out);
        assert!((out[0] - 100.0).abs() < 1e-3);

        sources[f.env.index()] = 0.0;
        f.matrix.resolve_poly_destinations(&sources, &mut out);
        assert!((out[0] - 50.0).abs() < 1e-3);
        assert!((out[1] - 1.0).abs() < 1e-6, "mono params copied");
    }

    #[test]
    fn test_disconnect_and_clear() {
        let mut f = fixture();
        f.matrix
            .connect(f.wheel, ParamId(0), 0.5, ModCurve::Linear)
            .unwrap();
        f.matrix
            .connect(f.wheel, ParamId(0), 0.1, ModCurve::QuadIn)
            .unwrap();
        assert_eq!(f.matrix.connections().len(), 1, "same route updates");
        assert!(f.matrix.disconnect(f.wheel, ParamId(0)));
        assert!(!f.matrix.disconnect(f.wheel, ParamId(0)));
        f.matrix
            .connect(f.env, ParamId(0), 0.5, ModCurve::Linear)
            .unwrap();
        f.matrix.clear_connections();
        assert!(f.matrix.connections().is_empty());
    }

    #[test]
    fn test_curves_keep_sign_and_endpoints() {
        let curves = [
            ModCurve::Linear,
            ModCurve::QuadIn,
            ModCurve::QuadOut,
            ModCurve::CubicIn,
            ModCurve::CubicOut,
            ModCurve::Sine,
            ModCurve::Threshold,
        ];
        for c in curves {
            assert_eq!(c.apply(0.0), 0.0, "{c:?}");
            assert!((c.apply(1.0) - 1.0).abs() < 1e-6, "{c:?}");
            assert!((c.apply(-1.0) + 1.0).abs() < 1e-6, "{c:?}");
        }
        assert_eq!(ModCurve::LABELS.len(), curves.len());
    }

    #[test]
    fn test_block_counter() {
        let mut f = fixture();
        f.matrix.start_block();
        f.matrix.finish_block(32);
        f.matrix.finish_block(16);
        assert_eq!(f.matrix.elapsed_block_samples(), 48);
        f.matrix.start_block();
        assert_eq!(f.matrix.elapsed_block_samples(), 0);
    }
}
