//! The stereo [`Effect`] trait.
//!
//! Every effect in the chain works on a left/right pair. Processing happens
//! in place on split channel slices, which is how the processor hands out
//! sub-block slices of its output buffer.
//!
//! The trait is object-safe. The effect chain itself dispatches statically
//! through a closed enum, but tests and tools may hold `Box<dyn Effect>`.

/// A stereo audio effect.
///
/// # Example
///
/// ```rust
/// use orrery_core::Effect;
///
/// struct Swap;
///
/// impl Effect for Swap {
///     fn process_stereo(&mut self, left: f32, right: f32) -> (f32, f32) {
///         (right, left)
///     }
///
///     fn set_sample_rate(&mut self, _sample_rate: f32) {}
///
///     fn reset(&mut self) {}
/// }
///
/// let mut fx = Swap;
/// assert_eq!(fx.process_stereo(1.0, 2.0), (2.0, 1.0));
/// ```
pub trait Effect {
    /// Process one stereo frame.
    fn process_stereo(&mut self, left: f32, right: f32) -> (f32, f32);

    /// Process a block in place.
    ///
    /// Both slices must have the same length. The default implementation
    /// calls [`process_stereo`](Self::process_stereo) per frame.
    fn process_block_stereo(&mut self, left: &mut [f32], right: &mut [f32]) {
        debug_assert_eq!(
            left.len(),
            right.len(),
            "left and right buffers must have same length"
        );
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let (ol, or) = self.process_stereo(*l, *r);
            *l = ol;
            *r = or;
        }
    }

    /// Recompute sample-rate dependent coefficients and buffer sizes.
    fn set_sample_rate(&mut self, sample_rate: f32);

    /// Clear delay lines, filter history and detectors without touching
    /// parameters.
    fn reset(&mut self);

    /// Latency introduced by the effect, in samples.
    fn latency_samples(&self) -> usize {
        0
    }
}

/// Fluent series composition.
pub trait EffectExt: Effect + Sized {
    /// Feed the output of `self` into `next`.
    fn chain<E: Effect>(self, next: E) -> Chain<Self, E> {
        Chain {
            first: self,
            second: next,
        }
    }
}

impl<T: Effect> EffectExt for T {}

/// Two effects in series, built with [`EffectExt::chain`].
#[derive(Debug, Clone)]
pub struct Chain<A, B> {
    first: A,
    second: B,
}

impl<A: Effect, B: Effect> Effect for Chain<A, B> {
    #[inline]
    fn process_stereo(&mut self, left: f32, right: f32) -> (f32, f32) {
        let (l, r) = self.first.process_stereo(left, right);
        self.second.process_stereo(l, r)
    }

    fn process_block_stereo(&mut self, left: &mut [f32], right: &mut [f32]) {
        self.first.process_block_stereo(left, right);
        self.second.process_block_stereo(left, right);
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.first.set_sample_rate(sample_rate);
        self.second.set_sample_rate(sample_rate);
    }

    fn reset(&mut self) {
        self.first.reset();
        self.second.reset();
    }

    fn latency_samples(&self) -> usize {
        self.first.latency_samples() + self.second.latency_samples()
    }
}

impl<A, B> Chain<A, B> {
    /// First stage.
    pub fn first(&self) -> &A {
        &self.first
    }

    /// First stage, mutably.
    pub fn first_mut(&mut self) -> &mut A {
        &mut self.first
    }

    /// Second stage.
    pub fn second(&self) -> &B {
        &self.second
    }

    /// Second stage, mutably.
    pub fn second_mut(&mut self) -> &mut B {
        &mut self.second
    }
}
