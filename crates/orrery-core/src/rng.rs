//! Xorshift noise source.
//!
//! Deterministic, allocation-free and cheap enough to call per sample. Each
//! voice and effect that needs noise owns its own generator, seeded
//! differently so voices decorrelate.

/// 32-bit xorshift generator (Marsaglia, shifts 13/17/5).
#[derive(Debug, Clone)]
pub struct Xorshift32 {
    state: u32,
}

impl Xorshift32 {
    /// Generator from a seed. A zero seed is replaced, since zero is a fixed point.
    pub const fn new(seed: u32) -> Self {
        Self {
            state: if seed == 0 { 0x9E37_79B9 } else { seed },
        }
    }

    /// Next raw value.
    #[inline]
    pub fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        x
    }

    /// Uniform value in [−1, 1].
    #[inline]
    pub fn next_bipolar(&mut self) -> f32 {
        (self.next_u32() as i32 as f32) / (i32::MAX as f32)
    }

    /// Uniform value in [0, 1).
    #[inline]
    pub fn next_unipolar(&mut self) -> f32 {
        (self.next_u32() >> 8) as f32 / (1u32 << 24) as f32
    }
}

impl Default for Xorshift32 {
    fn default() -> Self {
        Self::new(0x1234_5678)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranges() {
        let mut rng = Xorshift32::new(1);
        for _ in 0..10_000 {
            let b = rng.next_bipolar();
            assert!((-1.0..=1.0).contains(&b));
            let u = rng.next_unipolar();
            assert!((0.0..1.0).contains(&u));
        }
    }

    #[test]
    fn test_zero_seed_not_stuck() {
        let mut rng = Xorshift32::new(0);
        assert_ne!(rng.next_u32(), 0);
    }

    #[test]
    fn test_deterministic() {
        let mut a = Xorshift32::new(42);
        let mut b = Xorshift32::new(42);
        for _ in 0..16 {
            assert_eq!(a.next_u32(), b.next_u32());
        }
    }
}
