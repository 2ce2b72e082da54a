//! Seeded deterministic PRNG.
//!
//! A mulberry32-style generator: 32 bits of state advanced by a Weyl
//! increment, with two xorshift-multiply rounds per output. Small, fast, and
//! fully reproducible from a seed, which is all the simulation needs for
//! pellet spread and weighted selection. The generator is owned by the world
//! state so re-simulation from the same seed replays identically.

use serde::{Deserialize, Serialize};

/// Deterministic 32-bit PRNG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimRng {
    state: u32,
}

impl SimRng {
    /// Create a generator from a seed.
    #[must_use]
    pub const fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Next raw 32-bit value.
    pub fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_add(0x6D2B_79F5);
        let mut z = self.state;
        z = (z ^ (z >> 15)).wrapping_mul(z | 1);
        z ^= z.wrapping_add((z ^ (z >> 7)).wrapping_mul(z | 61));
        z ^ (z >> 14)
    }

    /// Uniform float in `[0, 1)`.
    pub fn next_f32(&mut self) -> f32 {
        // 24 bits of mantissa keeps the conversion exact.
        (self.next_u32() >> 8) as f32 / (1u32 << 24) as f32
    }

    /// Uniform float in `[min, max)`.
    pub fn range_f32(&mut self, min: f32, max: f32) -> f32 {
        min + self.next_f32() * (max - min)
    }

    /// Uniform integer in `[0, bound)`. Returns 0 for a zero bound.
    pub fn below(&mut self, bound: u32) -> u32 {
        if bound == 0 {
            0
        } else {
            self.next_u32() % bound
        }
    }

    /// Weighted index selection. Returns `None` for an empty or zero-weight
    /// slice.
    pub fn weighted_index(&mut self, weights: &[f32]) -> Option<usize> {
        let total: f32 = weights.iter().copied().filter(|w| *w > 0.0).sum();
        if total <= 0.0 {
            return None;
        }
        let mut pick = self.next_f32() * total;
        for (i, w) in weights.iter().enumerate() {
            if *w <= 0.0 {
                continue;
            }
            if pick < *w {
                return Some(i);
            }
            pick -= *w;
        }
        // Floating-point tail: fall back to the last positive weight.
        weights.iter().rposition(|w| *w > 0.0)
    }
}
