//! A self-contained 64-bit KISS-style generator.
//!
//! Per the design notes, randomness here must never depend on a
//! host-provided source: the generator below is a small, fully specified
//! combination of a 64-bit linear congruential generator, a 64-bit xorshift
//! generator and a multiply-with-carry generator (in the spirit of
//! Marsaglia's KISS family), seeded from a pair of 32-bit words. Given the
//! same seed it produces the same stream on every platform, which is what
//! the reproducibility tests in `simulation` rely on.

use crate::Float;
use rand_core::{Error, RngCore, SeedableRng};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Kiss64 {
    x: u64,
    y: u64,
    z: u64,
    c: u64,
}

impl Kiss64 {
    /// Advances the generator and returns the next raw 64-bit word.
    fn step(&mut self) -> u64 {
        // Multiplicative congruential term.
        self.x = self.x.wrapping_mul(1_490_024_343_005_336_237).wrapping_add(123_456_789);

        // 64-bit xorshift term.
        self.y ^= self.y << 21;
        self.y ^= self.y >> 17;
        self.y ^= self.y << 30;

        // Multiply-with-carry term.
        let t = (4_294_584_393u64 as u128) * (self.z as u128) + (self.c as u128);
        self.c = (t >> 32) as u64;
        self.z = t as u64;

        self.x.wrapping_add(self.y).wrapping_add(self.z)
    }

    /// Returns a `Float` uniformly distributed in `[0, 1)`.
    pub fn next_uniform(&mut self) -> Float {
        // Use the top 53 (or 24 for `single`) bits for a uniform double in
        // the reference interval, matching the common "divide by 2^53" trick.
        let bits = self.next_u64() >> 11;
        (bits as Float) * (1.0 / (1u64 << 53) as Float)
    }
}

impl SeedableRng for Kiss64 {
    type Seed = [u8; 8];

    fn from_seed(seed: [u8; 8]) -> Kiss64 {
        let s0 = u32::from_le_bytes([seed[0], seed[1], seed[2], seed[3]]);
        let s1 = u32::from_le_bytes([seed[4], seed[5], seed[6], seed[7]]);
        Kiss64::from_seed_words(s0, s1)
    }
}

impl Kiss64 {
    /// Constructs a generator from the pair of 32-bit seed words described
    /// in the design notes. The state words are mixed with distinct odd
    /// constants so that small or related seeds (e.g. `(0, 0)`, `(1, 0)`)
    /// still diverge into well-spread initial state.
    pub fn from_seed_words(s0: u32, s1: u32) -> Kiss64 {
        let seed = ((s0 as u64) << 32) | (s1 as u64);
        let mut rng = Kiss64 {
            x: seed ^ 0x9E37_79B9_7F4A_7C15,
            y: (seed.rotate_left(17)) ^ 0x6C62_272E_07BB_0142 | 1,
            z: (seed.rotate_left(37)) ^ 0xBF58_476D_1CE4_E5B9 | 1,
            c: 0x1234_5678,
        };
        // Warm up so the first output does not trivially leak the seed.
        for _ in 0..8 {
            rng.step();
        }
        rng
    }
}

impl RngCore for Kiss64 {
    fn next_u32(&mut self) -> u32 {
        (self.step() >> 32) as u32
    }

    fn next_u64(&mut self) -> u64 {
        self.step()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        let mut chunks = dest.chunks_exact_mut(8);
        for chunk in &mut chunks {
            chunk.copy_from_slice(&self.next_u64().to_le_bytes());
        }
        let rem = chunks.into_remainder();
        if !rem.is_empty() {
            let bytes = self.next_u64().to_le_bytes();
            rem.copy_from_slice(&bytes[..rem.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

/// Draws one sample from the standard normal distribution using the
/// Box–Muller transform, as required for thermal velocity sampling.
pub fn standard_normal(rng: &mut Kiss64) -> Float {
    // Avoid ln(0) by excluding zero from the first uniform draw.
    let mut u1 = rng.next_uniform();
    while u1 <= Float::EPSILON {
        u1 = rng.next_uniform();
    }
    let u2 = rng.next_uniform();

    let two_pi = crate::consts::TWOPI;
    (-2.0 * u1.ln()).sqrt() * (two_pi * u2).cos()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_stream() {
        let mut a = Kiss64::from_seed_words(42, 7);
        let mut b = Kiss64::from_seed_words(42, 7);
        for _ in 0..1000 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn different_seeds_diverge() {
        let mut a = Kiss64::from_seed_words(1, 0);
        let mut b = Kiss64::from_seed_words(0, 1);
        assert_ne!(a.next_u64(), b.next_u64());
    }

    #[test]
    fn uniform_in_unit_interval() {
        let mut rng = Kiss64::from_seed_words(1, 1);
        for _ in 0..10_000 {
            let u = rng.next_uniform();
            assert!((0.0..1.0).contains(&u));
        }
    }

    #[test]
    fn normal_samples_are_finite_and_centered() {
        let mut rng = Kiss64::from_seed_words(9, 9);
        let n = 20_000;
        let mut sum = 0.0;
        for _ in 0..n {
            let s = standard_normal(&mut rng);
            assert!(s.is_finite());
            sum += s;
        }
        let mean = sum / n as Float;
        assert!(mean.abs() < 0.05, "mean = {}", mean);
    }
}
