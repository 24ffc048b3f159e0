//! Seeded linear-congruential generator.
//!
//! Motion selection must be reproducible byte-for-byte for a given seed, so
//! the generator is an explicit value carrying its state. Every shot gets a
//! fresh generator derived from the job seed, its index and its position.

use reel_models::Seed;

const LCG_MULTIPLIER: u32 = 1_664_525;
const LCG_INCREMENT: u32 = 1_013_904_223;

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// 32-bit LCG (Numerical Recipes constants).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeededRng {
    state: u32,
}

impl SeededRng {
    pub fn new(state: u32) -> Self {
        Self { state }
    }

    /// Generator for one shot.
    ///
    /// Position is taken in thousandths so that the same index in sequences
    /// of different length draws different values.
    pub fn for_shot(seed: &Seed, shot_index: usize, total_shots: usize) -> Self {
        let position = if total_shots > 1 {
            shot_index as f64 / (total_shots - 1) as f64
        } else {
            0.0
        };
        let position_key = (position * 1000.0).round() as u32;

        let mut state = seed_hash(seed);
        state = mix(state, shot_index as u32);
        state = mix(state, position_key);
        Self::new(state)
    }

    pub fn state(&self) -> u32 {
        self.state
    }

    /// Advance and return the new raw state.
    pub fn next_u32(&mut self) -> u32 {
        self.state = self
            .state
            .wrapping_mul(LCG_MULTIPLIER)
            .wrapping_add(LCG_INCREMENT);
        self.state
    }

    /// Uniform sample in [0, 1).
    pub fn next_f64(&mut self) -> f64 {
        self.next_u32() as f64 / (u32::MAX as f64 + 1.0)
    }

    /// Uniform sample in [low, high).
    pub fn range(&mut self, low: f64, high: f64) -> f64 {
        low + (high - low) * self.next_f64()
    }
}

/// Stable 32-bit hash of a job seed.
pub fn seed_hash(seed: &Seed) -> u32 {
    match seed {
        Seed::Number(n) => (*n as u32) ^ ((*n >> 32) as u32),
        Seed::Text(text) => fnv1a(text.as_bytes()),
    }
}

fn fnv1a(bytes: &[u8]) -> u32 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, b| {
        (hash ^ *b as u32).wrapping_mul(FNV_PRIME)
    })
}

fn mix(state: u32, value: u32) -> u32 {
    (state ^ value.wrapping_mul(0x9e37_79b9)).wrapping_mul(FNV_PRIME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lcg_sequence() {
        let mut rng = SeededRng::new(0);
        assert_eq!(rng.next_u32(), 1_013_904_223);
        assert_eq!(
            rng.next_u32(),
            1_013_904_223u32
                .wrapping_mul(1_664_525)
                .wrapping_add(1_013_904_223)
        );
    }

    #[test]
    fn test_unit_interval() {
        let mut rng = SeededRng::new(42);
        for _ in 0..1000 {
            let v = rng.next_f64();
            assert!((0.0..1.0).contains(&v));
        }
    }

    #[test]
    fn test_fnv1a_known_value() {
        assert_eq!(fnv1a(b""), FNV_OFFSET_BASIS);
        assert_eq!(fnv1a(b"a"), 0xe40c_292c);
    }

    #[test]
    fn test_shot_generators_are_reproducible_and_distinct() {
        let seed = Seed::from("job-1");
        let a = SeededRng::for_shot(&seed, 2, 6);
        let b = SeededRng::for_shot(&seed, 2, 6);
        assert_eq!(a, b);
        assert_ne!(a, SeededRng::for_shot(&seed, 3, 6));
        assert_ne!(a, SeededRng::for_shot(&Seed::from("job-2"), 2, 6));
    }
}
