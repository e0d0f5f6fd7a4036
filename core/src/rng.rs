//! Seeded 32-bit pseudorandom generator used by every deterministic stream.

use rand::{Error, RngCore, SeedableRng};

const STATE_INCREMENT: u32 = 0x6d2b_79f5;
const UNIT_SCALE: f64 = 1.0 / 4_294_967_296.0;

/// Integer state-mixing generator whose output is a pure function of its state.
///
/// Two generators created from the same seed yield identical sequences on every
/// platform. The generator implements [`RngCore`] so it can drive any `rand`
/// sampling helper, while [`DeterministicRng::next_unit`] exposes the raw
/// `[0, 1)` stream used by replay jitter and room layout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeterministicRng {
    state: u32,
}

impl DeterministicRng {
    /// Creates a generator positioned at the provided seed.
    #[must_use]
    pub const fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Current internal state; feeding it back into [`DeterministicRng::new`] resumes the stream.
    #[must_use]
    pub const fn state(&self) -> u32 {
        self.state
    }

    /// Advances the state and returns the next mixed 32-bit value.
    pub fn next_word(&mut self) -> u32 {
        self.state = self.state.wrapping_add(STATE_INCREMENT);
        let t = self.state;
        let mut r = (t ^ (t >> 15)).wrapping_mul(1 | t);
        r ^= r.wrapping_add((r ^ (r >> 7)).wrapping_mul(61 | r));
        r ^ (r >> 14)
    }

    /// Returns a uniformly distributed value in `[0, 1)`.
    pub fn next_unit(&mut self) -> f64 {
        f64::from(self.next_word()) * UNIT_SCALE
    }

    /// Returns a uniformly distributed value in `(0, 1)`, rejecting exact zeros.
    pub fn next_unit_open(&mut self) -> f64 {
        loop {
            let value = self.next_unit();
            if value > 0.0 {
                return value;
            }
        }
    }
}

impl RngCore for DeterministicRng {
    fn next_u32(&mut self) -> u32 {
        self.next_word()
    }

    fn next_u64(&mut self) -> u64 {
        let high = u64::from(self.next_word());
        let low = u64::from(self.next_word());
        (high << 32) | low
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let bytes = self.next_word().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl SeedableRng for DeterministicRng {
    type Seed = [u8; 4];

    fn from_seed(seed: Self::Seed) -> Self {
        Self::new(u32::from_le_bytes(seed))
    }
}

#[cfg(test)]
mod tests {
    use super::DeterministicRng;
    use rand::Rng;

    #[test]
    fn identical_seeds_replay_identical_streams() {
        let mut first = DeterministicRng::new(999);
        let mut second = DeterministicRng::new(999);
        for _ in 0..64 {
            assert_eq!(first.next_word(), second.next_word());
        }
    }

    #[test]
    fn first_words_match_reference_sequence() {
        let mut rng = DeterministicRng::new(0);
        let words: Vec<u32> = (0..3).map(|_| rng.next_word()).collect();
        assert_eq!(words, vec![1_144_304_738, 1_416_247, 958_946_056]);
    }

    #[test]
    fn unit_samples_stay_in_half_open_range() {
        let mut rng = DeterministicRng::new(12_345);
        for _ in 0..1_000 {
            let value = rng.next_unit();
            assert!((0.0..1.0).contains(&value));
        }
    }

    #[test]
    fn state_round_trips_into_new_generator() {
        let mut rng = DeterministicRng::new(7);
        let _ = rng.next_word();
        let mut resumed = DeterministicRng::new(rng.state());
        assert_eq!(rng.next_word(), resumed.next_word());
    }

    #[test]
    fn drives_rand_sampling_helpers() {
        let mut rng = DeterministicRng::new(42);
        let index = rng.gen_range(0..5usize);
        assert!(index < 5);
    }
}
