//! Short random identifiers for new blocks and documents.
//!
//! Identifiers are 10 symbols drawn uniformly from a 64-symbol URL-safe
//! alphabet (60 bits). They are not checked for uniqueness; a collision is
//! possible in theory and is not handled.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// URL-safe alphabet, 64 symbols.
const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789_-";

/// Length of every generated identifier.
pub const ID_LEN: usize = 10;

/// Identifier generator.
///
/// Owned by whoever creates blocks (the factory borrows it mutably) instead
/// of living in a process-wide singleton. Use [`IdGenerator::seeded`] for
/// reproducible output in tests.
#[derive(Debug, Clone)]
pub struct IdGenerator {
    rng: StdRng,
}

impl IdGenerator {
    /// Generator seeded from OS entropy.
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic generator.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Produce the next identifier.
    pub fn next_id(&mut self) -> String {
        (0..ID_LEN)
            .map(|_| ALPHABET[self.rng.gen_range(0..ALPHABET.len())] as char)
            .collect()
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_have_fixed_length_and_alphabet() {
        let mut ids = IdGenerator::new();
        for _ in 0..100 {
            let id = ids.next_id();
            assert_eq!(id.len(), ID_LEN);
            assert!(id.bytes().all(|b| ALPHABET.contains(&b)), "{id}");
        }
    }

    #[test]
    fn test_seeded_generators_repeat() {
        let mut a = IdGenerator::seeded(7);
        let mut b = IdGenerator::seeded(7);
        let first: Vec<_> = (0..5).map(|_| a.next_id()).collect();
        let second: Vec<_> = (0..5).map(|_| b.next_id()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_consecutive_ids_differ() {
        let mut ids = IdGenerator::seeded(1);
        assert_ne!(ids.next_id(), ids.next_id());
    }
}
