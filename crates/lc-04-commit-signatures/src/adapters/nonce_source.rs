use rand::rngs::{OsRng, StdRng};
use rand::SeedableRng;
use shared_crypto::Nonce;

use crate::ports::outbound::NonceSource;

/// Nonces from the operating system RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsNonceSource;

impl NonceSource for OsNonceSource {
    fn next_nonce(&mut self) -> Nonce {
        Nonce::random(&mut OsRng)
    }
}

/// Reproducible nonces for tests and simulations.
#[derive(Debug, Clone)]
pub struct SeededNonceSource {
    rng: StdRng,
}

impl SeededNonceSource {
    /// Source seeded with `seed`.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl NonceSource for SeededNonceSource {
    fn next_nonce(&mut self) -> Nonce {
        Nonce::random(&mut self.rng)
    }
}
