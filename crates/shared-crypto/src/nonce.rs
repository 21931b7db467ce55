//! # Hash-then-Reveal Nonces
//!
//! A signer publishes `H(nonce)` with one signature and discloses `nonce`
//! later. Anyone holding both can check the opening; a pre-image that does
//! not hash to the published commitment is evidence of equivocation.

use crate::hashing::sha256_many;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Domain separator so nonce commitments never collide with other digests.
const NONCE_DOMAIN: &[u8] = b"ledger-core/nonce/v1";

/// A 32-byte nonce pre-image.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Nonce([u8; 32]);

impl Nonce {
    /// Wrap raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Draw a fresh nonce from a cryptographic RNG.
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut bytes = [0u8; 32];
        rng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Commitment published before the nonce is revealed.
    pub fn commit(&self) -> HashedNonce {
        HashedNonce(sha256_many(&[NONCE_DOMAIN, &self.0]))
    }
}

impl fmt::Debug for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Nonce({})", hex::encode(self.0))
    }
}

/// Commitment `H(nonce)`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct HashedNonce(pub [u8; 32]);

impl HashedNonce {
    /// True if `nonce` is the pre-image of this commitment.
    pub fn is_opened_by(&self, nonce: &Nonce) -> bool {
        nonce.commit() == *self
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for HashedNonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HashedNonce({})", hex::encode(self.0))
    }
}
