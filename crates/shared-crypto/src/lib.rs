//! # Shared Crypto - Ledger Integrity Primitives
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `hashing` | SHA-256 | Ledger entry digests, Merkle nodes |
//! | `signatures` | Ed25519 | Node commit signatures |
//! | `nonce` | SHA-256 commitment | Hash-then-reveal nonce chain |
//!
//! ## Security Properties
//!
//! - **Ed25519**: Deterministic signatures, no RNG dependency when signing
//! - **Nonce commitments**: `H(nonce)` is binding; the pre-image is only
//!   disclosed in a later round

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod errors;
pub mod hashing;
pub mod nonce;
pub mod signatures;

// Re-exports
pub use errors::CryptoError;
pub use hashing::{sha256, sha256_many, Sha256Hasher};
pub use nonce::{HashedNonce, Nonce};
pub use signatures::{Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    #[test]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
    }
}
