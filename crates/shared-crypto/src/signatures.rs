//! # Ed25519 Signatures
//!
//! Node identity keys. A node's id is its verifying key, so anyone holding a
//! signature record can check it without a key directory.
//!
//! Signing is deterministic (RFC 8032): the same key and message always give
//! the same bytes, which keeps re-signing idempotent. The signing key wipes
//! itself on drop (`ed25519-dalek`'s `zeroize` feature).

use crate::CryptoError;
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// Ed25519 verifying key, checked to be a valid curve point.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ed25519PublicKey([u8; 32]);

impl Ed25519PublicKey {
    /// Key from its 32-byte encoding.
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self, CryptoError> {
        Self::decode(&bytes)?;
        Ok(Self(bytes))
    }

    fn decode(bytes: &[u8; 32]) -> Result<VerifyingKey, CryptoError> {
        VerifyingKey::from_bytes(bytes).map_err(|_| CryptoError::InvalidPublicKey)
    }

    /// The 32-byte encoding.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Check `signature` over `message`.
    pub fn verify(&self, message: &[u8], signature: &Ed25519Signature) -> Result<(), CryptoError> {
        let sig = ed25519_dalek::Signature::from_bytes(signature.as_bytes());
        Self::decode(&self.0)?
            .verify(message, &sig)
            .map_err(|_| CryptoError::SignatureVerificationFailed)
    }
}

/// Raw 64-byte signature.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ed25519Signature([u8; 64]);

impl Ed25519Signature {
    /// Signature from its fixed-size encoding.
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Signature from a stored byte string; fails unless it is 64 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let array: [u8; 64] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidSignatureFormat(bytes.len()))?;
        Ok(Self(array))
    }

    /// The 64-byte encoding.
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }
}

/// A node's signing key.
pub struct Ed25519KeyPair {
    signing_key: SigningKey,
}

impl Ed25519KeyPair {
    /// Fresh key from the OS RNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut rand::rngs::OsRng),
        }
    }

    /// Key derived from a 32-byte secret seed.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&seed),
        }
    }

    /// Create from a hex-encoded 32-byte seed.
    pub fn from_seed_hex(seed_hex: &str) -> Result<Self, CryptoError> {
        let mut bytes =
            hex::decode(seed_hex.trim()).map_err(|e| CryptoError::InvalidHex(e.to_string()))?;
        let seed: [u8; 32] = match bytes.as_slice().try_into() {
            Ok(seed) => seed,
            Err(_) => {
                let actual = bytes.len();
                bytes.zeroize();
                return Err(CryptoError::InvalidKeyLength {
                    expected: 32,
                    actual,
                });
            }
        };
        bytes.zeroize();
        Ok(Self::from_seed(seed))
    }

    /// The verifying half.
    pub fn public_key(&self) -> Ed25519PublicKey {
        Ed25519PublicKey(self.signing_key.verifying_key().to_bytes())
    }

    /// Sign `message`.
    pub fn sign(&self, message: &[u8]) -> Ed25519Signature {
        Ed25519Signature(self.signing_key.sign(message).to_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify_root() {
        let node = Ed25519KeyPair::generate();
        let signature = node.sign(b"root@42");
        assert_eq!(node.public_key().verify(b"root@42", &signature), Ok(()));
        assert_eq!(
            node.public_key().verify(b"root@43", &signature),
            Err(CryptoError::SignatureVerificationFailed)
        );
    }

    #[test]
    fn test_other_node_cannot_vouch() {
        let a = Ed25519KeyPair::from_seed([1; 32]);
        let b = Ed25519KeyPair::from_seed([2; 32]);
        assert!(b.public_key().verify(b"root", &a.sign(b"root")).is_err());
    }

    #[test]
    fn test_resigning_is_bit_identical() {
        let node = Ed25519KeyPair::from_seed([0xAB; 32]);
        assert_eq!(node.sign(b"payload"), node.sign(b"payload"));
    }

    #[test]
    fn test_public_key_roundtrips_through_bytes() {
        let key = Ed25519KeyPair::from_seed([7; 32]).public_key();
        assert_eq!(Ed25519PublicKey::from_bytes(*key.as_bytes()), Ok(key));
    }

    #[test]
    fn test_seed_hex() {
        let from_hex = Ed25519KeyPair::from_seed_hex(&"ab".repeat(32)).unwrap();
        let from_seed = Ed25519KeyPair::from_seed([0xAB; 32]);
        assert_eq!(from_hex.public_key(), from_seed.public_key());

        assert!(matches!(
            Ed25519KeyPair::from_seed_hex("abcd"),
            Err(CryptoError::InvalidKeyLength { expected: 32, actual: 2 })
        ));
        assert!(matches!(
            Ed25519KeyPair::from_seed_hex("zz"),
            Err(CryptoError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_signature_from_slice() {
        assert!(Ed25519Signature::from_slice(&[0u8; 64]).is_ok());
        assert_eq!(
            Ed25519Signature::from_slice(&[0u8; 10]),
            Err(CryptoError::InvalidSignatureFormat(10))
        );
    }
}
