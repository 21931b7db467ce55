//! Errors from key handling and signature checks.

use thiserror::Error;

/// Why a key or signature was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// The signature does not match the key and message.
    #[error("signature does not verify")]
    SignatureVerificationFailed,

    /// Stored signature bytes are not 64 bytes long.
    #[error("malformed signature: {0} bytes, expected 64")]
    InvalidSignatureFormat(usize),

    /// The bytes are not a valid Ed25519 point.
    #[error("not a valid Ed25519 verifying key")]
    InvalidPublicKey,

    /// A seed or key has the wrong length.
    #[error("expected {expected} key bytes, found {actual}")]
    InvalidKeyLength {
        /// Required length.
        expected: usize,
        /// Length supplied.
        actual: usize,
    },

    /// A hex-encoded seed could not be decoded.
    #[error("bad hex: {0}")]
    InvalidHex(String),
}
