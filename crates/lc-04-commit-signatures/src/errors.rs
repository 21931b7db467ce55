//! # Error Types

use lc_01_versioned_store::StoreError;
use shared_crypto::CryptoError;
use shared_types::{SeqNo, View};
use thiserror::Error;

/// Inconsistencies in the signer's own tree or nonce state.
///
/// A signer that hits one of these stops signing for good.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntegrityFault {
    /// Frontier fails its shape check or cannot be decoded.
    #[error("malformed merkle tree: {0}")]
    MalformedTree(String),

    /// The frontier does not fold to the root being signed.
    #[error("frontier root does not match tree root at seqno {seqno}")]
    RootMismatch { seqno: SeqNo },

    /// The pending nonce no longer opens the last published commitment.
    #[error("nonce chain broken after seqno {seqno}")]
    NonceChainBroken { seqno: SeqNo },

    /// Ledger entries must arrive in seqno order without gaps.
    #[error("ledger entry {actual} appended where {expected} was expected")]
    NonContiguousEntry { expected: SeqNo, actual: SeqNo },

    /// The history is shorter than an already-produced signature implies.
    #[error("history holds {history} entries but seqno {signed} was already signed")]
    HistoryRegressed { signed: SeqNo, history: u64 },

    /// A freshly produced signature failed to verify under the node's key.
    #[error("self-verification failed for signature at seqno {seqno}")]
    SelfVerificationFailed { seqno: SeqNo },
}

/// Errors from signing and the signature log.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    /// Integrity fault detected by this call. The signer is now halted.
    #[error("integrity fault: {0}")]
    Integrity(#[from] IntegrityFault),

    /// The signer halted earlier and refuses all further work.
    #[error("signer halted: {0}")]
    Halted(IntegrityFault),

    /// Different inputs at a seqno this node already signed.
    #[error("seqno {seqno} already signed with different inputs")]
    ConflictingResign { seqno: SeqNo },

    /// Signing view is older than the view of the last signature.
    #[error("view {view} is older than last signed view {last}")]
    ViewRegression { view: View, last: View },

    /// Consensus reported a commit point past the local history.
    #[error("commit seqno {commit} is beyond local history of {history} entries")]
    CommitBeyondHistory { commit: SeqNo, history: u64 },

    /// A different signature is already stored at this seqno.
    #[error("a different signature already exists at seqno {seqno}")]
    AlreadyExists { seqno: SeqNo },

    /// Store failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Payload encoding failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Key or signature material was rejected.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

impl SignatureError {
    /// True for integrity faults and the halted state they leave behind.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Integrity(_) | Self::Halted(_))
    }
}
