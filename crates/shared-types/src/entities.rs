//! # Core Domain Entities
//!
//! Ledger positions and node identity.
//!
//! - **Ordering**: `SeqNo`, `View`, `TxId`
//! - **Integrity**: `Hash`
//! - **Identity**: `NodeId`

use serde::{Deserialize, Serialize};
use std::fmt;

/// A 32-byte SHA-256 digest.
pub type Hash = [u8; 32];

/// Position of an entry in the ledger. The first entry has sequence number 1.
pub type SeqNo = u64;

/// Consensus epoch in which an entry was ordered.
pub type View = u64;

/// Identifier of a ledger transaction: the view it was ordered in and its
/// sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TxId {
    /// Consensus view.
    pub view: View,
    /// Ledger sequence number.
    pub seqno: SeqNo,
}

impl TxId {
    /// Create a transaction id.
    pub const fn new(view: View, seqno: SeqNo) -> Self {
        Self { view, seqno }
    }

    /// True if `self` is at or beyond `other` on both axes.
    pub fn dominates(&self, other: &TxId) -> bool {
        self.seqno >= other.seqno && self.view >= other.view
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.view, self.seqno)
    }
}

/// Identity of a signing node: its Ed25519 verifying key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct NodeId(pub [u8; 32]);

impl NodeId {
    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // First 8 bytes are enough to tell nodes apart in logs.
        write!(f, "{}", hex::encode(&self.0[..8]))
    }
}
