//! # Signer State
//!
//! ```text
//!            new entries                  commit observed
//!   ┌──────────────────────┐           ┌─────────────────┐
//!   ▼                      │           ▼                 │
//! [Unsigned] ──sign──→ [Signed] ──────────────→ [CommitKnown]
//!   ▲                                                │
//!   └────────────────── new entries ─────────────────┘
//!
//!   any integrity fault ──→ [Halted]  (terminal)
//! ```

use shared_types::{Hash, SeqNo, View};
use std::fmt;

/// Where the signer stands relative to the ledger it is signing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningState {
    /// Content up to `seqno - 1` is not covered by any signature yet.
    Unsigned {
        /// Seqno the next signature would take.
        seqno: SeqNo,
    },
    /// Last signature covers all content; its commitment is not known.
    Signed {
        /// Seqno of the last signature.
        seqno: SeqNo,
        /// Its view.
        view: View,
        /// Its root.
        root: Hash,
    },
    /// Last signature covers all content and is itself committed.
    CommitKnown {
        /// Seqno of the last signature.
        seqno: SeqNo,
        /// Commit point observed.
        commit_seqno: SeqNo,
        /// View of the commit point.
        commit_view: View,
    },
    /// An integrity fault stopped the signer.
    Halted,
}

impl SigningState {
    /// True once halted.
    pub fn is_halted(&self) -> bool {
        matches!(self, Self::Halted)
    }
}

impl fmt::Display for SigningState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsigned { seqno } => write!(f, "unsigned(next={seqno})"),
            Self::Signed { seqno, view, .. } => write!(f, "signed({view}.{seqno})"),
            Self::CommitKnown {
                seqno,
                commit_seqno,
                commit_view,
            } => write!(f, "commit-known({seqno}, commit={commit_view}.{commit_seqno})"),
            Self::Halted => write!(f, "halted"),
        }
    }
}
