//! # Signature Auditor
//!
//! Third-party verification of a signature log. Every problem becomes an
//! [`AuditFinding`]; nothing is dropped and the audit never stops early.
//!
//! Checks, per node, over its signatures in log order:
//!
//! | Check | Finding |
//! |-------|---------|
//! | Ed25519 signature under `node` | `InvalidSignature` |
//! | `tree` decodes and passes its shape check | `MalformedTree` |
//! | `tree` folds to `root` and covers `seqno - 1` entries | `FrontierMismatch` |
//! | `commit <= (seqno, view)` | `CommitBeyondSignature` |
//! | seqno strictly increases | `SeqnoNotIncreasing` |
//! | view never decreases | `ViewRegressed` |
//! | commit point never decreases | `CommitRegressed` |
//! | revealed nonce opens previous commitment | `NonceMismatch` |
//! | dedicated reveal valid and opening | `InvalidReveal` |
//! | some reveal exists for every non-final signature | `MissingReveal` |
//! | root matches the ledger (optional) | `LedgerRootMismatch`, `LedgerTooShort` |

use serde::Serialize;
use shared_types::{Hash, NodeId, SeqNo, TxId, View};
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::domain::merkle::MerkleHistory;
use crate::domain::signature::{NonceReveal, PrimarySignature};

/// One problem found in a signature log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditFinding {
    /// Signature bytes do not verify.
    InvalidSignature {
        /// Signer.
        node: NodeId,
        /// Signature seqno.
        seqno: SeqNo,
        /// Verification error.
        reason: String,
    },
    /// `tree` cannot be decoded or is misshapen.
    MalformedTree {
        /// Signer.
        node: NodeId,
        /// Signature seqno.
        seqno: SeqNo,
        /// Decoding or shape error.
        reason: String,
    },
    /// `tree` does not fold to `root`, or covers the wrong number of entries.
    FrontierMismatch {
        /// Signer.
        node: NodeId,
        /// Signature seqno.
        seqno: SeqNo,
    },
    /// Commit point lies beyond the signature's own position.
    CommitBeyondSignature {
        /// Signer.
        node: NodeId,
        /// Signature seqno.
        seqno: SeqNo,
        /// Claimed commit point.
        commit: TxId,
    },
    /// Seqno did not increase.
    SeqnoNotIncreasing {
        /// Signer.
        node: NodeId,
        /// Signature seqno.
        seqno: SeqNo,
        /// Seqno of the signature before it.
        previous: SeqNo,
    },
    /// View went backwards.
    ViewRegressed {
        /// Signer.
        node: NodeId,
        /// Signature seqno.
        seqno: SeqNo,
        /// Its view.
        view: View,
        /// View of the signature before it.
        previous: View,
    },
    /// Commit point went backwards.
    CommitRegressed {
        /// Signer.
        node: NodeId,
        /// Signature seqno.
        seqno: SeqNo,
        /// Its commit point.
        commit: TxId,
        /// Commit point of the signature before it.
        previous: TxId,
    },
    /// Revealed nonce does not open the previous commitment.
    NonceMismatch {
        /// Signer.
        node: NodeId,
        /// Seqno of the revealing signature.
        seqno: SeqNo,
        /// Seqno whose commitment was not opened.
        previous_seqno: SeqNo,
    },
    /// A dedicated reveal is badly signed or does not open its commitment.
    InvalidReveal {
        /// Signer.
        node: NodeId,
        /// Seqno the reveal claims to open.
        seqno: SeqNo,
    },
    /// A commitment was never opened although a later signature exists.
    MissingReveal {
        /// Signer.
        node: NodeId,
        /// Seqno of the later signature.
        seqno: SeqNo,
        /// Seqno whose commitment is unopened.
        previous_seqno: SeqNo,
    },
    /// Root differs from the tree over the supplied ledger.
    LedgerRootMismatch {
        /// Signer.
        node: NodeId,
        /// Signature seqno.
        seqno: SeqNo,
    },
    /// Supplied ledger ends before the entries the signature covers.
    LedgerTooShort {
        /// Signer.
        node: NodeId,
        /// Signature seqno.
        seqno: SeqNo,
        /// Number of ledger digests supplied.
        ledger_len: u64,
    },
}

impl AuditFinding {
    /// Seqno the finding is about.
    pub fn seqno(&self) -> SeqNo {
        match self {
            Self::InvalidSignature { seqno, .. }
            | Self::MalformedTree { seqno, .. }
            | Self::FrontierMismatch { seqno, .. }
            | Self::CommitBeyondSignature { seqno, .. }
            | Self::SeqnoNotIncreasing { seqno, .. }
            | Self::ViewRegressed { seqno, .. }
            | Self::CommitRegressed { seqno, .. }
            | Self::NonceMismatch { seqno, .. }
            | Self::InvalidReveal { seqno, .. }
            | Self::MissingReveal { seqno, .. }
            | Self::LedgerRootMismatch { seqno, .. }
            | Self::LedgerTooShort { seqno, .. } => *seqno,
        }
    }

    /// True for findings that prove a node signed conflicting statements.
    pub fn is_equivocation(&self) -> bool {
        matches!(
            self,
            Self::NonceMismatch { .. }
                | Self::InvalidReveal { .. }
                | Self::LedgerRootMismatch { .. }
        )
    }
}

/// Result of one audit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    /// Signatures examined.
    pub signatures_checked: usize,
    /// Distinct signers seen.
    pub nodes: usize,
    /// Every problem found.
    pub findings: Vec<AuditFinding>,
}

impl AuditReport {
    /// True if nothing was found.
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }
}

/// Verifier for signature logs.
#[derive(Debug, Clone, Default)]
pub struct SignatureAuditor {
    reveals: BTreeMap<(NodeId, SeqNo), NonceReveal>,
    ledger: Option<MerkleHistory>,
}

impl SignatureAuditor {
    /// Auditor with no reveals and no ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Dedicated nonce reveals to accept in place of inline ones.
    pub fn with_reveals(mut self, reveals: impl IntoIterator<Item = NonceReveal>) -> Self {
        for reveal in reveals {
            self.reveals.insert((reveal.node, reveal.seqno), reveal);
        }
        self
    }

    /// Ledger entry digests, entry `seqno` at index `seqno - 1`, to check
    /// roots against.
    pub fn with_ledger(mut self, digests: &[Hash]) -> Self {
        self.ledger = Some(MerkleHistory::from_digests(digests));
        self
    }

    /// Audit `signatures`, given in log order.
    pub fn audit(&self, signatures: impl IntoIterator<Item = PrimarySignature>) -> AuditReport {
        let mut by_node: BTreeMap<NodeId, Vec<PrimarySignature>> = BTreeMap::new();
        let mut report = AuditReport::default();
        for signature in signatures {
            report.signatures_checked += 1;
            by_node.entry(signature.node()).or_default().push(signature);
        }
        report.nodes = by_node.len();

        for (node, chain) in &by_node {
            self.audit_node(*node, chain, &mut report.findings);
        }

        for finding in &report.findings {
            warn!(?finding, "Audit finding");
        }
        info!(
            signatures = report.signatures_checked,
            nodes = report.nodes,
            findings = report.findings.len(),
            "Audit complete"
        );
        report
    }

    fn audit_node(&self, node: NodeId, chain: &[PrimarySignature], out: &mut Vec<AuditFinding>) {
        let mut previous: Option<&PrimarySignature> = None;
        for sig in chain {
            let seqno = sig.seqno;
            self.check_standalone(node, sig, out);

            if let Some(prev) = previous {
                if seqno <= prev.seqno {
                    out.push(AuditFinding::SeqnoNotIncreasing {
                        node,
                        seqno,
                        previous: prev.seqno,
                    });
                }
                if sig.view < prev.view {
                    out.push(AuditFinding::ViewRegressed {
                        node,
                        seqno,
                        view: sig.view,
                        previous: prev.view,
                    });
                }
                if !sig.commit_id().dominates(&prev.commit_id()) {
                    out.push(AuditFinding::CommitRegressed {
                        node,
                        seqno,
                        commit: sig.commit_id(),
                        previous: prev.commit_id(),
                    });
                }
                self.check_nonce_link(node, prev, sig, out);
            }
            previous = Some(sig);
        }

        // The final commitment may legitimately still be pending, but a
        // reveal that was published must be sound.
        if let Some(last) = previous {
            if let Some(reveal) = self.reveals.get(&(node, last.seqno)) {
                if !reveal_opens(reveal, last) {
                    out.push(AuditFinding::InvalidReveal {
                        node,
                        seqno: last.seqno,
                    });
                }
            }
        }
    }

    fn check_standalone(&self, node: NodeId, sig: &PrimarySignature, out: &mut Vec<AuditFinding>) {
        let seqno = sig.seqno;
        if let Err(e) = sig.verify() {
            out.push(AuditFinding::InvalidSignature {
                node,
                seqno,
                reason: e.to_string(),
            });
        }

        match sig.frontier() {
            Err(fault) => out.push(AuditFinding::MalformedTree {
                node,
                seqno,
                reason: fault.to_string(),
            }),
            Ok(frontier) => {
                let covers = frontier.leaf_count.checked_add(1) == Some(seqno);
                if !covers || frontier.root().ok() != Some(sig.root) {
                    out.push(AuditFinding::FrontierMismatch { node, seqno });
                }
            }
        }

        if sig.commit_seqno > seqno || sig.commit_view > sig.view {
            out.push(AuditFinding::CommitBeyondSignature {
                node,
                seqno,
                commit: sig.commit_id(),
            });
        }

        if let Some(ledger) = &self.ledger {
            match ledger.root_at(seqno.saturating_sub(1)) {
                None => out.push(AuditFinding::LedgerTooShort {
                    node,
                    seqno,
                    ledger_len: ledger.len(),
                }),
                Some(root) if root != sig.root => {
                    out.push(AuditFinding::LedgerRootMismatch { node, seqno })
                }
                Some(_) => {}
            }
        }
    }

    fn check_nonce_link(
        &self,
        node: NodeId,
        prev: &PrimarySignature,
        sig: &PrimarySignature,
        out: &mut Vec<AuditFinding>,
    ) {
        match (&sig.base.revealed_nonce, self.reveals.get(&(node, prev.seqno))) {
            (Some(nonce), _) => {
                if !prev.base.hashed_nonce.is_opened_by(nonce) {
                    out.push(AuditFinding::NonceMismatch {
                        node,
                        seqno: sig.seqno,
                        previous_seqno: prev.seqno,
                    });
                }
            }
            (None, Some(reveal)) => {
                if !reveal_opens(reveal, prev) {
                    out.push(AuditFinding::InvalidReveal {
                        node,
                        seqno: prev.seqno,
                    });
                }
            }
            (None, None) => out.push(AuditFinding::MissingReveal {
                node,
                seqno: sig.seqno,
                previous_seqno: prev.seqno,
            }),
        }
    }
}

fn reveal_opens(reveal: &NonceReveal, sig: &PrimarySignature) -> bool {
    reveal.verify().is_ok() && reveal.opens(&sig.base.hashed_nonce)
}
