//! # Commit Signature Protocol
//!
//! One node's signer. It tracks the Merkle history of the ledger it signs,
//! the commit point reported by consensus, and the nonce chain linking its
//! consecutive signatures.
//!
//! The caller drives it:
//!
//! 1. [`CommitSignatureProtocol::append_entry`] for every ledger entry, in
//!    seqno order, including the signature entries themselves.
//! 2. [`CommitSignatureProtocol::observe_commit`] when consensus reports a
//!    new rollback-safe position.
//! 3. [`CommitSignatureProtocol::sign`] to produce the signature for the
//!    next seqno, which the caller writes at exactly that seqno.
//!
//! The protocol takes `&mut self` throughout; a node shares it behind a
//! mutex so only one seqno is ever being signed at a time.

use shared_crypto::Ed25519KeyPair;
use shared_types::{Hash, NodeId, SeqNo, TxId, View};
use std::fmt;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::domain::merkle::MerkleHistory;
use crate::domain::nonce_chain::NonceChain;
use crate::domain::signature::{NodeSignature, NonceReveal, PrimarySignature, SigningInputs};
use crate::domain::state::SigningState;
use crate::errors::{IntegrityFault, SignatureError};
use crate::ports::outbound::{ConsensusPort, NonceSource};

/// Signer for one node.
pub struct CommitSignatureProtocol<N: NonceSource> {
    keys: Ed25519KeyPair,
    node: NodeId,
    nonces: N,
    chain: NonceChain,
    history: MerkleHistory,
    commit: TxId,
    last: Option<PrimarySignature>,
    halted: Option<IntegrityFault>,
}

impl<N: NonceSource> CommitSignatureProtocol<N> {
    /// Signer for the node owning `keys`.
    pub fn new(keys: Ed25519KeyPair, nonces: N) -> Self {
        let node = NodeId(*keys.public_key().as_bytes());
        Self {
            keys,
            node,
            nonces,
            chain: NonceChain::new(),
            history: MerkleHistory::new(),
            commit: TxId::default(),
            last: None,
            halted: None,
        }
    }

    /// This node's identity.
    pub fn node_id(&self) -> NodeId {
        self.node
    }

    /// Tree over every appended entry.
    pub fn history(&self) -> &MerkleHistory {
        &self.history
    }

    /// Last observed commit point.
    pub fn commit_point(&self) -> TxId {
        self.commit
    }

    /// Most recent signature produced.
    pub fn last_signature(&self) -> Option<&PrimarySignature> {
        self.last.as_ref()
    }

    /// Fault that halted the signer.
    pub fn halt_reason(&self) -> Option<&IntegrityFault> {
        self.halted.as_ref()
    }

    /// True once an integrity fault has been hit.
    pub fn is_halted(&self) -> bool {
        self.halted.is_some()
    }

    /// Current position in the signing state machine.
    pub fn state(&self) -> SigningState {
        if self.halted.is_some() {
            return SigningState::Halted;
        }
        match &self.last {
            Some(last) if last.seqno >= self.history.len() => {
                if self.commit.seqno >= last.seqno {
                    SigningState::CommitKnown {
                        seqno: last.seqno,
                        commit_seqno: self.commit.seqno,
                        commit_view: self.commit.view,
                    }
                } else {
                    SigningState::Signed {
                        seqno: last.seqno,
                        view: last.view,
                        root: last.root,
                    }
                }
            }
            _ => SigningState::Unsigned {
                seqno: self.history.len() + 1,
            },
        }
    }

    fn ensure_running(&self) -> Result<(), SignatureError> {
        match &self.halted {
            Some(fault) => Err(SignatureError::Halted(fault.clone())),
            None => Ok(()),
        }
    }

    fn halt(&mut self, fault: IntegrityFault) -> SignatureError {
        error!(node = %self.node, %fault, "Integrity fault, signing halted");
        self.halted = Some(fault.clone());
        SignatureError::Integrity(fault)
    }

    fn guard<T>(&mut self, result: Result<T, IntegrityFault>) -> Result<T, SignatureError> {
        result.map_err(|fault| self.halt(fault))
    }

    /// Add the ledger entry at `seqno` to the history.
    pub fn append_entry(
        &mut self,
        seqno: SeqNo,
        entry_digest: &Hash,
    ) -> Result<(), SignatureError> {
        self.ensure_running()?;
        let expected = self.history.len() + 1;
        if seqno != expected {
            return Err(self.halt(IntegrityFault::NonContiguousEntry {
                expected,
                actual: seqno,
            }));
        }
        self.history.append(entry_digest);
        trace!(seqno, "Appended ledger entry");
        Ok(())
    }

    /// Record a rollback-safe position reported by consensus.
    ///
    /// Positions that do not advance the current one are ignored.
    pub fn observe_commit(&mut self, commit: TxId) -> Result<(), SignatureError> {
        self.ensure_running()?;
        if commit.seqno > self.history.len() {
            return Err(SignatureError::CommitBeyondHistory {
                commit: commit.seqno,
                history: self.history.len(),
            });
        }
        if !commit.dominates(&self.commit) {
            warn!(
                current = %self.commit,
                reported = %commit,
                "Ignoring commit point that does not advance"
            );
            return Ok(());
        }
        if commit != self.commit {
            debug!(commit = %commit, "Commit point advanced");
            self.commit = commit;
        }
        Ok(())
    }

    /// Sign the next seqno in `view`.
    ///
    /// Returns `Ok(None)` when nothing new has been appended since the last
    /// signature. Calling again before the returned signature is appended
    /// yields the same signature, provided view and commit point are
    /// unchanged.
    #[instrument(skip(self), fields(node = %self.node))]
    pub fn sign(&mut self, view: View) -> Result<Option<PrimarySignature>, SignatureError> {
        self.ensure_running()?;
        let seqno = self.history.len() + 1;
        let inputs = SigningInputs {
            node: self.node,
            seqno,
            view,
            commit: self.commit,
            root: self.history.root(),
        };

        let mut previous_seqno = 0;
        if let Some(last) = &self.last {
            if last.seqno == seqno {
                if last.inputs() == inputs {
                    debug!(seqno, "Re-sign with identical inputs");
                    return Ok(Some(last.clone()));
                }
                return Err(SignatureError::ConflictingResign { seqno });
            }
            if last.seqno > seqno {
                let fault = IntegrityFault::HistoryRegressed {
                    signed: last.seqno,
                    history: self.history.len(),
                };
                return Err(self.halt(fault));
            }
            if last.seqno == self.history.len() {
                trace!(seqno = last.seqno, "No new content since last signature");
                return Ok(None);
            }
            if view < last.view {
                return Err(SignatureError::ViewRegression {
                    view,
                    last: last.view,
                });
            }
            previous_seqno = last.seqno;
        } else if self.history.is_empty() {
            return Ok(None);
        }
        if self.commit.view > view {
            return Err(SignatureError::ViewRegression {
                view,
                last: self.commit.view,
            });
        }

        let frontier = self.history.frontier();
        let folded = self.guard(frontier.root())?;
        if folded != inputs.root {
            return Err(self.halt(IntegrityFault::RootMismatch { seqno }));
        }
        let tree = self.guard(frontier.to_bytes())?;
        if !self.chain.is_consistent() {
            return Err(self.halt(IntegrityFault::NonceChainBroken {
                seqno: previous_seqno,
            }));
        }

        let (revealed_nonce, hashed_nonce) = self.chain.advance(self.nonces.next_nonce());
        let sig = self.keys.sign(&inputs.payload(&hashed_nonce)?);
        let signature = PrimarySignature {
            seqno,
            view,
            commit_seqno: self.commit.seqno,
            commit_view: self.commit.view,
            root: inputs.root,
            tree,
            base: NodeSignature {
                sig: sig.as_bytes().to_vec(),
                node: self.node,
                hashed_nonce,
                revealed_nonce,
            },
        };
        if signature.verify().is_err() {
            return Err(self.halt(IntegrityFault::SelfVerificationFailed { seqno }));
        }

        info!(
            seqno,
            view,
            commit = %self.commit,
            root = %hex::encode(inputs.root),
            "Produced commit signature"
        );
        self.last = Some(signature.clone());
        Ok(Some(signature))
    }

    /// Observe the consensus commit point, then sign in its current view.
    pub fn sign_with<C: ConsensusPort + ?Sized>(
        &mut self,
        consensus: &C,
    ) -> Result<Option<PrimarySignature>, SignatureError> {
        self.observe_commit(consensus.commit_point())?;
        self.sign(consensus.current_view())
    }

    /// Disclose the nonce committed to by the last signature without
    /// producing a new one. The next signature then reveals nothing.
    pub fn reveal_pending(&mut self) -> Result<Option<NonceReveal>, SignatureError> {
        self.ensure_running()?;
        let Some(seqno) = self.last.as_ref().map(|last| last.seqno) else {
            return Ok(None);
        };
        if !self.chain.is_consistent() {
            return Err(self.halt(IntegrityFault::NonceChainBroken { seqno }));
        }
        let Some(nonce) = self.chain.take_pending() else {
            return Ok(None);
        };
        let reveal = NonceReveal::sign(&self.keys, self.node, seqno, nonce)?;
        info!(seqno, "Revealed pending nonce");
        Ok(Some(reveal))
    }
}

impl<N: NonceSource> fmt::Debug for CommitSignatureProtocol<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommitSignatureProtocol")
            .field("node", &self.node)
            .field("history", &self.history.len())
            .field("commit", &self.commit)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::SeededNonceSource;
    use shared_crypto::{sha256, Nonce};

    type Signer = CommitSignatureProtocol<SeededNonceSource>;

    fn signer() -> Signer {
        CommitSignatureProtocol::new(Ed25519KeyPair::from_seed([7; 32]), SeededNonceSource::new(1))
    }

    fn append(signer: &mut Signer, count: u64) {
        for _ in 0..count {
            let seqno = signer.history().len() + 1;
            signer.append_entry(seqno, &sha256(&seqno.to_le_bytes())).unwrap();
        }
    }

    fn append_signature(signer: &mut Signer, sig: &PrimarySignature) {
        signer
            .append_entry(sig.seqno, &sha256(&sig.payload().unwrap()))
            .unwrap();
    }

    struct FixedConsensus {
        view: View,
        commit: TxId,
    }

    impl ConsensusPort for FixedConsensus {
        fn current_view(&self) -> View {
            self.view
        }

        fn commit_point(&self) -> TxId {
            self.commit
        }
    }

    #[test]
    fn test_nothing_to_sign_is_noop() {
        let mut signer = signer();
        assert_eq!(signer.sign(1).unwrap(), None);
        assert_eq!(signer.state(), SigningState::Unsigned { seqno: 1 });
    }

    #[test]
    fn test_signature_covers_preceding_entries() {
        let mut signer = signer();
        append(&mut signer, 3);
        let sig = signer.sign(1).unwrap().unwrap();

        assert_eq!(sig.seqno, 4);
        assert_eq!(sig.root, signer.history().root());
        assert_eq!(sig.frontier().unwrap().leaf_count, 3);
        assert_eq!(sig.node(), signer.node_id());
        assert_eq!(sig.base.revealed_nonce, None);
        assert!(sig.verify().is_ok());
    }

    #[test]
    fn test_consecutive_signatures_chain_nonces() {
        let mut signer = signer();
        append(&mut signer, 2);
        let first = signer.sign(1).unwrap().unwrap();
        append_signature(&mut signer, &first);
        append(&mut signer, 1);
        let second = signer.sign(1).unwrap().unwrap();

        assert_eq!(second.seqno, 5);
        let revealed = second.base.revealed_nonce.unwrap();
        assert!(first.base.hashed_nonce.is_opened_by(&revealed));
        assert_ne!(first.base.hashed_nonce, second.base.hashed_nonce);
    }

    #[test]
    fn test_no_new_content_after_signature() {
        let mut signer = signer();
        append(&mut signer, 1);
        let sig = signer.sign(1).unwrap().unwrap();
        append_signature(&mut signer, &sig);
        assert_eq!(signer.sign(1).unwrap(), None);
    }

    #[test]
    fn test_identical_resign_is_idempotent() {
        let mut signer = signer();
        append(&mut signer, 2);
        let first = signer.sign(3).unwrap().unwrap();
        let again = signer.sign(3).unwrap().unwrap();
        assert_eq!(first, again);
    }

    #[test]
    fn test_resign_with_different_inputs_fails() {
        let mut signer = signer();
        append(&mut signer, 2);
        signer.sign(3).unwrap();
        assert_eq!(
            signer.sign(4),
            Err(SignatureError::ConflictingResign { seqno: 3 })
        );

        signer.observe_commit(TxId::new(3, 2)).unwrap();
        assert_eq!(
            signer.sign(3),
            Err(SignatureError::ConflictingResign { seqno: 3 })
        );
        assert!(!signer.is_halted());
    }

    #[test]
    fn test_commit_fields_monotonic_and_bounded() {
        let mut signer = signer();
        append(&mut signer, 2);
        signer.observe_commit(TxId::new(1, 2)).unwrap();
        let first = signer.sign(1).unwrap().unwrap();
        assert_eq!(first.commit_id(), TxId::new(1, 2));
        append_signature(&mut signer, &first);

        // A regressing report is ignored.
        signer.observe_commit(TxId::new(1, 1)).unwrap();
        append(&mut signer, 1);
        let second = signer.sign(1).unwrap().unwrap();
        assert_eq!(second.commit_id(), TxId::new(1, 2));
        assert!(second.commit_seqno <= second.seqno);
        assert!(second.commit_view <= second.view);
    }

    #[test]
    fn test_commit_beyond_history_rejected() {
        let mut signer = signer();
        append(&mut signer, 2);
        assert_eq!(
            signer.observe_commit(TxId::new(1, 3)),
            Err(SignatureError::CommitBeyondHistory {
                commit: 3,
                history: 2
            })
        );
    }

    #[test]
    fn test_view_regression_rejected() {
        let mut signer = signer();
        append(&mut signer, 1);
        let sig = signer.sign(5).unwrap().unwrap();
        append_signature(&mut signer, &sig);
        append(&mut signer, 1);
        assert_eq!(
            signer.sign(4),
            Err(SignatureError::ViewRegression { view: 4, last: 5 })
        );
    }

    #[test]
    fn test_non_contiguous_entry_halts() {
        let mut signer = signer();
        let err = signer.append_entry(2, &[0; 32]).unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(signer.state(), SigningState::Halted);
        assert!(matches!(signer.sign(1), Err(SignatureError::Halted(_))));
        assert!(matches!(
            signer.append_entry(1, &[0; 32]),
            Err(SignatureError::Halted(_))
        ));
    }

    #[test]
    fn test_broken_nonce_chain_halts() {
        let mut signer = signer();
        append(&mut signer, 1);
        let sig = signer.sign(1).unwrap().unwrap();
        append_signature(&mut signer, &sig);
        append(&mut signer, 1);

        signer.chain.corrupt_pending(Nonce::from_bytes([0xee; 32]));
        assert_eq!(
            signer.sign(1),
            Err(SignatureError::Integrity(IntegrityFault::NonceChainBroken {
                seqno: 2
            }))
        );
        assert!(signer.is_halted());
        assert!(matches!(signer.reveal_pending(), Err(SignatureError::Halted(_))));
    }

    #[test]
    fn test_reveal_pending() {
        let mut signer = signer();
        assert_eq!(signer.reveal_pending().unwrap(), None);

        append(&mut signer, 1);
        let first = signer.sign(1).unwrap().unwrap();
        let reveal = signer.reveal_pending().unwrap().unwrap();
        assert_eq!(reveal.seqno, first.seqno);
        assert!(reveal.verify().is_ok());
        assert!(reveal.opens(&first.base.hashed_nonce));
        assert_eq!(signer.reveal_pending().unwrap(), None);

        append_signature(&mut signer, &first);
        append(&mut signer, 1);
        let second = signer.sign(1).unwrap().unwrap();
        assert_eq!(second.base.revealed_nonce, None);
    }

    #[test]
    fn test_sign_with_consensus() {
        let mut signer = signer();
        append(&mut signer, 4);
        let consensus = FixedConsensus {
            view: 2,
            commit: TxId::new(2, 3),
        };
        let sig = signer.sign_with(&consensus).unwrap().unwrap();
        assert_eq!((sig.view, sig.commit_seqno, sig.commit_view), (2, 3, 2));
    }

    #[test]
    fn test_state_transitions() {
        let mut signer = signer();
        append(&mut signer, 1);
        assert_eq!(signer.state(), SigningState::Unsigned { seqno: 2 });

        let sig = signer.sign(1).unwrap().unwrap();
        assert!(matches!(signer.state(), SigningState::Signed { seqno: 2, .. }));

        append_signature(&mut signer, &sig);
        assert!(matches!(signer.state(), SigningState::Signed { seqno: 2, .. }));

        signer.observe_commit(TxId::new(1, 2)).unwrap();
        assert_eq!(
            signer.state(),
            SigningState::CommitKnown {
                seqno: 2,
                commit_seqno: 2,
                commit_view: 1
            }
        );

        append(&mut signer, 1);
        assert_eq!(signer.state(), SigningState::Unsigned { seqno: 4 });
    }
}
