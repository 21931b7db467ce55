//! # Sequencer
//!
//! Serializes every commit with its Merkle-history append, so the ledger
//! order the signer sees is exactly the store's version order. It is the
//! dispatcher's [`TransactionSink`] and also writes the node's signatures.
//!
//! ```text
//! submit(tx) ──lock──→ commit ─→ append digest ─→ interval reached? ──yes──→ sign
//!                                                                         │
//!                                    signature entry at exactly seqno ←───┘
//!                                    append digest, mark committed
//! ```

use lc_01_versioned_store::{CommitOutcome, CommitReceipt, Store, StoreError, Transaction};
use lc_03_script_dispatch::TransactionSink;
use lc_04_commit_signatures::{
    AuditReport, CommitSignatureProtocol, ConsensusPort, NonceReveal, NonceSource, PrimarySignature,
    SignatureAuditor, SignatureError, SignatureLog, SigningState,
};
use parking_lot::Mutex;
use shared_types::{Hash, NodeId};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::adapters::SingleNodeConsensus;

struct SequencerState<N: NonceSource> {
    signer: CommitSignatureProtocol<N>,
    consensus: SingleNodeConsensus,
    digests: Vec<Hash>,
    reveals: Vec<NonceReveal>,
    since_signature: u64,
    signatures_emitted: u64,
}

struct Shared<N: NonceSource> {
    store: Store,
    signatures: SignatureLog,
    interval: u64,
    state: Mutex<SequencerState<N>>,
}

/// Single writer of the node's ledger.
pub struct Sequencer<N: NonceSource> {
    shared: Arc<Shared<N>>,
}

impl<N: NonceSource> Clone for Sequencer<N> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<N: NonceSource> Sequencer<N> {
    /// Sequencer signing after every `interval` committed transactions.
    pub fn new(
        store: Store,
        signatures: SignatureLog,
        signer: CommitSignatureProtocol<N>,
        consensus: SingleNodeConsensus,
        interval: u64,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                store,
                signatures,
                interval,
                state: Mutex::new(SequencerState {
                    signer,
                    consensus,
                    digests: Vec::new(),
                    reveals: Vec::new(),
                    since_signature: 0,
                    signatures_emitted: 0,
                }),
            }),
        }
    }

    /// Identity of the signing node.
    pub fn node_id(&self) -> NodeId {
        self.shared.state.lock().signer.node_id()
    }

    /// Signer state.
    pub fn signing_state(&self) -> SigningState {
        self.shared.state.lock().signer.state()
    }

    /// Number of ledger entries recorded.
    pub fn ledger_len(&self) -> u64 {
        self.shared.state.lock().digests.len() as u64
    }

    /// Signatures written so far.
    pub fn signatures_emitted(&self) -> u64 {
        self.shared.state.lock().signatures_emitted
    }

    /// Sign now, regardless of the interval.
    pub fn emit_signature(&self) -> Result<Option<PrimarySignature>, SignatureError> {
        let mut state = self.shared.state.lock();
        self.shared.emit(&mut state)
    }

    /// Publish the pending nonce outside a signature.
    pub fn reveal_nonce(&self) -> Result<Option<NonceReveal>, SignatureError> {
        let mut state = self.shared.state.lock();
        let reveal = state.signer.reveal_pending()?;
        if let Some(reveal) = &reveal {
            state.reveals.push(reveal.clone());
        }
        Ok(reveal)
    }

    /// Audit the signature log against the recorded ledger.
    pub fn audit(&self) -> Result<AuditReport, StoreError> {
        let (mut tx, auditor) = {
            let state = self.shared.state.lock();
            let auditor = SignatureAuditor::new()
                .with_reveals(state.reveals.iter().cloned())
                .with_ledger(&state.digests);
            (self.shared.store.begin(), auditor)
        };
        let signatures = self
            .shared
            .signatures
            .foreach(&mut tx)?
            .map(|item| item.map(|(_, signature)| signature))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(auditor.audit(signatures))
    }
}

impl<N: NonceSource> Shared<N> {
    fn record(&self, state: &mut SequencerState<N>, receipt: &CommitReceipt) {
        let digest = receipt.entry.digest();
        state.digests.push(digest);
        match state.signer.append_entry(receipt.version, &digest) {
            Ok(()) => {}
            Err(SignatureError::Halted(_)) => {
                debug!(seqno = receipt.version, "Signer halted, entry not tracked")
            }
            Err(e) => error!(seqno = receipt.version, error = %e, "Failed to track ledger entry"),
        }
    }

    fn emit(
        &self,
        state: &mut SequencerState<N>,
    ) -> Result<Option<PrimarySignature>, SignatureError> {
        let Some(signature) = state.signer.sign_with(&state.consensus)? else {
            return Ok(None);
        };

        let mut tx = self.store.begin();
        self.signatures.put(&mut tx, &signature)?;
        let outcome = tx.commit_expecting(signature.seqno)?;
        if let Some(receipt) = outcome.receipt() {
            self.record(state, receipt);
            state.consensus.mark_committed(signature.tx_id());
            state.signer.observe_commit(state.consensus.commit_point())?;
            state.signatures_emitted += 1;
            info!(
                seqno = signature.seqno,
                view = signature.view,
                "Signature written"
            );
        }
        state.since_signature = 0;
        Ok(Some(signature))
    }
}

impl<N: NonceSource> TransactionSink for Sequencer<N> {
    fn submit(&self, tx: Transaction) -> Result<CommitOutcome, StoreError> {
        let mut state = self.shared.state.lock();
        let outcome = tx.commit()?;
        if let Some(receipt) = outcome.receipt() {
            self.shared.record(&mut state, receipt);
            state.since_signature += 1;
            if state.since_signature >= self.shared.interval {
                if let Err(e) = self.shared.emit(&mut state) {
                    error!(error = %e, fatal = e.is_fatal(), "Scheduled signature failed");
                }
            }
        }
        Ok(outcome)
    }
}
