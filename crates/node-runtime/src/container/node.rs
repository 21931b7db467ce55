//! # Ledger Node
//!
//! Owns one store and everything wired to it:
//!
//! | Component | Role |
//! |-----------|------|
//! | `ScriptRegistry` | handler scripts and partition tables |
//! | `ScriptDispatcher` | request → script → transaction |
//! | `Sequencer` | commit order, Merkle history, signature cadence |
//! | `SignatureLog` | the `signatures` table |

use lc_01_versioned_store::{CommitOutcome, Store, StoreError};
use lc_02_script_runtime::Script;
use lc_03_script_dispatch::{
    DispatchStats, Endpoint, RegistryError, Request, Response, ScriptDispatcher, ScriptRegistry,
    TransactionSink,
};
use lc_04_commit_signatures::{
    AuditReport, CommitSignatureProtocol, NonceReveal, NonceSource, OsNonceSource,
    PrimarySignature, SignatureError, SignatureLog,
};
use serde::Serialize;
use shared_crypto::Ed25519KeyPair;
use shared_types::{HttpStatus, NodeId, SeqNo};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::config::{ConfigError, NodeConfig};
use super::sequencer::Sequencer;
use crate::adapters::SingleNodeConsensus;

/// Message returned when a request keeps losing conflicts.
pub const CONFLICT_MESSAGE: &str = "Transaction conflict, retry";

/// Node-level failures.
#[derive(Debug, Error)]
pub enum NodeError {
    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Registry maintenance failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Signing or signature log failure.
    #[error(transparent)]
    Signature(#[from] SignatureError),
}

/// Snapshot of node counters.
#[derive(Debug, Clone, Serialize)]
pub struct NodeStats {
    /// Dispatcher counters, one per attempt.
    pub dispatch: DispatchStats,
    /// Requests answered with a conflict after all retries.
    pub exhausted_retries: u64,
    /// Signatures written.
    pub signatures_emitted: u64,
    /// Ledger entries recorded.
    pub ledger_len: u64,
    /// Signer state.
    pub signing_state: String,
}

/// A single ledger node.
pub struct LedgerNode<N: NonceSource = OsNonceSource> {
    config: NodeConfig,
    store: Store,
    registry: Arc<ScriptRegistry>,
    signatures: SignatureLog,
    sequencer: Sequencer<N>,
    dispatcher: ScriptDispatcher<Sequencer<N>>,
    exhausted_retries: AtomicU64,
}

impl LedgerNode<OsNonceSource> {
    /// Node with the configured key and OS nonces.
    pub fn new(config: NodeConfig) -> Result<Self, NodeError> {
        let keys = config.signing.key_pair()?;
        Self::with_signer(config, keys, OsNonceSource)
    }
}

impl<N: NonceSource> LedgerNode<N> {
    /// Node signing with `keys` and drawing nonces from `nonces`.
    pub fn with_signer(
        config: NodeConfig,
        keys: Ed25519KeyPair,
        nonces: N,
    ) -> Result<Self, NodeError> {
        config.validate()?;
        let store = Store::new();
        let registry = Arc::new(ScriptRegistry::create(&store, config.partitions)?);
        let signatures = SignatureLog::create(&store)?;

        let sequencer = Sequencer::new(
            store.clone(),
            signatures.clone(),
            CommitSignatureProtocol::new(keys, nonces),
            SingleNodeConsensus::new(config.signing.view),
            config.signing.signature_interval,
        );
        let dispatcher = ScriptDispatcher::new(
            store.clone(),
            Arc::clone(&registry),
            sequencer.clone(),
            config.dispatch,
        );

        info!(
            node = %sequencer.node_id(),
            partitions = config.partitions,
            signature_interval = config.signing.signature_interval,
            "Ledger node initialized"
        );
        Ok(Self {
            config,
            store,
            registry,
            signatures,
            sequencer,
            dispatcher,
            exhausted_retries: AtomicU64::new(0),
        })
    }

    /// Active configuration.
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// The node's store.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// The script registry.
    pub fn registry(&self) -> &Arc<ScriptRegistry> {
        &self.registry
    }

    /// Signing identity.
    pub fn node_id(&self) -> NodeId {
        self.sequencer.node_id()
    }

    /// Dispatch `request`, retrying lost optimistic-concurrency races.
    pub fn handle_request(&self, request: &Request) -> Response {
        let mut attempt = 0;
        loop {
            match self.dispatcher.dispatch(request) {
                Ok(dispatched) => return dispatched.response,
                Err(e) if e.is_retryable() && attempt < self.config.max_conflict_retries => {
                    attempt += 1;
                    debug!(attempt, error = %e, "Retrying conflicting request");
                }
                Err(e) if e.is_retryable() => {
                    self.exhausted_retries.fetch_add(1, Ordering::Relaxed);
                    warn!(attempts = attempt + 1, error = %e, "Giving up on conflicting request");
                    return Response::error(HttpStatus::CONFLICT, CONFLICT_MESSAGE);
                }
                Err(e) => {
                    error!(error = %e, "Store failure while dispatching");
                    return Response::internal_error();
                }
            }
        }
    }

    /// Register the handler for `key` as its own ledger transaction.
    pub fn install_script(&self, key: &str, script: &Script) -> Result<CommitOutcome, NodeError> {
        let mut tx = self.store.begin();
        self.registry.register(&mut tx, key, script)?;
        let outcome = self.sequencer.submit(tx)?;
        info!(key, "Installed script");
        Ok(outcome)
    }

    /// Remove the handler for `key`.
    pub fn uninstall_script(&self, key: &str) -> Result<bool, NodeError> {
        let mut tx = self.store.begin();
        let existed = self.registry.unregister(&mut tx, key)?;
        self.sequencer.submit(tx)?;
        Ok(existed)
    }

    /// Install the environment-initialization script.
    pub fn set_environment_script(&self, script: &Script) -> Result<CommitOutcome, NodeError> {
        let mut tx = self.store.begin();
        self.registry.set_environment_script(&mut tx, script)?;
        Ok(self.sequencer.submit(tx)?)
    }

    /// Dispatchable endpoints at the current version.
    pub fn endpoints(&self) -> Result<Vec<Endpoint>, NodeError> {
        let mut tx = self.store.begin();
        Ok(self.registry.list_endpoints(&mut tx)?)
    }

    /// Sign now instead of waiting for the interval.
    pub fn emit_signature(&self) -> Result<Option<PrimarySignature>, NodeError> {
        Ok(self.sequencer.emit_signature()?)
    }

    /// Publish the pending nonce outside a signature.
    pub fn reveal_nonce(&self) -> Result<Option<NonceReveal>, NodeError> {
        Ok(self.sequencer.reveal_nonce()?)
    }

    /// Every stored signature, ascending.
    pub fn signatures(&self) -> Result<Vec<PrimarySignature>, NodeError> {
        let mut tx = self.store.begin();
        let signatures = self
            .signatures
            .foreach(&mut tx)?
            .map(|item| item.map(|(_, signature)| signature))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(signatures)
    }

    /// Signature stored at `seqno`.
    pub fn signature_at(&self, seqno: SeqNo) -> Result<Option<PrimarySignature>, NodeError> {
        let mut tx = self.store.begin();
        Ok(self.signatures.get(&mut tx, seqno)?)
    }

    /// Audit the node's own signature log.
    pub fn audit(&self) -> Result<AuditReport, NodeError> {
        Ok(self.sequencer.audit()?)
    }

    /// Counters.
    pub fn stats(&self) -> NodeStats {
        NodeStats {
            dispatch: self.dispatcher.stats(),
            exhausted_retries: self.exhausted_retries.load(Ordering::Relaxed),
            signatures_emitted: self.sequencer.signatures_emitted(),
            ledger_len: self.sequencer.ledger_len(),
            signing_state: self.sequencer.signing_state().to_string(),
        }
    }
}
