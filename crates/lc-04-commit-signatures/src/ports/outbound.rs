//! # Driven Ports (SPI - Outbound)

use shared_crypto::Nonce;
use shared_types::{TxId, View};

/// Supplier of fresh nonce pre-images.
pub trait NonceSource: Send {
    /// Next unpredictable nonce.
    fn next_nonce(&mut self) -> Nonce;
}

/// What the signer needs from the consensus layer.
pub trait ConsensusPort: Send + Sync {
    /// View new signatures are produced in.
    fn current_view(&self) -> View;

    /// Highest position that can no longer be rolled back.
    fn commit_point(&self) -> TxId;
}
