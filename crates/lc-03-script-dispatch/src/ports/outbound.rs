//! # Driven Ports (SPI - Outbound)

use lc_01_versioned_store::{CommitOutcome, StoreError, Transaction};

/// Where successful request transactions go.
///
/// The sink applies the transaction atomically or reports why it could not;
/// a transaction it is never handed is discarded.
pub trait TransactionSink: Send + Sync {
    /// Apply `tx`.
    fn submit(&self, tx: Transaction) -> Result<CommitOutcome, StoreError>;
}
