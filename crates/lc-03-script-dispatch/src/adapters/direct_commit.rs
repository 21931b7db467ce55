use lc_01_versioned_store::{CommitOutcome, StoreError, Transaction};

use crate::ports::outbound::TransactionSink;

/// Commits straight to the local store.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectCommit;

impl TransactionSink for DirectCommit {
    fn submit(&self, tx: Transaction) -> Result<CommitOutcome, StoreError> {
        tx.commit()
    }
}
