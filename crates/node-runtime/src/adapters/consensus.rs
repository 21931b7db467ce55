//! # Consensus Adapter
//!
//! Single-node stand-in for the consensus layer: one fixed view, and every
//! signature the node writes is immediately rollback-safe.

use lc_04_commit_signatures::ConsensusPort;
use shared_types::{TxId, View};

/// Consensus as seen by a node that is its own quorum.
#[derive(Debug, Clone, Copy)]
pub struct SingleNodeConsensus {
    view: View,
    committed: TxId,
}

impl SingleNodeConsensus {
    /// Consensus fixed at `view` with nothing committed.
    pub fn new(view: View) -> Self {
        Self {
            view,
            committed: TxId::default(),
        }
    }

    /// Declare everything up to `position` committed. Never moves backwards.
    pub fn mark_committed(&mut self, position: TxId) {
        if position.dominates(&self.committed) {
            self.committed = position;
        }
    }
}

impl ConsensusPort for SingleNodeConsensus {
    fn current_view(&self) -> View {
        self.view
    }

    fn commit_point(&self) -> TxId {
        self.committed
    }
}
