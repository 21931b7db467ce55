//! Adapters connecting the node to the ports of its subsystems.

pub mod consensus;

pub use consensus::SingleNodeConsensus;
