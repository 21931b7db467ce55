//! # Node Container
//!
//! Configuration and the wiring of one ledger node.

pub mod config;
pub mod node;
pub mod sequencer;

pub use config::{
    ConfigError, LoggingConfig, NodeConfig, SigningConfig, MAX_EVAL_DEPTH, WORKER_STACK_SIZE,
};
pub use node::{LedgerNode, NodeError, NodeStats, CONFLICT_MESSAGE};
pub use sequencer::Sequencer;
