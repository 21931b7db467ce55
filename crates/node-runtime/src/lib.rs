//! # Node Runtime Library
//!
//! Wiring of a single Ledger-Core node, exposed for the `ledger-node`
//! binary and for integration tests.
//!
//! - `container/` - configuration, the sequencer and [`LedgerNode`]
//! - `adapters/` - port implementations (single-node consensus)
//! - `commands` - the line protocol spoken on stdin/stdout
//! - `logging` - subscriber setup for the binary

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod commands;
pub mod container;
pub mod logging;

pub use commands::handle_line;
pub use container::{ConfigError, LedgerNode, NodeConfig, NodeError, NodeStats};
pub use logging::init_logging;
