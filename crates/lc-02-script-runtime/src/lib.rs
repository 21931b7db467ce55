//! # LC-02 Script Runtime - Sandboxed Transaction Scripts
//!
//! **Subsystem ID:** 2
//!
//! ## Purpose
//!
//! Executes stored scripts inside an isolated, deterministic sandbox bound to
//! a single store transaction. A script sees exactly three globals and the
//! partition tables its invocation is scoped to; nothing else in the store
//! is reachable.
//!
//! ## Sandbox Contents
//!
//! | Name | Contents | Mutable |
//! |------|----------|---------|
//! | `args` | the caller's argument value | no |
//! | `static_args` | arguments fixed by the invoking component | no |
//! | `env` | constants (`error_codes`, `partitions`) | no |
//! | `privK` / `pubK` | partition tables, per [`TableScope`] | per [`TableAccess`] |
//!
//! ## Domain Invariants
//!
//! | Invariant | Enforcement |
//! |-----------|-------------|
//! | Exactly `2N` partition tables | `TablePartitions::create` |
//! | Only scoped partitions reachable | `adapters/scoped_tables.rs` |
//! | Same script + args + snapshot → same value | no clock/random/I/O operators, ordered maps |
//! | Bounded execution | `ExecutionLimits` (steps charged by size, call depth, nesting) |
//! | Env script failure is not fatal | `TransactionalScriptRunner::setup_environment` |

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod domain;
pub mod errors;
pub mod language;
pub mod ports;
pub mod service;

pub use domain::constants::SandboxConstants;
pub use domain::limits::ExecutionLimits;
pub use domain::partitions::{GenericTable, PartitionId, PartitionKind, TablePartitions};
pub use domain::scope::{TableAccess, TableScope};
pub use domain::script::Script;
pub use errors::ScriptFault;
pub use service::{ScriptInvocation, TransactionalScriptRunner};

/// Subsystem ID.
pub const SUBSYSTEM_ID: u8 = 2;
