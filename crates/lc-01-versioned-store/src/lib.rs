//! # LC-01 Versioned Store - Transactional Key-Value Tables
//!
//! **Subsystem ID:** 1
//!
//! ## Purpose
//!
//! Named, typed key-value tables with multi-version reads and atomic
//! multi-table commits. Every other subsystem keeps its state here: the
//! script registry, the application partitions and the signature log.
//!
//! ## Concurrency Model
//!
//! Optimistic multi-version concurrency control:
//!
//! ```text
//! begin() ──snapshot@v──→ get/put/remove/iter ──commit()──┬── read set still at v ──→ Committed(v')
//!                                                         └── superseded read ─────→ Conflict (retry)
//! ```
//!
//! - A transaction reads the snapshot it was opened at, overlaid with its own
//!   pending writes.
//! - Commit succeeds only if no key (or scanned table) it read has been
//!   written since the snapshot.
//! - Dropping a transaction discards it; nothing is ever partially applied.
//!
//! ## Domain Invariants
//!
//! | Invariant | Enforcement |
//! |-----------|-------------|
//! | Versions strictly increase by one per commit | `Store::apply` |
//! | Commits are all-or-nothing | single write lock in `Transaction::commit` |
//! | Ledger entries are deterministic | ordered write sets, bincode encoding |

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod domain;
pub mod store;
pub mod transaction;

pub use domain::entry::{CommitOutcome, CommitReceipt, LedgerEntry, TableWrites};
pub use domain::errors::StoreError;
pub use domain::keys::StoreKey;
pub use domain::table::Table;
pub use store::{Store, Version};
pub use transaction::{TableIter, Transaction};

/// Subsystem ID.
pub const SUBSYSTEM_ID: u8 = 1;
