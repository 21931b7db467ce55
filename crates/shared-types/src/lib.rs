//! # Shared Types Crate
//!
//! Identifiers and fixed tables used across the Ledger-Core crates.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: sequence numbers, views and node identities
//!   are defined once here.
//! - **Exhaustive status table**: [`HttpStatus`] is the complete name→code
//!   mapping injected verbatim into the script sandbox.

pub mod entities;
pub mod status;

pub use entities::*;
pub use status::HttpStatus;
