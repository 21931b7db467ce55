//! Store domain types.

pub mod entry;
pub mod errors;
pub mod keys;
pub mod table;
