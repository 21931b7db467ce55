//! Adapters implementing the outbound ports.

pub mod direct_commit;

pub use direct_commit::DirectCommit;
