//! Adapters implementing the outbound ports.

pub mod nonce_source;

pub use nonce_source::{OsNonceSource, SeededNonceSource};
