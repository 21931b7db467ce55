//! Domain layer: tree, nonce chain, signature records and signer state.

pub mod merkle;
pub mod nonce_chain;
pub mod signature;
pub mod state;
