//! Cross-crate integration flows.

pub mod concurrency;
pub mod dispatch_flow;
pub mod signature_flow;
