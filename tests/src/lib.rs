//! # Ledger-Core Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/          # Criterion benchmarks (Merkle history, dispatch)
//! └── src/integration/  # Cross-crate flows
//!     ├── dispatch_flow.rs    # request → script → commit
//!     ├── signature_flow.rs   # ledger → Merkle root → signature → audit
//!     └── concurrency.rs      # conflicting requests across threads
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p lc-tests
//! cargo test -p lc-tests integration::signature_flow
//! cargo bench -p lc-tests
//! ```

#![allow(dead_code)]

pub mod integration;
