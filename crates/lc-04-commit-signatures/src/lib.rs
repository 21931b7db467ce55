//! # LC-04 Commit Signatures - Merkle History and Node Signatures
//!
//! **Subsystem ID:** 4
//!
//! ## Purpose
//!
//! Each node periodically signs the Merkle root of everything committed
//! before a given seqno. The signature is itself written into the ledger at
//! that seqno, so the log of signatures is replicated with the rest of the
//! state and can be checked by anyone holding it.
//!
//! ## Signature Chain
//!
//! | Field | Covered by `sig` | Meaning |
//! |-------|------------------|---------|
//! | `seqno`, `view` | yes | Ledger position of the signature |
//! | `commit_seqno`, `commit_view` | yes | Highest rollback-safe position known |
//! | `root` | yes | Root over entries `1..seqno` |
//! | `hashed_nonce` | yes | `H(n_k)` for this round |
//! | `tree` | via `root` | Frontier that folds to `root` |
//! | `revealed_nonce` | no | `n_{k-1}`, opening the previous round |
//!
//! Revealing `n_{k-1}` alongside `H(n_k)` links every signature to the one
//! before it; a node cannot disown a signature without breaking the chain.
//!
//! ## Failure Semantics
//!
//! | Condition | Outcome |
//! |-----------|---------|
//! | Nothing new since last signature | `Ok(None)` |
//! | Same seqno, same inputs | Cached signature returned |
//! | Same seqno, different inputs | `ConflictingResign` |
//! | Tree or nonce-chain inconsistency | `Integrity`, signer halted for good |

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod auditor;
pub mod domain;
pub mod errors;
pub mod ports;
pub mod protocol;
pub mod signature_log;

pub use adapters::{OsNonceSource, SeededNonceSource};
pub use auditor::{AuditFinding, AuditReport, SignatureAuditor};
pub use domain::merkle::{InclusionProof, MerkleFrontier, MerkleHistory};
pub use domain::nonce_chain::NonceChain;
pub use domain::signature::{NodeSignature, NonceReveal, PrimarySignature};
pub use domain::state::SigningState;
pub use errors::{IntegrityFault, SignatureError};
pub use ports::{ConsensusPort, NonceSource};
pub use protocol::CommitSignatureProtocol;
pub use signature_log::{PutOutcome, SignatureLog, SIGNATURES_TABLE};

/// Subsystem ID.
pub const SUBSYSTEM_ID: u8 = 4;
