//! # LC-03 Script Dispatch - Registry and Request Dispatcher
//!
//! **Subsystem ID:** 3
//!
//! ## Purpose
//!
//! Maps incoming requests to stored handler scripts, runs them through the
//! script runtime inside one store transaction per request, and turns the
//! script's value into a response.
//!
//! ## Resolution Order
//!
//! | Step | Key tried | On miss |
//! |------|-----------|---------|
//! | 0 | `__environment` requested | 404 immediately |
//! | 1 | `path` | step 2 |
//! | 2 | `VERB path` | 404 naming `VERB path` |
//!
//! ## Error Taxonomy
//!
//! | Kind | Surface | Transaction |
//! |------|---------|-------------|
//! | Not found | 404 response | discarded |
//! | Application error | script's code and message | discarded |
//! | Execution fault | generic 500 response, diagnostic logged | discarded |
//! | Store conflict | `Err(DispatchError::Conflict)`, retryable | discarded |
//! | Success | payload | submitted to [`TransactionSink`] |

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod domain;
pub mod errors;
pub mod ports;
pub mod registry;
pub mod service;

pub use adapters::DirectCommit;
pub use domain::outcome::{MalformedResult, ResultPolicy, ScriptOutcome};
pub use domain::request::{Request, Response};
pub use domain::script_key::{split_script_key, HttpVerb, ENVIRONMENT_KEY};
pub use errors::{DispatchError, RegistryError};
pub use ports::TransactionSink;
pub use registry::{Endpoint, EndpointSchema, ScriptRegistry, SCRIPTS_TABLE};
pub use service::{DispatchConfig, DispatchStats, Dispatched, ScriptDispatcher};

/// Subsystem ID.
pub const SUBSYSTEM_ID: u8 = 3;
