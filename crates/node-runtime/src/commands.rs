//! # Line Protocol
//!
//! One JSON value per line in, one JSON response per line out.
//!
//! | Input | Action |
//! |-------|--------|
//! | `{"verb", "path", "headers"?, "body"?}` | dispatch a request |
//! | `{"admin": "install", "key", "script"}` | register a handler |
//! | `{"admin": "uninstall", "key"}` | remove a handler |
//! | `{"admin": "environment", "script"}` | set the environment script |
//! | `{"admin": "sign"}` | emit a signature now |
//! | `{"admin": "reveal"}` | publish the pending nonce |
//! | `{"admin": "endpoints"}` | list dispatchable endpoints |
//! | `{"admin": "signatures"}` | list stored signatures |
//! | `{"admin": "audit"}` | audit the signature log |
//! | `{"admin": "stats"}` | node counters |
//!
//! A `script` is either source text or an inline program value.

use lc_02_script_runtime::Script;
use lc_03_script_dispatch::{Request, Response};
use lc_04_commit_signatures::NonceSource;
use serde::Deserialize;
use serde_json::{json, Value};
use shared_types::HttpStatus;
use tracing::{error, warn};

use crate::container::{LedgerNode, NodeError};

/// Governance commands accepted on the line protocol.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "admin", rename_all = "snake_case")]
pub enum AdminCommand {
    /// Register a handler script.
    Install {
        /// Dispatch key, e.g. `GET items`.
        key: String,
        /// Source text or program.
        script: Value,
    },
    /// Remove a handler script.
    Uninstall {
        /// Dispatch key.
        key: String,
    },
    /// Install the environment-initialization script.
    Environment {
        /// Source text or program.
        script: Value,
    },
    /// Sign now.
    Sign,
    /// Reveal the pending nonce.
    Reveal,
    /// List dispatchable endpoints.
    Endpoints,
    /// List signatures.
    Signatures,
    /// Audit the signature log.
    Audit,
    /// Node counters.
    Stats,
}

fn bad_request(message: impl Into<String>) -> Value {
    Response::error(HttpStatus::BAD_REQUEST, message).to_json()
}

fn success(result: impl serde::Serialize) -> Value {
    match serde_json::to_value(result) {
        Ok(value) => Response::Success(value).to_json(),
        Err(e) => {
            error!(error = %e, "Failed to encode admin result");
            Response::internal_error().to_json()
        }
    }
}

fn node_failure(e: NodeError) -> Value {
    match e {
        NodeError::Registry(e) => bad_request(e.to_string()),
        other => {
            error!(error = %other, "Admin command failed");
            Response::internal_error().to_json()
        }
    }
}

fn script_from(value: Value) -> Result<Script, String> {
    let script = match value {
        Value::String(source) => Script::new(source),
        program => Script::from_program(&program),
    };
    script.compile().map_err(|e| e.to_string())?;
    Ok(script)
}

fn reply<T: serde::Serialize>(result: Result<T, NodeError>) -> Value {
    match result {
        Ok(value) => success(value),
        Err(e) => node_failure(e),
    }
}

fn run_admin<N: NonceSource>(node: &LedgerNode<N>, command: AdminCommand) -> Value {
    match command {
        AdminCommand::Install { key, script } => match script_from(script) {
            Ok(script) => reply(
                node.install_script(&key, &script)
                    .map(|_| json!({ "installed": key })),
            ),
            Err(reason) => bad_request(reason),
        },
        AdminCommand::Uninstall { key } => reply(
            node.uninstall_script(&key)
                .map(|existed| json!({ "removed": existed })),
        ),
        AdminCommand::Environment { script } => match script_from(script) {
            Ok(script) => reply(
                node.set_environment_script(&script)
                    .map(|_| json!({ "environment": true })),
            ),
            Err(reason) => bad_request(reason),
        },
        AdminCommand::Sign => reply(node.emit_signature()),
        AdminCommand::Reveal => reply(node.reveal_nonce()),
        AdminCommand::Endpoints => reply(node.endpoints()),
        AdminCommand::Signatures => reply(node.signatures()),
        AdminCommand::Audit => reply(node.audit()),
        AdminCommand::Stats => success(node.stats()),
    }
}

/// Handle one input line and produce its response.
pub fn handle_line<N: NonceSource>(node: &LedgerNode<N>, line: &str) -> Value {
    let value: Value = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "Unparsable input line");
            return bad_request(format!("invalid JSON: {e}"));
        }
    };

    if value.get("admin").is_some() {
        return match serde_json::from_value::<AdminCommand>(value) {
            Ok(command) => run_admin(node, command),
            Err(e) => bad_request(format!("invalid admin command: {e}")),
        };
    }

    match serde_json::from_value::<Request>(value) {
        Ok(request) => node.handle_request(&request).to_json(),
        Err(e) => bad_request(format!("invalid request: {e}")),
    }
}
