//! # Requests and Responses
//!
//! The transport-facing shapes. A request is opaque to dispatch beyond its
//! verb and path; the whole of it becomes the script's `args`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use shared_types::HttpStatus;
use std::collections::BTreeMap;

/// Message returned for execution faults and rejected script values.
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// An incoming call, as handed over by the transport layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// HTTP verb, e.g. `GET`.
    pub verb: String,
    /// Method path, possibly with leading `/`.
    pub path: String,
    /// Request headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Parsed request body.
    #[serde(default)]
    pub body: Value,
}

impl Request {
    /// Request with no headers and a null body.
    pub fn new(verb: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            verb: verb.into(),
            path: path.into(),
            headers: BTreeMap::new(),
            body: Value::Null,
        }
    }

    /// Set the body.
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    /// Add a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Method path without leading separators.
    pub fn local_method(&self) -> &str {
        self.path.trim_start_matches('/')
    }

    /// The `args` value handed to the handler script.
    pub fn script_args(&self) -> Value {
        json!({
            "verb": self.verb,
            "method": self.local_method(),
            "headers": self.headers,
            "body": self.body,
        })
    }
}

/// What the caller gets back.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Success payload.
    Success(Value),
    /// Failure status and message.
    Failure {
        /// Status code.
        status: u16,
        /// Message for the caller.
        message: String,
    },
}

impl Response {
    /// Failure with a status from the status table.
    pub fn error(status: HttpStatus, message: impl Into<String>) -> Self {
        Self::Failure {
            status: status.code(),
            message: message.into(),
        }
    }

    /// Generic internal-error response.
    pub fn internal_error() -> Self {
        Self::error(HttpStatus::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_MESSAGE)
    }

    /// Status code (200 for success).
    pub fn status(&self) -> u16 {
        match self {
            Self::Success(_) => HttpStatus::OK.code(),
            Self::Failure { status, .. } => *status,
        }
    }

    /// True for success responses.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// JSON rendering: `{"status", "result"}` or `{"status", "error": {"code", "message"}}`.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Success(result) => json!({"status": self.status(), "result": result}),
            Self::Failure { status, message } => json!({
                "status": status,
                "error": {"code": status, "message": message},
            }),
        }
    }
}
