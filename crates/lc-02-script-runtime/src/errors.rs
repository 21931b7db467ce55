//! # Error Types
//!
//! Every way a script execution can abort. These are execution faults:
//! a deliberate application error is an ordinary script result, never one of
//! these.

use lc_01_versioned_store::StoreError;
use thiserror::Error;

/// Errors that abort a script execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptFault {
    /// The script source is not a well-formed program.
    #[error("invalid script: {0}")]
    InvalidScript(String),

    /// Reference to a variable that is not bound.
    #[error("undefined variable: {0}")]
    UndefinedVariable(String),

    /// Call to a function that was never defined.
    #[error("undefined function: {0}")]
    UndefinedFunction(String),

    /// Operand of the wrong type.
    #[error("type error in {op}: expected {expected}, found {found}")]
    TypeError {
        /// Operator that rejected the operand.
        op: &'static str,
        /// What the operator accepts.
        expected: &'static str,
        /// Type of the operand it got.
        found: String,
    },

    /// Function called with the wrong number of arguments.
    #[error("function {function} takes {expected} arguments, got {actual}")]
    ArityMismatch {
        /// Name of the called function.
        function: String,
        /// Declared parameter count.
        expected: usize,
        /// Arguments passed.
        actual: usize,
    },

    /// Integer overflow or division by zero.
    #[error("arithmetic error: {0}")]
    Arithmetic(&'static str),

    /// The evaluation step budget was exhausted.
    #[error("step limit exceeded: {limit}")]
    StepLimitExceeded {
        /// The configured step budget.
        limit: u64,
    },

    /// Nested function calls exceeded the depth limit.
    #[error("call depth exceeded: {limit}")]
    CallDepthExceeded {
        /// The configured call depth.
        limit: usize,
    },

    /// Expressions nested deeper than the evaluator allows.
    #[error("expression nesting exceeded: {limit}")]
    NestingTooDeep {
        /// The configured expression depth.
        limit: usize,
    },

    /// The table is not a partition, or not in this invocation's scope.
    #[error("table not in scope: {0}")]
    TableNotInScope(String),

    /// Write to a table the invocation may only read.
    #[error("table is read-only: {0}")]
    ReadOnlyTable(String),

    /// The script aborted itself with `$raise`.
    #[error("script raised: {0}")]
    Raised(String),

    /// The underlying store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl ScriptFault {
    /// True if the fault is an optimistic-concurrency conflict in the store:
    /// the request should be retried, not reported as a script failure.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_retryable())
    }

    /// True if the script ran out of its execution budget.
    #[must_use]
    pub fn is_resource_exhaustion(&self) -> bool {
        matches!(
            self,
            Self::StepLimitExceeded { .. }
                | Self::CallDepthExceeded { .. }
                | Self::NestingTooDeep { .. }
        )
    }

    pub(crate) fn type_error(
        op: &'static str,
        expected: &'static str,
        found: &serde_json::Value,
    ) -> Self {
        Self::TypeError {
            op,
            expected,
            found: type_name(found).to_string(),
        }
    }
}

/// Short name of a value's JSON type, for diagnostics.
pub(crate) fn type_name(value: &serde_json::Value) -> &'static str {
    use serde_json::Value;
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
