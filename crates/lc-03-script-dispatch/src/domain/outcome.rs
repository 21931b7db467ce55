//! # Script Outcomes
//!
//! Translation of a script's terminal value into a response:
//!
//! | Script value | Outcome |
//! |--------------|---------|
//! | object with `error` | `Failure(code, message)` |
//! | object with `result` | `Success(result)` |
//! | anything else | `Passthrough(value)` |
//!
//! `error` always wins over `result`. Under [`ResultPolicy::Strict`] a value
//! carrying both, or an `error` that is not a well-formed `{code, message}`
//! object, is rejected instead of being repaired with defaults.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_types::HttpStatus;
use std::str::FromStr;
use thiserror::Error;

use super::request::Response;

/// Field holding a success payload.
pub const RESULT_FIELD: &str = "result";
/// Field holding an application error.
pub const ERROR_FIELD: &str = "error";
/// Member of the error object holding the status code.
pub const CODE_FIELD: &str = "code";
/// Member of the error object holding the message.
pub const MESSAGE_FIELD: &str = "message";

/// How strictly script values are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultPolicy {
    /// Reject ambiguous or malformed values.
    #[default]
    Strict,
    /// Resolve by precedence; malformed members fall back to defaults.
    Precedence,
}

impl FromStr for ResultPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "precedence" => Ok(Self::Precedence),
            other => Err(format!("unknown result policy '{other}'")),
        }
    }
}

/// Script values rejected under [`ResultPolicy::Strict`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MalformedResult {
    /// Both `result` and `error` are present.
    #[error("script returned both 'result' and 'error'")]
    ResultAndError,

    /// `error` is not an object.
    #[error("'error' must be an object, found {0}")]
    ErrorNotObject(Value),

    /// `error.code` is not a known status code.
    #[error("'error.code' is not a valid status code: {0}")]
    InvalidCode(Value),

    /// `error.message` is not a string.
    #[error("'error.message' must be a string, found {0}")]
    InvalidMessage(Value),
}

/// The three shapes a script value can take.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptOutcome {
    /// Explicit `result` payload.
    Success(Value),
    /// Application error.
    Failure {
        /// Status code.
        code: u16,
        /// Message for the caller.
        message: String,
    },
    /// Value with neither field, returned unchanged.
    Passthrough(Value),
}

impl ScriptOutcome {
    /// Classify a script value.
    pub fn from_value(value: Value, policy: ResultPolicy) -> Result<Self, MalformedResult> {
        let Value::Object(mut fields) = value else {
            return Ok(Self::Passthrough(value));
        };

        match (fields.remove(ERROR_FIELD), fields.remove(RESULT_FIELD)) {
            (Some(_), Some(_)) if policy == ResultPolicy::Strict => {
                Err(MalformedResult::ResultAndError)
            }
            (Some(error), _) => Self::failure(error, policy),
            (None, Some(result)) => Ok(Self::Success(result)),
            (None, None) => Ok(Self::Passthrough(Value::Object(fields))),
        }
    }

    fn failure(error: Value, policy: ResultPolicy) -> Result<Self, MalformedResult> {
        let strict = policy == ResultPolicy::Strict;
        let default_code = HttpStatus::INTERNAL_SERVER_ERROR.code();

        let Value::Object(error) = error else {
            if strict {
                return Err(MalformedResult::ErrorNotObject(error));
            }
            return Ok(Self::Failure {
                code: default_code,
                message: String::new(),
            });
        };

        let code = match error.get(CODE_FIELD) {
            None => default_code,
            Some(raw) => match status_code(raw) {
                Some(code) => code,
                None if strict => return Err(MalformedResult::InvalidCode(raw.clone())),
                None => default_code,
            },
        };
        let message = match error.get(MESSAGE_FIELD) {
            None => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) if strict => return Err(MalformedResult::InvalidMessage(other.clone())),
            Some(_) => String::new(),
        };
        Ok(Self::Failure { code, message })
    }

    /// True for `Success` and `Passthrough`.
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failure { .. })
    }

    /// Response for the caller.
    pub fn into_response(self) -> Response {
        match self {
            Self::Success(value) | Self::Passthrough(value) => Response::Success(value),
            Self::Failure { code, message } => Response::Failure {
                status: code,
                message,
            },
        }
    }
}

fn status_code(raw: &Value) -> Option<u16> {
    let code = u16::try_from(raw.as_u64()?).ok()?;
    HttpStatus::from_code(code).map(HttpStatus::code)
}
