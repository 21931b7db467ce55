//! # Sandbox Constants
//!
//! Immutable values injected into every sandbox as the read-only `env`
//! global. The status-code table is built from the exhaustive
//! [`HttpStatus`] enumeration so scripts can write
//! `{"$var": "env.error_codes.NOT_FOUND"}` instead of a literal `404`.

use serde_json::{Map, Value};
use shared_types::HttpStatus;
use std::collections::BTreeMap;

/// Name of the status-code member of `env`.
pub const ERROR_CODES_FIELD: &str = "error_codes";

/// Name of the partition-count member of `env`.
pub const PARTITIONS_FIELD: &str = "partitions";

/// Constants visible to scripts through `env`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxConstants {
    error_codes: BTreeMap<&'static str, u16>,
    partitions: usize,
}

impl SandboxConstants {
    /// The standard constants for a registry with `partitions` partition pairs.
    pub fn standard(partitions: usize) -> Self {
        let error_codes = HttpStatus::ALL
            .iter()
            .map(|status| (status.name(), status.code()))
            .collect();
        Self {
            error_codes,
            partitions,
        }
    }

    /// Numeric code for a status name.
    pub fn error_code(&self, name: &str) -> Option<u16> {
        self.error_codes.get(name).copied()
    }

    /// Number of status codes.
    pub fn error_code_count(&self) -> usize {
        self.error_codes.len()
    }

    /// The `env` value handed to the sandbox.
    pub fn to_env(&self) -> Value {
        let codes: Map<String, Value> = self
            .error_codes
            .iter()
            .map(|(name, code)| ((*name).to_string(), Value::from(*code)))
            .collect();

        let mut env = Map::new();
        env.insert(ERROR_CODES_FIELD.to_string(), Value::Object(codes));
        env.insert(PARTITIONS_FIELD.to_string(), Value::from(self.partitions));
        Value::Object(env)
    }
}
