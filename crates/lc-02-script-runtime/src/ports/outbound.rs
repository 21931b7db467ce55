//! # Driven Ports (SPI - Outbound)
//!
//! The only state a script can reach. Adapters decide which tables exist and
//! which are in scope; the interpreter only sees table names and JSON values.

use serde_json::Value;

use crate::errors::ScriptFault;

/// Table access from inside the sandbox.
pub trait ScriptTables {
    /// Value stored under `key`, if any.
    fn get(&mut self, table: &str, key: &Value) -> Result<Option<Value>, ScriptFault>;

    /// True if `key` is present.
    fn has(&mut self, table: &str, key: &Value) -> Result<bool, ScriptFault>;

    /// Store `value` under `key`.
    fn put(&mut self, table: &str, key: Value, value: Value) -> Result<(), ScriptFault>;

    /// Remove `key`, returning whether it was present.
    fn remove(&mut self, table: &str, key: &Value) -> Result<bool, ScriptFault>;
}
