//! # Scoped Transaction Tables
//!
//! Binds the sandbox to one store transaction, restricted to the partitions
//! in a [`TableScope`]. Any name that is not a partition (the script registry,
//! the signature log, a mistyped name) is reported as out of scope.

use lc_01_versioned_store::Transaction;
use serde_json::Value;

use crate::domain::partitions::{GenericTable, TablePartitions};
use crate::domain::scope::TableScope;
use crate::errors::ScriptFault;
use crate::ports::outbound::ScriptTables;

/// [`ScriptTables`] over a transaction and a partition scope.
pub struct ScopedTables<'a> {
    tx: &'a mut Transaction,
    partitions: &'a TablePartitions,
    scope: &'a TableScope,
}

impl<'a> ScopedTables<'a> {
    /// Bind a transaction to a scope.
    pub fn new(
        tx: &'a mut Transaction,
        partitions: &'a TablePartitions,
        scope: &'a TableScope,
    ) -> Self {
        Self {
            tx,
            partitions,
            scope,
        }
    }

    fn readable(&self, name: &str) -> Result<&'a GenericTable, ScriptFault> {
        let partitions: &'a TablePartitions = self.partitions;
        match partitions.resolve(name) {
            Some((id, table)) if self.scope.permits(id) => Ok(table),
            _ => Err(ScriptFault::TableNotInScope(name.to_string())),
        }
    }

    fn writable(&self, name: &str) -> Result<&'a GenericTable, ScriptFault> {
        let partitions: &'a TablePartitions = self.partitions;
        match partitions.resolve(name) {
            Some((id, table)) if self.scope.permits_write(id) => Ok(table),
            Some((id, _)) if self.scope.permits(id) => {
                Err(ScriptFault::ReadOnlyTable(name.to_string()))
            }
            _ => Err(ScriptFault::TableNotInScope(name.to_string())),
        }
    }
}

impl ScriptTables for ScopedTables<'_> {
    fn get(&mut self, table: &str, key: &Value) -> Result<Option<Value>, ScriptFault> {
        let table = self.readable(table)?;
        Ok(self.tx.get(table, key)?)
    }

    fn has(&mut self, table: &str, key: &Value) -> Result<bool, ScriptFault> {
        let table = self.readable(table)?;
        Ok(self.tx.contains(table, key)?)
    }

    fn put(&mut self, table: &str, key: Value, value: Value) -> Result<(), ScriptFault> {
        let table = self.writable(table)?;
        Ok(self.tx.put(table, &key, &value)?)
    }

    fn remove(&mut self, table: &str, key: &Value) -> Result<bool, ScriptFault> {
        let table = self.writable(table)?;
        let existed = self.tx.contains(table, key)?;
        self.tx.remove(table, key)?;
        Ok(existed)
    }
}
