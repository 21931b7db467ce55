//! # Script Registry
//!
//! The `scripts` table maps dispatch keys to script source, plus one reserved
//! entry for the environment-initialization script. Building a registry also
//! builds the application's table partitions, so the two always agree on `N`.
//!
//! All reads and writes go through a caller-supplied transaction: at request
//! time the dispatcher reads the registry inside the request's own
//! transaction, and governance writes commit like any other transaction.

use lc_01_versioned_store::{Store, StoreError, Table, Transaction};
use lc_02_script_runtime::{Script, TablePartitions};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::script_key::{split_script_key, HttpVerb, ENVIRONMENT_KEY};
use crate::errors::RegistryError;

/// Name of the registry table.
pub const SCRIPTS_TABLE: &str = "scripts";

/// A dispatchable (verb, path) pair.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Endpoint {
    /// Verb; bare keys report `POST`.
    pub verb: HttpVerb,
    /// Method path.
    pub path: String,
}

/// Schema entry for one verb of an endpoint. Scripts declare no schemas, so
/// both members are always null.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EndpointSchema {
    /// Parameter schema.
    pub params_schema: Value,
    /// Result schema.
    pub result_schema: Value,
}

/// Registry of handler scripts.
#[derive(Debug, Clone)]
pub struct ScriptRegistry {
    scripts: Table<String, Script>,
    partitions: Arc<TablePartitions>,
}

impl ScriptRegistry {
    /// Create the registry table and `2 * partitions` partition tables.
    pub fn create(store: &Store, partitions: usize) -> Result<Self, StoreError> {
        let scripts = store.create_table(SCRIPTS_TABLE)?;
        let partitions = Arc::new(TablePartitions::create(store, partitions)?);
        Ok(Self {
            scripts,
            partitions,
        })
    }

    /// Attach to an existing registry.
    pub fn open(store: &Store, partitions: usize) -> Result<Self, StoreError> {
        Ok(Self {
            scripts: store.open_table(SCRIPTS_TABLE)?,
            partitions: Arc::new(TablePartitions::open(store, partitions)?),
        })
    }

    /// Partition handles shared with the script runner.
    pub fn partitions(&self) -> &Arc<TablePartitions> {
        &self.partitions
    }

    /// The underlying table.
    pub fn table(&self) -> &Table<String, Script> {
        &self.scripts
    }

    fn validate(key: &str) -> Result<(), RegistryError> {
        let invalid = |reason| {
            Err(RegistryError::InvalidKey {
                key: key.to_string(),
                reason,
            })
        };
        if key.is_empty() {
            return invalid("empty key");
        }
        let Some((_, path)) = split_script_key(key) else {
            return invalid("unknown verb prefix");
        };
        if path.is_empty() {
            return invalid("empty method path");
        }
        if path.starts_with('/') {
            return invalid("leading '/' is stripped from requests and can never match");
        }
        if path == ENVIRONMENT_KEY {
            return Err(RegistryError::ReservedKey(key.to_string()));
        }
        Ok(())
    }

    /// Register (or replace) the handler for `key`.
    pub fn register(
        &self,
        tx: &mut Transaction,
        key: &str,
        script: &Script,
    ) -> Result<(), RegistryError> {
        Self::validate(key)?;
        tx.put(&self.scripts, &key.to_string(), script)?;
        debug!(key, "Registered script");
        Ok(())
    }

    /// Remove the handler for `key`. Returns whether it existed.
    pub fn unregister(&self, tx: &mut Transaction, key: &str) -> Result<bool, RegistryError> {
        if key == ENVIRONMENT_KEY {
            return Err(RegistryError::ReservedKey(key.to_string()));
        }
        let key = key.to_string();
        let existed = tx.contains(&self.scripts, &key)?;
        tx.remove(&self.scripts, &key)?;
        Ok(existed)
    }

    /// Install the environment-initialization script.
    pub fn set_environment_script(
        &self,
        tx: &mut Transaction,
        script: &Script,
    ) -> Result<(), RegistryError> {
        tx.put(&self.scripts, &ENVIRONMENT_KEY.to_string(), script)?;
        debug!("Installed environment script");
        Ok(())
    }

    /// Remove the environment-initialization script.
    pub fn clear_environment_script(&self, tx: &mut Transaction) -> Result<(), RegistryError> {
        tx.remove(&self.scripts, &ENVIRONMENT_KEY.to_string())?;
        Ok(())
    }

    /// Script stored under exactly `key`.
    pub fn lookup(&self, tx: &mut Transaction, key: &str) -> Result<Option<Script>, StoreError> {
        tx.get(&self.scripts, &key.to_string())
    }

    /// The environment-initialization script, if installed.
    pub fn environment_script(&self, tx: &mut Transaction) -> Result<Option<Script>, StoreError> {
        self.lookup(tx, ENVIRONMENT_KEY)
    }

    /// Every dispatchable endpoint, in key order.
    pub fn list_endpoints(&self, tx: &mut Transaction) -> Result<Vec<Endpoint>, StoreError> {
        let mut endpoints = Vec::new();
        for item in tx.iter(&self.scripts)? {
            let (key, _) = item?;
            if key == ENVIRONMENT_KEY {
                continue;
            }
            match split_script_key(&key) {
                Some((verb, path)) => endpoints.push(Endpoint {
                    verb,
                    path: path.to_string(),
                }),
                None => warn!(key = %key, "Skipping script key with unknown verb"),
            }
        }
        Ok(endpoints)
    }

    /// Schema entries for `path`, keyed by lowercase verb.
    pub fn endpoint_schema(
        &self,
        tx: &mut Transaction,
        path: &str,
    ) -> Result<BTreeMap<String, EndpointSchema>, StoreError> {
        let path = path.trim_start_matches('/');
        Ok(self
            .list_endpoints(tx)?
            .into_iter()
            .filter(|endpoint| endpoint.path == path)
            .map(|endpoint| {
                (
                    endpoint.verb.as_str().to_ascii_lowercase(),
                    EndpointSchema::default(),
                )
            })
            .collect())
    }
}
