//! Multi-version table storage.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::domain::errors::StoreError;
use crate::domain::keys::StoreKey;
use crate::domain::table::Table;
use crate::transaction::Transaction;

/// Store version. Version 0 is the empty store; each write commit adds one.
pub type Version = u64;

/// Every version of one key, ascending. `None` marks a removal.
#[derive(Debug, Default)]
pub(crate) struct VersionedCell {
    versions: Vec<(Version, Option<Vec<u8>>)>,
}

impl VersionedCell {
    /// Value visible at `version`: outer `None` if the key had no history yet.
    pub(crate) fn at(&self, version: Version) -> Option<&Option<Vec<u8>>> {
        self.versions
            .iter()
            .rev()
            .find(|(v, _)| *v <= version)
            .map(|(_, value)| value)
    }

    /// Live value at `version`.
    pub(crate) fn live_at(&self, version: Version) -> Option<&[u8]> {
        self.at(version).and_then(|v| v.as_deref())
    }

    pub(crate) fn latest_version(&self) -> Version {
        self.versions.last().map(|(v, _)| *v).unwrap_or(0)
    }

    pub(crate) fn push(&mut self, version: Version, value: Option<Vec<u8>>) {
        self.versions.push((version, value));
    }

    /// Drop versions superseded at `up_to`. Returns true if the cell is empty.
    fn compact(&mut self, up_to: Version) -> bool {
        let keep_from = self
            .versions
            .iter()
            .rposition(|(v, _)| *v <= up_to)
            .unwrap_or(0);
        self.versions.drain(..keep_from);
        if let Some((v, None)) = self.versions.first() {
            if *v <= up_to {
                self.versions.remove(0);
            }
        }
        self.versions.is_empty()
    }
}

#[derive(Debug, Default)]
pub(crate) struct TableState {
    pub(crate) cells: BTreeMap<Vec<u8>, VersionedCell>,
    /// Last version that wrote to this table (used for scan validation).
    pub(crate) last_modified: Version,
}

#[derive(Debug, Default)]
pub(crate) struct StoreState {
    pub(crate) version: Version,
    pub(crate) tables: BTreeMap<String, TableState>,
    /// History at or below this version has been folded into single values.
    pub(crate) compacted_to: Version,
}

impl StoreState {
    pub(crate) fn table(&self, name: &str) -> Result<&TableState, StoreError> {
        self.tables
            .get(name)
            .ok_or_else(|| StoreError::UnknownTable(name.to_string()))
    }

    pub(crate) fn check_snapshot(&self, read_version: Version) -> Result<(), StoreError> {
        if read_version < self.compacted_to {
            return Err(StoreError::StaleSnapshot {
                read_version,
                compacted_to: self.compacted_to,
            });
        }
        Ok(())
    }
}

/// Shared handle to an in-memory versioned store.
///
/// Cloning is cheap; all clones see the same tables.
#[derive(Clone, Default)]
pub struct Store {
    pub(crate) inner: Arc<RwLock<StoreState>>,
}

impl Store {
    /// Create an empty store at version 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new named table.
    pub fn create_table<K: StoreKey, V>(&self, name: &str) -> Result<Table<K, V>, StoreError> {
        let mut state = self.inner.write();
        if state.tables.contains_key(name) {
            return Err(StoreError::TableExists(name.to_string()));
        }
        state.tables.insert(name.to_string(), TableState::default());
        info!(table = name, "Created table");
        Ok(Table::new(name))
    }

    /// Handle to an existing table.
    pub fn open_table<K: StoreKey, V>(&self, name: &str) -> Result<Table<K, V>, StoreError> {
        self.inner.read().table(name)?;
        Ok(Table::new(name))
    }

    /// Names of all tables, ascending.
    pub fn table_names(&self) -> Vec<String> {
        self.inner.read().tables.keys().cloned().collect()
    }

    /// Open a read-write transaction on the current version.
    pub fn begin(&self) -> Transaction {
        let version = self.inner.read().version;
        debug!(read_version = version, "Begin transaction");
        Transaction::new(self.clone(), version, false)
    }

    /// Open a read-only snapshot of a historical version.
    pub fn begin_at(&self, version: Version) -> Result<Transaction, StoreError> {
        let state = self.inner.read();
        if version > state.version {
            return Err(StoreError::VersionNotCommitted {
                requested: version,
                current: state.version,
            });
        }
        if version < state.compacted_to {
            return Err(StoreError::VersionCompacted {
                requested: version,
                compacted_to: state.compacted_to,
            });
        }
        Ok(Transaction::new(self.clone(), version, true))
    }

    /// Latest committed version.
    pub fn current_version(&self) -> Version {
        self.inner.read().version
    }

    /// Oldest version still readable.
    pub fn compacted_to(&self) -> Version {
        self.inner.read().compacted_to
    }

    /// Discard history superseded at or below `up_to`.
    ///
    /// Snapshots older than `up_to` become stale afterwards.
    pub fn compact(&self, up_to: Version) -> Result<(), StoreError> {
        let mut state = self.inner.write();
        if up_to > state.version {
            return Err(StoreError::VersionNotCommitted {
                requested: up_to,
                current: state.version,
            });
        }
        if up_to <= state.compacted_to {
            return Ok(());
        }
        let mut removed = 0usize;
        for table in state.tables.values_mut() {
            let before = table.cells.len();
            table.cells.retain(|_, cell| !cell.compact(up_to));
            removed += before - table.cells.len();
        }
        state.compacted_to = up_to;
        debug!(up_to, removed, "Compacted store history");
        Ok(())
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.read();
        f.debug_struct("Store")
            .field("version", &state.version)
            .field("tables", &state.tables.len())
            .field("compacted_to", &state.compacted_to)
            .finish()
    }
}
