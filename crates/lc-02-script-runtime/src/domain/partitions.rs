//! # Table Partitions
//!
//! An application owns `N` pairs of generic JSON tables, one private and one
//! public per index:
//!
//! ```text
//! handles: [ priv0, priv1, .., priv{N-1}, pub0, pub1, .., pub{N-1} ]
//!            └──── Private(i) → i ────┘   └── Public(i) → N + i ──┘
//! ```
//!
//! The tables are created once, when the registry is built. Scripts name a
//! table by string; the name is parsed into a [`PartitionId`] and checked
//! against this vector, so no table name is ever assembled at request time.

use lc_01_versioned_store::{Store, StoreError, Table};
use serde_json::Value;
use std::fmt;

/// Prefix of private partition names.
pub const PRIVATE_PREFIX: &str = "priv";

/// Prefix of public partition names.
pub const PUBLIC_PREFIX: &str = "pub";

/// A generic application table.
pub type GenericTable = Table<Value, Value>;

/// Private or public half of a partition pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PartitionKind {
    /// `privK`
    Private,
    /// `pubK`
    Public,
}

/// Identifies one partition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PartitionId {
    /// Private or public.
    pub kind: PartitionKind,
    /// Partition index.
    pub index: usize,
}

impl PartitionId {
    /// Private partition `index`.
    pub const fn private(index: usize) -> Self {
        Self {
            kind: PartitionKind::Private,
            index,
        }
    }

    /// Public partition `index`.
    pub const fn public(index: usize) -> Self {
        Self {
            kind: PartitionKind::Public,
            index,
        }
    }

    /// Parse `privK` / `pubK`. Leading zeros and signs are rejected so every
    /// table has exactly one spelling.
    pub fn parse(name: &str) -> Option<Self> {
        let (kind, digits) = if let Some(rest) = name.strip_prefix(PRIVATE_PREFIX) {
            (PartitionKind::Private, rest)
        } else if let Some(rest) = name.strip_prefix(PUBLIC_PREFIX) {
            (PartitionKind::Public, rest)
        } else {
            return None;
        };
        if digits.is_empty()
            || !digits.bytes().all(|b| b.is_ascii_digit())
            || (digits.len() > 1 && digits.starts_with('0'))
        {
            return None;
        }
        let index = digits.parse().ok()?;
        Some(Self { kind, index })
    }
}

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.kind {
            PartitionKind::Private => PRIVATE_PREFIX,
            PartitionKind::Public => PUBLIC_PREFIX,
        };
        write!(f, "{prefix}{}", self.index)
    }
}

/// The fixed set of `2N` partition table handles.
#[derive(Debug, Clone)]
pub struct TablePartitions {
    count: usize,
    tables: Vec<GenericTable>,
}

impl TablePartitions {
    /// Create all `2 * count` tables in `store`.
    pub fn create(store: &Store, count: usize) -> Result<Self, StoreError> {
        Self::build(count, |name| store.create_table(name))
    }

    /// Attach to partition tables that already exist in `store`.
    pub fn open(store: &Store, count: usize) -> Result<Self, StoreError> {
        Self::build(count, |name| store.open_table(name))
    }

    fn build(
        count: usize,
        mut make: impl FnMut(&str) -> Result<GenericTable, StoreError>,
    ) -> Result<Self, StoreError> {
        let ids = (0..count)
            .map(PartitionId::private)
            .chain((0..count).map(PartitionId::public));
        let tables = ids
            .map(|id| make(&id.to_string()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { count, tables })
    }

    /// Number of partition pairs (`N`).
    pub fn count(&self) -> usize {
        self.count
    }

    /// All handles, private then public.
    pub fn tables(&self) -> &[GenericTable] {
        &self.tables
    }

    /// Handle for a partition, if it exists.
    pub fn get(&self, id: PartitionId) -> Option<&GenericTable> {
        if id.index >= self.count {
            return None;
        }
        let slot = match id.kind {
            PartitionKind::Private => id.index,
            PartitionKind::Public => self.count + id.index,
        };
        self.tables.get(slot)
    }

    /// Resolve a table name to its partition and handle.
    pub fn resolve(&self, name: &str) -> Option<(PartitionId, &GenericTable)> {
        let id = PartitionId::parse(name)?;
        self.get(id).map(|table| (id, table))
    }

    /// Every partition id, in handle order.
    pub fn ids(&self) -> impl Iterator<Item = PartitionId> + '_ {
        (0..self.count)
            .map(PartitionId::private)
            .chain((0..self.count).map(PartitionId::public))
    }
}
