use std::collections::BTreeSet;

use super::partitions::{PartitionId, PartitionKind};

/// What a script may do with the tables in its scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableAccess {
    /// `$get` and `$has` only.
    ReadOnly,
    /// All table operations.
    ReadWrite,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Selection {
    Nothing,
    All,
    Kind(PartitionKind),
    Only(BTreeSet<PartitionId>),
}

/// The partitions a script invocation may reach, and how.
///
/// Tables outside the partition set are never reachable, whatever the scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableScope {
    selection: Selection,
    access: TableAccess,
}

impl TableScope {
    /// No tables at all (used for the environment-initialization script).
    pub fn none() -> Self {
        Self {
            selection: Selection::Nothing,
            access: TableAccess::ReadOnly,
        }
    }

    /// Every partition.
    pub fn all(access: TableAccess) -> Self {
        Self {
            selection: Selection::All,
            access,
        }
    }

    /// Every public (or every private) partition.
    pub fn kind(kind: PartitionKind, access: TableAccess) -> Self {
        Self {
            selection: Selection::Kind(kind),
            access,
        }
    }

    /// An explicit set of partitions.
    pub fn only(ids: impl IntoIterator<Item = PartitionId>, access: TableAccess) -> Self {
        Self {
            selection: Selection::Only(ids.into_iter().collect()),
            access,
        }
    }

    /// Access mode for tables in scope.
    pub fn access(&self) -> TableAccess {
        self.access
    }

    /// True if `id` is reachable.
    pub fn permits(&self, id: PartitionId) -> bool {
        match &self.selection {
            Selection::Nothing => false,
            Selection::All => true,
            Selection::Kind(kind) => id.kind == *kind,
            Selection::Only(ids) => ids.contains(&id),
        }
    }

    /// True if `id` is reachable for writing.
    pub fn permits_write(&self, id: PartitionId) -> bool {
        self.access == TableAccess::ReadWrite && self.permits(id)
    }
}
