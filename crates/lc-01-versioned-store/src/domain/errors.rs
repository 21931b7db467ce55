use thiserror::Error;

/// Errors raised by the versioned store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A key read by the transaction was written after its snapshot.
    #[error("Write conflict on {table}[{key}]: read at version {read_version}, now at {current_version}")]
    Conflict {
        table: String,
        key: String,
        read_version: u64,
        current_version: u64,
    },

    /// A table scanned by the transaction was modified after its snapshot.
    #[error("Scan conflict on table {table}: read at version {read_version}, modified at {modified_version}")]
    ScanConflict {
        table: String,
        read_version: u64,
        modified_version: u64,
    },

    /// The snapshot predates compacted history and can no longer be validated.
    #[error("Stale snapshot: read version {read_version} is below compaction point {compacted_to}")]
    StaleSnapshot { read_version: u64, compacted_to: u64 },

    #[error("Unknown table: {0}")]
    UnknownTable(String),

    #[error("Table already exists: {0}")]
    TableExists(String),

    /// Write attempted through a historical snapshot.
    #[error("Snapshot transactions are read-only")]
    ReadOnlySnapshot,

    #[error("Version {requested} has been compacted (history starts at {compacted_to})")]
    VersionCompacted { requested: u64, compacted_to: u64 },

    #[error("Version {requested} is not committed yet (current {current})")]
    VersionNotCommitted { requested: u64, current: u64 },

    /// The commit would not land at the version the caller reserved.
    #[error("Version mismatch: expected to commit at {expected}, next version is {actual}")]
    VersionMismatch { expected: u64, actual: u64 },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

impl StoreError {
    /// True if re-running the whole transaction against a fresh snapshot may
    /// succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Conflict { .. } | Self::ScanConflict { .. } | Self::StaleSnapshot { .. }
        )
    }
}
