//! # Ledger Entries
//!
//! Every committed write set becomes one ledger entry. The encoding is a
//! pure function of the writes (tables and keys in ascending order), so the
//! same commit always produces the same bytes and the same digest.

use serde::{Deserialize, Serialize};
use shared_crypto::sha256;
use shared_types::Hash;
use std::collections::BTreeMap;

use super::errors::StoreError;

/// Pending writes of one transaction: table → key → value (`None` = removal).
pub(crate) type WriteSet = BTreeMap<String, BTreeMap<Vec<u8>, Option<Vec<u8>>>>;

/// Writes applied to one table by a committed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableWrites {
    /// Table name.
    pub table: String,
    /// Encoded key and value pairs in key order; `None` removes the key.
    pub writes: Vec<(Vec<u8>, Option<Vec<u8>>)>,
}

#[derive(Serialize, Deserialize)]
struct EntryBody {
    version: u64,
    tables: Vec<TableWrites>,
}

/// Serialized, committed write set at a given version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    version: u64,
    bytes: Vec<u8>,
}

impl LedgerEntry {
    pub(crate) fn encode(version: u64, writes: &WriteSet) -> Result<Self, StoreError> {
        let body = EntryBody {
            version,
            tables: writes
                .iter()
                .map(|(table, keys)| TableWrites {
                    table: table.clone(),
                    writes: keys.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
                })
                .collect(),
        };
        let bytes =
            bincode::serialize(&body).map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(Self { version, bytes })
    }

    /// Rebuild an entry from its serialized form, validating the encoding.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, StoreError> {
        let body: EntryBody =
            bincode::deserialize(&bytes).map_err(|e| StoreError::Deserialization(e.to_string()))?;
        Ok(Self {
            version: body.version,
            bytes,
        })
    }

    /// Version (ledger sequence number) this entry was committed at.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Serialized bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// SHA-256 digest of the serialized entry.
    pub fn digest(&self) -> Hash {
        sha256(&self.bytes)
    }

    /// Decode the per-table writes.
    pub fn tables(&self) -> Result<Vec<TableWrites>, StoreError> {
        let body: EntryBody = bincode::deserialize(&self.bytes)
            .map_err(|e| StoreError::Deserialization(e.to_string()))?;
        Ok(body.tables)
    }
}

/// Result of a successful write commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitReceipt {
    /// New store version.
    pub version: u64,
    /// The committed write set.
    pub entry: LedgerEntry,
}

/// Outcome of [`crate::Transaction::commit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Writes were applied at a new version.
    Committed(CommitReceipt),
    /// The transaction wrote nothing; no version was consumed.
    ReadOnly,
}

impl CommitOutcome {
    /// The receipt, if anything was committed.
    pub fn receipt(&self) -> Option<&CommitReceipt> {
        match self {
            Self::Committed(receipt) => Some(receipt),
            Self::ReadOnly => None,
        }
    }
}
