//! # Signature Log
//!
//! Seqno-keyed record of commit signatures, stored in the `signatures`
//! table. An entry is written once; writing the bit-identical signature
//! again is accepted, anything else at an occupied seqno is refused.

use lc_01_versioned_store::{Store, StoreError, Table, TableIter, Transaction};
use shared_types::SeqNo;
use tracing::debug;

use crate::domain::signature::PrimarySignature;
use crate::errors::SignatureError;

/// Name of the signature table.
pub const SIGNATURES_TABLE: &str = "signatures";

/// Result of [`SignatureLog::put`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// New entry written.
    Inserted,
    /// The same signature was already stored.
    AlreadyPresent,
}

/// Append-only signature log.
#[derive(Debug, Clone)]
pub struct SignatureLog {
    table: Table<SeqNo, PrimarySignature>,
}

impl SignatureLog {
    /// Create the `signatures` table.
    pub fn create(store: &Store) -> Result<Self, StoreError> {
        Ok(Self {
            table: store.create_table(SIGNATURES_TABLE)?,
        })
    }

    /// Attach to an existing `signatures` table.
    pub fn open(store: &Store) -> Result<Self, StoreError> {
        Ok(Self {
            table: store.open_table(SIGNATURES_TABLE)?,
        })
    }

    /// The underlying table.
    pub fn table(&self) -> &Table<SeqNo, PrimarySignature> {
        &self.table
    }

    /// Record `signature` at its seqno.
    pub fn put(
        &self,
        tx: &mut Transaction,
        signature: &PrimarySignature,
    ) -> Result<PutOutcome, SignatureError> {
        let seqno = signature.seqno;
        match tx.get(&self.table, &seqno)? {
            Some(existing) if existing == *signature => {
                debug!(seqno, "Signature already recorded");
                Ok(PutOutcome::AlreadyPresent)
            }
            Some(_) => Err(SignatureError::AlreadyExists { seqno }),
            None => {
                tx.put(&self.table, &seqno, signature)?;
                Ok(PutOutcome::Inserted)
            }
        }
    }

    /// Signature stored at `seqno`.
    pub fn get(
        &self,
        tx: &mut Transaction,
        seqno: SeqNo,
    ) -> Result<Option<PrimarySignature>, StoreError> {
        tx.get(&self.table, &seqno)
    }

    /// Lazily walk every entry in ascending seqno order.
    pub fn foreach<'a>(
        &self,
        tx: &'a mut Transaction,
    ) -> Result<TableIter<'a, SeqNo, PrimarySignature>, StoreError> {
        tx.iter(&self.table)
    }

    /// Entry with the highest seqno.
    pub fn latest(&self, tx: &mut Transaction) -> Result<Option<PrimarySignature>, StoreError> {
        let mut latest = None;
        for item in self.foreach(tx)? {
            latest = Some(item?.1);
        }
        Ok(latest)
    }
}
