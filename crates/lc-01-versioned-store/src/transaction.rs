//! Optimistic transactions over a store snapshot.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::marker::PhantomData;
use std::ops::Bound;
use tracing::debug;

use crate::domain::entry::{CommitOutcome, CommitReceipt, LedgerEntry, WriteSet};
use crate::domain::errors::StoreError;
use crate::domain::keys::StoreKey;
use crate::domain::table::{decode_value, encode_value, Table};
use crate::store::{Store, Version};

/// A unit of work against one snapshot of the store.
///
/// Reads observe the snapshot the transaction was opened at, overlaid with
/// the transaction's own pending writes. Nothing is visible to other
/// transactions until [`Transaction::commit`] succeeds; dropping the
/// transaction discards it.
pub struct Transaction {
    store: Store,
    read_version: Version,
    read_only: bool,
    reads: BTreeSet<(String, Vec<u8>)>,
    scans: BTreeSet<String>,
    writes: WriteSet,
}

impl Transaction {
    pub(crate) fn new(store: Store, read_version: Version, read_only: bool) -> Self {
        Self {
            store,
            read_version,
            read_only,
            reads: BTreeSet::new(),
            scans: BTreeSet::new(),
            writes: WriteSet::new(),
        }
    }

    /// Version this transaction reads from.
    pub fn read_version(&self) -> Version {
        self.read_version
    }

    /// True for historical snapshots opened with [`Store::begin_at`].
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// True if the transaction has pending writes.
    pub fn has_writes(&self) -> bool {
        self.writes.values().any(|keys| !keys.is_empty())
    }

    fn get_raw(&mut self, table: &str, key: Vec<u8>) -> Result<Option<Vec<u8>>, StoreError> {
        if let Some(pending) = self.writes.get(table).and_then(|keys| keys.get(&key)) {
            return Ok(pending.clone());
        }
        let value = {
            let state = self.store.inner.read();
            let table_state = state.table(table)?;
            state.check_snapshot(self.read_version)?;
            table_state
                .cells
                .get(&key)
                .and_then(|cell| cell.live_at(self.read_version))
                .map(<[u8]>::to_vec)
        };
        self.reads.insert((table.to_string(), key));
        Ok(value)
    }

    /// Read a key.
    pub fn get<K: StoreKey, V: DeserializeOwned>(
        &mut self,
        table: &Table<K, V>,
        key: &K,
    ) -> Result<Option<V>, StoreError> {
        self.get_raw(table.name(), key.encode_key())?
            .map(|bytes| decode_value(&bytes))
            .transpose()
    }

    /// True if the key is present.
    pub fn contains<K: StoreKey, V>(
        &mut self,
        table: &Table<K, V>,
        key: &K,
    ) -> Result<bool, StoreError> {
        Ok(self.get_raw(table.name(), key.encode_key())?.is_some())
    }

    fn stage(
        &mut self,
        table: &str,
        key: Vec<u8>,
        value: Option<Vec<u8>>,
    ) -> Result<(), StoreError> {
        if self.read_only {
            return Err(StoreError::ReadOnlySnapshot);
        }
        self.store.inner.read().table(table)?;
        self.writes
            .entry(table.to_string())
            .or_default()
            .insert(key, value);
        Ok(())
    }

    /// Write a key.
    pub fn put<K: StoreKey, V: Serialize>(
        &mut self,
        table: &Table<K, V>,
        key: &K,
        value: &V,
    ) -> Result<(), StoreError> {
        let bytes = encode_value(value)?;
        self.stage(table.name(), key.encode_key(), Some(bytes))
    }

    /// Remove a key. Removing an absent key is not an error.
    pub fn remove<K: StoreKey, V>(
        &mut self,
        table: &Table<K, V>,
        key: &K,
    ) -> Result<(), StoreError> {
        self.stage(table.name(), key.encode_key(), None)
    }

    /// Lazy ascending iteration over a table.
    ///
    /// The whole table joins the read set: any later commit to it makes this
    /// transaction conflict.
    pub fn iter<'a, K: StoreKey, V: DeserializeOwned>(
        &'a mut self,
        table: &Table<K, V>,
    ) -> Result<TableIter<'a, K, V>, StoreError> {
        self.store.inner.read().table(table.name())?;
        self.scans.insert(table.name().to_string());
        let this: &'a Self = self;
        Ok(TableIter {
            store: &this.store,
            table: table.name().to_string(),
            read_version: this.read_version,
            pending: this.writes.get(table.name()),
            cursor: None,
            done: false,
            _marker: PhantomData,
        })
    }

    /// Validate and apply the transaction at the next version.
    pub fn commit(self) -> Result<CommitOutcome, StoreError> {
        self.commit_inner(None)
    }

    /// Like [`Transaction::commit`], but fail with
    /// [`StoreError::VersionMismatch`] unless the writes land at `version`.
    pub fn commit_expecting(self, version: Version) -> Result<CommitOutcome, StoreError> {
        self.commit_inner(Some(version))
    }

    fn commit_inner(self, expected: Option<Version>) -> Result<CommitOutcome, StoreError> {
        if !self.has_writes() {
            debug!(read_version = self.read_version, "Read-only transaction finished");
            return Ok(CommitOutcome::ReadOnly);
        }

        let mut state = self.store.inner.write();
        state.check_snapshot(self.read_version)?;

        for (table, key) in &self.reads {
            let current = state
                .table(table)?
                .cells
                .get(key)
                .map(|cell| cell.latest_version())
                .unwrap_or(0);
            if current > self.read_version {
                debug!(table = %table, read_version = self.read_version, current, "Read conflict");
                return Err(StoreError::Conflict {
                    table: table.clone(),
                    key: hex::encode(key),
                    read_version: self.read_version,
                    current_version: current,
                });
            }
        }
        for table in &self.scans {
            let modified = state.table(table)?.last_modified;
            if modified > self.read_version {
                debug!(table = %table, read_version = self.read_version, modified, "Scan conflict");
                return Err(StoreError::ScanConflict {
                    table: table.clone(),
                    read_version: self.read_version,
                    modified_version: modified,
                });
            }
        }

        let version = state.version + 1;
        if let Some(expected) = expected {
            if expected != version {
                return Err(StoreError::VersionMismatch {
                    expected,
                    actual: version,
                });
            }
        }

        // Encode before touching state so a failure leaves nothing applied.
        let entry = LedgerEntry::encode(version, &self.writes)?;
        for table in self.writes.keys() {
            state.table(table)?;
        }

        for (table, keys) in self.writes {
            if keys.is_empty() {
                continue;
            }
            let Some(table_state) = state.tables.get_mut(&table) else {
                continue;
            };
            for (key, value) in keys {
                table_state.cells.entry(key).or_default().push(version, value);
            }
            table_state.last_modified = version;
        }
        state.version = version;
        debug!(version, bytes = entry.as_bytes().len(), "Committed transaction");

        Ok(CommitOutcome::Committed(CommitReceipt { version, entry }))
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("read_version", &self.read_version)
            .field("read_only", &self.read_only)
            .field("reads", &self.reads.len())
            .field("writes", &self.writes.len())
            .finish()
    }
}

/// Lazy, one-shot ascending iterator over a table as seen by a transaction.
///
/// Each step takes the store's read lock briefly; no lock is held between
/// steps.
pub struct TableIter<'a, K, V> {
    store: &'a Store,
    table: String,
    read_version: Version,
    pending: Option<&'a BTreeMap<Vec<u8>, Option<Vec<u8>>>>,
    cursor: Option<Vec<u8>>,
    done: bool,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<'a, K, V> TableIter<'a, K, V> {
    fn lower(&self) -> Bound<&[u8]> {
        match &self.cursor {
            Some(c) => Bound::Excluded(c.as_slice()),
            None => Bound::Unbounded,
        }
    }

    fn next_raw(&self) -> Result<Option<(Vec<u8>, Vec<u8>)>, StoreError> {
        let committed = {
            let state = self.store.inner.read();
            let table_state = state.table(&self.table)?;
            state.check_snapshot(self.read_version)?;
            table_state
                .cells
                .range::<[u8], _>((self.lower(), Bound::Unbounded))
                .filter(|(key, _)| !self.pending.is_some_and(|p| p.contains_key(*key)))
                .find_map(|(key, cell)| {
                    cell.live_at(self.read_version)
                        .map(|value| (key.clone(), value.to_vec()))
                })
        };
        let pending = self.pending.and_then(|p| {
            p.range::<[u8], _>((self.lower(), Bound::Unbounded))
                .find_map(|(key, value)| value.as_ref().map(|v| (key.clone(), v.clone())))
        });

        Ok(match (committed, pending) {
            (Some(c), Some(p)) => Some(if c.0 < p.0 { c } else { p }),
            (c, p) => c.or(p),
        })
    }
}

impl<'a, K: StoreKey, V: DeserializeOwned> Iterator for TableIter<'a, K, V> {
    type Item = Result<(K, V), StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_raw() {
            Ok(Some((key, value))) => {
                let item = K::decode_key(&key)
                    .and_then(|k| decode_value(&value).map(|v| (k, v)));
                self.cursor = Some(key);
                Some(item)
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn setup() -> (Store, Table<String, u64>, Table<u64, String>) {
        let store = Store::new();
        let a = store.create_table::<String, u64>("pub0").unwrap();
        let b = store.create_table::<u64, String>("priv0").unwrap();
        (store, a, b)
    }

    fn key(s: &str) -> String {
        s.to_string()
    }

    #[test]
    fn test_read_own_writes() {
        let (store, table, _) = setup();
        let mut tx = store.begin();
        assert_eq!(tx.get(&table, &key("a")).unwrap(), None);
        tx.put(&table, &key("a"), &7).unwrap();
        assert_eq!(tx.get(&table, &key("a")).unwrap(), Some(7));
        tx.remove(&table, &key("a")).unwrap();
        assert!(!tx.contains(&table, &key("a")).unwrap());
    }

    #[test]
    fn test_uncommitted_writes_are_invisible() {
        let (store, table, _) = setup();
        let mut writer = store.begin();
        writer.put(&table, &key("a"), &1).unwrap();

        let mut reader = store.begin();
        assert_eq!(reader.get(&table, &key("a")).unwrap(), None);
        drop(writer);
        assert_eq!(store.current_version(), 0);
    }

    #[test]
    fn test_multi_table_commit_is_atomic() {
        let (store, a, b) = setup();
        let mut tx = store.begin();
        tx.put(&a, &key("x"), &1).unwrap();
        tx.put(&b, &10, &"ten".to_string()).unwrap();
        let outcome = tx.commit().unwrap();
        let receipt = outcome.receipt().unwrap();
        assert_eq!(receipt.version, 1);
        assert_eq!(receipt.entry.tables().unwrap().len(), 2);

        let mut check = store.begin();
        assert_eq!(check.get(&a, &key("x")).unwrap(), Some(1));
        assert_eq!(check.get(&b, &10).unwrap(), Some("ten".to_string()));
    }

    #[test]
    fn test_read_only_commit_consumes_no_version() {
        let (store, table, _) = setup();
        let mut tx = store.begin();
        tx.get(&table, &key("a")).unwrap();
        assert_eq!(tx.commit().unwrap(), CommitOutcome::ReadOnly);
        assert_eq!(store.current_version(), 0);
    }

    #[test]
    fn test_write_write_on_read_key_conflicts() {
        let (store, table, _) = setup();
        let mut t1 = store.begin();
        let mut t2 = store.begin();

        let v1 = t1.get(&table, &key("n")).unwrap().unwrap_or(0);
        t1.put(&table, &key("n"), &(v1 + 1)).unwrap();
        let v2 = t2.get(&table, &key("n")).unwrap().unwrap_or(0);
        t2.put(&table, &key("n"), &(v2 + 1)).unwrap();

        t1.commit().unwrap();
        let err = t2.commit().unwrap_err();
        assert!(err.is_retryable());
        assert!(matches!(err, StoreError::Conflict { read_version: 0, current_version: 1, .. }));
    }

    #[test]
    fn test_blind_writes_do_not_conflict() {
        let (store, table, _) = setup();
        let mut t1 = store.begin();
        let mut t2 = store.begin();
        t1.put(&table, &key("a"), &1).unwrap();
        t2.put(&table, &key("b"), &2).unwrap();
        t1.commit().unwrap();
        assert!(t2.commit().is_ok());
    }

    #[test]
    fn test_scan_conflicts_with_later_insert() {
        let (store, table, _) = setup();
        let mut scanner = store.begin();
        let count = scanner.iter(&table).unwrap().count();
        assert_eq!(count, 0);
        scanner.put(&table, &key("count"), &0).unwrap();

        let mut inserter = store.begin();
        inserter.put(&table, &key("new"), &1).unwrap();
        inserter.commit().unwrap();

        assert!(matches!(
            scanner.commit(),
            Err(StoreError::ScanConflict { .. })
        ));
    }

    #[test]
    fn test_iter_merges_pending_writes_in_order() {
        let (store, table, _) = setup();
        let mut seed = store.begin();
        for (k, v) in [("b", 2), ("d", 4), ("e", 5)] {
            seed.put(&table, &key(k), &v).unwrap();
        }
        seed.commit().unwrap();

        let mut tx = store.begin();
        tx.put(&table, &key("a"), &1).unwrap();
        tx.put(&table, &key("d"), &40).unwrap();
        tx.remove(&table, &key("e")).unwrap();
        tx.put(&table, &key("c"), &3).unwrap();

        let items: Vec<(String, u64)> = tx.iter(&table).unwrap().map(Result::unwrap).collect();
        assert_eq!(
            items,
            vec![(key("a"), 1), (key("b"), 2), (key("c"), 3), (key("d"), 40)]
        );
    }

    #[test]
    fn test_iter_is_snapshot_isolated() {
        let (store, _, table) = setup();
        let mut seed = store.begin();
        seed.put(&table, &1, &"one".to_string()).unwrap();
        seed.commit().unwrap();

        let mut reader = store.begin();
        let mut writer = store.begin();
        writer.put(&table, &2, &"two".to_string()).unwrap();
        writer.commit().unwrap();

        let keys: Vec<u64> = reader
            .iter(&table)
            .unwrap()
            .map(|r| r.unwrap().0)
            .collect();
        assert_eq!(keys, vec![1]);
    }

    #[test]
    fn test_snapshot_rejects_writes() {
        let (store, table, _) = setup();
        let mut snap = store.begin_at(0).unwrap();
        assert!(snap.is_read_only());
        assert_eq!(
            snap.put(&table, &key("a"), &1),
            Err(StoreError::ReadOnlySnapshot)
        );
    }

    #[test]
    fn test_unknown_table() {
        let (store, _, _) = setup();
        let other = Store::new();
        let foreign = other.create_table::<String, u64>("elsewhere").unwrap();
        let mut tx = store.begin();
        assert_eq!(
            tx.get(&foreign, &key("a")),
            Err(StoreError::UnknownTable("elsewhere".into()))
        );
    }

    #[test]
    fn test_commit_expecting() {
        let (store, table, _) = setup();
        let mut tx = store.begin();
        tx.put(&table, &key("a"), &1).unwrap();
        assert_eq!(
            tx.commit_expecting(5),
            Err(StoreError::VersionMismatch {
                expected: 5,
                actual: 1
            })
        );
        assert_eq!(store.current_version(), 0);

        let mut tx = store.begin();
        tx.put(&table, &key("a"), &1).unwrap();
        assert!(tx.commit_expecting(1).is_ok());
    }

    #[test]
    fn test_ledger_entries_are_deterministic() {
        let s1 = Store::new();
        let s2 = Store::new();
        let t1 = s1.create_table::<String, u64>("pub0").unwrap();
        let t2 = s2.create_table::<String, u64>("pub0").unwrap();

        let mut a = s1.begin();
        a.put(&t1, &key("y"), &2).unwrap();
        a.put(&t1, &key("x"), &1).unwrap();
        let mut b = s2.begin();
        b.put(&t2, &key("x"), &1).unwrap();
        b.put(&t2, &key("y"), &2).unwrap();

        let ea = a.commit().unwrap().receipt().unwrap().entry.digest();
        let eb = b.commit().unwrap().receipt().unwrap().entry.digest();
        assert_eq!(ea, eb);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_increments_with_retry() {
        let store = Store::new();
        let table = Arc::new(store.create_table::<String, u64>("pub0").unwrap());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            let table = Arc::clone(&table);
            handles.push(tokio::task::spawn_blocking(move || loop {
                let mut tx = store.begin();
                let n = tx.get(&table, &"n".to_string()).unwrap().unwrap_or(0);
                tx.put(&table, &"n".to_string(), &(n + 1)).unwrap();
                match tx.commit() {
                    Ok(_) => break,
                    Err(e) if e.is_retryable() => continue,
                    Err(e) => panic!("unexpected error: {e}"),
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let mut tx = store.begin();
        assert_eq!(tx.get(&table, &"n".to_string()).unwrap(), Some(8));
        assert_eq!(store.current_version(), 8);
    }
}
