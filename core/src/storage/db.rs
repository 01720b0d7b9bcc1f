use anyhow::{Context, Result, ensure};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use std::path::Path;
use std::sync::Arc;
use tally_resource::{Commitment, NullifierTag};
use tally_transaction::Transaction;

use crate::storage::LedgerStore;

const CF_COMMITMENTS: &str = "commitments";
const CF_NULLIFIERS: &str = "nullifiers";
const CF_TRANSACTIONS: &str = "transactions";
const CF_META: &str = "meta";

const KEY_NEXT_POSITION: &[u8] = b"next_position";

/// A thread-safe wrapper around RocksDB.
///
/// ```text
/// transactions: position (u64 BE) -> transaction wire form
/// commitments:  commitment        -> position (u64 BE)
/// nullifiers:   nullifier tag     -> position (u64 BE)
/// meta:         "next_position"   -> u64 BE
/// ```
#[derive(Clone)]
pub struct RocksDbStore {
    db: Arc<DB>,
}

impl RocksDbStore {
    /// Opens the database at the specified path, creating it if missing.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let db = DB::open_cf_descriptors(&opts, path, Self::families())
            .map_err(|e| anyhow::anyhow!("Failed to open RocksDB: {}", e))?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Opens an existing database without write access. Fails if `path`
    /// holds no ledger database; every write through this handle fails.
    pub fn open_read_only<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(false);
        opts.create_missing_column_families(false);

        let db = DB::open_cf_descriptors_read_only(&opts, path, Self::families(), false)
            .map_err(|e| anyhow::anyhow!("Failed to open RocksDB read-only: {}", e))?;

        Ok(Self { db: Arc::new(db) })
    }

    fn families() -> Vec<ColumnFamilyDescriptor> {
        [CF_COMMITMENTS, CF_NULLIFIERS, CF_TRANSACTIONS, CF_META]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect()
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .with_context(|| format!("{} CF missing", name))
    }

    /// Check if a commitment has been recorded
    pub fn commitment_exists(&self, commitment: &Commitment) -> Result<bool> {
        let cf = self.cf(CF_COMMITMENTS)?;
        Ok(self.db.get_cf(cf, commitment.as_bytes())?.is_some())
    }

    /// Check if a nullifier has already been spent
    pub fn nullifier_exists(&self, tag: &NullifierTag) -> Result<bool> {
        let cf = self.cf(CF_NULLIFIERS)?;
        Ok(self.db.get_cf(cf, tag.as_bytes())?.is_some())
    }

    /// Position the next accepted transaction will be stored at.
    pub fn next_position(&self) -> Result<u64> {
        let cf = self.cf(CF_META)?;
        match self.db.get_cf(cf, KEY_NEXT_POSITION)? {
            Some(bytes) => decode_position(&bytes),
            None => Ok(0),
        }
    }

    /// Get the transaction stored at `position`
    pub fn get_transaction(&self, position: u64) -> Result<Option<Transaction>> {
        let cf = self.cf(CF_TRANSACTIONS)?;
        match self.db.get_cf(cf, position.to_be_bytes())? {
            Some(bytes) => {
                let tx = Transaction::from_wire_form(&bytes)
                    .with_context(|| format!("corrupt transaction at position {}", position))?;
                Ok(Some(tx))
            }
            None => Ok(None),
        }
    }
}

impl LedgerStore for RocksDbStore {
    fn persist_accepted(&self, position: u64, tx: &Transaction) -> Result<()> {
        let next = self.next_position()?;
        ensure!(
            position == next,
            "out-of-order persist: position {} but next is {}",
            position,
            next
        );

        let cf_transactions = self.cf(CF_TRANSACTIONS)?;
        let cf_commitments = self.cf(CF_COMMITMENTS)?;
        let cf_nullifiers = self.cf(CF_NULLIFIERS)?;
        let cf_meta = self.cf(CF_META)?;

        let key = position.to_be_bytes();
        let mut batch = WriteBatch::default();

        batch.put_cf(cf_transactions, key, tx.to_wire_form());
        for commitment in &tx.commitments {
            batch.put_cf(cf_commitments, commitment.as_bytes(), key);
        }
        for nullifier in &tx.nullifiers {
            batch.put_cf(cf_nullifiers, nullifier.tag().as_bytes(), key);
        }
        batch.put_cf(cf_meta, KEY_NEXT_POSITION, (position + 1).to_be_bytes());

        self.db.write(batch)?;
        Ok(())
    }

    fn load_transactions(&self) -> Result<Vec<Transaction>> {
        let cf = self.cf(CF_TRANSACTIONS)?;

        let mut transactions = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, value) = item?;
            let position = decode_position(&key)?;
            ensure!(
                position == transactions.len() as u64,
                "gap in stored order: expected position {}, found {}",
                transactions.len(),
                position
            );
            let tx = Transaction::from_wire_form(&value)
                .with_context(|| format!("corrupt transaction at position {}", position))?;
            transactions.push(tx);
        }

        Ok(transactions)
    }
}

fn decode_position(bytes: &[u8]) -> Result<u64> {
    let arr: [u8; 8] = bytes.try_into().context("invalid position length")?;
    Ok(u64::from_be_bytes(arr))
}
