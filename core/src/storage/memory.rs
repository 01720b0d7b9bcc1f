use std::sync::{Mutex, PoisonError};

use anyhow::{Result, ensure};
use tally_transaction::Transaction;

use crate::storage::LedgerStore;

/// A volatile store, for tests and throwaway ledgers.
#[derive(Debug, Default)]
pub struct MemoryStore {
    transactions: Mutex<Vec<Transaction>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.transactions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LedgerStore for MemoryStore {
    fn persist_accepted(&self, position: u64, tx: &Transaction) -> Result<()> {
        let mut transactions = self
            .transactions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        ensure!(
            position == transactions.len() as u64,
            "out-of-order persist: position {} but {} stored",
            position,
            transactions.len()
        );
        transactions.push(tx.clone());
        Ok(())
    }

    fn load_transactions(&self) -> Result<Vec<Transaction>> {
        Ok(self
            .transactions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }
}
