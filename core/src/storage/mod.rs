pub mod db;
pub mod memory;

pub use db::RocksDbStore;
pub use memory::MemoryStore;

use anyhow::Result;
use tally_transaction::Transaction;

/// Durable record of the ledger's accepted transactions.
pub trait LedgerStore: Send + Sync {
    /// Records `tx` as accepted at `position`, together with its commitments
    /// and nullifier tags, in one atomic write.
    fn persist_accepted(&self, position: u64, tx: &Transaction) -> Result<()>;

    /// Every persisted transaction in position order.
    fn load_transactions(&self) -> Result<Vec<Transaction>>;
}
