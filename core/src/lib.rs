//! Tally ledger: accepts transactions that create and consume resources,
//! refusing any that spend a nullifier twice.

pub mod executor;
pub mod ledger;
pub mod service;
pub mod storage;

pub use executor::Executor;
pub use ledger::{
    Accepted, InvalidReason, Ledger, LedgerConfig, LedgerError, Order, OrderIter, Prepared,
};
pub use service::{LedgerService, LedgerStats, ServiceConfig, SubmitError};
pub use storage::{LedgerStore, MemoryStore, RocksDbStore};

#[cfg(test)]
mod tests;
