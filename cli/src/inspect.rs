//! Read-only views of the persisted ledger.

use anyhow::{Context, Result};
use serde::Serialize;
use tally_config::TallyConfig;
use tally_core::{Ledger, LedgerConfig, LedgerStore, RocksDbStore};
use tally_transaction::{Transaction, TransactionId};

#[derive(Serialize)]
struct OrderEntry<'a> {
    position: u64,
    id: TransactionId,
    transaction: &'a Transaction,
}

fn restore(config: &TallyConfig) -> Result<Ledger> {
    let db = RocksDbStore::open_read_only(&config.database.path)
        .with_context(|| format!("opening ledger database at {}", config.database.path))?;
    let history = db.load_transactions()?;
    Ledger::restore(LedgerConfig::from(config), history).context("persisted history does not replay")
}

pub fn order(config: &TallyConfig, json: bool) -> Result<()> {
    let ledger = restore(config)?;

    for (position, tx) in ledger.get_order().iter().enumerate() {
        let position = position as u64;
        if json {
            let entry = OrderEntry {
                position,
                id: tx.id(),
                transaction: tx.as_ref(),
            };
            println!("{}", serde_json::to_string(&entry)?);
        } else {
            println!(
                "{:>6}  {}  +{} -{}",
                position,
                tx.id(),
                tx.commitments.len(),
                tx.nullifiers.len()
            );
        }
    }

    Ok(())
}

pub fn stats(config: &TallyConfig) -> Result<()> {
    let ledger = restore(config)?;
    println!("📍 Database:     {}", config.database.path);
    println!("📜 Transactions: {}", ledger.len());
    println!("🪙  Commitments:  {}", ledger.commitment_count());
    println!("🔥 Nullifiers:   {}", ledger.nullifier_count());
    Ok(())
}
