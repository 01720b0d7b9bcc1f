// Copyright 2025 Tally Contributors
// Licensed under the Apache License, Version 2.0

//! Ledger node: reads hex-encoded transaction wire forms from stdin, one per
//! line, and answers each with the ledger's verdict.

use std::sync::Arc;

use anyhow::Context;
use log::{error, info};
use tally_config::TallyConfig;
use tally_core::{Ledger, LedgerConfig, LedgerService, LedgerStore, RocksDbStore, ServiceConfig};
use tally_transaction::Transaction;
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = TallyConfig::load()?;
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();
    info!("Tally node starting...");

    let db = RocksDbStore::open(&config.database.path)
        .with_context(|| format!("opening ledger database at {}", config.database.path))?;
    let history = db.load_transactions()?;
    info!("Replaying {} persisted transactions", history.len());
    let ledger = Ledger::restore(LedgerConfig::from(&config), history)
        .context("persisted history does not replay")?;

    let (service, writer) =
        LedgerService::spawn(ledger, Arc::new(db), ServiceConfig::from(&config));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let tx = match hex::decode(line)
            .map_err(anyhow::Error::from)
            .and_then(|bytes| Transaction::from_wire_form(&bytes).map_err(Into::into))
        {
            Ok(tx) => tx,
            Err(e) => {
                error!("Undecodable input: {}", e);
                println!("error {}", e);
                continue;
            }
        };

        match service.submit(tx).await {
            Ok(accepted) => println!("accepted {} {}", accepted.position, accepted.id),
            Err(e) => println!("rejected {}", e),
        }
    }

    let stats = service.stats().await?;
    info!(
        "Input closed: {} transactions, {} commitments, {} nullifiers",
        stats.transactions, stats.commitments, stats.nullifiers
    );
    service.shutdown().await?;
    writer.await?;
    Ok(())
}
