//! Scripted walk through the ledger: two issuances of look-alike resources,
//! a transfer, a forged spend and a double spend.

use std::sync::Arc;

use anyhow::{Result, bail};
use log::info;
use tally_config::TallyConfig;
use tally_core::{
    Ledger, LedgerConfig, LedgerError, LedgerService, LedgerStore, MemoryStore, RocksDbStore,
    ServiceConfig, SubmitError,
};
use tally_keypair::Keypair;
use tally_resource::{Resource, commitment};
use tally_transaction::{Transaction, TransactionBuilder};

#[derive(Debug, Clone)]
pub struct DemoOptions {
    /// Use the configured RocksDB instead of a throwaway store
    pub persist: bool,
    pub label: String,
    pub quantity: u64,
}

impl Default for DemoOptions {
    fn default() -> Self {
        Self {
            persist: false,
            label: "x".to_string(),
            quantity: 10,
        }
    }
}

pub async fn run(config: &TallyConfig, options: DemoOptions) -> Result<()> {
    let ledger_config = LedgerConfig::from(config);
    if !ledger_config.allow_issuance {
        bail!("the demo mints resources, but ledger.allow_issuance is false");
    }

    let (ledger, store): (Ledger, Arc<dyn LedgerStore>) = if options.persist {
        let db = RocksDbStore::open(&config.database.path)?;
        let ledger = Ledger::restore(ledger_config, db.load_transactions()?)?;
        info!("Restored {} transactions from {}", ledger.len(), config.database.path);
        (ledger, Arc::new(db))
    } else {
        (Ledger::new(ledger_config), Arc::new(MemoryStore::new()))
    };

    let (service, writer) = LedgerService::spawn(ledger, store, ServiceConfig::from(config));

    let alice = Keypair::new();
    let bob = Keypair::new();
    let mallory = Keypair::new();
    println!("👤 alice: {}", alice.public_key());
    println!("👤 bob:   {}", bob.public_key());
    println!();

    // 1. Issue a resource to alice
    let r = Resource::new(alice.public_key(), options.label.as_str(), options.quantity);
    println!("🪙  Minting {} {} to alice", options.quantity, options.label);
    report(&service, TransactionBuilder::new().create(r.clone()).build()).await;

    // 2. An identical-looking resource is a different resource
    let twin = Resource::new(alice.public_key(), options.label.as_str(), options.quantity);
    println!(
        "🪙  Minting a look-alike: commitment {} vs {}",
        commitment(&r),
        commitment(&twin)
    );
    report(&service, TransactionBuilder::new().create(twin).build()).await;

    // 3. Alice pays bob
    let paid = Resource::new(bob.public_key(), options.label.as_str(), options.quantity);
    println!("💸 alice -> bob");
    let spend = TransactionBuilder::new()
        .consume(r.clone(), alice.secret_key())
        .create(paid)
        .build();
    report(&service, spend).await;

    // 4. Mallory signs for a resource owned by alice
    println!("🥷 mallory signs for alice's resource");
    let forged = TransactionBuilder::new()
        .consume(r.clone(), mallory.secret_key())
        .create(Resource::new(mallory.public_key(), options.label.as_str(), options.quantity))
        .build();
    report(&service, forged).await;

    // 5. Alice tries to spend the same resource again
    println!("🔁 alice -> alice, reusing the spent resource");
    let replay = TransactionBuilder::new()
        .consume(r, alice.secret_key())
        .create(Resource::new(alice.public_key(), options.label.as_str(), options.quantity))
        .build();
    report(&service, replay).await;

    let stats = service.stats().await?;
    println!();
    println!(
        "📊 {} transactions, {} commitments, {} spent nullifiers",
        stats.transactions, stats.commitments, stats.nullifiers
    );

    service.shutdown().await?;
    writer.await?;
    Ok(())
}

async fn report(service: &LedgerService, tx: Transaction) {
    match service.submit(tx).await {
        Ok(accepted) => println!(
            "   ✅ accepted at position {} ({})",
            accepted.position, accepted.id
        ),
        Err(SubmitError::Rejected(LedgerError::DoubleSpend(tag))) => {
            println!("   ⛔ double spend: nullifier {} already spent", tag)
        }
        Err(e) => println!("   ❌ {}", e),
    }
}
