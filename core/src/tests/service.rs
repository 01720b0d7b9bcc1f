use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Result, bail};
use tally_keypair::Keypair;
use tally_resource::{commitment, nullifier_tag};
use tally_transaction::Transaction;

use super::{mint, transfer};
use crate::executor::Executor;
use crate::ledger::{Ledger, LedgerConfig, LedgerError};
use crate::service::{LedgerService, LedgerStats, ServiceConfig, SubmitError};
use crate::storage::{LedgerStore, MemoryStore};

/// A store whose disk is always full.
struct BrokenStore;

impl LedgerStore for BrokenStore {
    fn persist_accepted(&self, _position: u64, _tx: &Transaction) -> Result<()> {
        bail!("disk full")
    }

    fn load_transactions(&self) -> Result<Vec<Transaction>> {
        Ok(Vec::new())
    }
}

/// Fails the next `failures` persists, then behaves like a `MemoryStore`.
#[derive(Default)]
struct FlakyStore {
    inner: MemoryStore,
    failures: AtomicUsize,
}

impl FlakyStore {
    fn fail_next(&self, n: usize) {
        self.failures.store(n, Ordering::SeqCst);
    }
}

impl LedgerStore for FlakyStore {
    fn persist_accepted(&self, position: u64, tx: &Transaction) -> Result<()> {
        if self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            bail!("write stalled");
        }
        self.inner.persist_accepted(position, tx)
    }

    fn load_transactions(&self) -> Result<Vec<Transaction>> {
        self.inner.load_transactions()
    }
}

fn start() -> (LedgerService, Ledger, Arc<MemoryStore>) {
    let ledger = Ledger::default();
    let store = Arc::new(MemoryStore::new());
    let service = LedgerService::start(ledger.clone(), store.clone(), ServiceConfig::default());
    (service, ledger, store)
}

#[tokio::test]
async fn submit_accepts_and_persists() {
    let (service, ledger, store) = start();
    let alice = Keypair::new();
    let (tx, r) = mint(&alice, "x", 10);

    let accepted = service.submit(tx.clone()).await.unwrap();

    assert_eq!(accepted.position, 0);
    assert!(ledger.is_committed(&commitment(&r)));
    assert_eq!(store.load_transactions().unwrap(), vec![tx]);
}

#[tokio::test]
async fn invalid_transaction_never_reaches_writer() {
    let (service, ledger, store) = start();

    let err = service.submit(Transaction::default()).await.unwrap_err();

    assert!(matches!(
        err,
        SubmitError::Rejected(LedgerError::InvalidTransaction(_))
    ));
    assert!(ledger.is_empty());
    assert!(store.is_empty());
}

#[tokio::test]
async fn double_spend_reported_through_service() {
    let (service, _ledger, store) = start();
    let alice = Keypair::new();
    let bob = Keypair::new();

    let (mint_tx, r) = mint(&alice, "x", 10);
    service.submit(mint_tx).await.unwrap();
    let (first, _) = transfer(&alice, &r, &bob);
    service.submit(first).await.unwrap();

    let (second, _) = transfer(&alice, &r, &alice);
    let err = service.submit(second).await.unwrap_err();

    assert!(matches!(
        err,
        SubmitError::Rejected(LedgerError::DoubleSpend(tag)) if tag == nullifier_tag(&r)
    ));
    assert_eq!(store.len(), 2);
}

#[tokio::test]
async fn stats_and_order_reflect_queued_submissions() {
    let (service, _ledger, _store) = start();
    let alice = Keypair::new();
    let bob = Keypair::new();

    let (mint_tx, r) = mint(&alice, "x", 10);
    let mint_id = mint_tx.id();
    service.submit(mint_tx).await.unwrap();
    let (spend, _) = transfer(&alice, &r, &bob);
    let spend_id = spend.id();
    service.submit(spend).await.unwrap();

    assert_eq!(
        service.stats().await.unwrap(),
        LedgerStats {
            transactions: 2,
            commitments: 2,
            nullifiers: 1,
        }
    );

    let ids: Vec<_> = service.order().await.unwrap().iter().map(|tx| tx.id()).collect();
    assert_eq!(ids, vec![mint_id, spend_id]);
}

#[tokio::test]
async fn storage_failure_surfaces_but_ledger_keeps_acceptance() {
    let ledger = Ledger::default();
    let service = LedgerService::start(ledger.clone(), Arc::new(BrokenStore), ServiceConfig::default());
    let (tx, r) = mint(&Keypair::new(), "x", 10);

    let err = service.submit(tx).await.unwrap_err();

    match err {
        SubmitError::Storage { accepted, reason } => {
            assert_eq!(accepted.position, 0);
            assert!(reason.contains("disk full"));
        }
        other => panic!("expected storage error, got {other:?}"),
    }
    assert!(ledger.is_committed(&commitment(&r)));
}

#[tokio::test]
async fn shutdown_stops_the_writer() {
    let ledger = Ledger::default();
    let (service, handle) = LedgerService::spawn(
        ledger,
        Arc::new(MemoryStore::new()),
        ServiceConfig { queue_depth: 4 },
    );

    service.shutdown().await.unwrap();
    handle.await.unwrap();

    let (tx, _) = mint(&Keypair::new(), "x", 1);
    assert!(matches!(
        service.submit(tx).await,
        Err(SubmitError::ServiceUnavailable)
    ));
    assert!(matches!(
        service.stats().await,
        Err(SubmitError::ServiceUnavailable)
    ));
}

#[tokio::test]
async fn abandoned_submission_still_decided_once() {
    let (service, ledger, store) = start();
    let alice = Keypair::new();
    let (tx, r) = mint(&alice, "x", 10);

    let executor = Executor::new(service.clone());
    // detach: nobody awaits this handle
    drop(executor.spawn(tx));

    let stats = loop {
        let stats = service.stats().await.unwrap();
        if stats.transactions == 1 {
            break stats;
        }
        tokio::task::yield_now().await;
    };

    assert_eq!(stats.commitments, 1);
    assert!(ledger.is_committed(&commitment(&r)));
    assert_eq!(store.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_disjoint_submissions_all_accepted() {
    let (service, ledger, store) = start();
    let executor = Executor::new(service);
    let alice = Keypair::new();
    let bob = Keypair::new();

    let txs: Vec<_> = (1..=16u64)
        .map(|q| mint(if q % 2 == 0 { &alice } else { &bob }, "x", q).0)
        .collect();
    let results = executor.run_all(txs).await;

    let mut positions: Vec<u64> = results.into_iter().map(|r| r.unwrap().position).collect();
    positions.sort_unstable();
    assert_eq!(positions, (0..16).collect::<Vec<_>>());
    assert_eq!(ledger.commitment_count(), 16);
    assert_eq!(store.len(), 16);

    // persisted order matches the ledger's order
    let persisted: Vec<_> = store
        .load_transactions()
        .unwrap()
        .iter()
        .map(Transaction::id)
        .collect();
    let ordered: Vec<_> = ledger.get_order().iter().map(|tx| tx.id()).collect();
    assert_eq!(persisted, ordered);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_conflicting_submissions_accept_exactly_one() {
    let (service, ledger, _store) = start();
    let executor = Executor::new(service.clone());
    let alice = Keypair::new();

    let (mint_tx, r) = mint(&alice, "x", 10);
    service.submit(mint_tx).await.unwrap();

    let spends: Vec<_> = (0..2)
        .map(|_| transfer(&alice, &r, &Keypair::new()).0)
        .collect();
    let results = executor.run_all(spends).await;

    let accepted = results.iter().filter(|r| r.is_ok()).count();
    let double_spends = results
        .iter()
        .filter(|r| matches!(r, Err(SubmitError::Rejected(LedgerError::DoubleSpend(_)))))
        .count();
    assert_eq!(accepted, 1);
    assert_eq!(double_spends, 1);
    assert_eq!(ledger.len(), 2);
}

#[tokio::test]
async fn failed_persist_caught_up_before_next_commit() {
    let ledger = Ledger::default();
    let store = Arc::new(FlakyStore::default());
    let service = LedgerService::start(ledger.clone(), store.clone(), ServiceConfig::default());
    let alice = Keypair::new();
    let bob = Keypair::new();

    let (mint_tx, r) = mint(&alice, "x", 10);
    service.submit(mint_tx).await.unwrap();

    store.fail_next(1);
    let (spend, _) = transfer(&alice, &r, &bob);
    let err = service.submit(spend).await.unwrap_err();
    assert!(matches!(err, SubmitError::Storage { accepted, .. } if accepted.position == 1));
    assert_eq!(store.inner.len(), 1);

    let (next, _) = mint(&bob, "y", 3);
    let accepted = service.submit(next).await.unwrap();
    assert_eq!(accepted.position, 2);
    assert_eq!(store.inner.len(), 3);

    // a restart sees the spend that failed to persist the first time
    let restored = Ledger::restore(LedgerConfig::default(), store.load_transactions().unwrap()).unwrap();
    assert!(restored.is_spent(&nullifier_tag(&r)));
    let (again, _) = transfer(&alice, &r, &alice);
    assert_eq!(
        restored.apply_transaction(again),
        Err(LedgerError::DoubleSpend(nullifier_tag(&r)))
    );
}

#[tokio::test]
async fn store_behind_refuses_new_commits() {
    let ledger = Ledger::default();
    let store = Arc::new(FlakyStore::default());
    let service = LedgerService::start(ledger.clone(), store.clone(), ServiceConfig::default());
    let alice = Keypair::new();

    store.fail_next(2);
    let (first, _) = mint(&alice, "x", 1);
    assert!(matches!(
        service.submit(first).await,
        Err(SubmitError::Storage { .. })
    ));

    let (second, r) = mint(&alice, "x", 2);
    let err = service.submit(second.clone()).await.unwrap_err();
    match err {
        SubmitError::StoreBehind { position, reason } => {
            assert_eq!(position, 0);
            assert!(reason.contains("write stalled"));
        }
        other => panic!("expected store behind, got {other:?}"),
    }
    assert_eq!(ledger.len(), 1);
    assert!(!ledger.is_committed(&commitment(&r)));

    let accepted = service.submit(second).await.unwrap();
    assert_eq!(accepted.position, 1);
    assert_eq!(store.inner.len(), 2);
}

#[tokio::test]
async fn shutdown_persists_backlog() {
    let store = Arc::new(FlakyStore::default());
    let (service, handle) =
        LedgerService::spawn(Ledger::default(), store.clone(), ServiceConfig::default());

    store.fail_next(1);
    let (tx, _) = mint(&Keypair::new(), "x", 5);
    assert!(service.submit(tx.clone()).await.is_err());
    assert!(store.inner.is_empty());

    service.shutdown().await.unwrap();
    handle.await.unwrap();

    assert_eq!(store.load_transactions().unwrap(), vec![tx]);
}
