//! Ledger Service
//!
//! Single-writer front end for a [`Ledger`] backed by a [`LedgerStore`].
//!
//! ```text
//!  submitter ──┐  Prepared::new (crypto, on the submitter's task)
//!  submitter ──┼──▶ mpsc ──▶ writer task ──▶ Ledger::commit
//!  submitter ──┘                 │
//!                                ▼
//!                     LedgerStore::persist_accepted
//!                                │
//!                   oneshot ◀────┘ reply
//! ```
//!
//! The writer replies only after the accepted transaction is persisted, so
//! the store's order always matches the ledger's. A submitter that gives up
//! waiting does not undo the writer's decision.
//!
//! If a persist fails, the ledger keeps the acceptance and the store falls
//! behind. Before committing anything new the writer persists that backlog;
//! while it cannot, every submission is refused with
//! [`SubmitError::StoreBehind`] and the ledger does not grow.
//!
//! Commits and store writes run on tokio's blocking pool, one at a time.

use std::sync::Arc;

use anyhow::Context;
use log::{debug, error, info, warn};
use tally_config::TallyConfig;
use tally_transaction::Transaction;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::ledger::{Accepted, Ledger, LedgerError, Order, Prepared};
use crate::storage::LedgerStore;

const DEFAULT_QUEUE_DEPTH: usize = 1000;

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Submissions buffered ahead of the writer
    pub queue_depth: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            queue_depth: DEFAULT_QUEUE_DEPTH,
        }
    }
}

impl From<&TallyConfig> for ServiceConfig {
    fn from(config: &TallyConfig) -> Self {
        Self {
            queue_depth: config.service.queue_depth.max(1),
        }
    }
}

// ============================================================================
// Errors and stats
// ============================================================================

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Rejected(#[from] LedgerError),
    /// The ledger accepted the transaction but the store did not record it.
    #[error("transaction accepted at position {} but not persisted: {reason}", .accepted.position)]
    Storage { accepted: Accepted, reason: String },
    /// Earlier acceptances are still unpersisted; nothing was committed.
    #[error("store is behind the ledger from position {position}: {reason}")]
    StoreBehind { position: u64, reason: String },
    #[error("ledger service unavailable")]
    ServiceUnavailable,
}

/// Ledger statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LedgerStats {
    pub transactions: usize,
    pub commitments: usize,
    pub nullifiers: usize,
}

// ============================================================================
// Async Ledger Service
// ============================================================================

/// Messages for the ledger service
enum LedgerCommand {
    /// Commit a checked transaction
    Submit(Prepared, oneshot::Sender<Result<Accepted, SubmitError>>),
    /// Get statistics
    Stats(oneshot::Sender<LedgerStats>),
    /// Snapshot the order
    Order(oneshot::Sender<Order>),
    /// Shutdown
    Shutdown,
}

/// Cloneable handle to the writer task.
#[derive(Clone)]
pub struct LedgerService {
    command_tx: mpsc::Sender<LedgerCommand>,
}

impl LedgerService {
    /// Start the ledger service. Must be called within a tokio runtime.
    ///
    /// `ledger` must hold exactly the transactions `store` has persisted,
    /// as returned by [`Ledger::restore`] over `store`.
    pub fn start(ledger: Ledger, store: Arc<dyn LedgerStore>, config: ServiceConfig) -> Self {
        Self::spawn(ledger, store, config).0
    }

    /// Start the service and return the writer's join handle as well.
    pub fn spawn(
        ledger: Ledger,
        store: Arc<dyn LedgerStore>,
        config: ServiceConfig,
    ) -> (Self, JoinHandle<()>) {
        let (command_tx, mut command_rx) = mpsc::channel::<LedgerCommand>(config.queue_depth);

        let handle = tokio::spawn(async move {
            info!(
                "Ledger service started ({} transactions on ledger)",
                ledger.len()
            );
            let mut writer = Some(Writer::new(ledger.clone(), store));

            while let Some(cmd) = command_rx.recv().await {
                match cmd {
                    LedgerCommand::Submit(prepared, reply) => {
                        let Some(mut w) = writer.take() else { break };
                        let joined = tokio::task::spawn_blocking(move || {
                            let result = w.submit(prepared);
                            (w, result)
                        })
                        .await;

                        match joined {
                            Ok((w, result)) => {
                                writer = Some(w);
                                let _ = reply.send(result);
                            }
                            Err(e) => {
                                error!("Ledger writer panicked: {}", e);
                                let _ = reply.send(Err(SubmitError::ServiceUnavailable));
                                break;
                            }
                        }
                    }
                    LedgerCommand::Stats(reply) => {
                        let _ = reply.send(LedgerStats {
                            transactions: ledger.len(),
                            commitments: ledger.commitment_count(),
                            nullifiers: ledger.nullifier_count(),
                        });
                    }
                    LedgerCommand::Order(reply) => {
                        let _ = reply.send(ledger.get_order());
                    }
                    LedgerCommand::Shutdown => {
                        break;
                    }
                }
            }

            if let Some(mut w) = writer {
                let flushed = tokio::task::spawn_blocking(move || w.catch_up()).await;
                match flushed {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => error!("Store still behind at shutdown: {:#}", e),
                    Err(e) => error!("Ledger writer panicked at shutdown: {}", e),
                }
            }

            info!("Ledger service stopped");
        });

        (Self { command_tx }, handle)
    }

    /// Submit a transaction
    pub async fn submit(&self, tx: Transaction) -> Result<Accepted, SubmitError> {
        let prepared = Prepared::new(tx).inspect_err(|e| warn!("Rejected transaction: {}", e))?;

        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(LedgerCommand::Submit(prepared, reply_tx))
            .await
            .map_err(|_| SubmitError::ServiceUnavailable)?;
        reply_rx.await.map_err(|_| SubmitError::ServiceUnavailable)?
    }

    /// Get statistics
    pub async fn stats(&self) -> Result<LedgerStats, SubmitError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(LedgerCommand::Stats(reply_tx))
            .await
            .map_err(|_| SubmitError::ServiceUnavailable)?;
        reply_rx.await.map_err(|_| SubmitError::ServiceUnavailable)
    }

    /// Snapshot of the accepted transactions, ordered after every submission
    /// already queued.
    pub async fn order(&self) -> Result<Order, SubmitError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(LedgerCommand::Order(reply_tx))
            .await
            .map_err(|_| SubmitError::ServiceUnavailable)?;
        reply_rx.await.map_err(|_| SubmitError::ServiceUnavailable)
    }

    /// Shutdown the service. Submissions queued earlier are still processed.
    pub async fn shutdown(&self) -> Result<(), SubmitError> {
        self.command_tx
            .send(LedgerCommand::Shutdown)
            .await
            .map_err(|_| SubmitError::ServiceUnavailable)
    }
}

// ============================================================================
// Writer
// ============================================================================

/// Owns the store side of the ledger. Lives on the writer task and is lent to
/// the blocking pool for each submission.
struct Writer {
    ledger: Ledger,
    store: Arc<dyn LedgerStore>,
    /// Positions below this are in the store.
    persisted: u64,
}

impl Writer {
    fn new(ledger: Ledger, store: Arc<dyn LedgerStore>) -> Self {
        let persisted = ledger.len() as u64;
        Self {
            ledger,
            store,
            persisted,
        }
    }

    /// Persists every accepted transaction the store does not have yet.
    fn catch_up(&mut self) -> anyhow::Result<()> {
        let end = self.ledger.len() as u64;
        while self.persisted < end {
            let position = self.persisted;
            let tx = self
                .ledger
                .transaction(position)
                .with_context(|| format!("no transaction at position {}", position))?;
            self.store.persist_accepted(position, &tx)?;
            debug!("Persisted transaction {} at position {}", tx.id(), position);
            self.persisted += 1;
        }
        Ok(())
    }

    fn submit(&mut self, prepared: Prepared) -> Result<Accepted, SubmitError> {
        if let Err(e) = self.catch_up() {
            error!(
                "Refusing submission, store behind ledger from position {}: {:#}",
                self.persisted, e
            );
            return Err(SubmitError::StoreBehind {
                position: self.persisted,
                reason: format!("{:#}", e),
            });
        }

        let id = prepared.id();
        let accepted = match self.ledger.commit(prepared) {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!("Rejected transaction {}: {}", id, e);
                return Err(e.into());
            }
        };

        if let Err(e) = self.catch_up() {
            error!(
                "Failed to persist transaction {} at position {}: {:#}",
                accepted.id, accepted.position, e
            );
            return Err(SubmitError::Storage {
                accepted,
                reason: format!("{:#}", e),
            });
        }

        Ok(accepted)
    }
}
