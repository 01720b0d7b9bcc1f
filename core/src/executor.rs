use log::error;
use tally_transaction::Transaction;
use tokio::task::JoinHandle;

use crate::ledger::Accepted;
use crate::service::{LedgerService, SubmitError};

/// Runs submissions as independent tokio tasks against one service.
#[derive(Clone)]
pub struct Executor {
    service: LedgerService,
}

impl Executor {
    pub fn new(service: LedgerService) -> Self {
        Self { service }
    }

    /// Submits `tx` on its own task. Dropping the handle does not cancel the
    /// submission.
    pub fn spawn(&self, tx: Transaction) -> JoinHandle<Result<Accepted, SubmitError>> {
        let service = self.service.clone();
        tokio::spawn(async move { service.submit(tx).await })
    }

    /// Submits every transaction concurrently and returns the outcomes in
    /// input order. Acceptance order is whatever the writer saw first.
    pub async fn run_all<I>(&self, txs: I) -> Vec<Result<Accepted, SubmitError>>
    where
        I: IntoIterator<Item = Transaction>,
    {
        let handles: Vec<_> = txs.into_iter().map(|tx| self.spawn(tx)).collect();

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => {
                    error!("Submission task failed: {}", e);
                    Err(SubmitError::ServiceUnavailable)
                }
            };
            results.push(result);
        }
        results
    }
}
