//! Ledger
//!
//! The set of committed resources, the set of spent nullifier tags, and the
//! total order of accepted transactions.
//!
//! ```text
//!   apply_transaction(tx)
//!        │
//!        ▼
//!   ┌────────────────────┐   signatures, openings, balance
//!   │ Prepared::new(tx)  │   (no lock held)
//!   └────────┬───────────┘
//!            ▼
//!   ┌────────────────────┐   spent?  committed?  policy?
//!   │ commit (write lock)│   insert commitments + tags
//!   │                    │   append to order
//!   └────────┬───────────┘
//!            ▼
//!     Accepted { position, id }
//! ```
//!
//! The check-and-insert happens inside one write-lock critical section, so two
//! transactions racing on the same nullifier produce exactly one `Accepted`.
//! A rejected transaction leaves every set untouched.

use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::debug;
use thiserror::Error;
use tally_config::TallyConfig;
use tally_resource::{Commitment, NullifierTag, commitment};
use tally_transaction::{Transaction, TransactionError, TransactionId};

// ============================================================================
// Errors
// ============================================================================

/// Why a transaction was refused before touching the ledger sets.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidReason {
    #[error(transparent)]
    Malformed(#[from] TransactionError),
    #[error("ledger does not accept issuance")]
    IssuanceDisabled,
    #[error("consumed resource {0} was never committed")]
    UnknownInput(Commitment),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("invalid transaction: {0}")]
    InvalidTransaction(InvalidReason),
    #[error("double spend: nullifier {0} already spent")]
    DoubleSpend(NullifierTag),
    #[error("commitment {0} already recorded")]
    DuplicateCommitment(Commitment),
}

impl From<TransactionError> for LedgerError {
    fn from(err: TransactionError) -> Self {
        Self::InvalidTransaction(InvalidReason::Malformed(err))
    }
}

impl From<InvalidReason> for LedgerError {
    fn from(reason: InvalidReason) -> Self {
        Self::InvalidTransaction(reason)
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Admission policy applied on top of transaction validity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Accept transactions that consume nothing.
    pub allow_issuance: bool,
    /// Refuse to consume resources whose commitment is not on the ledger.
    pub require_known_inputs: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            allow_issuance: true,
            require_known_inputs: false,
        }
    }
}

impl From<&TallyConfig> for LedgerConfig {
    fn from(config: &TallyConfig) -> Self {
        Self {
            allow_issuance: config.ledger.allow_issuance,
            require_known_inputs: config.ledger.require_known_inputs,
        }
    }
}

// ============================================================================
// State
// ============================================================================

/// Result of a successful `apply_transaction`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accepted {
    /// Zero-based index in the ledger's total order.
    pub position: u64,
    pub id: TransactionId,
}

/// A transaction that passed every check that does not depend on ledger
/// state. Building one does all the signature and hashing work, so it can
/// happen on the submitter's task before the ledger lock is contended.
#[derive(Debug, Clone)]
pub struct Prepared {
    tx: Transaction,
    id: TransactionId,
    /// Commitments of the consumed resources.
    inputs: Vec<Commitment>,
}

impl Prepared {
    pub fn new(tx: Transaction) -> Result<Self, LedgerError> {
        tx.check()?;

        let inputs = tx
            .proofs
            .iter()
            .filter(|p| !p.is_created())
            .map(|p| commitment(p.resource()))
            .collect();
        let id = tx.id();

        Ok(Self { tx, id, inputs })
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn transaction(&self) -> &Transaction {
        &self.tx
    }
}

#[derive(Debug, Default)]
struct LedgerState {
    commitments: HashSet<Commitment>,
    spent: HashSet<NullifierTag>,
    order: Vec<Arc<Transaction>>,
}

/// Cloneable handle to one ledger; clones share state.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    state: Arc<RwLock<LedgerState>>,
    config: LedgerConfig,
}

impl Ledger {
    pub fn new(config: LedgerConfig) -> Self {
        Self {
            state: Arc::default(),
            config,
        }
    }

    /// Rebuilds a ledger by re-applying `accepted` in order.
    ///
    /// Replay checks validity and conflicts but not admission policy: the
    /// transactions were admitted under whatever policy was in force then.
    pub fn restore<I>(config: LedgerConfig, accepted: I) -> Result<Self, LedgerError>
    where
        I: IntoIterator<Item = Transaction>,
    {
        let replay = Self::new(LedgerConfig {
            allow_issuance: true,
            require_known_inputs: false,
        });
        for tx in accepted {
            replay.apply_transaction(tx)?;
        }

        Ok(Self {
            state: replay.state,
            config,
        })
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    fn read(&self) -> RwLockReadGuard<'_, LedgerState> {
        // every mutation completes before the guard drops, so a poisoned
        // lock still holds consistent state
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, LedgerState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Validates `tx` and, if it conflicts with nothing on the ledger,
    /// records its commitments and nullifiers and appends it to the order.
    pub fn apply_transaction(&self, tx: Transaction) -> Result<Accepted, LedgerError> {
        self.commit(Prepared::new(tx)?)
    }

    /// Applies a transaction already checked by [`Prepared::new`].
    ///
    /// Only set lookups and inserts happen here, all under the write lock.
    pub fn commit(&self, prepared: Prepared) -> Result<Accepted, LedgerError> {
        let Prepared { tx, id, inputs } = prepared;

        if tx.is_issuance() && !self.config.allow_issuance {
            return Err(InvalidReason::IssuanceDisabled.into());
        }

        let mut state = self.write();

        if let Some(nf) = tx.nullifiers.iter().find(|nf| state.spent.contains(nf.tag())) {
            return Err(LedgerError::DoubleSpend(*nf.tag()));
        }
        if let Some(c) = tx.commitments.iter().find(|c| state.commitments.contains(*c)) {
            return Err(LedgerError::DuplicateCommitment(*c));
        }
        if self.config.require_known_inputs {
            if let Some(c) = inputs.iter().find(|c| !state.commitments.contains(*c)) {
                return Err(InvalidReason::UnknownInput(*c).into());
            }
        }

        state.commitments.extend(tx.commitments.iter().copied());
        state.spent.extend(tx.nullifiers.iter().map(|nf| *nf.tag()));
        let position = state.order.len() as u64;
        state.order.push(Arc::new(tx));
        drop(state);

        debug!("accepted transaction {} at position {}", id, position);
        Ok(Accepted { position, id })
    }

    /// The accepted transactions in acceptance order, as of now.
    pub fn get_order(&self) -> Order {
        Order {
            ledger: self.clone(),
            len: self.len(),
        }
    }

    pub fn is_committed(&self, commitment: &Commitment) -> bool {
        self.read().commitments.contains(commitment)
    }

    pub fn is_spent(&self, tag: &NullifierTag) -> bool {
        self.read().spent.contains(tag)
    }

    /// Number of accepted transactions.
    pub fn len(&self) -> usize {
        self.read().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn commitment_count(&self) -> usize {
        self.read().commitments.len()
    }

    pub fn nullifier_count(&self) -> usize {
        self.read().spent.len()
    }

    pub fn transaction(&self, position: u64) -> Option<Arc<Transaction>> {
        let index = usize::try_from(position).ok()?;
        self.read().order.get(index).cloned()
    }
}

// ============================================================================
// Order
// ============================================================================

/// A snapshot of the ledger's total order.
///
/// Holds no lock and copies nothing up front; each call to [`Order::iter`]
/// starts again from position zero and reads one transaction at a time.
/// Transactions accepted after the snapshot are not included.
#[derive(Debug, Clone)]
pub struct Order {
    ledger: Ledger,
    len: usize,
}

impl Order {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn iter(&self) -> OrderIter {
        OrderIter {
            ledger: self.ledger.clone(),
            next: 0,
            end: self.len,
        }
    }
}

impl IntoIterator for &Order {
    type Item = Arc<Transaction>;
    type IntoIter = OrderIter;

    fn into_iter(self) -> OrderIter {
        self.iter()
    }
}

pub struct OrderIter {
    ledger: Ledger,
    next: usize,
    end: usize,
}

impl Iterator for OrderIter {
    type Item = Arc<Transaction>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        let tx = self.ledger.read().order.get(self.next).cloned();
        self.next += 1;
        tx
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.end - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for OrderIter {}
