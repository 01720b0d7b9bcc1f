//! Transaction validity in isolation from any ledger.
//!
//! A transaction is valid when:
//! - it creates or consumes at least one resource
//! - no commitment and no nullifier tag appears twice
//! - proof `i` opens commitment `i`, then proof `commitments.len() + j` opens
//!   nullifier `j`, and every opening verifies
//! - Σ consumed == Σ created, unless nothing is consumed (issuance)
//!
//! Quantities are summed across all labels. A label does not partition
//! value, so consuming 10 under "gold" and creating 10 under "silver" balances.

use std::collections::HashSet;

use thiserror::Error;
use tally_resource::{Commitment, NullifierTag};

use crate::Transaction;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionError {
    #[error("transaction creates and consumes nothing")]
    Empty,
    #[error("commitment {0} appears more than once")]
    DuplicateCommitment(Commitment),
    #[error("nullifier {0} appears more than once")]
    DuplicateNullifier(NullifierTag),
    #[error("expected {expected} proofs, found {found}")]
    ProofCountMismatch { expected: usize, found: usize },
    #[error("proof {index} has the wrong kind")]
    ProofKindMismatch { index: usize },
    #[error("proof {index} does not verify")]
    InvalidProof { index: usize },
    #[error("proof {index} carries a label too long to encode")]
    LabelTooLong { index: usize },
    #[error("unbalanced: created {created}, consumed {consumed}")]
    Unbalanced { created: u64, consumed: u64 },
    #[error("quantity sum overflows u64")]
    QuantityOverflow,
}

/// Quantities moved by a valid transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Balance {
    pub created: u64,
    pub consumed: u64,
}

/// Checks `tx` and reports why it is invalid.
pub fn check(tx: &Transaction) -> Result<Balance, TransactionError> {
    if tx.commitments.is_empty() && tx.nullifiers.is_empty() {
        return Err(TransactionError::Empty);
    }

    let mut seen_commitments = HashSet::with_capacity(tx.commitments.len());
    for c in &tx.commitments {
        if !seen_commitments.insert(c) {
            return Err(TransactionError::DuplicateCommitment(*c));
        }
    }
    let mut seen_tags = HashSet::with_capacity(tx.nullifiers.len());
    for n in &tx.nullifiers {
        if !seen_tags.insert(n.tag()) {
            return Err(TransactionError::DuplicateNullifier(*n.tag()));
        }
    }

    let expected = tx.commitments.len() + tx.nullifiers.len();
    if tx.proofs.len() != expected {
        return Err(TransactionError::ProofCountMismatch {
            expected,
            found: tx.proofs.len(),
        });
    }

    let (creation_proofs, consumption_proofs) = tx.proofs.split_at(tx.commitments.len());
    let mut balance = Balance::default();

    for (index, (commitment, proof)) in tx.commitments.iter().zip(creation_proofs).enumerate() {
        if !proof.resource().is_encodable() {
            return Err(TransactionError::LabelTooLong { index });
        }
        match proof.verify_commitment(commitment) {
            None => return Err(TransactionError::ProofKindMismatch { index }),
            Some(false) => return Err(TransactionError::InvalidProof { index }),
            Some(true) => {}
        }
        balance.created = balance
            .created
            .checked_add(proof.resource().quantity())
            .ok_or(TransactionError::QuantityOverflow)?;
    }

    let offset = tx.commitments.len();
    for (i, (nullifier, proof)) in tx.nullifiers.iter().zip(consumption_proofs).enumerate() {
        let index = offset + i;
        if !proof.resource().is_encodable() {
            return Err(TransactionError::LabelTooLong { index });
        }
        match proof.verify_nullifier(nullifier) {
            None => return Err(TransactionError::ProofKindMismatch { index }),
            Some(false) => return Err(TransactionError::InvalidProof { index }),
            Some(true) => {}
        }
        balance.consumed = balance
            .consumed
            .checked_add(proof.resource().quantity())
            .ok_or(TransactionError::QuantityOverflow)?;
    }

    if !tx.nullifiers.is_empty() && balance.created != balance.consumed {
        return Err(TransactionError::Unbalanced {
            created: balance.created,
            consumed: balance.consumed,
        });
    }

    Ok(balance)
}

/// Whether `tx` is valid in isolation.
pub fn validate(tx: &Transaction) -> bool {
    check(tx).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Proof, TransactionBuilder};
    use tally_keypair::Keypair;
    use tally_resource::{Resource, commitment, nullifier};

    #[test]
    fn test_empty_rejected() {
        assert_eq!(check(&Transaction::default()), Err(TransactionError::Empty));
    }

    #[test]
    fn test_issuance_valid() {
        let kp = Keypair::new();
        let r = Resource::new(kp.public_key(), "x", 10);
        let tx = Transaction::new(vec![commitment(&r)], vec![], vec![Proof::created(r)]);

        assert_eq!(
            check(&tx),
            Ok(Balance {
                created: 10,
                consumed: 0
            })
        );
    }

    #[test]
    fn test_balanced_transfer_valid() {
        let alice = Keypair::new();
        let bob = Keypair::new();
        let tx = TransactionBuilder::new()
            .consume(Resource::new(alice.public_key(), "x", 7), alice.secret_key())
            .consume(Resource::new(alice.public_key(), "x", 3), alice.secret_key())
            .create(Resource::new(bob.public_key(), "x", 10))
            .build();

        assert!(validate(&tx));
    }

    #[test]
    fn test_balance_sums_across_labels() {
        let alice = Keypair::new();
        let tx = TransactionBuilder::new()
            .consume(Resource::new(alice.public_key(), "gold", 10), alice.secret_key())
            .create(Resource::new(alice.public_key(), "silver", 4))
            .create(Resource::new(alice.public_key(), "bronze", 6))
            .build();

        assert_eq!(
            check(&tx),
            Ok(Balance {
                created: 10,
                consumed: 10
            })
        );
    }

    #[test]
    fn test_unbalanced_rejected_despite_valid_proofs() {
        let alice = Keypair::new();
        let tx = TransactionBuilder::new()
            .consume(Resource::new(alice.public_key(), "x", 5), alice.secret_key())
            .create(Resource::new(alice.public_key(), "x", 6))
            .build();

        assert_eq!(
            check(&tx),
            Err(TransactionError::Unbalanced {
                created: 6,
                consumed: 5
            })
        );
    }

    #[test]
    fn test_pure_burn_rejected() {
        let alice = Keypair::new();
        let tx = TransactionBuilder::new()
            .consume(Resource::new(alice.public_key(), "x", 5), alice.secret_key())
            .build();

        assert!(matches!(check(&tx), Err(TransactionError::Unbalanced { .. })));
    }

    #[test]
    fn test_duplicate_commitment_rejected() {
        let kp = Keypair::new();
        let r = Resource::new(kp.public_key(), "x", 1);
        let tx = Transaction::new(
            vec![commitment(&r), commitment(&r)],
            vec![],
            vec![Proof::created(r.clone()), Proof::created(r)],
        );

        assert!(matches!(
            check(&tx),
            Err(TransactionError::DuplicateCommitment(_))
        ));
    }

    #[test]
    fn test_duplicate_nullifier_rejected() {
        let kp = Keypair::new();
        let input = Resource::new(kp.public_key(), "x", 1);
        let nf = nullifier(&input, kp.secret_key());
        let out = Resource::new(kp.public_key(), "x", 2);
        let tx = Transaction::new(
            vec![commitment(&out)],
            vec![nf, nf],
            vec![
                Proof::created(out),
                Proof::consumed(input.clone()),
                Proof::consumed(input),
            ],
        );

        assert!(matches!(
            check(&tx),
            Err(TransactionError::DuplicateNullifier(_))
        ));
    }

    #[test]
    fn test_missing_proof_rejected() {
        let kp = Keypair::new();
        let r = Resource::new(kp.public_key(), "x", 1);
        let tx = Transaction::new(vec![commitment(&r)], vec![], vec![]);

        assert_eq!(
            check(&tx),
            Err(TransactionError::ProofCountMismatch {
                expected: 1,
                found: 0
            })
        );
    }

    #[test]
    fn test_proof_for_other_resource_rejected() {
        let kp = Keypair::new();
        let r = Resource::new(kp.public_key(), "x", 10);
        let decoy = Resource::new(kp.public_key(), "x", 10);
        let tx = Transaction::new(vec![commitment(&r)], vec![], vec![Proof::created(decoy)]);

        assert_eq!(check(&tx), Err(TransactionError::InvalidProof { index: 0 }));
    }

    #[test]
    fn test_wrong_proof_kind_rejected() {
        let kp = Keypair::new();
        let r = Resource::new(kp.public_key(), "x", 10);
        let tx = Transaction::new(vec![commitment(&r)], vec![], vec![Proof::consumed(r)]);

        assert_eq!(
            check(&tx),
            Err(TransactionError::ProofKindMismatch { index: 0 })
        );
    }

    #[test]
    fn test_unauthorized_consumption_rejected() {
        let owner = Keypair::new();
        let thief = Keypair::new();
        let stolen = Resource::new(owner.public_key(), "x", 10);
        let tx = TransactionBuilder::new()
            .consume(stolen, thief.secret_key())
            .create(Resource::new(thief.public_key(), "x", 10))
            .build();

        assert_eq!(check(&tx), Err(TransactionError::InvalidProof { index: 1 }));
    }

    #[test]
    fn test_quantity_overflow_rejected() {
        let kp = Keypair::new();
        let tx = TransactionBuilder::new()
            .create(Resource::new(kp.public_key(), "x", u64::MAX))
            .create(Resource::new(kp.public_key(), "x", 1))
            .build();

        assert_eq!(check(&tx), Err(TransactionError::QuantityOverflow));
    }

    #[test]
    fn test_oversized_label_rejected() {
        let kp = Keypair::new();
        let label = "l".repeat(tally_resource::MAX_LABEL_LEN + 1);
        let tx = TransactionBuilder::new()
            .create(Resource::new(kp.public_key(), label, 1))
            .build();

        assert_eq!(check(&tx), Err(TransactionError::LabelTooLong { index: 0 }));
    }
}
