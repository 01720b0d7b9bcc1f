use tally_keypair::SecretKey;
use tally_resource::{Nullifier, Resource, commitment, nullifier};

use crate::{Proof, Transaction};

/// Assembles a transaction from the resources it creates and consumes,
/// deriving commitments, nullifiers and proofs in the order `validate`
/// expects.
#[derive(Debug, Default)]
pub struct TransactionBuilder {
    created: Vec<Resource>,
    consumed: Vec<(Resource, Nullifier)>,
}

impl TransactionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(mut self, resource: Resource) -> Self {
        self.created.push(resource);
        self
    }

    /// Consumes `resource`, authorizing with `secret_key`.
    pub fn consume(mut self, resource: Resource, secret_key: &SecretKey) -> Self {
        let nf = nullifier(&resource, secret_key);
        self.consumed.push((resource, nf));
        self
    }

    pub fn build(self) -> Transaction {
        let commitments = self.created.iter().map(commitment).collect();
        let nullifiers = self.consumed.iter().map(|(_, nf)| *nf).collect();
        let proofs = self
            .created
            .into_iter()
            .map(Proof::created)
            .chain(self.consumed.into_iter().map(|(r, _)| Proof::consumed(r)))
            .collect();

        Transaction::new(commitments, nullifiers, proofs)
    }
}
