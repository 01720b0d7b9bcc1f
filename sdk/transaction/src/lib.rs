use std::fmt;

use serde::{Deserialize, Serialize};
use tally_resource::{
    Commitment, Nullifier, WireDecode, WireEncode, WireError, WireReader, put_len, put_u16,
};

pub mod builder;
pub mod proof;
pub mod validate;

pub use builder::TransactionBuilder;
pub use proof::Proof;
pub use validate::{Balance, TransactionError, check, validate};

/// Leading bytes of every encoded transaction.
pub const TX_MAGIC: [u8; 4] = *b"TLTX";
pub const TX_WIRE_VERSION: u16 = 1;

const COMMITMENT_WIRE_LEN: usize = 32;
const NULLIFIER_WIRE_LEN: usize = 32 + 64;
// kind + owner + label_len + quantity + nonce
const MIN_PROOF_WIRE_LEN: usize = 1 + 32 + 4 + 8 + 32;

/// A bundle of resources to create and resources to consume.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Transaction {
    /// Commitments of the resources being created.
    pub commitments: Vec<Commitment>,
    /// Nullifiers of the resources being consumed.
    pub nullifiers: Vec<Nullifier>,
    /// One proof per commitment, then one per nullifier.
    pub proofs: Vec<Proof>,
}

/// BLAKE3 digest of a transaction's wire form.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TransactionId(#[serde(with = "hex::serde")] pub [u8; 32]);

impl TransactionId {
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransactionId({})", hex::encode(&self.0[..8]))
    }
}

impl Transaction {
    pub fn new(commitments: Vec<Commitment>, nullifiers: Vec<Nullifier>, proofs: Vec<Proof>) -> Self {
        Self {
            commitments,
            nullifiers,
            proofs,
        }
    }

    /// A transaction that consumes nothing mints the value it creates.
    pub fn is_issuance(&self) -> bool {
        self.nullifiers.is_empty()
    }

    pub fn validate(&self) -> bool {
        validate(self)
    }

    pub fn check(&self) -> Result<Balance, TransactionError> {
        check(self)
    }

    /// Deterministic encoding for transmission and storage.
    ///
    /// ```text
    /// "TLTX" | version:u16
    /// | n:u32 | Commitment*  | n:u32 | Nullifier* | n:u32 | Proof*
    /// ```
    pub fn to_wire_form(&self) -> Vec<u8> {
        self.to_wire()
    }

    pub fn from_wire_form(bytes: &[u8]) -> Result<Self, WireError> {
        Self::from_wire(bytes)
    }

    pub fn id(&self) -> TransactionId {
        TransactionId(*blake3::hash(&self.to_wire_form()).as_bytes())
    }
}

/// Free-function form of [`Transaction::to_wire_form`].
pub fn to_wire_form(tx: &Transaction) -> Vec<u8> {
    tx.to_wire_form()
}

impl WireEncode for Transaction {
    fn encode_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&TX_MAGIC);
        put_u16(out, TX_WIRE_VERSION);

        put_len(out, self.commitments.len());
        for c in &self.commitments {
            c.encode_to(out);
        }
        put_len(out, self.nullifiers.len());
        for n in &self.nullifiers {
            n.encode_to(out);
        }
        put_len(out, self.proofs.len());
        for p in &self.proofs {
            p.encode_to(out);
        }
    }
}

impl WireDecode for Transaction {
    fn decode_from(reader: &mut WireReader<'_>) -> Result<Self, WireError> {
        if reader.read_array::<4>()? != TX_MAGIC {
            return Err(WireError::BadMagic);
        }
        let version = reader.read_u16()?;
        if version != TX_WIRE_VERSION {
            return Err(WireError::UnsupportedVersion(version));
        }

        let count = reader.read_count(COMMITMENT_WIRE_LEN)?;
        let commitments = (0..count)
            .map(|_| Commitment::decode_from(reader))
            .collect::<Result<Vec<_>, _>>()?;

        let count = reader.read_count(NULLIFIER_WIRE_LEN)?;
        let nullifiers = (0..count)
            .map(|_| Nullifier::decode_from(reader))
            .collect::<Result<Vec<_>, _>>()?;

        let count = reader.read_count(MIN_PROOF_WIRE_LEN)?;
        let proofs = (0..count)
            .map(|_| Proof::decode_from(reader))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            commitments,
            nullifiers,
            proofs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_keypair::Keypair;
    use tally_resource::Resource;

    fn transfer() -> Transaction {
        let alice = Keypair::from_seed(&[1u8; 32]);
        let bob = Keypair::from_seed(&[2u8; 32]);
        let input = Resource::new(alice.public_key(), "x", 10);
        TransactionBuilder::new()
            .consume(input, alice.secret_key())
            .create(Resource::new(bob.public_key(), "x", 10))
            .build()
    }

    #[test]
    fn test_wire_form_deterministic() {
        let tx = transfer();
        assert_eq!(tx.to_wire_form(), tx.clone().to_wire_form());
        assert_eq!(tx.id(), tx.clone().id());
        assert_eq!(to_wire_form(&tx), tx.to_wire_form());
    }

    #[test]
    fn test_wire_form_decodes_to_same_transaction() {
        let tx = transfer();
        let decoded = Transaction::from_wire_form(&tx.to_wire_form()).unwrap();
        assert_eq!(decoded, tx);
        assert!(decoded.validate(), "decoded proofs still verify");
    }

    #[test]
    fn test_wire_header() {
        let bytes = transfer().to_wire_form();
        assert_eq!(&bytes[..4], b"TLTX");
        assert_eq!(&bytes[4..6], &1u16.to_be_bytes());
        // one commitment
        assert_eq!(&bytes[6..10], &1u32.to_be_bytes());
    }

    #[test]
    fn test_decode_errors() {
        let bytes = transfer().to_wire_form();

        let mut bad_magic = bytes.clone();
        bad_magic[0] = b'X';
        assert_eq!(Transaction::from_wire_form(&bad_magic), Err(WireError::BadMagic));

        let mut bad_version = bytes.clone();
        bad_version[5] = 9;
        assert_eq!(
            Transaction::from_wire_form(&bad_version),
            Err(WireError::UnsupportedVersion(9))
        );

        assert_eq!(
            Transaction::from_wire_form(&bytes[..bytes.len() - 1]),
            Err(WireError::Truncated)
        );

        let mut trailing = bytes.clone();
        trailing.push(0);
        assert_eq!(
            Transaction::from_wire_form(&trailing),
            Err(WireError::TrailingBytes(1))
        );
    }

    #[test]
    fn test_distinct_transactions_have_distinct_ids() {
        assert_ne!(transfer().id(), transfer().id());
    }

    #[test]
    fn test_issuance() {
        let kp = Keypair::new();
        let mint = TransactionBuilder::new()
            .create(Resource::new(kp.public_key(), "x", 10))
            .build();
        assert!(mint.is_issuance());
        assert!(!transfer().is_issuance());
    }
}
