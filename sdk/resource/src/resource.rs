//! Resources
//!
//! A Resource is an immutable unit of value owned by a public key.
//!
//! ```text
//! Resource = {
//!     owner:    PublicKey, // who can consume it
//!     label:    String,    // free-form tag, not a unit of account
//!     quantity: u64,       // how much of it
//!     nonce:    [u8; 32],  // fresh randomness, makes every resource unique
//! }
//! ```
//!
//! Two resources built from the same owner, label and quantity are still
//! distinct: each one draws its own nonce, so each has its own commitment and
//! its own nullifier.

use std::fmt;

use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use tally_pubkey::PublicKey;

use crate::wire::{
    MAX_LABEL_LEN, WireDecode, WireEncode, WireError, WireReader, put_len, put_u64,
};

/// Per-resource uniqueness value.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Nonce(#[serde(with = "hex::serde")] pub [u8; 32]);

impl Nonce {
    /// Draws a nonce from the OS RNG.
    pub fn random() -> Self {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }
}

impl fmt::Debug for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Nonce({})", hex::encode(&self.0[..8]))
    }
}

/// An immutable record of value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resource {
    owner: PublicKey,
    label: String,
    quantity: u64,
    nonce: Nonce,
}

impl Resource {
    /// Creates a resource with a fresh random nonce.
    pub fn new(owner: PublicKey, label: impl Into<String>, quantity: u64) -> Self {
        Self::with_nonce(owner, label, quantity, Nonce::random())
    }

    /// Creates a resource with an explicit nonce (for fixtures/recovery).
    pub fn with_nonce(
        owner: PublicKey,
        label: impl Into<String>,
        quantity: u64,
        nonce: Nonce,
    ) -> Self {
        Self {
            owner,
            label: label.into(),
            quantity,
            nonce,
        }
    }

    pub fn owner(&self) -> &PublicKey {
        &self.owner
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn quantity(&self) -> u64 {
        self.quantity
    }

    pub fn nonce(&self) -> &Nonce {
        &self.nonce
    }

    /// A new resource with the same owner and quantity under `label`.
    /// The result draws a fresh nonce; `self` is untouched.
    pub fn relabel(&self, label: impl Into<String>) -> Self {
        Self::new(self.owner, label, self.quantity)
    }

    /// Whether the label fits the wire format.
    pub fn is_encodable(&self) -> bool {
        self.label.len() <= MAX_LABEL_LEN
    }
}

impl WireEncode for Resource {
    fn encode_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.owner.as_bytes());
        put_len(out, self.label.len());
        out.extend_from_slice(self.label.as_bytes());
        put_u64(out, self.quantity);
        out.extend_from_slice(&self.nonce.0);
    }
}

impl WireDecode for Resource {
    fn decode_from(reader: &mut WireReader<'_>) -> Result<Self, WireError> {
        let owner = PublicKey(reader.read_array::<32>()?);
        let label_len = reader.read_u32()? as usize;
        if label_len > MAX_LABEL_LEN {
            return Err(WireError::LabelTooLong(label_len));
        }
        let label = String::from_utf8(reader.read_vec(label_len)?)
            .map_err(|_| WireError::InvalidLabel)?;
        let quantity = reader.read_u64()?;
        let nonce = Nonce(reader.read_array::<32>()?);

        Ok(Self {
            owner,
            label,
            quantity,
            nonce,
        })
    }
}
