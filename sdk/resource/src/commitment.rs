//! Resource Commitments
//!
//! ```text
//! Commitment = BLAKE3-derive-key(COMMITMENT_CONTEXT, wire(resource))
//! ```
//!
//! Every field of the resource, nonce included, goes through the hash, so a
//! commitment binds exactly one resource.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::resource::Resource;
use crate::wire::{WireDecode, WireEncode, WireError, WireReader};

const COMMITMENT_CONTEXT: &str = "tally 2025-06 resource commitment v1";

/// A resource commitment (32 bytes)
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Commitment(#[serde(with = "hex::serde")] pub [u8; 32]);

impl Commitment {
    pub const LEN: usize = 32;

    /// Get raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl AsRef<[u8]> for Commitment {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Commitment({})", hex::encode(&self.0[..8]))
    }
}

impl WireEncode for Commitment {
    fn encode_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.0);
    }
}

impl WireDecode for Commitment {
    fn decode_from(reader: &mut WireReader<'_>) -> Result<Self, WireError> {
        Ok(Self(reader.read_array::<32>()?))
    }
}

/// Commits to `resource`.
pub fn commitment(resource: &Resource) -> Commitment {
    let mut hasher = blake3::Hasher::new_derive_key(COMMITMENT_CONTEXT);
    hasher.update(&resource.to_wire());
    Commitment(*hasher.finalize().as_bytes())
}

/// Whether `commitment` was derived from `resource`.
pub fn commits_to(commitment: &Commitment, resource: &Resource) -> bool {
    self::commitment(resource) == *commitment
}
