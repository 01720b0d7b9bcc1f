//! Nullifiers
//!
//! Implements nullifier derivation for double-spend prevention.
//!
//! ```text
//! tag           = BLAKE3-derive-key(NULLIFIER_CONTEXT, commitment(resource))
//! authorization = Ed25519-Sign(secret_key, NULLIFIER_DOMAIN || tag)
//! Nullifier     = (tag, authorization)
//! ```
//!
//! The tag is what the ledger records as spent. It depends only on the
//! resource, so every authorization over one resource maps to the same spent
//! entry. The authorization only verifies under the owner's public key, which
//! makes a nullifier derived with any other secret key worthless.
//! Ed25519 signing is deterministic, so `nullifier(r, sk)` is a pure function.

use std::fmt;

use serde::{Deserialize, Serialize};
use tally_keypair::{SecretKey, sign, verify};
use tally_signature::Signature;

use crate::commitment::commitment;
use crate::resource::Resource;
use crate::wire::{WireDecode, WireEncode, WireError, WireReader};

const NULLIFIER_CONTEXT: &str = "tally 2025-06 resource nullifier v1";

/// Prefix of the message signed by the resource owner.
pub const NULLIFIER_DOMAIN: &[u8] = b"tally/nullifier-authorization/v1";

/// The spent-set identifier of a resource (32 bytes)
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NullifierTag(#[serde(with = "hex::serde")] pub [u8; 32]);

impl NullifierTag {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl AsRef<[u8]> for NullifierTag {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for NullifierTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for NullifierTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NullifierTag({})", hex::encode(&self.0[..8]))
    }
}

/// An owner-authorized claim that a resource is consumed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Nullifier {
    tag: NullifierTag,
    authorization: Signature,
}

impl Nullifier {
    pub fn from_parts(tag: NullifierTag, authorization: Signature) -> Self {
        Self { tag, authorization }
    }

    pub fn tag(&self) -> &NullifierTag {
        &self.tag
    }

    pub fn authorization(&self) -> &Signature {
        &self.authorization
    }
}

/// The tag under which `resource` is recorded once consumed.
pub fn nullifier_tag(resource: &Resource) -> NullifierTag {
    let mut hasher = blake3::Hasher::new_derive_key(NULLIFIER_CONTEXT);
    hasher.update(commitment(resource).as_bytes());
    NullifierTag(*hasher.finalize().as_bytes())
}

fn authorization_message(tag: &NullifierTag) -> Vec<u8> {
    let mut msg = Vec::with_capacity(NULLIFIER_DOMAIN.len() + 32);
    msg.extend_from_slice(NULLIFIER_DOMAIN);
    msg.extend_from_slice(tag.as_bytes());
    msg
}

/// Derives the nullifier for `resource` under `secret_key`.
///
/// Deriving with a key other than the owner's still succeeds; the result
/// simply fails [`nullifies`].
pub fn nullifier(resource: &Resource, secret_key: &SecretKey) -> Nullifier {
    let tag = nullifier_tag(resource);
    let authorization = sign(secret_key, &authorization_message(&tag));
    Nullifier { tag, authorization }
}

/// Whether `nullifier` is an owner-authorized nullifier of `resource`.
pub fn nullifies(nullifier: &Nullifier, resource: &Resource) -> bool {
    if nullifier.tag != nullifier_tag(resource) {
        return false;
    }
    verify(
        resource.owner(),
        &authorization_message(&nullifier.tag),
        &nullifier.authorization,
    )
}

impl WireEncode for Nullifier {
    fn encode_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.tag.as_bytes());
        out.extend_from_slice(self.authorization.as_bytes());
    }
}

impl WireDecode for Nullifier {
    fn decode_from(reader: &mut WireReader<'_>) -> Result<Self, WireError> {
        let tag = NullifierTag(reader.read_array::<32>()?);
        let authorization = Signature(reader.read_array::<64>()?);
        Ok(Self { tag, authorization })
    }
}
