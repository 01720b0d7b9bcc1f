//! Tally Resource SDK
//!
//! Resources and the identifiers the ledger tracks for them.
//!
//! ```text
//!   Resource ──commitment()──▶ Commitment      (recorded when created)
//!      │
//!      └──nullifier(sk)─────▶ Nullifier        (recorded when consumed)
//!                              ├─ tag            spent-set key
//!                              └─ authorization  owner's signature over tag
//! ```

pub mod commitment;
pub mod nullifier;
pub mod resource;
pub mod wire;

pub use commitment::{Commitment, commitment, commits_to};
pub use nullifier::{NULLIFIER_DOMAIN, Nullifier, NullifierTag, nullifier, nullifier_tag, nullifies};
pub use resource::{Nonce, Resource};
pub use wire::{
    MAX_LABEL_LEN, WireDecode, WireEncode, WireError, WireReader, put_len, put_u8, put_u16, put_u32,
    put_u64,
};
