use std::fmt;
use std::fs;
use std::path::Path;

use ed25519_dalek::{Signer, SigningKey};
use rand::rngs::OsRng;
use tally_pubkey::PublicKey;
use tally_signature::Signature;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeypairError {
    #[error("failed to read keypair file: {0}")]
    Io(#[from] std::io::Error),
    #[error("keypair file is not a JSON byte array: {0}")]
    Format(#[from] serde_json::Error),
    #[error("keypair seed must be 32 bytes, got {0}")]
    SeedLength(usize),
}

/// The secret half of a keypair.
/// NEVER expose its bytes outside of keypair persistence.
#[derive(Clone)]
pub struct SecretKey(SigningKey);

impl SecretKey {
    pub fn public_key(&self) -> PublicKey {
        self.0.verifying_key().into()
    }

    /// Raw 32-byte seed, for persistence only.
    pub fn to_seed(&self) -> [u8; 32] {
        self.0.to_bytes()
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(<redacted>)")
    }
}

/// An owner's signing identity.
#[derive(Clone, Debug)]
pub struct Keypair {
    secret: SecretKey,
    public: PublicKey,
}

impl Keypair {
    /// Generates a fresh random keypair.
    pub fn new() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        Self::from_signing_key(signing_key)
    }

    /// Reconstructs a keypair from its 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self::from_signing_key(SigningKey::from_bytes(seed))
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let public = signing_key.verifying_key().into();
        Self {
            secret: SecretKey(signing_key),
            public,
        }
    }

    pub fn public_key(&self) -> PublicKey {
        self.public
    }

    pub fn secret_key(&self) -> &SecretKey {
        &self.secret
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        sign(&self.secret, message)
    }

    /// Reads a keypair file: a JSON array holding the 32 seed bytes.
    pub fn read_from_file<P: AsRef<Path>>(path: P) -> Result<Self, KeypairError> {
        let contents = fs::read_to_string(path)?;
        let bytes: Vec<u8> = serde_json::from_str(&contents)?;
        let seed: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| KeypairError::SeedLength(bytes.len()))?;
        Ok(Self::from_seed(&seed))
    }

    /// Writes the keypair seed in the format read by [`Keypair::read_from_file`].
    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), KeypairError> {
        let json = serde_json::to_string(&self.secret.to_seed().to_vec())?;
        fs::write(path, json)?;
        Ok(())
    }
}

impl Default for Keypair {
    fn default() -> Self {
        Self::new()
    }
}

/// Signs `message` with `secret_key`. Ed25519 signing is deterministic.
pub fn sign(secret_key: &SecretKey, message: &[u8]) -> Signature {
    secret_key.0.sign(message).into()
}

/// Verifies `signature` over `message` under `public_key`.
/// Any mismatch, including a public key that is not a curve point, is `false`.
pub fn verify(public_key: &PublicKey, message: &[u8], signature: &Signature) -> bool {
    let Some(verifying_key) = public_key.verifying_key() else {
        return false;
    };
    let signature = ed25519_dalek::Signature::from(signature);
    verifying_key.verify_strict(message, &signature).is_ok()
}
