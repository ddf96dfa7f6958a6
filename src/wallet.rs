//! Fee-payer wallet
//!
//! The fee-payer is a conventional ed25519 account. It signs the outer
//! transaction envelope only; contract-call authorization for the custom
//! account comes from the [`AuthSigner`](crate::signer::AuthSigner).

use ed25519_dalek::{Signer, SigningKey};
use std::fmt;
use stellar_strkey::ed25519::{PrivateKey as StrkeySecret, PublicKey as StrkeyPublicKey};
use zeroize::{Zeroize, Zeroizing};

use crate::signer::SignerError;

/// Signs transaction envelope hashes
pub trait EnvelopeSigner: Send + Sync {
    /// Raw ed25519 public key
    fn public_key(&self) -> [u8; 32];

    /// Sign a 32-byte envelope hash
    fn sign(&self, hash: &[u8; 32]) -> [u8; 64];

    /// Account address in `G...` form
    fn address(&self) -> String {
        StrkeyPublicKey(self.public_key()).to_string()
    }
}

/// Fee-payer account backed by an in-memory ed25519 key
pub struct FeePayer {
    signing_key: SigningKey,
}

impl FeePayer {
    /// Load from an `S...` secret seed
    pub fn from_secret(secret: &str) -> Result<Self, SignerError> {
        let mut seed = StrkeySecret::from_string(secret.trim())
            .map_err(|_| SignerError::Key("invalid secret seed".to_string()))?
            .0;

        if seed.iter().all(|&b| b == 0) {
            return Err(SignerError::Key("all-zero seed rejected".to_string()));
        }

        let signing_key = SigningKey::from_bytes(&seed);
        seed.zeroize();
        Ok(Self { signing_key })
    }

    /// Load the secret seed from the named environment variable
    pub fn from_env(var: &str) -> Result<Self, SignerError> {
        let secret = Zeroizing::new(
            std::env::var(var)
                .map_err(|_| SignerError::Key(format!("environment variable {} not set", var)))?,
        );
        Self::from_secret(&secret)
    }

    /// Fresh random key, for tests and throwaway accounts
    pub fn generate() -> Self {
        let mut seed: [u8; 32] = rand::random();
        let signing_key = SigningKey::from_bytes(&seed);
        seed.zeroize();
        Self { signing_key }
    }
}

impl EnvelopeSigner for FeePayer {
    fn public_key(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    fn sign(&self, hash: &[u8; 32]) -> [u8; 64] {
        self.signing_key.sign(hash).to_bytes()
    }
}

impl fmt::Debug for FeePayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeePayer")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}
