//! Custom-account authorization signers
//!
//! The pipeline never produces the post-quantum signature itself. It hands
//! the 32-byte payload hash to an [`AuthSigner`] and gets raw signature bytes
//! back. How those bytes are produced (hardware wallet, WASM module, a
//! command-line tool) is the signer's business.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::types::PayloadHash;

/// Default lower bound for a Falcon-512 signature accepted by the account contract
pub const FALCON_MIN_SIGNATURE_LEN: usize = 42;
/// Default upper bound for a Falcon-512 signature accepted by the account contract
pub const FALCON_MAX_SIGNATURE_LEN: usize = 700;

#[derive(Debug, Clone, Error)]
pub enum SignerError {
    #[error("Failed to launch signer: {0}")]
    Launch(String),

    #[error("Signer exited with {status}: {stderr}")]
    Exited { status: String, stderr: String },

    #[error("Signer timed out after {0:?}")]
    Timeout(Duration),

    #[error("Signer produced invalid output: {0}")]
    InvalidOutput(String),

    #[error("Signature length {len} outside accepted range {min}..={max}")]
    InvalidLength { len: usize, min: usize, max: usize },

    /// Signing key could not be loaded
    #[error("Key error: {0}")]
    Key(String),
}

/// Capability that signs a custom-account payload hash
#[async_trait]
pub trait AuthSigner: Send + Sync {
    async fn sign(&self, payload: &PayloadHash) -> Result<Vec<u8>, SignerError>;
}

/// Accepted signature size range, inclusive on both ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureBounds {
    pub min: usize,
    pub max: usize,
}

impl Default for SignatureBounds {
    fn default() -> Self {
        Self {
            min: FALCON_MIN_SIGNATURE_LEN,
            max: FALCON_MAX_SIGNATURE_LEN,
        }
    }
}

impl SignatureBounds {
    pub fn check(&self, signature: &[u8]) -> Result<(), SignerError> {
        let len = signature.len();
        if len < self.min || len > self.max {
            return Err(SignerError::InvalidLength {
                len,
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }
}

/// Signs by running an external program
///
/// The program receives the configured arguments followed by the payload
/// hash in hex, and must print the signature as hex on stdout.
#[derive(Debug, Clone)]
pub struct CommandSigner {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandSigner {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }
}

#[async_trait]
impl AuthSigner for CommandSigner {
    async fn sign(&self, payload: &PayloadHash) -> Result<Vec<u8>, SignerError> {
        debug!(program = %self.program, payload = %payload, "Requesting signature");

        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(payload.to_hex())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| SignerError::Timeout(self.timeout))?
            .map_err(|e| SignerError::Launch(format!("{}: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!(program = %self.program, status = %output.status, "Signer failed");
            return Err(SignerError::Exited {
                status: output.status.to_string(),
                stderr,
            });
        }

        let stdout = String::from_utf8(output.stdout)
            .map_err(|_| SignerError::InvalidOutput("stdout is not UTF-8".to_string()))?;
        let signature = hex::decode(stdout.trim())
            .map_err(|e| SignerError::InvalidOutput(format!("expected hex signature: {}", e)))?;

        debug!(len = signature.len(), "Signature received");
        Ok(signature)
    }
}
