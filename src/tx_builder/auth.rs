//! Custom-account authorization assembly
//!
//! The signer signs a payload hash, not the transaction:
//!
//! ```text
//! sha256(XDR(HashIdPreimage::SorobanAuthorization {
//!     network_id, nonce, signature_expiration_ledger, invocation
//! }))
//! ```
//!
//! `nonce` comes from simulation output and `invocation` is the exact
//! invocation tree the simulation returned. The tree is moved from the
//! unsigned entry into the signed one, never rebuilt, so the bytes the
//! ledger re-verifies are the bytes that were simulated.

use stellar_xdr::curr::{
    HashIdPreimage, HashIdPreimageSorobanAuthorization, ScAddress, SorobanAddressCredentials,
    SorobanAuthorizationEntry, SorobanAuthorizedInvocation, SorobanCredentials,
};
use tracing::{debug, info};

use super::encoding::{address_to_string, bytes_val, xdr_sha256};
use super::errors::TransactionBuilderError;
use crate::signer::{AuthSigner, SignatureBounds};
use crate::types::{NetworkId, PayloadHash};

/// Ledgers a signed authorization stays valid for
pub const DEFAULT_AUTH_EXPIRATION_LEDGERS: u32 = 100;

/// Signature expiration for an authorization signed now
pub fn expiration_ledger_for(
    latest_ledger: u32,
    validity_ledgers: u32,
) -> Result<u32, TransactionBuilderError> {
    latest_ledger
        .checked_add(validity_ledgers)
        .ok_or_else(|| TransactionBuilderError::internal("expiration ledger overflow"))
}

/// Computes payload hashes and embeds signatures into authorization entries
#[derive(Debug, Clone)]
pub struct AuthorizationAssembler {
    network_id: NetworkId,
    bounds: SignatureBounds,
}

impl AuthorizationAssembler {
    pub fn new(network_id: NetworkId, bounds: SignatureBounds) -> Self {
        Self { network_id, bounds }
    }

    /// Hash the signer must sign for this nonce, expiration and invocation
    pub fn payload_hash(
        &self,
        nonce: i64,
        signature_expiration_ledger: u32,
        invocation: &SorobanAuthorizedInvocation,
    ) -> Result<PayloadHash, TransactionBuilderError> {
        let preimage = HashIdPreimage::SorobanAuthorization(HashIdPreimageSorobanAuthorization {
            network_id: self.network_id.as_xdr_hash(),
            nonce,
            signature_expiration_ledger,
            invocation: invocation.clone(),
        });
        Ok(PayloadHash(xdr_sha256(&preimage)?))
    }

    /// Sign one address-credential entry
    ///
    /// Consumes the unsigned entry; the returned entry carries the same
    /// address, nonce and invocation tree with the expiration and signature
    /// filled in.
    pub async fn assemble(
        &self,
        entry: SorobanAuthorizationEntry,
        signature_expiration_ledger: u32,
        signer: &dyn AuthSigner,
    ) -> Result<SignedAuthorization, TransactionBuilderError> {
        let SorobanAuthorizationEntry {
            credentials,
            root_invocation,
        } = entry;

        let SorobanCredentials::Address(creds) = credentials else {
            return Err(TransactionBuilderError::authorization(
                "source-account credentials carry no signature",
            ));
        };

        let payload =
            self.payload_hash(creds.nonce, signature_expiration_ledger, &root_invocation)?;
        debug!(
            address = %address_to_string(&creds.address),
            nonce = creds.nonce,
            expiration = signature_expiration_ledger,
            payload = %payload,
            "Requesting authorization signature"
        );

        let signature = signer.sign(&payload).await?;
        self.bounds.check(&signature)?;

        let entry = SorobanAuthorizationEntry {
            credentials: SorobanCredentials::Address(SorobanAddressCredentials {
                address: creds.address,
                nonce: creds.nonce,
                signature_expiration_ledger,
                signature: bytes_val(&signature)?,
            }),
            root_invocation,
        };

        Ok(SignedAuthorization { entry, payload })
    }

    /// Sign every entry that needs the custom account's authorization
    ///
    /// Source-account entries pass through unchanged. Address entries for any
    /// other address are rejected: the flow has no signer for them. At least
    /// one entry must belong to the custom account.
    pub async fn assemble_all(
        &self,
        entries: Vec<SorobanAuthorizationEntry>,
        custom_account: &ScAddress,
        signature_expiration_ledger: u32,
        signer: &dyn AuthSigner,
    ) -> Result<Vec<SorobanAuthorizationEntry>, TransactionBuilderError> {
        let mut signed = Vec::with_capacity(entries.len());
        let mut signed_count = 0usize;

        for entry in entries {
            match &entry.credentials {
                SorobanCredentials::SourceAccount => signed.push(entry),
                SorobanCredentials::Address(creds) if &creds.address == custom_account => {
                    let result = self
                        .assemble(entry, signature_expiration_ledger, signer)
                        .await?;
                    signed.push(result.entry);
                    signed_count += 1;
                }
                SorobanCredentials::Address(creds) => {
                    return Err(TransactionBuilderError::authorization(format!(
                        "unexpected authorization required from {}",
                        address_to_string(&creds.address)
                    )));
                }
            }
        }

        if signed_count == 0 {
            return Err(TransactionBuilderError::authorization(format!(
                "simulation returned no authorization entry for {}",
                address_to_string(custom_account)
            )));
        }

        info!(signed = signed_count, "Authorization entries signed");
        Ok(signed)
    }
}

/// A signed entry and the payload hash its signature covers
#[derive(Debug, Clone, PartialEq)]
pub struct SignedAuthorization {
    pub entry: SorobanAuthorizationEntry,
    pub payload: PayloadHash,
}
