//! Common types used throughout the pipeline
//!
//! These are the values that flow between the pipeline stages: account
//! snapshots, contract calls, simulation results and the hashes produced
//! along the way. XDR structures from `stellar-xdr` are used directly where
//! the ledger defines the shape; everything else is a small owned type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use stellar_xdr::curr::{
    Hash, ScAddress, ScVal, SorobanAuthorizationEntry, SorobanTransactionData,
};

/// Network passphrase for Stellar mainnet
pub const MAINNET_PASSPHRASE: &str = "Public Global Stellar Network ; September 2015";
/// Network passphrase for Stellar testnet
pub const TESTNET_PASSPHRASE: &str = "Test SDF Network ; September 2015";

/// Network identifier: SHA-256 of the network passphrase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NetworkId(pub [u8; 32]);

impl NetworkId {
    pub fn from_passphrase(passphrase: &str) -> Self {
        Self(Sha256::digest(passphrase.as_bytes()).into())
    }

    pub fn testnet() -> Self {
        Self::from_passphrase(TESTNET_PASSPHRASE)
    }

    pub fn as_xdr_hash(&self) -> Hash {
        Hash(self.0)
    }
}

/// Snapshot of an account's sequence number at fetch time
///
/// A snapshot is consumed by exactly one transaction build. It is
/// deliberately not `Clone`: every independent build must fetch a fresh
/// snapshot from the ledger instead of reusing one from an earlier build.
#[derive(Debug, PartialEq, Eq)]
pub struct AccountSnapshot {
    /// Account address in `G...` form
    pub address: String,

    /// Current on-ledger sequence number
    pub sequence: i64,

    /// When the snapshot was read
    pub fetched_at: DateTime<Utc>,
}

impl AccountSnapshot {
    pub fn new(address: impl Into<String>, sequence: i64) -> Self {
        Self {
            address: address.into(),
            sequence,
            fetched_at: Utc::now(),
        }
    }

    /// Sequence number the next transaction from this account must carry
    pub fn next_sequence(&self) -> Option<i64> {
        self.sequence.checked_add(1)
    }
}

/// A single contract invocation: target contract, function and arguments
///
/// Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractCall {
    contract: ScAddress,
    function: String,
    args: Vec<ScVal>,
}

impl ContractCall {
    pub fn new(contract: ScAddress, function: impl Into<String>, args: Vec<ScVal>) -> Self {
        Self {
            contract,
            function: function.into(),
            args,
        }
    }

    pub fn contract(&self) -> &ScAddress {
        &self.contract
    }

    pub fn function(&self) -> &str {
        &self.function
    }

    pub fn args(&self) -> &[ScVal] {
        &self.args
    }
}

/// The operation a transaction carries: a contract call plus the
/// authorization entries attached to it
///
/// Rebuilding with different authorization produces a new value; the
/// original is never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokeOperation {
    pub call: ContractCall,
    pub auth: Vec<SorobanAuthorizationEntry>,
}

impl InvokeOperation {
    /// Operation without authorization entries, as sent to the first simulation
    pub fn unauthorized(call: ContractCall) -> Self {
        Self {
            call,
            auth: Vec::new(),
        }
    }

    pub fn with_auth(&self, auth: Vec<SorobanAuthorizationEntry>) -> Self {
        Self {
            call: self.call.clone(),
            auth,
        }
    }
}

/// Which response parser produced a simulation result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParsePath {
    /// Full typed model decoded every field
    Structured,
    /// Typed model failed; minimal fields were extracted from raw JSON
    RawFallback,
}

/// Successful simulation output
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationSuccess {
    /// Minimum resource fee in stroops
    pub min_resource_fee: i64,

    /// Footprint and resource limits to attach to the final transaction
    pub transaction_data: SorobanTransactionData,

    /// Authorization entries the invocation requires (unsigned)
    pub auth_entries: Vec<SorobanAuthorizationEntry>,

    /// Preview of the contract's return value, if it could be decoded
    pub return_value: Option<ScVal>,

    /// Ledger the simulation ran against (0 when unknown)
    pub latest_ledger: u32,

    pub parse_path: ParsePath,
}

impl SimulationSuccess {
    /// Boolean return value, if the contract returned one
    pub fn bool_return(&self) -> Option<bool> {
        match self.return_value {
            Some(ScVal::Bool(b)) => Some(b),
            _ => None,
        }
    }
}

/// Outcome of a simulation
///
/// A logical rejection from the node and a successful simulation are
/// mutually exclusive by construction. Note that a contract returning
/// `false` is a `Success`, not a `Rejected`.
#[derive(Debug, Clone, PartialEq)]
pub enum SimulationResult {
    Success(Box<SimulationSuccess>),
    Rejected { error: String },
}

impl SimulationResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// 32-byte hash signed by the custom account's external signer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PayloadHash(pub [u8; 32]);

impl PayloadHash {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for PayloadHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Transaction hash in the node's canonical form: 64 lowercase hex characters
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxHash(String);

impl TxHash {
    pub fn parse(s: &str) -> Option<Self> {
        let valid = s.len() == 64 && s.bytes().all(|b| b.is_ascii_hexdigit());
        valid.then(|| Self(s.to_ascii_lowercase()))
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of a verify-only flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerifyOutcome {
    /// Verifier returned `true`
    Valid,
    /// Verifier returned `false`
    Invalid,
    /// Simulation succeeded but the return value was missing or not a bool
    Indeterminate { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_id_is_passphrase_hash() {
        let id = NetworkId::testnet();
        let expected: [u8; 32] = Sha256::digest(TESTNET_PASSPHRASE.as_bytes()).into();
        assert_eq!(id.0, expected);
        assert_ne!(id, NetworkId::from_passphrase(MAINNET_PASSPHRASE));
    }

    #[test]
    fn test_next_sequence() {
        let snapshot = AccountSnapshot::new("GABC", 41);
        assert_eq!(snapshot.next_sequence(), Some(42));

        let saturated = AccountSnapshot::new("GABC", i64::MAX);
        assert_eq!(saturated.next_sequence(), None);
    }

    #[test]
    fn test_tx_hash_parse() {
        let upper = "A".repeat(64);
        let parsed = TxHash::parse(&upper).unwrap();
        assert_eq!(parsed.as_str(), "a".repeat(64));

        assert!(TxHash::parse("abc").is_none());
        assert!(TxHash::parse(&"g".repeat(64)).is_none());
        assert_eq!(TxHash::from_bytes([0xab; 32]).as_str().len(), 64);
    }

    #[test]
    fn test_bool_return_only_for_bool() {
        let mut success = SimulationSuccess {
            min_resource_fee: 0,
            transaction_data: crate::test_utils::empty_transaction_data(0),
            auth_entries: vec![],
            return_value: Some(ScVal::Bool(false)),
            latest_ledger: 1,
            parse_path: ParsePath::Structured,
        };
        assert_eq!(success.bool_return(), Some(false));

        success.return_value = Some(ScVal::Void);
        assert_eq!(success.bool_return(), None);

        success.return_value = None;
        assert_eq!(success.bool_return(), None);
    }

    #[test]
    fn test_with_auth_leaves_original_untouched() {
        let call = ContractCall::new(
            ScAddress::Contract(Hash([7; 32])),
            "transfer",
            vec![ScVal::Bool(true)],
        );
        let op = InvokeOperation::unauthorized(call);
        let entry = crate::test_utils::source_account_entry(&op.call);
        let authorized = op.with_auth(vec![entry]);

        assert!(op.auth.is_empty());
        assert_eq!(authorized.auth.len(), 1);
        assert_eq!(authorized.call, op.call);
    }
}
