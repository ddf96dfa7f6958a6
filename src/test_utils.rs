//! Test Utilities Module
//!
//! In-memory ledger and fixture builders for deterministic pipeline tests.
//!
//! These utilities are only compiled when running tests or when the
//! `test_utils` feature is enabled.

#![cfg(any(test, feature = "test_utils"))]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use stellar_xdr::curr::{
    ExtensionPoint, Hash, InvokeContractArgs, LedgerFootprint, MuxedAccount, ScAddress, ScSymbol,
    ScVal, SorobanAddressCredentials, SorobanAuthorizationEntry, SorobanAuthorizedFunction,
    SorobanAuthorizedInvocation, SorobanCredentials, SorobanResources, SorobanTransactionData,
    Uint256, VecM,
};

use crate::rpc::{
    GetTransactionResponse, LatestLedger, LedgerRpc, RpcError, SendStatus,
    SendTransactionResponse, SimulateTransactionResponse, TransactionStatus,
};
use crate::signer::{AuthSigner, SignerError};
use crate::tx_builder::encoding::{address_val, i128_val, to_base64};
use crate::tx_builder::BuiltTransaction;
use crate::types::{AccountSnapshot, ContractCall, NetworkId, PayloadHash, TxHash};

/// Valid `G...` address of the all-zero key
pub const TEST_ACCOUNT: &str = "GAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAWHF";

/// Ledger sequence the fake reports unless overridden
pub const FAKE_LATEST_LEDGER: u32 = 1_000;

pub fn custom_account_address() -> ScAddress {
    ScAddress::Contract(Hash([0xca; 32]))
}

pub fn token_address() -> ScAddress {
    ScAddress::Contract(Hash([0x70; 32]))
}

/// A token transfer out of the custom account
pub fn sample_call() -> ContractCall {
    ContractCall::new(
        token_address(),
        "transfer",
        vec![
            address_val(custom_account_address()),
            address_val(ScAddress::Contract(Hash([0x0d; 32]))),
            i128_val(10),
        ],
    )
}

/// Transaction data with an empty footprint
pub fn empty_transaction_data(resource_fee: i64) -> SorobanTransactionData {
    SorobanTransactionData {
        ext: ExtensionPoint::V0,
        resources: SorobanResources {
            footprint: LedgerFootprint {
                read_only: VecM::default(),
                read_write: VecM::default(),
            },
            instructions: 0,
            read_bytes: 0,
            write_bytes: 0,
        },
        resource_fee,
    }
}

/// Invocation tree for a call, as a node would return it
pub fn invocation_for(call: &ContractCall) -> SorobanAuthorizedInvocation {
    SorobanAuthorizedInvocation {
        function: SorobanAuthorizedFunction::ContractFn(InvokeContractArgs {
            contract_address: call.contract().clone(),
            function_name: ScSymbol(call.function().try_into().expect("symbol")),
            args: call.args().to_vec().try_into().expect("args"),
        }),
        sub_invocations: VecM::default(),
    }
}

pub fn source_account_entry(call: &ContractCall) -> SorobanAuthorizationEntry {
    SorobanAuthorizationEntry {
        credentials: SorobanCredentials::SourceAccount,
        root_invocation: invocation_for(call),
    }
}

/// Unsigned entry for the custom account, as simulation returns it
pub fn custom_account_entry(
    nonce: i64,
    signature_expiration_ledger: u32,
) -> SorobanAuthorizationEntry {
    SorobanAuthorizationEntry {
        credentials: SorobanCredentials::Address(SorobanAddressCredentials {
            address: custom_account_address(),
            nonce,
            signature_expiration_ledger,
            signature: ScVal::Void,
        }),
        root_invocation: invocation_for(&sample_call()),
    }
}

/// A `simulateTransaction` result in the node's JSON shape
pub fn simulate_json(
    data: &SorobanTransactionData,
    min_resource_fee: i64,
    auth: &[SorobanAuthorizationEntry],
    return_value: &ScVal,
) -> Value {
    let auth: Vec<String> = auth
        .iter()
        .map(|entry| to_base64(entry).expect("auth entry"))
        .collect();
    json!({
        "latestLedger": FAKE_LATEST_LEDGER,
        "minResourceFee": min_resource_fee.to_string(),
        "transactionData": to_base64(data).expect("transaction data"),
        "results": [{
            "auth": auth,
            "xdr": to_base64(return_value).expect("return value"),
        }],
        "events": [],
    })
}

/// Simulation rejection in the node's JSON shape
pub fn simulate_error_json(error: &str) -> Value {
    json!({ "latestLedger": FAKE_LATEST_LEDGER, "error": error })
}

/// Signer that returns a fixed signature and records every payload
#[derive(Debug)]
pub struct FixedSigner {
    signature: Vec<u8>,
    seen: Mutex<Vec<PayloadHash>>,
}

impl FixedSigner {
    pub fn new(signature: Vec<u8>) -> Self {
        Self {
            signature,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn seen(&self) -> Vec<PayloadHash> {
        lock(&self.seen).clone()
    }
}

#[async_trait]
impl AuthSigner for FixedSigner {
    async fn sign(&self, payload: &PayloadHash) -> Result<Vec<u8>, SignerError> {
        lock(&self.seen).push(*payload);
        Ok(self.signature.clone())
    }
}

/// Scripted simulation reply
#[derive(Clone)]
pub enum SimReply {
    Json(Value),
    /// Computed from the submitted envelope
    Handler(Arc<dyn Fn(&str) -> Value + Send + Sync>),
    Error(RpcError),
}

impl SimReply {
    fn resolve(&self, envelope: &str) -> Result<Value, RpcError> {
        match self {
            SimReply::Json(value) => Ok(value.clone()),
            SimReply::Handler(handler) => Ok(handler(envelope)),
            SimReply::Error(e) => Err(e.clone()),
        }
    }
}

/// Scripted sendTransaction reply
#[derive(Debug, Clone)]
pub enum SendReply {
    Status(SendStatus),
    Error(RpcError),
}

/// Scripted getTransaction reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusReply {
    Success,
    NotFound,
    Failed,
    TransportError,
    /// Node holds the request open for this long, then answers NOT_FOUND
    Hang(std::time::Duration),
}

/// An envelope the fake accepted
#[derive(Debug, Clone)]
pub struct Submitted {
    pub envelope: String,
    pub hash: TxHash,
    pub sequence: i64,
    pub fee: u32,
}

#[derive(Default)]
struct LedgerState {
    latest_ledger: u32,
    accounts: HashMap<String, i64>,
    account_fetches: usize,
    simulations: VecDeque<SimReply>,
    last_simulation: Option<SimReply>,
    simulated_envelopes: Vec<String>,
    raw_simulations: usize,
    sends: VecDeque<SendReply>,
    submitted: Vec<Submitted>,
    accepted_hashes: HashSet<String>,
    statuses: VecDeque<StatusReply>,
    status_queries: usize,
}

/// In-memory [`LedgerRpc`]
///
/// Defaults when nothing is scripted:
/// - simulation succeeds with empty transaction data, a resource fee of 100
///   and a void return value
/// - sends are `PENDING`; an accepted envelope moves its source account's
///   sequence to the envelope's sequence
/// - status is `SUCCESS` for accepted hashes and `NOT_FOUND` otherwise
///
/// Scripted simulation replies are consumed in order, and the last one is
/// repeated once the queue holds a single reply.
pub struct FakeLedger {
    network_id: NetworkId,
    state: Mutex<LedgerState>,
}

impl Default for FakeLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeLedger {
    pub fn new() -> Self {
        Self {
            network_id: NetworkId::testnet(),
            state: Mutex::new(LedgerState {
                latest_ledger: FAKE_LATEST_LEDGER,
                ..LedgerState::default()
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, LedgerState> {
        lock(&self.state)
    }

    pub fn set_account(&self, address: &str, sequence: i64) {
        self.state().accounts.insert(address.to_string(), sequence);
    }

    pub fn account_sequence(&self, address: &str) -> Option<i64> {
        self.state().accounts.get(address).copied()
    }

    pub fn set_latest_ledger(&self, sequence: u32) {
        self.state().latest_ledger = sequence;
    }

    pub fn push_simulation(&self, reply: SimReply) {
        self.state().simulations.push_back(reply);
    }

    pub fn push_send(&self, reply: SendReply) {
        self.state().sends.push_back(reply);
    }

    pub fn push_status(&self, reply: StatusReply) {
        self.state().statuses.push_back(reply);
    }

    pub fn account_fetches(&self) -> usize {
        self.state().account_fetches
    }

    /// Envelopes passed to either simulation call, in order
    pub fn simulated_envelopes(&self) -> Vec<String> {
        self.state().simulated_envelopes.clone()
    }

    pub fn raw_simulations(&self) -> usize {
        self.state().raw_simulations
    }

    pub fn submitted(&self) -> Vec<Submitted> {
        self.state().submitted.clone()
    }

    pub fn status_queries(&self) -> usize {
        self.state().status_queries
    }

    fn next_simulation(&self, envelope: &str) -> Result<Value, RpcError> {
        let reply = {
            let mut state = self.state();
            state.simulated_envelopes.push(envelope.to_string());
            let reply = if state.simulations.len() > 1 {
                state.simulations.pop_front()
            } else {
                state.simulations.front().cloned()
            };
            state.last_simulation = reply.clone();
            reply
        };
        match reply {
            Some(reply) => reply.resolve(envelope),
            None => Ok(simulate_json(
                &empty_transaction_data(100),
                100,
                &[],
                &ScVal::Void,
            )),
        }
    }

    fn accept(&self, envelope: &str) -> Result<Submitted, RpcError> {
        let tx = BuiltTransaction::from_envelope_base64(envelope)
            .map_err(|e| RpcError::decode("sendTransaction", e.to_string()))?;
        let hash = tx
            .hash(&self.network_id)
            .map_err(|e| RpcError::decode("sendTransaction", e.to_string()))?;
        Ok(Submitted {
            envelope: envelope.to_string(),
            hash,
            sequence: tx.sequence(),
            fee: tx.fee(),
        })
    }
}

#[async_trait]
impl LedgerRpc for FakeLedger {
    async fn get_latest_ledger(&self) -> Result<LatestLedger, RpcError> {
        let sequence = self.state().latest_ledger;
        Ok(LatestLedger {
            id: format!("{:064x}", sequence),
            sequence,
            protocol_version: 22,
        })
    }

    async fn get_account(&self, address: &str) -> Result<AccountSnapshot, RpcError> {
        let mut state = self.state();
        state.account_fetches += 1;
        state
            .accounts
            .get(address)
            .map(|&sequence| AccountSnapshot::new(address, sequence))
            .ok_or_else(|| RpcError::AccountNotFound {
                account: address.to_string(),
            })
    }

    async fn simulate_transaction(
        &self,
        envelope: &str,
    ) -> Result<SimulateTransactionResponse, RpcError> {
        let value = self.next_simulation(envelope)?;
        serde_json::from_value(value)
            .map_err(|e| RpcError::decode("simulateTransaction", e.to_string()))
    }

    async fn simulate_transaction_raw(&self, envelope: &str) -> Result<Value, RpcError> {
        let last = {
            let mut state = self.state();
            state.raw_simulations += 1;
            state.last_simulation.clone()
        };
        match last {
            Some(reply) => reply.resolve(envelope),
            None => self.next_simulation(envelope),
        }
    }

    async fn send_transaction(&self, envelope: &str) -> Result<SendTransactionResponse, RpcError> {
        let submitted = self.accept(envelope)?;
        let mut state = self.state();
        let reply = state
            .sends
            .pop_front()
            .unwrap_or(SendReply::Status(SendStatus::Pending));
        let status = match reply {
            SendReply::Status(status) => status,
            SendReply::Error(e) => return Err(e),
        };

        if matches!(status, SendStatus::Pending | SendStatus::Duplicate) {
            let tx = BuiltTransaction::from_envelope_base64(envelope)
                .map_err(|e| RpcError::decode("sendTransaction", e.to_string()))?;
            if let MuxedAccount::Ed25519(Uint256(key)) = &tx.transaction().source_account {
                let source = stellar_strkey::ed25519::PublicKey(*key).to_string();
                state.accounts.insert(source, submitted.sequence);
            }
            state
                .accepted_hashes
                .insert(submitted.hash.as_str().to_string());
            state.submitted.push(submitted.clone());
        }

        Ok(SendTransactionResponse {
            status,
            hash: submitted.hash.to_string(),
            latest_ledger: state.latest_ledger,
            error_result_xdr: (status == SendStatus::Error)
                .then(|| "AAAAAAAAAGT////7AAAAAA==".to_string()),
        })
    }

    async fn get_transaction(&self, hash: &str) -> Result<GetTransactionResponse, RpcError> {
        let (reply, latest_ledger) = {
            let mut state = self.state();
            state.status_queries += 1;
            let reply = state.statuses.pop_front().unwrap_or_else(|| {
                if state.accepted_hashes.contains(hash) {
                    StatusReply::Success
                } else {
                    StatusReply::NotFound
                }
            });
            (reply, state.latest_ledger)
        };

        let response = |status, ledger, result_xdr| GetTransactionResponse {
            status,
            latest_ledger,
            ledger,
            result_xdr,
            return_value: None,
        };
        match reply {
            StatusReply::Success => Ok(response(
                TransactionStatus::Success,
                Some(latest_ledger),
                None,
            )),
            StatusReply::NotFound => Ok(response(TransactionStatus::NotFound, None, None)),
            StatusReply::Failed => Ok(response(
                TransactionStatus::Failed,
                Some(latest_ledger),
                Some("AAAAAAAAAGT/////AAAAAA==".to_string()),
            )),
            StatusReply::TransportError => Err(RpcError::Transport {
                endpoint: "fake".to_string(),
                message: "connection reset".to_string(),
            }),
            StatusReply::Hang(delay) => {
                tokio::time::sleep(delay).await;
                Ok(response(TransactionStatus::NotFound, None, None))
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
