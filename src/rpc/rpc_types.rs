//! Soroban RPC wire types
//!
//! These mirror the node's JSON responses field for field. XDR payloads stay
//! base64 strings here; decoding into ledger types happens in the pipeline
//! stage that consumes them.

use serde::{Deserialize, Serialize};

/// JSON-RPC request wrapper
#[derive(Debug, Serialize)]
pub(crate) struct RpcRequest<'a, P: Serialize> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    /// Some methods like getLatestLedger reject an empty params object
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<P>,
}

/// JSON-RPC response wrapper, result left untyped until the caller picks a model
#[derive(Debug, Deserialize)]
pub(crate) struct RpcEnvelope {
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RpcErrorObject {
    pub code: i64,
    pub message: String,
}

/// getLatestLedger response
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LatestLedger {
    pub id: String,
    pub sequence: u32,
    pub protocol_version: u32,
}

/// getLedgerEntries params
#[derive(Debug, Serialize)]
pub(crate) struct GetLedgerEntriesParams {
    pub keys: Vec<String>,
}

/// getLedgerEntries response
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetLedgerEntriesResponse {
    #[serde(default)]
    pub entries: Vec<LedgerEntryResult>,
    pub latest_ledger: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntryResult {
    pub key: String,
    /// `LedgerEntryData` XDR
    pub xdr: String,
    pub last_modified_ledger_seq: u32,
    #[serde(default)]
    pub live_until_ledger_seq: Option<u32>,
}

/// simulateTransaction / sendTransaction params
#[derive(Debug, Serialize)]
pub(crate) struct TransactionParams {
    pub transaction: String,
}

/// simulateTransaction response, modelled in full
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulateTransactionResponse {
    pub latest_ledger: u32,
    #[serde(default)]
    pub min_resource_fee: Option<String>,
    /// `SorobanTransactionData` XDR
    #[serde(default)]
    pub transaction_data: Option<String>,
    #[serde(default)]
    pub results: Vec<SimulateHostFunctionResult>,
    /// `DiagnosticEvent` XDR
    #[serde(default)]
    pub events: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub restore_preamble: Option<RestorePreamble>,
    #[serde(default)]
    pub state_changes: Vec<LedgerEntryChange>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimulateHostFunctionResult {
    /// `SorobanAuthorizationEntry` XDR
    #[serde(default)]
    pub auth: Vec<String>,
    /// `ScVal` XDR of the return value
    pub xdr: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestorePreamble {
    pub transaction_data: String,
    pub min_resource_fee: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerEntryChange {
    #[serde(rename = "type")]
    pub kind: LedgerEntryChangeKind,
    /// `LedgerKey` XDR
    pub key: String,
    /// `LedgerEntry` XDR
    #[serde(default)]
    pub before: Option<String>,
    #[serde(default)]
    pub after: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LedgerEntryChangeKind {
    Created,
    Updated,
    Deleted,
}

/// sendTransaction status
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SendStatus {
    Pending,
    Duplicate,
    TryAgainLater,
    Error,
}

/// sendTransaction response
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendTransactionResponse {
    pub status: SendStatus,
    pub hash: String,
    pub latest_ledger: u32,
    /// `TransactionResult` XDR, present when status is ERROR
    #[serde(default)]
    pub error_result_xdr: Option<String>,
}

/// getTransaction status
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Success,
    Failed,
    NotFound,
}

/// getTransaction params
#[derive(Debug, Serialize)]
pub(crate) struct GetTransactionParams {
    pub hash: String,
}

/// getTransaction response
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetTransactionResponse {
    pub status: TransactionStatus,
    pub latest_ledger: u32,
    #[serde(default)]
    pub ledger: Option<u32>,
    #[serde(default)]
    pub result_xdr: Option<String>,
    /// `ScVal` XDR of the invocation's return value
    #[serde(default)]
    pub return_value: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_omits_missing_params() {
        let req = RpcRequest::<()> {
            jsonrpc: "2.0",
            id: 1,
            method: "getLatestLedger",
            params: None,
        };
        let value = serde_json::to_value(&req).unwrap();
        assert!(value.get("params").is_none());
        assert_eq!(value["method"], "getLatestLedger");
    }

    #[test]
    fn test_send_status_parsing() {
        let resp: SendTransactionResponse = serde_json::from_value(json!({
            "status": "TRY_AGAIN_LATER",
            "hash": "ab",
            "latestLedger": 10
        }))
        .unwrap();
        assert_eq!(resp.status, SendStatus::TryAgainLater);
        assert!(resp.error_result_xdr.is_none());
    }

    #[test]
    fn test_simulate_minimal_response() {
        let resp: SimulateTransactionResponse = serde_json::from_value(json!({
            "latestLedger": 5,
            "error": "HostError: Error(Contract, #3)"
        }))
        .unwrap();
        assert_eq!(resp.error.as_deref(), Some("HostError: Error(Contract, #3)"));
        assert!(resp.results.is_empty());
    }

    #[test]
    fn test_unknown_state_change_kind_rejected() {
        let parsed: Result<SimulateTransactionResponse, _> = serde_json::from_value(json!({
            "latestLedger": 5,
            "stateChanges": [{ "type": 2, "key": "AAAA" }]
        }));
        assert!(parsed.is_err());
    }
}
