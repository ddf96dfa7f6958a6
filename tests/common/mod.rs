//! Shared fixtures for the HTTP-level tests

#![allow(dead_code)]

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use mockito::{Matcher, Mock, ServerGuard};
use falcon_account_client::tx_builder::BuiltTransaction;
use serde_json::{json, Value};
use stellar_xdr::curr::{
    AccountEntry, AccountEntryExt, AccountId, ExtensionPoint, LedgerEntryData, LedgerFootprint,
    Limits, PublicKey, ScVal, SequenceNumber, SorobanResources, SorobanTransactionData, String32,
    Thresholds, Uint256, VecM, WriteXdr,
};

pub const DESTINATION: &str = "GAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAWHF";
pub const VERIFIER: &str = "CAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAABSC4";
pub const TOKEN: &str = "CAAQCAIBAEAQCAIBAEAQCAIBAEAQCAIBAEAQCAIBAEAQCAIBAEAQC526";
pub const NODE_HASH: &str = "3389e9f0f1a65f19736cacf544c2e825313e8447f569233bb8db39aa607c8889";

pub fn xdr<T: WriteXdr>(value: &T) -> String {
    BASE64.encode(value.to_xdr(Limits::none()).unwrap())
}

pub fn transaction_data(resource_fee: i64) -> SorobanTransactionData {
    SorobanTransactionData {
        ext: ExtensionPoint::V0,
        resources: SorobanResources {
            footprint: LedgerFootprint {
                read_only: VecM::default(),
                read_write: VecM::default(),
            },
            instructions: 1_000,
            read_bytes: 0,
            write_bytes: 0,
        },
        resource_fee,
    }
}

pub fn account_entry(key: [u8; 32], sequence: i64) -> String {
    xdr(&LedgerEntryData::Account(AccountEntry {
        account_id: AccountId(PublicKey::PublicKeyTypeEd25519(Uint256(key))),
        balance: 100_000_000,
        seq_num: SequenceNumber(sequence),
        num_sub_entries: 0,
        inflation_dest: None,
        flags: 0,
        home_domain: String32::default(),
        thresholds: Thresholds([1, 0, 0, 0]),
        signers: VecM::default(),
        ext: AccountEntryExt::V0,
    }))
}

pub fn rpc_result(result: Value) -> String {
    json!({ "jsonrpc": "2.0", "id": 1, "result": result }).to_string()
}

pub fn simulation(resource_fee: i64, return_value: &ScVal) -> Value {
    json!({
        "latestLedger": 5000,
        "minResourceFee": resource_fee.to_string(),
        "transactionData": xdr(&transaction_data(resource_fee)),
        "results": [{ "auth": [], "xdr": xdr(return_value) }],
        "events": []
    })
}

/// Mock answering one JSON-RPC method with a `result`
pub async fn mock_method(server: &mut ServerGuard, method: &str, result: Value) -> Mock {
    server
        .mock("POST", "/")
        .match_body(Matcher::PartialJson(json!({ "method": method })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(rpc_result(result))
        .create_async()
        .await
}

pub async fn mock_account(server: &mut ServerGuard, key: [u8; 32], sequence: i64) -> Mock {
    mock_method(
        server,
        "getLedgerEntries",
        json!({
            "entries": [{
                "key": "AAAAAA==",
                "xdr": account_entry(key, sequence),
                "lastModifiedLedgerSeq": 4990
            }],
            "latestLedger": 5000
        }),
    )
    .await
}

/// Verifier stand-in: `verify` returns true only for `accepted_message`
///
/// Reads the message argument out of the simulated envelope, so the answer
/// follows whatever the client actually sent.
pub async fn mock_verifier(server: &mut ServerGuard, accepted_message: &'static [u8]) -> Mock {
    server
        .mock("POST", "/")
        .match_body(Matcher::PartialJson(
            json!({ "method": "simulateTransaction" }),
        ))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body_from_request(move |request| {
            let body: Value = serde_json::from_slice(request.body().expect("body")).expect("json");
            let envelope = body["params"]["transaction"].as_str().expect("transaction");
            let operation = BuiltTransaction::from_envelope_base64(envelope)
                .and_then(|tx| tx.operation())
                .expect("invoke operation");
            let accepted = match operation.call.args().get(1) {
                Some(ScVal::Bytes(message)) => message.0.as_slice() == accepted_message,
                _ => false,
            };
            rpc_result(simulation(0, &ScVal::Bool(accepted))).into_bytes()
        })
        .create_async()
        .await
}
