use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use stellar_strkey::ed25519::PublicKey as StrkeyPublicKey;
use stellar_xdr::curr::{
    AccountId, LedgerEntryData, LedgerKey, LedgerKeyAccount, Limits, PublicKey, ReadXdr, Uint256,
    WriteXdr,
};
use tracing::{debug, trace};

use super::rpc_errors::{RetryPolicy, RpcError};
use super::rpc_retry::retry_with_backoff;
use super::rpc_types::*;
use super::LedgerRpc;
use crate::metrics::{metrics, Timer};
use crate::types::AccountSnapshot;

/// JSON-RPC client for a Soroban RPC node
#[derive(Debug)]
pub struct SorobanRpcClient {
    http: reqwest::Client,
    url: String,
    timeout: Duration,
    retry: RetryPolicy,
    next_id: AtomicU64,
}

impl SorobanRpcClient {
    pub fn new(url: &str, timeout: Duration, retry: RetryPolicy) -> Result<Self, RpcError> {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(RpcError::Configuration(format!("Invalid RPC URL: {}", url)));
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RpcError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self {
            http,
            url: url.to_string(),
            timeout,
            retry,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Send one JSON-RPC request and return the untyped `result` member
    async fn post<P: Serialize>(
        &self,
        method: &str,
        params: Option<P>,
    ) -> Result<serde_json::Value, RpcError> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        let timer = Timer::new();
        let response = self
            .http
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| RpcError::from_reqwest(e, &self.url, self.timeout))?;
        timer.observe_duration(&metrics().rpc_latency);

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RpcError::Response {
                method: method.to_string(),
                code: i64::from(status.as_u16()),
                message: body,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| RpcError::from_reqwest(e, &self.url, self.timeout))?;
        trace!(method, body_len = body.len(), "RPC response received");

        let envelope: RpcEnvelope =
            serde_json::from_str(&body).map_err(|e| RpcError::decode(method, e.to_string()))?;

        if let Some(error) = envelope.error {
            return Err(RpcError::Response {
                method: method.to_string(),
                code: error.code,
                message: error.message,
            });
        }

        envelope
            .result
            .ok_or_else(|| RpcError::decode(method, "empty result"))
    }

    /// Send a request and decode the result into a typed model
    async fn call<P: Serialize, R: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<P>,
    ) -> Result<R, RpcError> {
        let value = self.post(method, params).await?;
        serde_json::from_value(value).map_err(|e| RpcError::decode(method, e.to_string()))
    }
}

#[async_trait]
impl LedgerRpc for SorobanRpcClient {
    async fn get_latest_ledger(&self) -> Result<LatestLedger, RpcError> {
        retry_with_backoff("getLatestLedger", &self.retry, || {
            self.call::<(), LatestLedger>("getLatestLedger", None)
        })
        .await
    }

    async fn get_account(&self, address: &str) -> Result<AccountSnapshot, RpcError> {
        let key = StrkeyPublicKey::from_string(address)
            .map_err(|_| RpcError::Configuration(format!("Invalid account address: {}", address)))?;
        let ledger_key = LedgerKey::Account(LedgerKeyAccount {
            account_id: AccountId(PublicKey::PublicKeyTypeEd25519(Uint256(key.0))),
        });
        let key_xdr = ledger_key
            .to_xdr(Limits::none())
            .map_err(|e| RpcError::Configuration(format!("Ledger key encode: {}", e)))?;
        let keys = vec![BASE64.encode(key_xdr)];

        let response: GetLedgerEntriesResponse =
            retry_with_backoff("getLedgerEntries", &self.retry, || {
                self.call(
                    "getLedgerEntries",
                    Some(GetLedgerEntriesParams { keys: keys.clone() }),
                )
            })
            .await?;

        let entry = response
            .entries
            .first()
            .ok_or_else(|| RpcError::AccountNotFound {
                account: address.to_string(),
            })?;

        let bytes = BASE64
            .decode(&entry.xdr)
            .map_err(|e| RpcError::decode("getLedgerEntries", e.to_string()))?;
        let data = LedgerEntryData::from_xdr(bytes, Limits::none())
            .map_err(|e| RpcError::decode("getLedgerEntries", e.to_string()))?;

        match data {
            LedgerEntryData::Account(account) => {
                debug!(
                    account = %address,
                    sequence = account.seq_num.0,
                    latest_ledger = response.latest_ledger,
                    "Fetched account snapshot"
                );
                Ok(AccountSnapshot::new(address, account.seq_num.0))
            }
            _ => Err(RpcError::decode(
                "getLedgerEntries",
                "entry is not an account",
            )),
        }
    }

    async fn simulate_transaction(
        &self,
        envelope: &str,
    ) -> Result<SimulateTransactionResponse, RpcError> {
        retry_with_backoff("simulateTransaction", &self.retry, || {
            self.call(
                "simulateTransaction",
                Some(TransactionParams {
                    transaction: envelope.to_string(),
                }),
            )
        })
        .await
    }

    async fn simulate_transaction_raw(
        &self,
        envelope: &str,
    ) -> Result<serde_json::Value, RpcError> {
        retry_with_backoff("simulateTransaction", &self.retry, || {
            self.post(
                "simulateTransaction",
                Some(TransactionParams {
                    transaction: envelope.to_string(),
                }),
            )
        })
        .await
    }

    async fn send_transaction(&self, envelope: &str) -> Result<SendTransactionResponse, RpcError> {
        // Never retried: a resend of a rejected envelope cannot succeed and a
        // resend of an accepted one is a duplicate.
        self.call(
            "sendTransaction",
            Some(TransactionParams {
                transaction: envelope.to_string(),
            }),
        )
        .await
    }

    async fn get_transaction(&self, hash: &str) -> Result<GetTransactionResponse, RpcError> {
        retry_with_backoff("getTransaction", &self.retry, || {
            self.call(
                "getTransaction",
                Some(GetTransactionParams {
                    hash: hash.to_string(),
                }),
            )
        })
        .await
    }
}
