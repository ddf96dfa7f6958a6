//! Ledger RPC Module
//!
//! JSON-RPC client for a Soroban RPC node, with the typed wire model, error
//! classification and retry helper it needs.

use async_trait::async_trait;

use crate::types::AccountSnapshot;

// Submodules
pub mod rpc_client;
pub mod rpc_errors;
pub mod rpc_retry;
pub mod rpc_types;

// Re-exports for convenience
pub use rpc_client::SorobanRpcClient;
pub use rpc_errors::{RetryPolicy, RpcError};
pub use rpc_types::{
    GetTransactionResponse, LatestLedger, SendStatus, SendTransactionResponse,
    SimulateTransactionResponse, TransactionStatus,
};

/// The node operations the pipeline depends on
///
/// Every method is one network round trip from the caller's point of view.
/// Envelopes and hashes are passed in their wire form (base64 XDR and hex).
#[async_trait]
pub trait LedgerRpc: Send + Sync {
    async fn get_latest_ledger(&self) -> Result<LatestLedger, RpcError>;

    /// Fetch the account's current sequence number
    async fn get_account(&self, address: &str) -> Result<AccountSnapshot, RpcError>;

    /// Simulate and decode into the full typed model
    async fn simulate_transaction(
        &self,
        envelope: &str,
    ) -> Result<SimulateTransactionResponse, RpcError>;

    /// Issue the same simulation but hand back the untyped JSON result
    async fn simulate_transaction_raw(&self, envelope: &str)
        -> Result<serde_json::Value, RpcError>;

    async fn send_transaction(&self, envelope: &str) -> Result<SendTransactionResponse, RpcError>;

    async fn get_transaction(&self, hash: &str) -> Result<GetTransactionResponse, RpcError>;
}
