//! Account state for transaction building
//!
//! [`AccountState`] is the only way the pipeline obtains an
//! [`AccountSnapshot`]. Every call goes to the ledger; nothing is cached, so
//! each independent build starts from the account's current sequence.

use std::sync::Arc;
use tracing::{debug, warn};

use super::errors::TransactionBuilderError;
use crate::observability::TraceContext;
use crate::rpc::LedgerRpc;
use crate::types::AccountSnapshot;

/// Fetches fresh sequence snapshots for one account
#[derive(Clone)]
pub struct AccountState {
    rpc: Arc<dyn LedgerRpc>,
    address: String,
}

impl std::fmt::Debug for AccountState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountState")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl AccountState {
    pub fn new(rpc: Arc<dyn LedgerRpc>, address: impl Into<String>) -> Self {
        Self {
            rpc,
            address: address.into(),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Read the account's sequence from the ledger right now
    pub async fn fresh_snapshot(
        &self,
        trace: Option<&TraceContext>,
    ) -> Result<AccountSnapshot, TransactionBuilderError> {
        let snapshot = self.rpc.get_account(&self.address).await.map_err(|e| {
            warn!(account = %self.address, error = %e, "Account fetch failed");
            TransactionBuilderError::from(e)
        })?;

        debug!(
            account = %snapshot.address,
            sequence = snapshot.sequence,
            trace_id = trace.map(|t| t.trace_id()).unwrap_or_default(),
            "Fresh account snapshot"
        );
        Ok(snapshot)
    }
}
