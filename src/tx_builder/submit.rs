//! Final fee computation, envelope signing and submission
//!
//! Two independent signatures are involved in a custom-account transfer:
//! the external signer authorizes the contract call (see `auth`), and the
//! fee-payer signs the envelope here. The [`Resubmitter`] re-simulates the
//! signed operation first, since attaching a signature changes the footprint
//! and resource fee the first simulation reported.

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::builder::{BuiltTransaction, TransactionBuilder};
use super::errors::TransactionBuilderError;
use super::output::SubmitResult;
use super::simulate::Simulator;
use crate::metrics::metrics;
use crate::rpc::{LedgerRpc, SendStatus};
use crate::types::{
    AccountSnapshot, InvokeOperation, NetworkId, SimulationResult, SimulationSuccess, TxHash,
};
use crate::wallet::EnvelopeSigner;

/// Default inclusion fee in stroops
pub const DEFAULT_BASE_FEE: u32 = 100;

/// Total fee: inclusion fee plus the simulated resource fee
pub fn final_fee(base_fee: u32, min_resource_fee: i64) -> Result<u32, TransactionBuilderError> {
    let resource = u32::try_from(min_resource_fee).map_err(|_| {
        TransactionBuilderError::Configuration(format!(
            "resource fee {} does not fit a transaction fee",
            min_resource_fee
        ))
    })?;
    base_fee.checked_add(resource).ok_or_else(|| {
        TransactionBuilderError::Configuration(format!(
            "fee overflow: {} + {}",
            base_fee, min_resource_fee
        ))
    })
}

/// Which simulation the final transaction's fee and footprint came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalSource {
    Resimulated,
    /// Re-simulation response was unreadable on both parse paths
    FirstPass,
}

/// Re-simulates signed operations and submits fee-payer-signed envelopes
#[derive(Clone)]
pub struct Resubmitter {
    rpc: Arc<dyn LedgerRpc>,
    simulator: Simulator,
    network_id: NetworkId,
    base_fee: u32,
}

impl Resubmitter {
    pub fn new(rpc: Arc<dyn LedgerRpc>, network_id: NetworkId, base_fee: u32) -> Self {
        Self {
            simulator: Simulator::new(rpc.clone()),
            rpc,
            network_id,
            base_fee,
        }
    }

    /// Build the final transaction for an operation that now carries signed
    /// authorization
    ///
    /// The snapshot must be freshly fetched. The first-pass simulation is
    /// only used if the re-simulation cannot be parsed at all; a logical
    /// rejection from the re-simulation is returned as an error.
    pub async fn resimulate(
        &self,
        signed_operation: &InvokeOperation,
        fresh_snapshot: AccountSnapshot,
        first_pass: &SimulationSuccess,
        timeout: Duration,
    ) -> Result<(BuiltTransaction, FinalSource), TransactionBuilderError> {
        let probe = TransactionBuilder::build(
            fresh_snapshot,
            signed_operation,
            self.base_fee,
            timeout,
            None,
        )?;

        let (min_resource_fee, transaction_data, source) =
            match self.simulator.simulate(&probe).await {
                Ok(SimulationResult::Success(success)) => (
                    success.min_resource_fee,
                    success.transaction_data,
                    FinalSource::Resimulated,
                ),
                Ok(SimulationResult::Rejected { error }) => {
                    return Err(TransactionBuilderError::simulation_rejected(error));
                }
                Err(TransactionBuilderError::StructuredParse(reason)) => {
                    warn!(
                        reason = %reason,
                        "Re-simulation unreadable, using first-pass fee and footprint"
                    );
                    (
                        first_pass.min_resource_fee,
                        first_pass.transaction_data.clone(),
                        FinalSource::FirstPass,
                    )
                }
                Err(e) => return Err(e),
            };

        let fee = final_fee(self.base_fee, min_resource_fee)?;
        let tx = probe.rebuild(signed_operation, fee, transaction_data)?;
        info!(fee, min_resource_fee, source = ?source, "Final transaction built");
        Ok((tx, source))
    }

    /// Fee-payer-sign and submit
    ///
    /// `ERROR` and `TRY_AGAIN_LATER` end the attempt: neither envelope will
    /// ever be included, and a resend needs a fresh sequence.
    pub async fn submit(
        &self,
        tx: BuiltTransaction,
        fee_payer: &dyn EnvelopeSigner,
    ) -> Result<SubmitResult, TransactionBuilderError> {
        let signed = tx.sign(fee_payer, &self.network_id)?;
        let envelope = signed.to_base64()?;
        let response = self.rpc.send_transaction(&envelope).await?;

        let hash = match TxHash::parse(&response.hash) {
            Some(node_hash) if node_hash == signed.hash => node_hash,
            Some(node_hash) => {
                warn!(local = %signed.hash, node = %node_hash, "Node reported a different hash");
                node_hash
            }
            None => {
                warn!(node = %response.hash, "Node hash malformed, using local hash");
                signed.hash.clone()
            }
        };

        match response.status {
            SendStatus::Pending | SendStatus::Duplicate => {
                info!(hash = %hash, status = ?response.status, "Transaction submitted");
                Ok(SubmitResult {
                    hash,
                    status: response.status,
                    latest_ledger: response.latest_ledger,
                })
            }
            SendStatus::Error | SendStatus::TryAgainLater => {
                metrics().submissions_rejected.inc();
                let reason = response
                    .error_result_xdr
                    .unwrap_or_else(|| format!("{:?}", response.status));
                warn!(hash = %hash, reason = %reason, "Submission rejected");
                Err(TransactionBuilderError::SubmissionRejected {
                    hash: hash.to_string(),
                    reason,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{
        empty_transaction_data, sample_call, FakeLedger, SendReply, SimReply,
    };
    use crate::wallet::FeePayer;
    use serde_json::json;

    #[test]
    fn test_final_fee() {
        assert_eq!(final_fee(100, 45_000).unwrap(), 45_100);
        assert!(final_fee(100, -1).is_err());
        assert!(final_fee(u32::MAX, 1).is_err());
    }

    fn first_pass() -> SimulationSuccess {
        SimulationSuccess {
            min_resource_fee: 999,
            transaction_data: empty_transaction_data(999),
            auth_entries: vec![],
            return_value: None,
            latest_ledger: 10,
            parse_path: crate::types::ParsePath::Structured,
        }
    }

    #[tokio::test]
    async fn test_resimulate_uses_new_fee() {
        let payer = FeePayer::generate();
        let ledger = Arc::new(FakeLedger::new());
        ledger.push_simulation(SimReply::Json(crate::test_utils::simulate_json(
            &empty_transaction_data(2000),
            2000,
            &[],
            &stellar_xdr::curr::ScVal::Void,
        )));

        let resubmitter = Resubmitter::new(ledger, NetworkId::testnet(), 100);
        let (tx, source) = resubmitter
            .resimulate(
                &InvokeOperation::unauthorized(sample_call()),
                AccountSnapshot::new(payer.address(), 5),
                &first_pass(),
                Duration::from_secs(300),
            )
            .await
            .unwrap();

        assert_eq!(source, FinalSource::Resimulated);
        assert_eq!(tx.fee(), 2100);
        assert_eq!(tx.sequence(), 6);
        assert_eq!(tx.soroban_data(), Some(&empty_transaction_data(2000)));
    }

    #[tokio::test]
    async fn test_resimulate_falls_back_to_first_pass_when_unreadable() {
        let payer = FeePayer::generate();
        let ledger = Arc::new(FakeLedger::new());
        ledger.push_simulation(SimReply::Json(json!({
            "latestLedger": 1,
            "transactionData": "???",
            "minResourceFee": "1"
        })));

        let resubmitter = Resubmitter::new(ledger, NetworkId::testnet(), 100);
        let (tx, source) = resubmitter
            .resimulate(
                &InvokeOperation::unauthorized(sample_call()),
                AccountSnapshot::new(payer.address(), 5),
                &first_pass(),
                Duration::from_secs(300),
            )
            .await
            .unwrap();

        assert_eq!(source, FinalSource::FirstPass);
        assert_eq!(tx.fee(), 1099);
    }

    #[tokio::test]
    async fn test_resimulate_rejection_is_error() {
        let payer = FeePayer::generate();
        let ledger = Arc::new(FakeLedger::new());
        ledger.push_simulation(SimReply::Json(json!({
            "latestLedger": 1,
            "error": "HostError: Error(Auth, InvalidAction)"
        })));

        let err = Resubmitter::new(ledger, NetworkId::testnet(), 100)
            .resimulate(
                &InvokeOperation::unauthorized(sample_call()),
                AccountSnapshot::new(payer.address(), 5),
                &first_pass(),
                Duration::from_secs(300),
            )
            .await
            .unwrap_err();
        assert_eq!(err.category(), "simulation");
    }

    #[tokio::test]
    async fn test_submit_error_status_is_terminal() {
        let payer = FeePayer::generate();
        let ledger = Arc::new(FakeLedger::new());
        ledger.push_send(SendReply::Status(SendStatus::Error));
        let tx = TransactionBuilder::build_until(
            AccountSnapshot::new(payer.address(), 1),
            &InvokeOperation::unauthorized(sample_call()),
            100,
            1000,
            None,
        )
        .unwrap();

        let err = Resubmitter::new(ledger, NetworkId::testnet(), 100)
            .submit(tx, &payer)
            .await
            .unwrap_err();
        assert_eq!(err.category(), "submission");
    }

    #[tokio::test]
    async fn test_submit_pending_returns_local_hash() {
        let payer = FeePayer::generate();
        let ledger = Arc::new(FakeLedger::new());
        let tx = TransactionBuilder::build_until(
            AccountSnapshot::new(payer.address(), 1),
            &InvokeOperation::unauthorized(sample_call()),
            100,
            1000,
            None,
        )
        .unwrap();
        let expected = tx.hash(&NetworkId::testnet()).unwrap();

        let result = Resubmitter::new(ledger.clone(), NetworkId::testnet(), 100)
            .submit(tx, &payer)
            .await
            .unwrap();
        assert_eq!(result.hash, expected);
        assert_eq!(result.status, SendStatus::Pending);
        assert_eq!(ledger.submitted().len(), 1);
    }
}
