//! End-to-end flows
//!
//! Each flow is one strictly sequential pass through the pipeline stages.
//! Every stage's input is the previous stage's output, so nothing runs
//! concurrently inside a flow. Independent flows share nothing but the RPC
//! client: each one fetches its own account snapshots and owns its own
//! [`StepTracker`].
//!
//! | flow                           | stages                                                     |
//! |--------------------------------|------------------------------------------------------------|
//! | `verify_signature`             | Build transaction, Verify                                  |
//! | `fund`                         | Build transaction, Simulate, Submit, Confirm               |
//! | `transfer_from_custom_account` | Build, Simulate, Sign authorization, Re-simulate, Submit, Confirm |

use std::sync::Arc;
use std::time::Duration;
use stellar_xdr::curr::{ScAddress, ScVal};
use tracing::{debug, warn, Instrument};

use crate::metrics::metrics;
use crate::observability::{CorrelationId, TraceContext};
use crate::progress::{ProgressObserver, Stage, StepStatus, StepTracker, TransferStep};
use crate::rpc::LedgerRpc;
use crate::structured_logging::FlowLogger;
use crate::signer::{AuthSigner, SignatureBounds};
use crate::tx_builder::auth::DEFAULT_AUTH_EXPIRATION_LEDGERS;
use crate::tx_builder::confirm::{DEFAULT_POLL_ATTEMPTS, DEFAULT_POLL_INTERVAL};
use crate::tx_builder::encoding::{
    account_address, address_val, bytes_val, i128_val, parse_address,
};
use crate::tx_builder::submit::DEFAULT_BASE_FEE;
use crate::tx_builder::{
    expiration_ledger_for, final_fee, AccountState, AuthorizationAssembler, BuiltTransaction,
    ConfirmationPoller, Confirmed, PipelineResult, Resubmitter, Simulator, SubmitResult,
    TerminalStatus, TransactionBuilder, TransactionBuilderError,
};
use crate::types::{
    ContractCall, InvokeOperation, NetworkId, SimulationResult, SimulationSuccess, VerifyOutcome,
};
use crate::wallet::EnvelopeSigner;

/// Size of a Falcon-512 public key as stored by the account contract
pub const FALCON_PUBLIC_KEY_LEN: usize = 897;

/// Tunables shared by all flows
#[derive(Debug, Clone)]
pub struct FlowSettings {
    pub base_fee: u32,
    /// Validity window for flows without an external-signer round trip
    pub single_pass_timeout: Duration,
    /// Validity window for flows that wait on the external signer
    pub signer_timeout: Duration,
    pub auth_expiration_ledgers: u32,
    pub poll_interval: Duration,
    pub poll_max_attempts: u32,
    pub signature_bounds: SignatureBounds,
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self {
            base_fee: DEFAULT_BASE_FEE,
            single_pass_timeout: Duration::from_secs(30),
            signer_timeout: Duration::from_secs(300),
            auth_expiration_ledgers: DEFAULT_AUTH_EXPIRATION_LEDGERS,
            poll_interval: DEFAULT_POLL_INTERVAL,
            poll_max_attempts: DEFAULT_POLL_ATTEMPTS,
            signature_bounds: SignatureBounds::default(),
        }
    }
}

/// Contracts the flows talk to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contracts {
    /// Stand-alone Falcon signature verifier
    pub verifier: ScAddress,
    /// Token moved by the fund and transfer flows
    pub token: ScAddress,
    /// Falcon-controlled smart account
    pub custom_account: ScAddress,
}

impl Contracts {
    pub fn parse(verifier: &str, token: &str, custom_account: &str) -> PipelineResult<Self> {
        Ok(Self {
            verifier: parse_address(verifier)?,
            token: parse_address(token)?,
            custom_account: parse_address(custom_account)?,
        })
    }
}

/// Result of a flow plus its final step snapshot
#[derive(Debug)]
pub struct FlowReport<T> {
    pub flow_id: CorrelationId,
    pub outcome: PipelineResult<T>,
    pub steps: Vec<TransferStep>,
}

impl<T> FlowReport<T> {
    pub fn step_status(&self, stage: Stage) -> Option<StepStatus> {
        self.steps.iter().find(|s| s.stage == stage).map(|s| s.status)
    }
}

/// Entry point for all flows
///
/// The fee-payer is fixed per client; the custom-account signer is passed to
/// each transfer so it can be swapped without rebuilding the client.
pub struct FalconClient {
    rpc: Arc<dyn LedgerRpc>,
    network_id: NetworkId,
    contracts: Contracts,
    settings: FlowSettings,
    fee_payer: Arc<dyn EnvelopeSigner>,
}

impl FalconClient {
    pub fn new(
        rpc: Arc<dyn LedgerRpc>,
        network_id: NetworkId,
        contracts: Contracts,
        settings: FlowSettings,
        fee_payer: Arc<dyn EnvelopeSigner>,
    ) -> Self {
        Self {
            rpc,
            network_id,
            contracts,
            settings,
            fee_payer,
        }
    }

    pub fn fee_payer_address(&self) -> String {
        self.fee_payer.address()
    }

    fn fee_payer_state(&self) -> AccountState {
        AccountState::new(self.rpc.clone(), self.fee_payer.address())
    }

    fn poller(&self) -> ConfirmationPoller {
        ConfirmationPoller::new(
            self.rpc.clone(),
            self.settings.poll_interval,
            self.settings.poll_max_attempts,
        )
    }

    fn resubmitter(&self) -> Resubmitter {
        Resubmitter::new(self.rpc.clone(), self.network_id, self.settings.base_fee)
    }

    /// Ask the verifier contract whether `signature` is valid for `message`
    ///
    /// Simulation only; nothing is submitted and no fee is spent.
    pub async fn verify_signature(
        &self,
        public_key: &[u8],
        message: &[u8],
        signature: &[u8],
        observer: &dyn ProgressObserver,
    ) -> FlowReport<VerifyOutcome> {
        let trace = self.begin("verify_signature");
        let span = trace.span();
        let mut tracker = StepTracker::new(&[Stage::BuildTransaction, Stage::Verify], observer);

        let outcome = async {
            let tx = tracker
                .run(
                    Stage::BuildTransaction,
                    async {
                        let call = ContractCall::new(
                            self.contracts.verifier.clone(),
                            "verify",
                            vec![bytes_val(public_key)?, bytes_val(message)?, bytes_val(signature)?],
                        );
                        self.build_single_pass(&trace, call).await
                    },
                    |tx| Some(format!("sequence {}", tx.sequence())),
                )
                .await?;

            tracker
                .run(
                    Stage::Verify,
                    async {
                        let success = self.simulate_success(&tx).await?;
                        Ok::<_, TransactionBuilderError>(interpret_verification(&success))
                    },
                    |outcome: &VerifyOutcome| Some(format!("{:?}", outcome)),
                )
                .await
        }
        .instrument(span)
        .await;

        self.finish(&trace, tracker, outcome)
    }

    /// Transfer `amount` of the token from the fee-payer to `destination`
    pub async fn fund(
        &self,
        destination: &str,
        amount: i128,
        observer: &dyn ProgressObserver,
    ) -> FlowReport<Confirmed> {
        let trace = self.begin("fund");
        let span = trace.span();
        let mut tracker = StepTracker::new(
            &[Stage::BuildTransaction, Stage::Simulate, Stage::Submit, Stage::Confirm],
            observer,
        );

        let outcome = async {
            let (tx, operation) = tracker
                .run(
                    Stage::BuildTransaction,
                    async {
                        let from = account_address(self.fee_payer.public_key());
                        let call = self.transfer_call(from, destination, amount)?;
                        let operation = InvokeOperation::unauthorized(call.clone());
                        let tx = self.build_single_pass(&trace, call).await?;
                        Ok::<_, TransactionBuilderError>((tx, operation))
                    },
                    |(tx, _)| Some(format!("sequence {}", tx.sequence())),
                )
                .await?;

            let final_tx = tracker
                .run(
                    Stage::Simulate,
                    async {
                        let success = self.simulate_success(&tx).await?;
                        let fee = final_fee(self.settings.base_fee, success.min_resource_fee)?;
                        let SimulationSuccess {
                            transaction_data,
                            auth_entries,
                            ..
                        } = *success;
                        tx.rebuild(&operation.with_auth(auth_entries), fee, transaction_data)
                    },
                    |tx| Some(format!("fee {} stroops", tx.fee())),
                )
                .await?;

            self.submit_and_confirm(&trace, &mut tracker, final_tx).await
        }
        .instrument(span)
        .await;

        self.finish(&trace, tracker, outcome)
    }

    /// Transfer `amount` of the token out of the custom account
    ///
    /// The custom account authorizes the call through `signer`; the fee-payer
    /// pays for and submits the envelope.
    pub async fn transfer_from_custom_account(
        &self,
        destination: &str,
        amount: i128,
        signer: &dyn AuthSigner,
        observer: &dyn ProgressObserver,
    ) -> FlowReport<Confirmed> {
        let trace = self.begin("transfer_from_custom_account");
        let span = trace.span();
        let mut tracker = StepTracker::new(
            &[
                Stage::BuildTransaction,
                Stage::Simulate,
                Stage::SignAuthorization,
                Stage::Resimulate,
                Stage::Submit,
                Stage::Confirm,
            ],
            observer,
        );
        let timeout = self.settings.signer_timeout;

        let outcome = async {
            let (tx, operation) = tracker
                .run(
                    Stage::BuildTransaction,
                    async {
                        let call = self.transfer_call(
                            self.contracts.custom_account.clone(),
                            destination,
                            amount,
                        )?;
                        let operation = InvokeOperation::unauthorized(call);
                        let snapshot = self
                            .fee_payer_state()
                            .fresh_snapshot(Some(&trace.child_span("build")))
                            .await?;
                        let tx = TransactionBuilder::build(
                            snapshot,
                            &operation,
                            self.settings.base_fee,
                            timeout,
                            None,
                        )?;
                        Ok::<_, TransactionBuilderError>((tx, operation))
                    },
                    |(tx, _)| Some(format!("sequence {}", tx.sequence())),
                )
                .await?;

            let mut first_pass = tracker
                .run(
                    Stage::Simulate,
                    self.simulate_success(&tx),
                    |s| {
                        Some(format!(
                            "{} auth entries, resource fee {}",
                            s.auth_entries.len(),
                            s.min_resource_fee
                        ))
                    },
                )
                .await?;

            let unsigned = std::mem::take(&mut first_pass.auth_entries);
            let signed_operation = tracker
                .run(
                    Stage::SignAuthorization,
                    async {
                        let latest = self.rpc.get_latest_ledger().await?;
                        let expiration = expiration_ledger_for(
                            latest.sequence,
                            self.settings.auth_expiration_ledgers,
                        )?;
                        let assembler = AuthorizationAssembler::new(
                            self.network_id,
                            self.settings.signature_bounds,
                        );
                        let signed = assembler
                            .assemble_all(
                                unsigned,
                                &self.contracts.custom_account,
                                expiration,
                                signer,
                            )
                            .await?;
                        Ok::<_, TransactionBuilderError>(operation.with_auth(signed))
                    },
                    |op| Some(format!("{} entries", op.auth.len())),
                )
                .await?;

            let final_tx = tracker
                .run(
                    Stage::Resimulate,
                    async {
                        let snapshot = self
                            .fee_payer_state()
                            .fresh_snapshot(Some(&trace.child_span("resimulate")))
                            .await?;
                        let (tx, _source) = self
                            .resubmitter()
                            .resimulate(&signed_operation, snapshot, &first_pass, timeout)
                            .await?;
                        Ok::<_, TransactionBuilderError>(tx)
                    },
                    |tx| Some(format!("fee {} stroops", tx.fee())),
                )
                .await?;

            self.submit_and_confirm(&trace, &mut tracker, final_tx).await
        }
        .instrument(span)
        .await;

        self.finish(&trace, tracker, outcome)
    }

    /// Read the Falcon public key the custom account verifies against
    pub async fn get_custom_account_public_key(&self) -> PipelineResult<Vec<u8>> {
        let trace = TraceContext::new("get_custom_account_public_key");
        let call = ContractCall::new(self.contracts.custom_account.clone(), "get_pubkey", vec![]);
        let tx = self.build_single_pass(&trace, call).await?;
        let success = self.simulate_success(&tx).await?;

        match success.return_value {
            Some(ScVal::Bytes(bytes)) => {
                let key: Vec<u8> = bytes.0.into();
                if key.len() != FALCON_PUBLIC_KEY_LEN {
                    warn!(
                        len = key.len(),
                        expected = FALCON_PUBLIC_KEY_LEN,
                        "Unexpected public key size"
                    );
                }
                Ok(key)
            }
            other => Err(TransactionBuilderError::StructuredParse(format!(
                "get_pubkey returned {:?}",
                other
            ))),
        }
    }

    fn transfer_call(
        &self,
        from: ScAddress,
        destination: &str,
        amount: i128,
    ) -> PipelineResult<ContractCall> {
        if amount <= 0 {
            return Err(TransactionBuilderError::Configuration(format!(
                "amount must be positive, got {}",
                amount
            )));
        }
        let to = parse_address(destination)?;
        Ok(ContractCall::new(
            self.contracts.token.clone(),
            "transfer",
            vec![address_val(from), address_val(to), i128_val(amount)],
        ))
    }

    /// Fresh snapshot plus an unsigned build with the single-pass timeout
    async fn build_single_pass(
        &self,
        trace: &TraceContext,
        call: ContractCall,
    ) -> PipelineResult<BuiltTransaction> {
        let snapshot = self
            .fee_payer_state()
            .fresh_snapshot(Some(&trace.child_span("build")))
            .await?;
        TransactionBuilder::build(
            snapshot,
            &InvokeOperation::unauthorized(call),
            self.settings.base_fee,
            self.settings.single_pass_timeout,
            None,
        )
    }

    async fn simulate_success(
        &self,
        tx: &BuiltTransaction,
    ) -> PipelineResult<Box<SimulationSuccess>> {
        match Simulator::new(self.rpc.clone()).simulate(tx).await? {
            SimulationResult::Success(success) => Ok(success),
            SimulationResult::Rejected { error } => {
                Err(TransactionBuilderError::simulation_rejected(error))
            }
        }
    }

    async fn submit_and_confirm(
        &self,
        trace: &TraceContext,
        tracker: &mut StepTracker<'_>,
        tx: BuiltTransaction,
    ) -> PipelineResult<Confirmed> {
        let fee = tx.fee();
        let sequence = tx.sequence();
        let submitted: SubmitResult = tracker
            .run(
                Stage::Submit,
                self.resubmitter().submit(tx, self.fee_payer.as_ref()),
                |r| Some(r.hash.to_string()),
            )
            .await?;
        FlowLogger::new(trace).log_submission(submitted.hash.as_str(), fee, sequence);

        tracker
            .run(
                Stage::Confirm,
                async {
                    let status = self.poller().poll(&submitted.hash).await;
                    debug!(hash = %submitted.hash, status = status.label(), "Polling finished");
                    match status {
                        TerminalStatus::Success { ledger, .. } => Ok(Confirmed {
                            hash: submitted.hash.clone(),
                            ledger,
                            fee,
                        }),
                        TerminalStatus::Failed { result_xdr } => {
                            Err(TransactionBuilderError::ConfirmationFailed {
                                hash: submitted.hash.clone(),
                                result_xdr,
                            })
                        }
                        TerminalStatus::TimedOut { attempts } => {
                            Err(TransactionBuilderError::ConfirmationTimeout {
                                hash: submitted.hash.clone(),
                                attempts,
                            })
                        }
                    }
                },
                |c| c.ledger.map(|l| format!("ledger {}", l)),
            )
            .await
    }

    fn begin(&self, flow: &str) -> TraceContext {
        metrics().flows_started.with_label_values(&[flow]).inc();
        metrics().active_flows.inc();
        let trace = TraceContext::new(flow);
        FlowLogger::new(&trace).log_flow_started(&self.fee_payer_address());
        trace
    }

    fn finish<T>(
        &self,
        trace: &TraceContext,
        tracker: StepTracker<'_>,
        outcome: PipelineResult<T>,
    ) -> FlowReport<T> {
        let flow = trace.operation.as_str();
        metrics().active_flows.dec();
        metrics()
            .flow_latency
            .observe(trace.elapsed_ms() as f64 / 1000.0);

        let logger = FlowLogger::new(trace);
        match &outcome {
            Ok(_) => {
                metrics().flows_succeeded.with_label_values(&[flow]).inc();
                logger.log_flow_completed(trace.elapsed_ms());
            }
            Err(e) => {
                metrics()
                    .flows_failed
                    .with_label_values(&[flow, e.category()])
                    .inc();
                logger.log_flow_failed(e.category(), &e.to_string(), trace.elapsed_ms());
            }
        }

        FlowReport {
            flow_id: trace.correlation_id().clone(),
            outcome,
            steps: tracker.into_steps(),
        }
    }
}

/// Map a successful verifier simulation to an outcome
///
/// Only an actual boolean counts. A missing or non-boolean return value is
/// reported as indeterminate rather than assumed valid.
pub fn interpret_verification(success: &SimulationSuccess) -> VerifyOutcome {
    match (&success.return_value, success.bool_return()) {
        (_, Some(true)) => VerifyOutcome::Valid,
        (_, Some(false)) => VerifyOutcome::Invalid,
        (None, None) => VerifyOutcome::Indeterminate {
            reason: "simulation returned no value".to_string(),
        },
        (Some(other), None) => VerifyOutcome::Indeterminate {
            reason: format!("expected a bool return, got {:?}", other),
        },
    }
}
