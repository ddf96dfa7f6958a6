//! Verify, fund and public-key flows against the in-memory ledger

use std::sync::Arc;
use std::time::Duration;
use stellar_xdr::curr::{Hash, ScAddress, ScVal};

use crate::flows::{Contracts, FalconClient, FlowSettings, FALCON_PUBLIC_KEY_LEN};
use crate::progress::{
    ChannelObserver, NoopObserver, ProgressObserver, Stage, StepEvent, StepStatus, TransferStep,
};
use crate::test_utils::{
    custom_account_address, empty_transaction_data, simulate_error_json, simulate_json,
    token_address, FakeLedger, SendReply, SimReply, StatusReply, TEST_ACCOUNT,
};
use crate::tx_builder::encoding::bytes_val;
use crate::rpc::SendStatus;
use crate::types::{NetworkId, VerifyOutcome};
use crate::wallet::{EnvelopeSigner, FeePayer};

pub(super) fn contracts() -> Contracts {
    Contracts {
        verifier: ScAddress::Contract(Hash([0x11; 32])),
        token: token_address(),
        custom_account: custom_account_address(),
    }
}

pub(super) fn settings() -> FlowSettings {
    FlowSettings {
        poll_interval: Duration::from_millis(5),
        poll_max_attempts: 3,
        ..FlowSettings::default()
    }
}

/// Client over a fake ledger with a funded fee-payer at sequence 100
pub(super) fn setup() -> (Arc<FakeLedger>, Arc<FeePayer>, FalconClient) {
    let ledger = Arc::new(FakeLedger::new());
    let payer = Arc::new(FeePayer::generate());
    ledger.set_account(&payer.address(), 100);
    let client = FalconClient::new(
        ledger.clone(),
        NetworkId::testnet(),
        contracts(),
        settings(),
        payer.clone(),
    );
    (ledger, payer, client)
}

fn verify_reply(ledger: &FakeLedger, return_value: ScVal) {
    ledger.push_simulation(SimReply::Json(simulate_json(
        &empty_transaction_data(0),
        0,
        &[],
        &return_value,
    )));
}

async fn verify(client: &FalconClient) -> crate::flows::FlowReport<VerifyOutcome> {
    client
        .verify_signature(&[1; 897], b"hello", &[2; 666], &NoopObserver)
        .await
}

#[tokio::test]
async fn test_verify_true_is_valid() {
    let (ledger, _payer, client) = setup();
    verify_reply(&ledger, ScVal::Bool(true));

    let report = verify(&client).await;

    assert_eq!(report.outcome.as_ref().unwrap(), &VerifyOutcome::Valid);
    assert_eq!(report.step_status(Stage::Verify), Some(StepStatus::Success));
    assert!(ledger.submitted().is_empty());
}

#[tokio::test]
async fn test_verify_false_is_invalid_not_error() {
    let (ledger, _payer, client) = setup();
    verify_reply(&ledger, ScVal::Bool(false));

    let report = verify(&client).await;

    assert_eq!(report.outcome.as_ref().unwrap(), &VerifyOutcome::Invalid);
    assert_eq!(report.step_status(Stage::Verify), Some(StepStatus::Success));
    assert!(ledger.submitted().is_empty());
}

#[tokio::test]
async fn test_verify_non_bool_is_indeterminate() {
    let (ledger, _payer, client) = setup();
    verify_reply(&ledger, ScVal::Void);

    let report = verify(&client).await;

    assert!(matches!(
        report.outcome.unwrap(),
        VerifyOutcome::Indeterminate { .. }
    ));
}

#[tokio::test]
async fn test_verify_rejected_simulation_is_error() {
    let (ledger, _payer, client) = setup();
    ledger.push_simulation(SimReply::Json(simulate_error_json(
        "HostError: Error(Contract, #1)",
    )));

    let report = verify(&client).await;

    let err = report.outcome.as_ref().unwrap_err();
    assert_eq!(err.category(), "simulation");
    assert_eq!(report.step_status(Stage::BuildTransaction), Some(StepStatus::Success));
    assert_eq!(report.step_status(Stage::Verify), Some(StepStatus::Error));
}

#[tokio::test]
async fn test_verify_missing_fee_payer_fails_at_build() {
    let ledger = Arc::new(FakeLedger::new());
    let client = FalconClient::new(
        ledger.clone(),
        NetworkId::testnet(),
        contracts(),
        settings(),
        Arc::new(FeePayer::generate()),
    );

    let report = verify(&client).await;

    assert_eq!(report.outcome.as_ref().unwrap_err().category(), "rpc");
    assert_eq!(report.step_status(Stage::BuildTransaction), Some(StepStatus::Error));
    assert_eq!(report.step_status(Stage::Verify), Some(StepStatus::Pending));
    assert!(ledger.simulated_envelopes().is_empty());
}

#[tokio::test]
async fn test_fund_confirms_with_simulated_fee() {
    let (ledger, payer, client) = setup();
    ledger.push_simulation(SimReply::Json(simulate_json(
        &empty_transaction_data(4_200),
        4_200,
        &[],
        &ScVal::Void,
    )));

    let report = client.fund(TEST_ACCOUNT, 10_000_000, &NoopObserver).await;

    let confirmed = report.outcome.unwrap();
    assert_eq!(confirmed.fee, 4_300);
    assert!(confirmed.ledger.is_some());
    assert_eq!(confirmed.hash.as_str().len(), 64);

    let submitted = ledger.submitted();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].sequence, 101);
    assert_eq!(submitted[0].hash, confirmed.hash);
    assert_eq!(ledger.account_sequence(&payer.address()), Some(101));
    assert!(report.steps.iter().all(|s| s.status == StepStatus::Success));
}

#[tokio::test]
async fn test_sequential_flows_use_fresh_sequences() {
    let (ledger, _payer, client) = setup();

    let first = client.fund(TEST_ACCOUNT, 1, &NoopObserver).await;
    let second = client.fund(TEST_ACCOUNT, 1, &NoopObserver).await;
    assert!(first.outcome.is_ok());
    assert!(second.outcome.is_ok());
    assert_ne!(first.flow_id, second.flow_id);

    let sequences: Vec<i64> = ledger.submitted().iter().map(|s| s.sequence).collect();
    assert_eq!(sequences, vec![101, 102]);
}

#[tokio::test]
async fn test_fund_rejects_non_positive_amount_before_simulating() {
    let (ledger, _payer, client) = setup();

    let report = client.fund(TEST_ACCOUNT, 0, &NoopObserver).await;

    assert_eq!(report.outcome.as_ref().unwrap_err().category(), "config");
    assert_eq!(report.step_status(Stage::BuildTransaction), Some(StepStatus::Error));
    assert!(ledger.simulated_envelopes().is_empty());
}

#[tokio::test]
async fn test_fund_submission_error_stops_before_confirm() {
    let (ledger, _payer, client) = setup();
    ledger.push_send(SendReply::Status(SendStatus::Error));

    let report = client.fund(TEST_ACCOUNT, 5, &NoopObserver).await;

    assert_eq!(report.outcome.as_ref().unwrap_err().category(), "submission");
    assert_eq!(report.step_status(Stage::Submit), Some(StepStatus::Error));
    assert_eq!(report.step_status(Stage::Confirm), Some(StepStatus::Pending));
    assert_eq!(ledger.status_queries(), 0);
}

#[tokio::test]
async fn test_fund_failed_transaction() {
    let (ledger, _payer, client) = setup();
    ledger.push_status(StatusReply::Failed);

    let report = client.fund(TEST_ACCOUNT, 5, &NoopObserver).await;

    assert_eq!(report.outcome.as_ref().unwrap_err().category(), "confirmation");
    assert_eq!(report.step_status(Stage::Confirm), Some(StepStatus::Error));
}

#[tokio::test(start_paused = true)]
async fn test_fund_confirmation_timeout_is_distinct() {
    let (ledger, _payer, client) = setup();
    for _ in 0..3 {
        ledger.push_status(StatusReply::NotFound);
    }

    let report = client.fund(TEST_ACCOUNT, 5, &NoopObserver).await;

    assert_eq!(report.outcome.unwrap_err().category(), "timeout");
    assert_eq!(ledger.status_queries(), 3);
}

#[tokio::test]
async fn test_observer_sees_ordered_transitions() {
    let (_ledger, _payer, client) = setup();
    let (observer, mut rx) = ChannelObserver::new();

    let report = client.fund(TEST_ACCOUNT, 5, &observer).await;
    assert!(report.outcome.is_ok());

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push((event.stage, event.status));
    }
    let expected: Vec<(Stage, StepStatus)> = [
        Stage::BuildTransaction,
        Stage::Simulate,
        Stage::Submit,
        Stage::Confirm,
    ]
    .into_iter()
    .flat_map(|stage| [(stage, StepStatus::Running), (stage, StepStatus::Success)])
    .collect();
    assert_eq!(events, expected);
}

struct PanickingObserver;

impl ProgressObserver for PanickingObserver {
    fn on_event(&self, _event: &StepEvent, _steps: &[TransferStep]) {
        panic!("observer failure");
    }
}

#[tokio::test]
async fn test_panicking_observer_does_not_abort_flow() {
    let (ledger, _payer, client) = setup();

    let report = client.fund(TEST_ACCOUNT, 5, &PanickingObserver).await;

    assert!(report.outcome.is_ok());
    assert_eq!(ledger.submitted().len(), 1);
}

#[tokio::test]
async fn test_get_custom_account_public_key() {
    let (ledger, _payer, client) = setup();
    let key = vec![0x09; FALCON_PUBLIC_KEY_LEN];
    ledger.push_simulation(SimReply::Json(simulate_json(
        &empty_transaction_data(0),
        0,
        &[],
        &bytes_val(&key).unwrap(),
    )));

    assert_eq!(client.get_custom_account_public_key().await.unwrap(), key);
    assert!(ledger.submitted().is_empty());
}

#[tokio::test]
async fn test_get_custom_account_public_key_wrong_type() {
    let (ledger, _payer, client) = setup();
    verify_reply(&ledger, ScVal::U32(7));

    let err = client.get_custom_account_public_key().await.unwrap_err();
    assert_eq!(err.category(), "parse");
}
