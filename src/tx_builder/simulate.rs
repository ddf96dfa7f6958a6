//! Transaction simulation with a raw-JSON fallback
//!
//! Simulation always tries the strict path first: the node's response is
//! decoded into the full typed model and every XDR field in it (transaction
//! data, auth entries, return value, events, state changes) is decoded.
//!
//! If that fails, the response is valid but shaped in a way the model does
//! not know. The same call is then re-issued raw and only the fields the
//! pipeline needs are read:
//! - `transactionData`
//! - `minResourceFee`
//! - `results[0].auth`
//! - `results[0].xdr`
//!
//! A node-reported `error` is a logical rejection on either path and is
//! never retried.

use serde_json::Value;
use std::sync::Arc;
use stellar_xdr::curr::{
    DiagnosticEvent, LedgerEntry, LedgerKey, ScVal, SorobanAuthorizationEntry,
    SorobanTransactionData,
};
use tracing::{debug, info, warn};

use super::builder::BuiltTransaction;
use super::encoding::from_base64;
use super::errors::TransactionBuilderError;
use crate::metrics::metrics;
use crate::rpc::{LedgerRpc, SimulateTransactionResponse};
use crate::types::{ParsePath, SimulationResult, SimulationSuccess};

/// Runs simulations against the ledger node
#[derive(Clone)]
pub struct Simulator {
    rpc: Arc<dyn LedgerRpc>,
}

impl Simulator {
    pub fn new(rpc: Arc<dyn LedgerRpc>) -> Self {
        Self { rpc }
    }

    pub async fn simulate(
        &self,
        tx: &BuiltTransaction,
    ) -> Result<SimulationResult, TransactionBuilderError> {
        let envelope = tx.to_envelope_base64()?;

        let structured_failure = match self.rpc.simulate_transaction(&envelope).await {
            Ok(response) => match parse_structured(response) {
                Ok(result) => return Ok(result),
                Err(e) => e.to_string(),
            },
            Err(e) if e.is_decode() => e.to_string(),
            Err(e) => return Err(e.into()),
        };

        warn!(
            reason = %structured_failure,
            "Structured simulation parse failed, retrying with raw request"
        );
        metrics().simulation_fallbacks.inc();

        let raw = self.rpc.simulate_transaction_raw(&envelope).await?;
        parse_raw(&raw).map_err(|e| {
            TransactionBuilderError::StructuredParse(format!(
                "structured: {}; raw: {}",
                structured_failure, e
            ))
        })
    }
}

/// Decode the fully typed response, failing on any field that does not decode
pub fn parse_structured(
    response: SimulateTransactionResponse,
) -> Result<SimulationResult, TransactionBuilderError> {
    if let Some(error) = response.error {
        info!(error = %error, "Simulation rejected by node");
        return Ok(SimulationResult::Rejected { error });
    }

    if response.restore_preamble.is_some() {
        return Ok(SimulationResult::Rejected {
            error: "ledger entries are archived and must be restored first".to_string(),
        });
    }

    let transaction_data_xdr = response
        .transaction_data
        .ok_or_else(|| TransactionBuilderError::xdr("missing transactionData"))?;
    let transaction_data: SorobanTransactionData = from_base64(&transaction_data_xdr)?;

    let min_resource_fee = parse_fee(
        response
            .min_resource_fee
            .as_deref()
            .ok_or_else(|| TransactionBuilderError::xdr("missing minResourceFee"))?,
    )?;

    let (auth_entries, return_value) = match response.results.first() {
        Some(result) => (
            decode_auth(&result.auth)?,
            Some(from_base64::<ScVal>(&result.xdr)?),
        ),
        None => (Vec::new(), None),
    };

    for event in &response.events {
        from_base64::<DiagnosticEvent>(event)?;
    }
    for change in &response.state_changes {
        from_base64::<LedgerKey>(&change.key)?;
        for entry in [&change.before, &change.after].into_iter().flatten() {
            from_base64::<LedgerEntry>(entry)?;
        }
    }

    debug!(
        min_resource_fee,
        auth_entries = auth_entries.len(),
        events = response.events.len(),
        state_changes = response.state_changes.len(),
        "Structured simulation parsed"
    );

    Ok(SimulationResult::Success(Box::new(SimulationSuccess {
        min_resource_fee,
        transaction_data,
        auth_entries,
        return_value,
        latest_ledger: response.latest_ledger,
        parse_path: ParsePath::Structured,
    })))
}

/// Extract the minimal fields from an untyped simulate result
pub fn parse_raw(raw: &Value) -> Result<SimulationResult, TransactionBuilderError> {
    if let Some(error) = raw.get("error").and_then(Value::as_str) {
        info!(error = %error, "Simulation rejected by node (raw path)");
        return Ok(SimulationResult::Rejected {
            error: error.to_string(),
        });
    }

    let transaction_data_xdr = raw
        .get("transactionData")
        .and_then(Value::as_str)
        .ok_or_else(|| TransactionBuilderError::xdr("raw response has no transactionData"))?;
    let transaction_data: SorobanTransactionData = from_base64(transaction_data_xdr)?;

    let min_resource_fee = match raw.get("minResourceFee") {
        Some(Value::String(s)) => parse_fee(s)?,
        Some(Value::Number(n)) => n
            .as_i64()
            .ok_or_else(|| TransactionBuilderError::xdr("minResourceFee out of range"))?,
        _ => return Err(TransactionBuilderError::xdr("raw response has no minResourceFee")),
    };

    let first = raw
        .get("results")
        .and_then(Value::as_array)
        .and_then(|results| results.first());

    let auth_entries = match first.and_then(|r| r.get("auth")).and_then(Value::as_array) {
        Some(items) => {
            let encoded = items
                .iter()
                .map(|v| {
                    v.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| TransactionBuilderError::xdr("auth entry is not a string"))
                })
                .collect::<Result<Vec<_>, _>>()?;
            decode_auth(&encoded)?
        }
        None => Vec::new(),
    };

    // The return value is only a preview; a value that cannot be decoded is
    // reported as absent and left for the caller to judge.
    let return_value = first
        .and_then(|r| r.get("xdr"))
        .and_then(Value::as_str)
        .and_then(|xdr| match from_base64::<ScVal>(xdr) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(error = %e, "Raw simulation return value undecodable");
                None
            }
        });

    let latest_ledger = raw
        .get("latestLedger")
        .and_then(Value::as_u64)
        .and_then(|l| u32::try_from(l).ok())
        .unwrap_or(0);

    debug!(
        min_resource_fee,
        auth_entries = auth_entries.len(),
        "Raw simulation parsed"
    );

    Ok(SimulationResult::Success(Box::new(SimulationSuccess {
        min_resource_fee,
        transaction_data,
        auth_entries,
        return_value,
        latest_ledger,
        parse_path: ParsePath::RawFallback,
    })))
}

fn parse_fee(s: &str) -> Result<i64, TransactionBuilderError> {
    let fee: i64 = s
        .trim()
        .parse()
        .map_err(|_| TransactionBuilderError::xdr(format!("invalid minResourceFee: {}", s)))?;
    if fee < 0 {
        return Err(TransactionBuilderError::xdr(format!("negative minResourceFee: {}", fee)));
    }
    Ok(fee)
}

fn decode_auth(
    encoded: &[String],
) -> Result<Vec<SorobanAuthorizationEntry>, TransactionBuilderError> {
    encoded.iter().map(|e| from_base64(e)).collect()
}
