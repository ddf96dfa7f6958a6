//! Structured logging setup and flow event logger

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::observability::TraceContext;

/// Install the global subscriber
///
/// `RUST_LOG` wins over the built-in filter when set. Returns an error if a
/// subscriber is already installed.
pub fn init_tracing(verbose: bool, json: bool) -> anyhow::Result<()> {
    let default_filter = if verbose {
        "falcon_account_client=debug,falcon_client=debug,info"
    } else {
        "falcon_account_client=info,falcon_client=info,warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .try_init()?;
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()?;
    }
    Ok(())
}

/// Logger for flow lifecycle events, keyed by correlation id
#[derive(Debug, Clone)]
pub struct FlowLogger {
    correlation_id: String,
    flow: String,
}

impl FlowLogger {
    pub fn new(trace: &TraceContext) -> Self {
        Self {
            correlation_id: trace.correlation_id().to_string(),
            flow: trace.operation.clone(),
        }
    }

    pub fn log_flow_started(&self, source: &str) {
        tracing::info!(
            correlation_id = %self.correlation_id,
            flow = %self.flow,
            source = %source,
            "Flow started"
        );
    }

    pub fn log_flow_completed(&self, latency_ms: u64) {
        tracing::info!(
            correlation_id = %self.correlation_id,
            flow = %self.flow,
            latency_ms = %latency_ms,
            "Flow completed"
        );
    }

    pub fn log_flow_failed(&self, category: &str, error: &str, latency_ms: u64) {
        tracing::warn!(
            correlation_id = %self.correlation_id,
            flow = %self.flow,
            category = %category,
            error = %error,
            latency_ms = %latency_ms,
            "Flow failed"
        );
    }

    pub fn log_submission(&self, hash: &str, fee: u32, sequence: i64) {
        tracing::info!(
            correlation_id = %self.correlation_id,
            flow = %self.flow,
            hash = %hash,
            fee = %fee,
            sequence = %sequence,
            "Envelope submitted"
        );
    }
}
