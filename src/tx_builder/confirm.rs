//! Confirmation polling
//!
//! Fixed-interval, bounded polling of `getTransaction`:
//!
//! ```text
//! NOT_FOUND --sleep(interval)--> query again
//!     |-- SUCCESS  (terminal)
//!     |-- FAILED   (terminal)
//!     `-- attempts exhausted -> TimedOut
//! ```
//!
//! The whole poll runs against a deadline of `max_attempts * interval` from
//! the first query. Each query is cut off at the time left until that
//! deadline, so a slow or hung node cannot stretch the poll past it. A
//! transport error or a cut-off query counts as an attempt, same as NOT_FOUND.

use std::sync::Arc;
use std::time::Duration;
use stellar_xdr::curr::ScVal;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

use super::encoding::from_base64;
use super::output::TerminalStatus;
use crate::metrics::metrics;
use crate::rpc::{LedgerRpc, TransactionStatus};
use crate::types::TxHash;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);
pub const DEFAULT_POLL_ATTEMPTS: u32 = 30;

#[derive(Clone)]
pub struct ConfirmationPoller {
    rpc: Arc<dyn LedgerRpc>,
    interval: Duration,
    max_attempts: u32,
}

impl ConfirmationPoller {
    pub fn new(rpc: Arc<dyn LedgerRpc>, interval: Duration, max_attempts: u32) -> Self {
        Self {
            rpc,
            interval: interval.max(Duration::from_millis(1)),
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn with_defaults(rpc: Arc<dyn LedgerRpc>) -> Self {
        Self::new(rpc, DEFAULT_POLL_INTERVAL, DEFAULT_POLL_ATTEMPTS)
    }

    /// Upper bound on the wall time of one `poll`
    pub fn budget(&self) -> Duration {
        self.interval
            .checked_mul(self.max_attempts)
            .unwrap_or(Duration::MAX)
    }

    pub async fn poll(&self, hash: &TxHash) -> TerminalStatus {
        let deadline = Instant::now().checked_add(self.budget());
        let remaining = || match deadline {
            Some(deadline) => deadline.saturating_duration_since(Instant::now()),
            None => Duration::MAX,
        };

        let mut attempts = 0;
        while attempts < self.max_attempts {
            let left = remaining();
            if left.is_zero() {
                break;
            }
            attempts += 1;
            metrics().poll_attempts.inc();

            match timeout(left, self.rpc.get_transaction(hash.as_str())).await {
                Ok(Ok(response)) => match response.status {
                    TransactionStatus::Success => {
                        info!(hash = %hash, attempts, ledger = ?response.ledger, "Transaction confirmed");
                        let return_value = response
                            .return_value
                            .as_deref()
                            .and_then(|xdr| from_base64::<ScVal>(xdr).ok());
                        return TerminalStatus::Success {
                            ledger: response.ledger,
                            return_value,
                        };
                    }
                    TransactionStatus::Failed => {
                        warn!(hash = %hash, attempts, "Transaction failed on ledger");
                        return TerminalStatus::Failed {
                            result_xdr: response.result_xdr,
                        };
                    }
                    TransactionStatus::NotFound => {
                        debug!(hash = %hash, attempts, "Transaction not found yet");
                    }
                },
                Ok(Err(e)) => {
                    warn!(hash = %hash, attempts, error = %e, "Status query failed");
                }
                Err(_) => {
                    warn!(hash = %hash, attempts, "Status query hit the poll deadline");
                }
            }

            if attempts < self.max_attempts {
                tokio::time::sleep(self.interval.min(remaining())).await;
            }
        }

        metrics().poll_timeouts.inc();
        warn!(
            hash = %hash,
            attempts,
            "Confirmation timed out, transaction status unknown"
        );
        TerminalStatus::TimedOut { attempts }
    }
}
