//! Submission and confirmation outcomes
//!
//! [`SubmitResult`] is what the node said when the envelope was handed over;
//! [`TerminalStatus`] is what polling eventually learned. A timed-out poll
//! is its own state: the envelope may still be included later.

use serde::{Deserialize, Serialize};
use stellar_xdr::curr::ScVal;

use crate::rpc::SendStatus;
use crate::types::TxHash;

/// Node's answer to `sendTransaction` for an accepted envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitResult {
    pub hash: TxHash,
    pub status: SendStatus,
    pub latest_ledger: u32,
}

/// Final state of a submitted transaction as seen by the poller
#[derive(Debug, Clone, PartialEq)]
pub enum TerminalStatus {
    Success {
        ledger: Option<u32>,
        return_value: Option<ScVal>,
    },
    Failed {
        result_xdr: Option<String>,
    },
    /// Poll ceiling reached with no final status; outcome unknown
    TimedOut { attempts: u32 },
}

impl TerminalStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Success { .. } => "SUCCESS",
            Self::Failed { .. } => "FAILED",
            Self::TimedOut { .. } => "TIMED_OUT",
        }
    }
}

/// Outcome of a flow that submitted a transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Confirmed {
    pub hash: TxHash,
    pub ledger: Option<u32>,
    /// Fee paid in stroops (base fee plus resource fee)
    pub fee: u32,
}
