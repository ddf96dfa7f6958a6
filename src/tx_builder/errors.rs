//! Error types for the transaction pipeline
//!
//! One error type covers every stage from account fetch to confirmation.
//! The variants follow the failure taxonomy the flows report to callers:
//! - structured-parse failures are normally recovered by the raw fallback
//!   and only surface here when both parse paths fail
//! - logical simulation rejections and submission rejections are final
//!   for the attempt and never retried
//! - a confirmation timeout is distinct from a failed transaction, since
//!   the envelope may still land later
//! - signer failures are propagated as-is

use thiserror::Error;

use crate::rpc::RpcError;
use crate::signer::SignerError;
use crate::types::TxHash;

/// Comprehensive error type for all pipeline operations
#[derive(Error, Debug)]
pub enum TransactionBuilderError {
    /// Ledger RPC communication failed
    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    /// Neither the typed model nor the raw extraction could read a response
    #[error("Unreadable response: {0}")]
    StructuredParse(String),

    /// The node reported the call would fail
    #[error("Simulation rejected: {0}")]
    SimulationRejected(String),

    /// The envelope was rejected at submission
    ///
    /// Resubmitting requires a fresh sequence number, i.e. a new attempt.
    #[error("Submission rejected (hash={hash}): {reason}")]
    SubmissionRejected {
        hash: String,
        reason: String,
    },

    /// The transaction was included but failed
    #[error("Transaction {hash} failed: {}", .result_xdr.as_deref().unwrap_or("no result"))]
    ConfirmationFailed {
        hash: TxHash,
        result_xdr: Option<String>,
    },

    /// Poll attempts exhausted without a final status; outcome unknown
    #[error("Transaction {hash} not confirmed after {attempts} attempts (status unknown)")]
    ConfirmationTimeout {
        hash: TxHash,
        attempts: u32,
    },

    /// External signer failed
    #[error("Signer error: {0}")]
    Signer(#[from] SignerError),

    /// XDR encode/decode failure
    #[error("XDR error: {0}")]
    Xdr(String),

    /// Authorization entries were not in the expected shape
    #[error("Authorization error: {0}")]
    Authorization(String),

    /// Configuration or input validation error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal invariant violation
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TransactionBuilderError {
    /// Check if retrying the same operation might succeed
    ///
    /// Only transport-level RPC failures qualify. Rejections need a new
    /// flow attempt with a fresh account snapshot, not a retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Rpc(e) => e.is_retryable(),
            Self::StructuredParse(_) => false,
            Self::SimulationRejected(_) => false,
            Self::SubmissionRejected { .. } => false,
            Self::ConfirmationFailed { .. } => false,
            Self::ConfirmationTimeout { .. } => false,
            Self::Signer(_) => false,
            Self::Xdr(_) => false,
            Self::Authorization(_) => false,
            Self::Configuration(_) => false,
            Self::Internal(_) => false,
        }
    }

    /// Get the error category for metrics and observability
    pub fn category(&self) -> &'static str {
        match self {
            Self::Rpc(_) => "rpc",
            Self::StructuredParse(_) => "parse",
            Self::SimulationRejected(_) => "simulation",
            Self::SubmissionRejected { .. } => "submission",
            Self::ConfirmationFailed { .. } => "confirmation",
            Self::ConfirmationTimeout { .. } => "timeout",
            Self::Signer(_) => "signer",
            Self::Xdr(_) => "xdr",
            Self::Authorization(_) => "authorization",
            Self::Configuration(_) => "config",
            Self::Internal(_) => "internal",
        }
    }
}

// Convenience constructors for common error scenarios
impl TransactionBuilderError {
    pub fn xdr(reason: impl Into<String>) -> Self {
        Self::Xdr(reason.into())
    }

    pub fn simulation_rejected(reason: impl Into<String>) -> Self {
        Self::SimulationRejected(reason.into())
    }

    pub fn authorization(reason: impl Into<String>) -> Self {
        Self::Authorization(reason.into())
    }

    pub fn internal(reason: impl Into<String>) -> Self {
        Self::Internal(reason.into())
    }
}

pub type PipelineResult<T> = Result<T, TransactionBuilderError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn hash() -> TxHash {
        TxHash::from_bytes([1; 32])
    }

    #[test]
    fn test_error_display() {
        let err = TransactionBuilderError::simulation_rejected("HostError: auth");
        assert_eq!(err.to_string(), "Simulation rejected: HostError: auth");

        let err = TransactionBuilderError::ConfirmationTimeout {
            hash: hash(),
            attempts: 30,
        };
        assert!(err.to_string().contains("after 30 attempts"));
        assert!(err.to_string().contains("unknown"));

        let err = TransactionBuilderError::ConfirmationFailed {
            hash: hash(),
            result_xdr: None,
        };
        assert!(err.to_string().ends_with("no result"));
    }

    #[test]
    fn test_error_retryability() {
        let transport = RpcError::Transport {
            endpoint: "http://node".to_string(),
            message: "connection reset".to_string(),
        };
        assert!(TransactionBuilderError::Rpc(transport).is_retryable());

        assert!(!TransactionBuilderError::simulation_rejected("x").is_retryable());
        assert!(!TransactionBuilderError::SubmissionRejected {
            hash: "h".to_string(),
            reason: "txBadSeq".to_string(),
        }
        .is_retryable());
        assert!(!TransactionBuilderError::ConfirmationTimeout {
            hash: hash(),
            attempts: 3
        }
        .is_retryable());
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(
            TransactionBuilderError::simulation_rejected("x").category(),
            "simulation"
        );
        assert_eq!(
            TransactionBuilderError::ConfirmationTimeout {
                hash: hash(),
                attempts: 1
            }
            .category(),
            "timeout"
        );
        assert_eq!(TransactionBuilderError::internal("x").category(), "internal");
    }
}
