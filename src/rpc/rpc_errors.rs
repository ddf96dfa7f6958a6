use std::time::Duration;
use thiserror::Error;

/// Soroban RPC error types
#[derive(Debug, Clone, Error)]
pub enum RpcError {
    /// Transport-level errors (network, connection)
    #[error("Transport error: {message} (endpoint: {endpoint})")]
    Transport { endpoint: String, message: String },

    /// Timeout errors
    #[error("Timeout after {timeout_ms}ms (endpoint: {endpoint})")]
    Timeout { endpoint: String, timeout_ms: u64 },

    /// HTTP status or JSON-RPC error object returned by the node
    #[error("RPC response error: {message} (method: {method}, code: {code})")]
    Response {
        method: String,
        code: i64,
        message: String,
    },

    /// The response arrived but did not fit the typed model
    #[error("Failed to decode {method} response: {message}")]
    Decode { method: String, message: String },

    /// Ledger has no entry for the account
    #[error("Account not found: {account}")]
    AccountNotFound { account: String },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// JSON-RPC "internal error" code
const JSONRPC_INTERNAL_ERROR: i64 = -32603;

impl RpcError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            RpcError::Transport { .. } => true,
            RpcError::Timeout { .. } => true,

            // Retry on HTTP 429 / 5xx and on node-internal errors
            RpcError::Response { code, .. } => {
                *code == 429 || (500..600).contains(code) || *code == JSONRPC_INTERNAL_ERROR
            }

            RpcError::Decode { .. } => false,
            RpcError::AccountNotFound { .. } => false,
            RpcError::Configuration(_) => false,
        }
    }

    /// True when the response was valid but the typed model could not represent it
    pub fn is_decode(&self) -> bool {
        matches!(self, RpcError::Decode { .. })
    }

    /// Classify a reqwest failure
    pub fn from_reqwest(err: reqwest::Error, endpoint: &str, timeout: Duration) -> Self {
        if err.is_timeout() {
            RpcError::Timeout {
                endpoint: endpoint.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            }
        } else if err.is_decode() {
            RpcError::Decode {
                method: "unknown".to_string(),
                message: err.to_string(),
            }
        } else {
            RpcError::Transport {
                endpoint: endpoint.to_string(),
                message: err.to_string(),
            }
        }
    }

    pub fn decode(method: &str, message: impl Into<String>) -> Self {
        RpcError::Decode {
            method: method.to_string(),
            message: message.into(),
        }
    }
}

/// Retry policy for read-only RPC operations
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first)
    pub max_attempts: u32,

    /// Base delay in milliseconds
    pub base_delay_ms: u64,

    /// Maximum delay in milliseconds
    pub max_delay_ms: u64,

    /// Jitter factor (0.0 - 1.0)
    pub jitter_factor: f64,

    /// Multiplier for exponential backoff
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 5000,
            jitter_factor: 0.1,
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Calculate delay before retrying after the given (0-indexed) attempt
    pub fn calculate_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt + 1 >= self.max_attempts {
            return None;
        }

        // Exponential backoff
        let delay_ms = self.base_delay_ms as f64 * self.multiplier.powi(attempt as i32);
        let delay_ms = delay_ms.min(self.max_delay_ms as f64);

        // Add jitter to prevent thundering herd
        let jitter = (rand::random::<f64>() - 0.5) * 2.0 * self.jitter_factor;
        let jittered_delay = (delay_ms * (1.0 + jitter)).max(0.0) as u64;

        Some(Duration::from_millis(jittered_delay))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_is_retryable() {
        assert!(RpcError::Transport {
            endpoint: "test".to_string(),
            message: "connection failed".to_string(),
        }
        .is_retryable());

        assert!(RpcError::Timeout {
            endpoint: "test".to_string(),
            timeout_ms: 5000,
        }
        .is_retryable());

        assert!(RpcError::Response {
            method: "getTransaction".to_string(),
            code: 503,
            message: "unavailable".to_string(),
        }
        .is_retryable());

        assert!(!RpcError::Response {
            method: "sendTransaction".to_string(),
            code: -32602,
            message: "invalid params".to_string(),
        }
        .is_retryable());

        assert!(!RpcError::decode("simulateTransaction", "unknown variant").is_retryable());
        assert!(!RpcError::AccountNotFound {
            account: "G...".to_string()
        }
        .is_retryable());
    }

    #[test]
    fn test_is_decode() {
        assert!(RpcError::decode("simulateTransaction", "x").is_decode());
        assert!(!RpcError::Configuration("x".to_string()).is_decode());
    }

    #[test]
    fn test_retry_policy_delay() {
        let policy = RetryPolicy {
            jitter_factor: 0.0,
            ..RetryPolicy::default()
        };

        let delay1 = policy.calculate_delay(0).unwrap();
        let delay2 = policy.calculate_delay(1).unwrap();
        assert_eq!(delay1, Duration::from_millis(100));
        assert_eq!(delay2, Duration::from_millis(200));

        // Third attempt is the last one
        assert!(policy.calculate_delay(2).is_none());
        assert!(RetryPolicy::none().calculate_delay(0).is_none());
    }

    #[test]
    fn test_retry_policy_caps_delay() {
        let policy = RetryPolicy {
            max_attempts: 20,
            jitter_factor: 0.0,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.calculate_delay(15).unwrap(), Duration::from_millis(5000));
    }
}
