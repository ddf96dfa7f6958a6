//! Configuration module for the Falcon account client
//!
//! This module handles all configuration loading from TOML files,
//! environment variables, and provides structured configuration types.
//! Secrets never live in the file: `fee_payer.secret_env` names the
//! environment variable that holds the fee-payer seed.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::flows::{Contracts, FlowSettings};
use crate::rpc::RetryPolicy;
use crate::signer::{CommandSigner, SignatureBounds};
use crate::tx_builder::encoding::parse_address;
use crate::types::{NetworkId, TESTNET_PASSPHRASE};

pub const ENV_RPC_URL: &str = "FALCON_RPC_URL";
pub const ENV_NETWORK_PASSPHRASE: &str = "FALCON_NETWORK_PASSPHRASE";
pub const ENV_SIGNER_COMMAND: &str = "FALCON_SIGNER_COMMAND";
pub const ENV_CUSTOM_ACCOUNT: &str = "FALCON_CUSTOM_ACCOUNT";

/// Configuration-related errors
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Missing setting: {0}")]
    Missing(String),
}

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub rpc: RpcConfig,
    pub network: NetworkConfig,
    pub fee_payer: FeePayerConfig,
    pub contracts: ContractsConfig,
    pub pipeline: PipelineConfig,
    pub signer: SignerConfig,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    /// Soroban RPC endpoint
    pub url: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Attempts per read-only request, including the first
    pub max_attempts: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub passphrase: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeePayerConfig {
    /// Environment variable holding the `S...` seed
    pub secret_env: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractsConfig {
    pub verifier: String,
    pub token: String,
    /// Deployed Falcon smart account; required by transfer and pubkey
    pub custom_account: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Inclusion fee in stroops
    pub base_fee: u32,
    pub single_pass_timeout_secs: u64,
    pub signer_timeout_secs: u64,
    pub auth_expiration_ledgers: u32,
    pub poll_interval_ms: u64,
    pub poll_max_attempts: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignerConfig {
    /// External signing program; receives the payload hash as last argument
    pub command: Option<String>,
    pub args: Vec<String>,
    pub min_signature_len: usize,
    pub max_signature_len: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// Emit logs as JSON lines
    pub json_logs: bool,

    /// Dump Prometheus metrics to stdout on exit
    pub print_metrics: bool,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: "https://soroban-testnet.stellar.org".to_string(),
            timeout_secs: 30,
            max_attempts: 3,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            passphrase: TESTNET_PASSPHRASE.to_string(),
        }
    }
}

impl Default for FeePayerConfig {
    fn default() -> Self {
        Self {
            secret_env: "FALCON_FEE_PAYER_SECRET".to_string(),
        }
    }
}

impl Default for ContractsConfig {
    fn default() -> Self {
        Self {
            verifier: "CCUXVGY7ABTWKKAMOJNUD536D7KVVEPG5DXA7SSALSSB3O7OAU3TL57S".to_string(),
            // Native XLM asset contract on testnet
            token: "CDLZFC3SYJYDZT7K67VZ75HPJVIEUVNIXF47ZG2FB2RMQQVU2HHGCYSC".to_string(),
            custom_account: None,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            base_fee: 100,
            single_pass_timeout_secs: 30,
            signer_timeout_secs: 300,
            auth_expiration_ledgers: 100,
            poll_interval_ms: 1000,
            poll_max_attempts: 30,
        }
    }
}

impl Default for SignerConfig {
    fn default() -> Self {
        let bounds = SignatureBounds::default();
        Self {
            command: None,
            args: Vec::new(),
            min_signature_len: bounds.min,
            max_signature_len: bounds.max,
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("Failed to read config file {}: {}", path, e)))?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse(format!("Failed to parse TOML: {}", e)))
    }

    /// Load configuration with `.env` and environment variable overrides
    pub fn from_file_with_env(path: &str) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let mut config = Self::from_file(path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Defaults plus `.env` and environment overrides, when no file is given
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok());
        config
    }

    /// Apply overrides from a key lookup
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_RPC_URL) {
            self.rpc.url = url;
        }
        if let Some(passphrase) = lookup(ENV_NETWORK_PASSPHRASE) {
            self.network.passphrase = passphrase;
        }
        if let Some(command) = lookup(ENV_SIGNER_COMMAND) {
            self.signer.command = Some(command);
        }
        if let Some(account) = lookup(ENV_CUSTOM_ACCOUNT) {
            self.contracts.custom_account = Some(account);
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.rpc.url.starts_with("http://") && !self.rpc.url.starts_with("https://") {
            return Err(ConfigError::Validation(format!(
                "Invalid RPC URL: {}",
                self.rpc.url
            )));
        }
        if self.rpc.timeout_secs == 0 {
            return Err(ConfigError::Validation("rpc.timeout_secs must be > 0".to_string()));
        }
        if self.network.passphrase.trim().is_empty() {
            return Err(ConfigError::Validation("network.passphrase is empty".to_string()));
        }
        if self.fee_payer.secret_env.trim().is_empty() {
            return Err(ConfigError::Validation("fee_payer.secret_env is empty".to_string()));
        }

        let addresses = [
            ("contracts.verifier", Some(&self.contracts.verifier)),
            ("contracts.token", Some(&self.contracts.token)),
            ("contracts.custom_account", self.contracts.custom_account.as_ref()),
        ];
        for (name, value) in addresses {
            if let Some(value) = value {
                parse_address(value).map_err(|_| {
                    ConfigError::Validation(format!("{} is not a valid address: {}", name, value))
                })?;
            }
        }

        if self.pipeline.base_fee == 0 {
            return Err(ConfigError::Validation("pipeline.base_fee must be > 0".to_string()));
        }
        let zero_durations = [
            ("pipeline.single_pass_timeout_secs", self.pipeline.single_pass_timeout_secs),
            ("pipeline.signer_timeout_secs", self.pipeline.signer_timeout_secs),
            ("pipeline.poll_interval_ms", self.pipeline.poll_interval_ms),
        ];
        for (name, value) in zero_durations {
            if value == 0 {
                return Err(ConfigError::Validation(format!("{} must be > 0", name)));
            }
        }
        if self.pipeline.poll_max_attempts == 0 {
            return Err(ConfigError::Validation(
                "pipeline.poll_max_attempts must be > 0".to_string(),
            ));
        }
        if self.pipeline.auth_expiration_ledgers == 0 {
            return Err(ConfigError::Validation(
                "pipeline.auth_expiration_ledgers must be > 0".to_string(),
            ));
        }
        if self.signer.min_signature_len == 0
            || self.signer.min_signature_len > self.signer.max_signature_len
        {
            return Err(ConfigError::Validation(format!(
                "signature bounds {}..={} are invalid",
                self.signer.min_signature_len, self.signer.max_signature_len
            )));
        }

        Ok(())
    }

    pub fn network_id(&self) -> NetworkId {
        NetworkId::from_passphrase(&self.network.passphrase)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc.timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::with_max_attempts(self.rpc.max_attempts)
    }

    pub fn flow_settings(&self) -> FlowSettings {
        FlowSettings {
            base_fee: self.pipeline.base_fee,
            single_pass_timeout: Duration::from_secs(self.pipeline.single_pass_timeout_secs),
            signer_timeout: Duration::from_secs(self.pipeline.signer_timeout_secs),
            auth_expiration_ledgers: self.pipeline.auth_expiration_ledgers,
            poll_interval: Duration::from_millis(self.pipeline.poll_interval_ms),
            poll_max_attempts: self.pipeline.poll_max_attempts,
            signature_bounds: SignatureBounds {
                min: self.signer.min_signature_len,
                max: self.signer.max_signature_len,
            },
        }
    }

    /// Parsed contract addresses; the custom account must be configured
    pub fn contracts(&self) -> Result<Contracts, ConfigError> {
        let custom = self
            .contracts
            .custom_account
            .as_deref()
            .ok_or_else(|| ConfigError::Missing("contracts.custom_account".to_string()))?;
        Contracts::parse(&self.contracts.verifier, &self.contracts.token, custom)
            .map_err(|e| ConfigError::Validation(e.to_string()))
    }

    /// Contracts with a placeholder custom account, for flows that never touch it
    pub fn contracts_without_account(&self) -> Result<Contracts, ConfigError> {
        let verifier = parse_address(&self.contracts.verifier)
            .map_err(|e| ConfigError::Validation(e.to_string()))?;
        let token = parse_address(&self.contracts.token)
            .map_err(|e| ConfigError::Validation(e.to_string()))?;
        Ok(Contracts {
            custom_account: verifier.clone(),
            verifier,
            token,
        })
    }

    /// External signer from `signer.command`
    pub fn command_signer(&self) -> Result<CommandSigner, ConfigError> {
        let command = self
            .signer
            .command
            .clone()
            .ok_or_else(|| ConfigError::Missing("signer.command".to_string()))?;
        Ok(CommandSigner::new(
            command,
            self.signer.args.clone(),
            Duration::from_secs(self.pipeline.signer_timeout_secs),
        ))
    }
}
