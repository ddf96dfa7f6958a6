//! Falcon account client CLI
//!
//! Runs one flow per invocation against a Soroban RPC node:
//!
//! - **verify**: ask the verifier contract whether a Falcon signature is valid
//! - **fund**: send tokens from the fee-payer to an address
//! - **transfer**: send tokens out of the Falcon smart account
//! - **pubkey**: read the public key the smart account verifies against

#![deny(unused_imports)]
#![deny(unused_mut)]
#![deny(unused_variables)]
#![warn(unused_must_use)]

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::{info, warn};

use falcon_account_client::config::Config;
use falcon_account_client::metrics::metrics;
use falcon_account_client::structured_logging::init_tracing;
use falcon_account_client::{
    FalconClient, FeePayer, FlowReport, LogObserver, SorobanRpcClient, StepStatus, VerifyOutcome,
};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "falcon.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check a signature with the verifier contract (simulation only)
    Verify {
        /// Falcon public key, hex
        #[arg(long)]
        public_key: String,
        /// Signed message, hex
        #[arg(long)]
        message: String,
        /// Signature, hex
        #[arg(long)]
        signature: String,
    },
    /// Transfer tokens from the fee-payer
    Fund {
        #[arg(long)]
        to: String,
        /// Amount in the token's smallest unit
        #[arg(long)]
        amount: i128,
    },
    /// Transfer tokens out of the Falcon smart account
    Transfer {
        #[arg(long)]
        to: String,
        #[arg(long)]
        amount: i128,
    },
    /// Print the smart account's Falcon public key
    Pubkey,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (config, loaded_from_file) = load_config(&args.config)?;
    init_tracing(args.verbose, args.json_logs || config.monitoring.json_logs)?;

    info!("🚀 Falcon account client v{}", env!("CARGO_PKG_VERSION"));
    if loaded_from_file {
        info!("📋 Configuration loaded from: {}", args.config);
    } else {
        warn!("Config file '{}' not found, using defaults", args.config);
    }
    config.validate().context("Invalid configuration")?;

    let result = run(&args.command, &config).await;

    if config.monitoring.print_metrics {
        match metrics().export_text() {
            Ok(text) => println!("{}", text),
            Err(e) => warn!("Failed to export metrics: {}", e),
        }
    }

    result
}

async fn run(command: &Command, config: &Config) -> Result<()> {
    let rpc = Arc::new(
        SorobanRpcClient::new(&config.rpc.url, config.rpc_timeout(), config.retry_policy())
            .context("Failed to create RPC client")?,
    );
    info!("🌐 RPC endpoint: {}", rpc.url());

    let contracts = match command {
        Command::Transfer { .. } | Command::Pubkey => config.contracts()?,
        Command::Verify { .. } | Command::Fund { .. } => config.contracts_without_account()?,
    };

    let fee_payer = Arc::new(
        FeePayer::from_env(&config.fee_payer.secret_env).context("Failed to load fee-payer")?,
    );
    let client = FalconClient::new(
        rpc,
        config.network_id(),
        contracts,
        config.flow_settings(),
        fee_payer,
    );
    info!("💼 Fee-payer: {}", client.fee_payer_address());

    let observer = LogObserver;
    match command {
        Command::Verify {
            public_key,
            message,
            signature,
        } => {
            let public_key = decode_hex("public key", public_key)?;
            let message = decode_hex("message", message)?;
            let signature = decode_hex("signature", signature)?;
            let report = client
                .verify_signature(&public_key, &message, &signature, &observer)
                .await;
            match into_outcome(report)? {
                VerifyOutcome::Valid => println!("valid"),
                VerifyOutcome::Invalid => println!("invalid"),
                VerifyOutcome::Indeterminate { reason } => {
                    println!("indeterminate: {}", reason)
                }
            }
        }
        Command::Fund { to, amount } => {
            let confirmed = into_outcome(client.fund(to, *amount, &observer).await)?;
            println!("{}", serde_json::to_string_pretty(&confirmed)?);
        }
        Command::Transfer { to, amount } => {
            let signer = config.command_signer()?;
            let confirmed = into_outcome(
                client
                    .transfer_from_custom_account(to, *amount, &signer, &observer)
                    .await,
            )?;
            println!("{}", serde_json::to_string_pretty(&confirmed)?);
        }
        Command::Pubkey => {
            let key = client.get_custom_account_public_key().await?;
            println!("{}", hex::encode(key));
        }
    }
    Ok(())
}

/// Load configuration from file with fallback to defaults
fn load_config(path: &str) -> Result<(Config, bool)> {
    if std::path::Path::new(path).exists() {
        let config = Config::from_file_with_env(path)
            .with_context(|| format!("Failed to load config from {}", path))?;
        Ok((config, true))
    } else {
        Ok((Config::from_env(), false))
    }
}

fn into_outcome<T>(report: FlowReport<T>) -> Result<T> {
    let flow_id = report.flow_id.clone();
    match report.outcome {
        Ok(value) => Ok(value),
        Err(e) => {
            let failed_stage = report
                .steps
                .iter()
                .find(|s| s.status == StepStatus::Error)
                .map(|s| s.stage.to_string())
                .unwrap_or_else(|| "unknown stage".to_string());
            bail!("flow {} failed at {}: {}", flow_id, failed_stage, e)
        }
    }
}

fn decode_hex(name: &str, value: &str) -> Result<Vec<u8>> {
    let trimmed = value.trim().trim_start_matches("0x");
    hex::decode(trimmed).with_context(|| format!("{} is not valid hex", name))
}

