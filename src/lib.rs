//! Falcon account client library
//!
//! Drives Soroban contract calls through build, simulate, authorize,
//! re-simulate, submit and confirm for accounts whose authorization is a
//! Falcon-512 signature checked on-chain.

pub mod config;
pub mod flows;
pub mod metrics;
pub mod observability;
pub mod progress;
pub mod rpc;
pub mod signer;
pub mod structured_logging;
pub mod tx_builder;
pub mod types;
pub mod wallet;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use flows::{Contracts, FalconClient, FlowReport, FlowSettings};
pub use progress::{ChannelObserver, LogObserver, NoopObserver, ProgressObserver, Stage, StepStatus};
pub use rpc::{LedgerRpc, SorobanRpcClient};
pub use signer::{AuthSigner, CommandSigner};
pub use tx_builder::{PipelineResult, TransactionBuilderError};
pub use types::{NetworkId, VerifyOutcome};
pub use wallet::{EnvelopeSigner, FeePayer};
