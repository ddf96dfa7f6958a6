//! Soroban transaction pipeline
//!
//! Stage modules, in the order a custom-account transfer uses them:
//! - **context**: fresh account snapshots (no sequence caching)
//! - **builder**: immutable single-operation transactions and envelopes
//! - **simulate**: strict simulation parse with a raw-JSON fallback
//! - **auth**: payload hashing and signed authorization entries
//! - **submit**: re-simulation, final fee, fee-payer signing, submission
//! - **confirm**: bounded fixed-interval status polling
//!
//! Supporting modules:
//! - **errors**: the pipeline error taxonomy
//! - **encoding**: XDR/StrKey/ScVal helpers
//! - **operation**: contract call ⇄ ledger operation
//! - **output**: submission and terminal status types
//!
//! ## Freshness
//!
//! Every independent build reads the account sequence from the ledger via
//! [`AccountState::fresh_snapshot`]. Snapshots are not `Clone` and are
//! consumed by [`TransactionBuilder::build`]. Fee or footprint changes go
//! through [`BuiltTransaction::rebuild`], which produces a new value.

pub mod errors;
pub use errors::{PipelineResult, TransactionBuilderError};

pub mod auth;
pub mod builder;
pub mod confirm;
pub mod context;
pub mod encoding;
pub mod operation;
pub mod output;
pub mod simulate;
pub mod submit;

// Re-export key types for convenience
pub use auth::{expiration_ledger_for, AuthorizationAssembler, SignedAuthorization};
pub use builder::{BuiltTransaction, SignedEnvelope, TransactionBuilder};
pub use confirm::ConfirmationPoller;
pub use context::AccountState;
pub use output::{Confirmed, SubmitResult, TerminalStatus};
pub use simulate::Simulator;
pub use submit::{final_fee, FinalSource, Resubmitter};
