//! Crate-level tests
//!
//! Whole flows against the in-memory ledger, plus property tests for the
//! builder and payload hashing.

mod builder_props;
mod flow_tests;
