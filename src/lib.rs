//! existbench workspace-level test utilities.
//!
//! This crate exists solely to support workspace-level integration tests,
//! particularly the BDD/cucumber tests in `tests/cucumber.rs`.
//!
//! The actual existbench functionality is in the workspace member crates:
//! - `existbench-types`: Shared types and JSON schemas
//! - `existbench-domain`: Catalog validation, classification and aggregation
//! - `existbench-adapters`: Existence strategies, bounded probing and case setup
//! - `existbench-app`: Application use cases
//! - `existbench-cli`: CLI interface
