//! Scenario simulation for the instruction chaincode
//!
//! Runs scripted or generated invocation sequences against an in-memory
//! ledger, collects outcome metrics, and checks that independent replays
//! converge on the same world state.
//!
//! # Modules
//! - `scenario`: Scenario scripts and generated workloads
//! - `runner`: Drives a fresh ledger through a scenario
//! - `metrics`: Outcome and lifecycle counters
//! - `replay`: Event log and deterministic replay validation
//! - `export`: Report JSON export

pub mod scenario;
pub mod runner;
pub mod metrics;
pub mod replay;
pub mod export;

pub use runner::{RunReport, RunnerConfig, ScenarioRunner};
pub use scenario::Scenario;

/// Crate version constant
pub const VERSION: &str = "1.0.0";
