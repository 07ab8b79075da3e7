//! Scenario runner
//!
//! Drives a fresh `MemoryLedger` through a scenario: `init` with the
//! participants, then every step in order. State-changing steps are
//! invoked and committed; read-only steps are evaluated as queries so they
//! do not consume transaction ids.

use crate::metrics::RunMetrics;
use crate::scenario::{Scenario, ScenarioError};
use instruction::{ChaincodeConfig, InstructionChaincode, MemoryLedger, Response};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Functions that never write state.
const READ_ONLY: &[&str] = &["query", "history", "payment", "holding", "participant"];

#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Scenario(#[from] ScenarioError),

    #[error("init failed with status {status}: {message}")]
    InitFailed { status: u16, message: String },

    #[error("step {index} ({function}) returned {actual}, expected {expected}: {message}")]
    Expectation {
        index: usize,
        function: String,
        expected: u16,
        actual: u16,
        message: String,
    },
}

/// Host clock and failure policy for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RunnerConfig {
    pub tx_prefix: String,
    pub start_timestamp: i64,
    pub timestamp_step: i64,
    /// Stop at the first step whose status differs from its expectation
    pub fail_fast: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            tx_prefix: "tx".to_string(),
            start_timestamp: 0,
            timestamp_step: 1,
            fail_fast: false,
        }
    }
}

/// Outcome of one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    pub index: usize,
    pub function: String,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<u16>,
}

impl StepResult {
    pub fn passed(&self) -> bool {
        self.expected.map_or(true, |expected| expected == self.status)
    }
}

/// Result of running a scenario to completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub scenario: String,
    pub steps: Vec<StepResult>,
    pub metrics: RunMetrics,
    pub state_hash: String,
    pub height: u64,
    pub event_count: usize,
}

impl RunReport {
    pub fn failures(&self) -> impl Iterator<Item = &StepResult> {
        self.steps.iter().filter(|s| !s.passed())
    }

    pub fn all_passed(&self) -> bool {
        self.failures().next().is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScenarioRunner {
    config: RunnerConfig,
    /// Replaces the scenario's own chaincode configuration when set
    chaincode_override: Option<ChaincodeConfig>,
}

impl ScenarioRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            config,
            chaincode_override: None,
        }
    }

    pub fn with_chaincode_config(mut self, config: ChaincodeConfig) -> Self {
        self.chaincode_override = Some(config);
        self
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn run(&self, scenario: &Scenario) -> Result<RunReport, RunError> {
        self.run_ledger(scenario).map(|(_, report)| report)
    }

    /// Run the scenario and hand back the final ledger with the report.
    pub fn run_ledger(&self, scenario: &Scenario) -> Result<(MemoryLedger, RunReport), RunError> {
        let config = self
            .chaincode_override
            .clone()
            .unwrap_or_else(|| scenario.config.clone());
        let chaincode = InstructionChaincode::new(config);
        let mut ledger = MemoryLedger::with_clock(
            self.config.tx_prefix.clone(),
            self.config.start_timestamp,
            self.config.timestamp_step,
        );

        let started = Instant::now();
        let payload = scenario.init_payload()?;
        let init = ledger.init(&chaincode, &[payload.as_str()]);
        if !init.is_success() {
            return Err(RunError::InitFailed {
                status: init.status,
                message: init.message,
            });
        }
        info!(
            scenario = %scenario.name,
            participants = scenario.participants.len(),
            steps = scenario.steps.len(),
            "scenario started"
        );

        let mut metrics = RunMetrics::new();
        let mut steps = Vec::with_capacity(scenario.steps.len());
        for (index, step) in scenario.steps.iter().enumerate() {
            let args: Vec<&str> = step.args.iter().map(String::as_str).collect();
            let response = if READ_ONLY.contains(&step.function.as_str()) {
                ledger.query(&chaincode, &step.function, &args)
            } else {
                ledger.invoke(&chaincode, &step.function, &args)
            };
            metrics.record_response(&response);

            let result = step_result(index, &step.function, &response, step.expect_status);
            debug!(index, function = %step.function, status = response.status, "step finished");

            if !result.passed() {
                metrics.expectation_failures += 1;
                warn!(
                    index,
                    function = %step.function,
                    expected = ?result.expected,
                    actual = response.status,
                    message = %response.message,
                    "unexpected step status"
                );
                if self.config.fail_fast {
                    return Err(RunError::Expectation {
                        index,
                        function: step.function.clone(),
                        expected: step.expect_status.unwrap_or_default(),
                        actual: response.status,
                        message: response.message,
                    });
                }
            }
            steps.push(result);
        }

        metrics.record_events(ledger.events());
        metrics.elapsed_ns = started.elapsed().as_nanos() as u64;

        let report = RunReport {
            scenario: scenario.name.clone(),
            steps,
            metrics,
            state_hash: ledger.state_hash(),
            height: ledger.height(),
            event_count: ledger.events().len(),
        };
        info!(
            scenario = %report.scenario,
            height = report.height,
            state_hash = %report.state_hash,
            "scenario finished"
        );
        Ok((ledger, report))
    }
}

fn step_result(index: usize, function: &str, response: &Response, expected: Option<u16>) -> StepResult {
    StepResult {
        index,
        function: function.to_string(),
        status: response.status,
        code: if response.is_success() {
            None
        } else {
            response.code().map(str::to_string)
        },
        expected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::{fixture_participants, paired_transfers, transfer_args, Step, WorkloadConfig};

    fn scenario(steps: Vec<Step>) -> Scenario {
        Scenario {
            name: "unit".to_string(),
            config: ChaincodeConfig::default(),
            participants: fixture_participants(100),
            steps,
        }
    }

    #[test]
    fn test_run_executes_matching_pair() {
        let report = ScenarioRunner::default()
            .run(&scenario(vec![
                Step::new("transfer", transfer_args("fop", "ref-1", 40)).expect(200),
                Step::new("receive", transfer_args("fop", "ref-1", 40)).expect(200),
            ]))
            .unwrap();

        assert!(report.all_passed());
        assert_eq!(report.metrics.executed, 2);
        assert_eq!(report.metrics.participants, 2);
        // init + two invocations
        assert_eq!(report.height, 3);
    }

    #[test]
    fn test_queries_do_not_advance_height() {
        let report = ScenarioRunner::default()
            .run(&scenario(vec![
                Step::new("query", Vec::<String>::new()).expect(200),
                Step::new("participant", ["DE000DB7HWY7"]).expect(200),
            ]))
            .unwrap();
        assert_eq!(report.height, 1);
        assert_eq!(report.metrics.succeeded, 2);
    }

    #[test]
    fn test_expectation_failure_is_reported() {
        let report = ScenarioRunner::default()
            .run(&scenario(vec![Step::new("nonsense", Vec::<String>::new()).expect(200)]))
            .unwrap();
        assert!(!report.all_passed());
        assert_eq!(report.metrics.expectation_failures, 1);
        assert_eq!(report.steps[0].status, Response::BAD_REQUEST);
        assert_eq!(report.steps[0].code.as_deref(), Some("UNKNOWN_FUNCTION"));
    }

    #[test]
    fn test_fail_fast_stops_run() {
        let runner = ScenarioRunner::new(RunnerConfig {
            fail_fast: true,
            ..RunnerConfig::default()
        });
        let err = runner
            .run(&scenario(vec![
                Step::new("transfer", transfer_args("fop", "ref-1", 500)),
                Step::new("receive", transfer_args("fop", "ref-1", 500)).expect(200),
            ]))
            .unwrap_err();
        assert!(matches!(err, RunError::Expectation { index: 1, actual: 202, .. }));
    }

    #[test]
    fn test_chaincode_override_applies() {
        let runner = ScenarioRunner::default().with_chaincode_config(ChaincodeConfig {
            legacy_fallback: false,
            ..ChaincodeConfig::default()
        });
        let mut legacy = transfer_args("fop", "ref-1", 1);
        legacy.remove(0);
        let report = runner.run(&scenario(vec![Step::new("transfer", legacy)])).unwrap();
        assert_eq!(report.steps[0].status, Response::BAD_REQUEST);
    }

    #[test]
    fn test_mismatch_workload_counts() {
        let workload = paired_transfers(&WorkloadConfig {
            pairs: 10,
            mismatch_every: Some(5),
            ..WorkloadConfig::default()
        });
        let report = ScenarioRunner::default().run(&workload).unwrap();
        assert_eq!(report.metrics.codes.get("MATCH_MISMATCH"), Some(&2));
        assert_eq!(report.metrics.executed, 16);
        assert_eq!(report.metrics.rejected_halves, 4);
    }

    #[test]
    fn test_custom_clock_prefix() {
        let runner = ScenarioRunner::new(RunnerConfig {
            tx_prefix: "sim".to_string(),
            ..RunnerConfig::default()
        });
        let (ledger, _) = runner
            .run_ledger(&scenario(vec![Step::new("transfer", transfer_args("fop", "ref-1", 1))]))
            .unwrap();
        assert!(ledger.events().iter().all(|e| e.tx_id.starts_with("sim-")));
    }
}
