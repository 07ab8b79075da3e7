//! Run metrics
//!
//! Counts invocation outcomes by response status and rejection code, and
//! instruction lifecycle transitions from the committed event stream.

use instruction::ledger::CommittedEvent;
use instruction::Response;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Aggregated metrics of one scenario run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMetrics {
    pub invocations: u64,
    /// 200 responses
    pub succeeded: u64,
    /// 202 responses, committed rejections
    pub rejected: u64,
    /// 400 responses
    pub client_errors: u64,
    /// 500 responses other than MVCC conflicts
    pub internal_errors: u64,
    pub conflicts: u64,
    /// Steps whose status differed from the expected one
    pub expectation_failures: u64,

    // Lifecycle, counted per instruction half
    pub submitted: u64,
    pub matched: u64,
    pub executed: u64,
    pub rejected_halves: u64,
    pub payments_recorded: u64,
    pub payments_confirmed: u64,
    pub participants: u64,

    /// Responses per error or rejection code
    pub codes: BTreeMap<String, u64>,
    pub elapsed_ns: u64,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one invocation response.
    pub fn record_response(&mut self, response: &Response) {
        self.invocations += 1;
        match response.status {
            Response::OK => self.succeeded += 1,
            Response::REJECTED => self.rejected += 1,
            Response::BAD_REQUEST => self.client_errors += 1,
            _ if response.code() == Some("MVCC_CONFLICT") => self.conflicts += 1,
            _ => self.internal_errors += 1,
        }
        if response.status != Response::OK {
            if let Some(code) = response.code() {
                *self.codes.entry(code.to_string()).or_insert(0) += 1;
            }
        }
    }

    /// Record one committed ledger event.
    pub fn record_event(&mut self, event: &CommittedEvent) {
        match event.name.as_str() {
            "InstructionSubmitted" => self.submitted += 1,
            "InstructionMatched" => self.matched += 1,
            "InstructionExecuted" => self.executed += 1,
            "InstructionRejected" => self.rejected_halves += 1,
            "PaymentRecorded" => self.payments_recorded += 1,
            "PaymentConfirmed" => self.payments_confirmed += 1,
            "ParticipantRegistered" => self.participants += 1,
            _ => {}
        }
    }

    pub fn record_events(&mut self, events: &[CommittedEvent]) {
        for event in events {
            self.record_event(event);
        }
    }

    /// Invocations per second over the measured wall time.
    pub fn invocations_per_second(&self) -> f64 {
        if self.elapsed_ns == 0 {
            return 0.0;
        }
        self.invocations as f64 / (self.elapsed_ns as f64 / 1_000_000_000.0)
    }

    /// Generate a summary string.
    pub fn summary(&self) -> String {
        let mut out = format!(
            "Invocations: {} (ok {}, rejected {}, client errors {}, internal errors {}, conflicts {})\n\
             Halves: submitted {}, matched {}, executed {}, rejected {}\n\
             Payments: recorded {}, confirmed {}\n\
             Throughput: {:.0} inv/s",
            self.invocations,
            self.succeeded,
            self.rejected,
            self.client_errors,
            self.internal_errors,
            self.conflicts,
            self.submitted,
            self.matched,
            self.executed,
            self.rejected_halves,
            self.payments_recorded,
            self.payments_confirmed,
            self.invocations_per_second(),
        );
        for (code, count) in &self.codes {
            out.push_str(&format!("\n  {}: {}", code, count));
        }
        if self.expectation_failures > 0 {
            out.push_str(&format!("\nExpectation failures: {}", self.expectation_failures));
        }
        out
    }
}
