//! Event log and deterministic replay validation
//!
//! Every node executing the same invocations in the same order must reach
//! the same world state and emit the same events.

use crate::runner::{RunError, ScenarioRunner};
use crate::scenario::Scenario;
use instruction::ledger::CommittedEvent;
use instruction::MemoryLedger;
use serde::{Deserialize, Serialize};

/// Committed event in exportable form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub tx_id: String,
    pub block: u64,
    pub name: String,
    /// Decoded payload; `null` when it is not JSON
    pub payload: serde_json::Value,
}

impl From<&CommittedEvent> for EventRecord {
    fn from(event: &CommittedEvent) -> Self {
        Self {
            tx_id: event.tx_id.clone(),
            block: event.block,
            name: event.name.clone(),
            payload: serde_json::from_slice(&event.payload).unwrap_or(serde_json::Value::Null),
        }
    }
}

/// Comparable summary of a ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSnapshot {
    pub state_hash: String,
    pub height: u64,
    pub entries: usize,
    pub event_count: usize,
    /// SHA-256 over the ordered event stream
    pub event_hash: String,
}

pub fn capture_snapshot(ledger: &MemoryLedger) -> LedgerSnapshot {
    LedgerSnapshot {
        state_hash: ledger.state_hash(),
        height: ledger.height(),
        entries: ledger.len(),
        event_count: ledger.events().len(),
        event_hash: event_hash(ledger.events()),
    }
}

fn event_hash(events: &[CommittedEvent]) -> String {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    for event in events {
        for part in [event.tx_id.as_bytes(), event.name.as_bytes(), event.payload.as_slice()] {
            hasher.update((part.len() as u64).to_le_bytes());
            hasher.update(part);
        }
        hasher.update(event.block.to_le_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Result of a replay validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayValidation {
    pub matches: bool,
    pub original: LedgerSnapshot,
    pub replayed: LedgerSnapshot,
}

/// Run the scenario twice on independent ledgers and compare the outcome.
pub fn verify_replay(runner: &ScenarioRunner, scenario: &Scenario) -> Result<ReplayValidation, RunError> {
    let (original, _) = runner.run_ledger(scenario)?;
    let (replayed, _) = runner.run_ledger(scenario)?;
    Ok(compare(&original, &replayed))
}

pub fn compare(original: &MemoryLedger, replayed: &MemoryLedger) -> ReplayValidation {
    let original = capture_snapshot(original);
    let replayed = capture_snapshot(replayed);
    ReplayValidation {
        matches: original == replayed,
        original,
        replayed,
    }
}

/// Export the committed event log as JSON.
pub fn export_event_log(ledger: &MemoryLedger) -> Result<String, serde_json::Error> {
    let records: Vec<EventRecord> = ledger.events().iter().map(EventRecord::from).collect();
    serde_json::to_string_pretty(&records)
}

/// Import an event log from JSON.
pub fn import_event_log(json: &str) -> Result<Vec<EventRecord>, serde_json::Error> {
    serde_json::from_str(json)
}
