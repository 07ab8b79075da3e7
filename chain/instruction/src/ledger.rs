//! In-memory hosting ledger
//!
//! Models the platform side of an invocation: the chaincode runs against a
//! `TxSimulator`, which records the version of every key it reads and buffers
//! every write. The resulting read/write set is then validated and applied by
//! `commit` as one unit. A read whose version changed since simulation makes
//! the whole transaction fail with `MvccConflict`, which is what rejects
//! overlapping read-modify-write sequences between invocations.

use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::chaincode::{InstructionChaincode, Response};
use crate::errors::{LedgerError, StateError};
use crate::state::{partial_key_prefix, scan_prefix, ChaincodeStub, CompositeKey, StateStore};

#[derive(Debug, Clone, PartialEq, Eq)]
struct VersionedValue {
    value: Vec<u8>,
    /// Height of the block that last wrote the key
    version: u64,
}

/// Event committed together with its transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedEvent {
    pub tx_id: String,
    pub block: u64,
    pub name: String,
    pub payload: Vec<u8>,
}

/// Outcome of one simulated transaction, ready for validation.
#[derive(Debug, Clone, Default)]
pub struct ReadWriteSet {
    pub tx_id: String,
    /// Version observed for each key read; `None` means absent
    reads: BTreeMap<String, Option<u64>>,
    writes: BTreeMap<String, Vec<u8>>,
    events: Vec<(String, Vec<u8>)>,
}

impl ReadWriteSet {
    pub fn is_read_only(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn write_count(&self) -> usize {
        self.writes.len()
    }
}

/// Transaction context for one invocation against a `MemoryLedger`.
///
/// Reads see the transaction's own pending writes.
pub struct TxSimulator<'a> {
    ledger: &'a MemoryLedger,
    timestamp: i64,
    rwset: ReadWriteSet,
}

impl<'a> TxSimulator<'a> {
    pub fn into_rwset(self) -> ReadWriteSet {
        self.rwset
    }

    fn record_read(&mut self, encoded: &str) {
        let version = self.ledger.state.get(encoded).map(|v| v.version);
        self.rwset
            .reads
            .entry(encoded.to_string())
            .or_insert(version);
    }
}

impl StateStore for TxSimulator<'_> {
    fn get_state(&mut self, key: &CompositeKey) -> Result<Option<Vec<u8>>, StateError> {
        let encoded = key.encode();
        if let Some(pending) = self.rwset.writes.get(&encoded) {
            return Ok(Some(pending.clone()));
        }
        self.record_read(&encoded);
        Ok(self.ledger.state.get(&encoded).map(|v| v.value.clone()))
    }

    fn put_state(&mut self, key: &CompositeKey, value: Vec<u8>) -> Result<(), StateError> {
        self.rwset.writes.insert(key.encode(), value);
        Ok(())
    }

    fn get_state_by_partial_key(
        &mut self,
        object_type: &str,
        attributes: &[&str],
    ) -> Result<Vec<(CompositeKey, Vec<u8>)>, StateError> {
        let prefix = partial_key_prefix(object_type, attributes)?;

        let mut merged: BTreeMap<String, Vec<u8>> = scan_prefix(&self.ledger.state, &prefix)
            .map(|(k, v)| (k.clone(), v.value.clone()))
            .collect();
        for key in merged.keys().cloned().collect::<Vec<_>>() {
            self.record_read(&key);
        }
        for (k, v) in scan_prefix(&self.rwset.writes, &prefix) {
            merged.insert(k.clone(), v.clone());
        }

        merged
            .into_iter()
            .map(|(k, v)| Ok((CompositeKey::decode(&k)?, v)))
            .collect()
    }
}

impl ChaincodeStub for TxSimulator<'_> {
    fn tx_id(&self) -> &str {
        &self.rwset.tx_id
    }

    fn tx_timestamp(&self) -> i64 {
        self.timestamp
    }

    fn set_event(&mut self, name: &str, payload: Vec<u8>) {
        self.rwset.events.push((name.to_string(), payload));
    }
}

/// Versioned world state with a block height and an event log.
///
/// Transaction ids and timestamps are assigned here from a logical clock,
/// so two ledgers fed the same invocations end in the same state.
#[derive(Debug, Clone)]
pub struct MemoryLedger {
    state: BTreeMap<String, VersionedValue>,
    height: u64,
    events: Vec<CommittedEvent>,
    tx_seq: u64,
    tx_prefix: String,
    clock_start: i64,
    clock_step: i64,
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::with_clock("tx", 0, 1)
    }

    /// Ledger whose transaction `n` gets id `{prefix}-{n:08}` and timestamp
    /// `start + n * step`.
    pub fn with_clock(tx_prefix: impl Into<String>, start: i64, step: i64) -> Self {
        Self {
            state: BTreeMap::new(),
            height: 0,
            events: Vec::new(),
            tx_seq: 0,
            tx_prefix: tx_prefix.into(),
            clock_start: start,
            clock_step: step,
        }
    }

    /// Number of committed transactions
    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn len(&self) -> usize {
        self.state.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }

    pub fn events(&self) -> &[CommittedEvent] {
        &self.events
    }

    /// Allocate the next transaction id and timestamp.
    pub fn next_tx(&mut self) -> (String, i64) {
        self.tx_seq += 1;
        let tx_id = format!("{}-{:08}", self.tx_prefix, self.tx_seq);
        let timestamp = self.clock_start + self.tx_seq as i64 * self.clock_step;
        (tx_id, timestamp)
    }

    /// Open a simulation against the current committed state.
    pub fn simulate(&self, tx_id: impl Into<String>, timestamp: i64) -> TxSimulator<'_> {
        TxSimulator {
            ledger: self,
            timestamp,
            rwset: ReadWriteSet {
                tx_id: tx_id.into(),
                ..ReadWriteSet::default()
            },
        }
    }

    /// Validate the read set and apply the write set atomically.
    pub fn commit(&mut self, rwset: ReadWriteSet) -> Result<u64, LedgerError> {
        for (key, observed) in &rwset.reads {
            let current = self.state.get(key).map(|v| v.version);
            if current != *observed {
                let key = CompositeKey::decode(key)
                    .map(|k| k.to_string())
                    .unwrap_or_else(|_| key.escape_debug().to_string());
                warn!(tx_id = %rwset.tx_id, %key, "MVCC conflict, transaction invalidated");
                return Err(LedgerError::MvccConflict { key });
            }
        }

        self.height += 1;
        let block = self.height;
        for (key, value) in rwset.writes {
            self.state.insert(key, VersionedValue { value, version: block });
        }
        for (name, payload) in rwset.events {
            self.events.push(CommittedEvent {
                tx_id: rwset.tx_id.clone(),
                block,
                name,
                payload,
            });
        }
        debug!(tx_id = %rwset.tx_id, block, "transaction committed");
        Ok(block)
    }

    /// Run `init` and commit it on success.
    pub fn init(&mut self, chaincode: &InstructionChaincode, args: &[&str]) -> Response {
        let (tx_id, timestamp) = self.next_tx();
        let (response, rwset) = {
            let mut sim = self.simulate(tx_id, timestamp);
            let response = chaincode.init(&mut sim, args);
            (response, sim.into_rwset())
        };
        self.finish(response, rwset)
    }

    /// Run a state-changing invocation; its writes are committed only when
    /// the response says so.
    pub fn invoke(&mut self, chaincode: &InstructionChaincode, function: &str, args: &[&str]) -> Response {
        let (tx_id, timestamp) = self.next_tx();
        let (response, rwset) = {
            let mut sim = self.simulate(tx_id, timestamp);
            let response = chaincode.invoke(&mut sim, function, args);
            (response, sim.into_rwset())
        };
        self.finish(response, rwset)
    }

    /// Evaluate an invocation without committing anything.
    pub fn query(&self, chaincode: &InstructionChaincode, function: &str, args: &[&str]) -> Response {
        let mut sim = self.simulate("query", self.clock_start);
        chaincode.invoke(&mut sim, function, args)
    }

    fn finish(&mut self, response: Response, rwset: ReadWriteSet) -> Response {
        if !response.commits() {
            return response;
        }
        match self.commit(rwset) {
            Ok(_) => response,
            Err(err) => Response::from_ledger_error(&err),
        }
    }

    /// Committed raw value.
    pub fn get(&self, key: &CompositeKey) -> Option<&[u8]> {
        self.state.get(&key.encode()).map(|v| v.value.as_slice())
    }

    /// Committed value decoded from JSON.
    pub fn read_json<T: DeserializeOwned>(&self, key: &CompositeKey) -> Result<Option<T>, StateError> {
        match self.get(key) {
            Some(bytes) => Ok(Some(serde_json::from_slice(bytes)?)),
            None => Ok(None),
        }
    }

    /// SHA-256 over the ordered world state, hex encoded.
    ///
    /// Versions are excluded: two nodes agree when they hold the same data.
    pub fn state_hash(&self) -> String {
        let mut hasher = Sha256::new();
        for (key, entry) in &self.state {
            hasher.update((key.len() as u64).to_le_bytes());
            hasher.update(key.as_bytes());
            hasher.update((entry.value.len() as u64).to_le_bytes());
            hasher.update(&entry.value);
        }
        hex::encode(hasher.finalize())
    }
}
