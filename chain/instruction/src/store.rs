//! Instruction store
//!
//! Instructions live under
//! `("Instruction", side, type, accountFrom, divisionFrom, accountTo, divisionTo, security, reference)`
//! and their audit trail under the same attributes with object type
//! `"InstructionHistory"`. Records are never deleted.

use types::instruction::{HistoryEntry, Instruction, InstructionKey, Side};

use crate::errors::{StateError, StoreError};
use crate::state::{get_json, put_json, scan_json, CompositeKey, StateStore};

pub const INSTRUCTION: &str = "Instruction";
pub const HISTORY: &str = "InstructionHistory";

fn side_key(object_type: &str, side: Side, key: &InstructionKey) -> Result<CompositeKey, StateError> {
    let attrs = key.attributes();
    CompositeKey::new(object_type, std::iter::once(side.as_str()).chain(attrs))
}

pub fn instruction_key(side: Side, key: &InstructionKey) -> Result<CompositeKey, StateError> {
    side_key(INSTRUCTION, side, key)
}

pub fn history_key(side: Side, key: &InstructionKey) -> Result<CompositeKey, StateError> {
    side_key(HISTORY, side, key)
}

pub fn find<S: StateStore + ?Sized>(
    store: &mut S,
    side: Side,
    key: &InstructionKey,
) -> Result<Option<Instruction>, StoreError> {
    Ok(get_json(store, &instruction_key(side, key)?)?)
}

pub fn get<S: StateStore + ?Sized>(
    store: &mut S,
    side: Side,
    key: &InstructionKey,
) -> Result<Instruction, StoreError> {
    find(store, side, key)?.ok_or_else(|| StoreError::NotFound {
        key: format!("{}:{}", side, key),
    })
}

pub fn exists<S: StateStore + ?Sized>(
    store: &mut S,
    side: Side,
    key: &InstructionKey,
) -> Result<bool, StoreError> {
    Ok(store.get_state(&instruction_key(side, key)?)?.is_some())
}

/// Persist an instruction half.
///
/// The stored record is re-read first: terminal records are immutable and
/// only forward transitions are accepted. New records may start in any
/// status but `Executed`. Returns the record as written, with its version
/// bumped.
pub fn put<S: StateStore + ?Sized>(
    store: &mut S,
    instruction: &Instruction,
) -> Result<Instruction, StoreError> {
    let key = instruction.key();
    let state_key = instruction_key(instruction.side, &key)?;
    let label = || format!("{}:{}", instruction.side, key);

    let version = match get_json::<Instruction, _>(store, &state_key)? {
        Some(stored) if stored.is_terminal() => {
            return Err(StoreError::ImmutableRecord {
                key: label(),
                status: stored.status.to_string(),
            });
        }
        Some(stored) => {
            if !stored.status.can_transition_to(instruction.status) {
                return Err(StoreError::IllegalTransition {
                    key: label(),
                    from: stored.status.to_string(),
                    to: instruction.status.to_string(),
                });
            }
            stored.version + 1
        }
        None => {
            if !instruction.status.is_initial_state() {
                return Err(StoreError::IllegalTransition {
                    key: label(),
                    from: "none".to_string(),
                    to: instruction.status.to_string(),
                });
            }
            1
        }
    };

    let mut written = instruction.clone();
    written.version = version;
    put_json(store, &state_key, &written)?;
    Ok(written)
}

/// All stored instructions in key order.
pub fn list<S: StateStore + ?Sized>(store: &mut S) -> Result<Vec<Instruction>, StoreError> {
    Ok(scan_json::<Instruction, _>(store, INSTRUCTION, &[])?
        .into_iter()
        .map(|(_, instruction)| instruction)
        .collect())
}

/// Audit trail of one instruction half, oldest first.
pub fn history<S: StateStore + ?Sized>(
    store: &mut S,
    side: Side,
    key: &InstructionKey,
) -> Result<Vec<HistoryEntry>, StoreError> {
    Ok(get_json(store, &history_key(side, key)?)?.unwrap_or_default())
}

pub fn append_history<S: StateStore + ?Sized>(
    store: &mut S,
    side: Side,
    key: &InstructionKey,
    entry: HistoryEntry,
) -> Result<(), StoreError> {
    let state_key = history_key(side, key)?;
    let mut entries: Vec<HistoryEntry> = get_json(store, &state_key)?.unwrap_or_default();
    entries.push(entry);
    put_json(store, &state_key, &entries)?;
    Ok(())
}
