//! Matching and settlement engine
//!
//! A submission is one half of a transfer. The first half waits as
//! `Initial`; the second half is compared with it on the mirrored terms and,
//! when they agree, both halves are matched and settled in the same
//! invocation. Settlement failure rejects both halves and moves nothing.
//!
//! Every decision is taken on records re-read through the stub, so a
//! concurrent invocation touching the same keys fails the host's MVCC check
//! instead of double-settling.

use tracing::{debug, info, warn};
use types::errors::RejectReason;
use types::instruction::{HistoryEntry, Instruction, InstructionStatus, Side, TransferTerms, TransferType};

use crate::config::ChaincodeConfig;
use crate::errors::{ChaincodeError, HoldingError, StoreError};
use crate::events::{LedgerEvent, PaymentUpdated, StatusChanged};
use crate::holdings;
use crate::payment;
use crate::state::ChaincodeStub;
use crate::store;
use crate::validation::{validate_instruction, ValidationResult};

/// Result of one submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOutcome {
    /// The submitting half as stored after this invocation
    pub instruction: Instruction,
    /// The counter half, when this invocation changed it
    pub counter: Option<Instruction>,
    /// Redelivery of an earlier submission; nothing was written
    pub replayed: bool,
}

impl SubmitOutcome {
    fn replayed(instruction: Instruction) -> Self {
        Self {
            instruction,
            counter: None,
            replayed: true,
        }
    }

    fn single(instruction: Instruction) -> Self {
        Self {
            instruction,
            counter: None,
            replayed: false,
        }
    }

    fn pair(instruction: Instruction, counter: Instruction) -> Self {
        Self {
            instruction,
            counter: Some(counter),
            replayed: false,
        }
    }

    pub fn status(&self) -> InstructionStatus {
        self.instruction.status
    }
}

/// Submit one half of a transfer.
pub fn submit<S: ChaincodeStub + ?Sized>(
    stub: &mut S,
    config: &ChaincodeConfig,
    side: Side,
    terms: TransferTerms,
) -> Result<SubmitOutcome, ChaincodeError> {
    let key = terms.key();
    let tx_id = stub.tx_id().to_string();

    if let Some(prior) = store::find(stub, side, &key)? {
        if prior.is_terminal() || prior.terms == terms {
            debug!(tx_id = %tx_id, %side, %key, status = %prior.status, "redelivered submission");
            return Ok(SubmitOutcome::replayed(prior));
        }
        return Err(StoreError::DuplicateInstruction {
            key: format!("{}:{}", side, key),
        }
        .into());
    }

    let submitted = Instruction::new(side, terms, &tx_id);

    if let ValidationResult::Reject(reason) = validate_instruction(stub, &submitted.terms)? {
        warn!(tx_id = %tx_id, %side, %key, code = reason.code(), %reason, "submission failed validation");
        let rejected = reject(stub, config, &submitted, reason)?;
        // a waiting counter can no longer match
        return match store::find(stub, side.counter(), &key)? {
            Some(counter) if counter.status == InstructionStatus::Initial => {
                warn!(tx_id = %tx_id, %key, "rejecting waiting counter-instruction");
                let other = reject(stub, config, &counter, RejectReason::CounterInstructionRejected)?;
                Ok(SubmitOutcome::pair(rejected, other))
            }
            _ => Ok(SubmitOutcome::single(rejected)),
        };
    }

    let counter = match store::find(stub, side.counter(), &key)? {
        None => {
            let stored = persist(stub, config, &submitted)?;
            info!(tx_id = %tx_id, %side, %key, "instruction awaiting counter-instruction");
            return Ok(SubmitOutcome::single(stored));
        }
        Some(counter) => counter,
    };

    match counter.status {
        InstructionStatus::Initial => {}
        InstructionStatus::Rejected => {
            warn!(tx_id = %tx_id, %side, %key, "counter-instruction already rejected");
            let rejected = reject(stub, config, &submitted, RejectReason::CounterInstructionRejected)?;
            return Ok(SubmitOutcome::single(rejected));
        }
        status => {
            return Err(StoreError::IllegalTransition {
                key: format!("{}:{}", counter.side, key),
                from: status.to_string(),
                to: InstructionStatus::Matched.to_string(),
            }
            .into());
        }
    }

    if let Some(field) = submitted.terms.first_mirror_mismatch(&counter.terms) {
        let reason = RejectReason::MatchMismatch { field };
        warn!(tx_id = %tx_id, %key, %field, "counter-instruction mismatch, rejecting both halves");
        let own = reject(stub, config, &submitted, reason.clone())?;
        let other = reject(stub, config, &counter, reason)?;
        return Ok(SubmitOutcome::pair(own, other));
    }

    let own = advance(stub, config, &submitted, InstructionStatus::Matched, None)?;
    let other = advance(stub, config, &counter, InstructionStatus::Matched, None)?;
    info!(tx_id = %tx_id, %key, "instructions matched");

    settle(stub, config, own, other)
}

/// Settle a matched pair: move the securities, record the payment leg of a
/// DVP transfer, then mark both halves executed.
fn settle<S: ChaincodeStub + ?Sized>(
    stub: &mut S,
    config: &ChaincodeConfig,
    own: Instruction,
    other: Instruction,
) -> Result<SubmitOutcome, ChaincodeError> {
    let terms = &own.terms;
    let key = terms.key();
    let tx_id = stub.tx_id().to_string();

    match holdings::transfer(stub, &terms.holding_from(), &terms.holding_to(), terms.quantity) {
        Ok(()) => {}
        Err(HoldingError::Insufficient { required, available, .. }) => {
            let reason = RejectReason::InsufficientHolding {
                security: terms.security.clone(),
                required,
                available,
            };
            warn!(tx_id = %tx_id, %key, %required, %available, "settlement failed, insufficient holding");
            let own = advance(stub, config, &own, InstructionStatus::Rejected, Some(reason.clone()))?;
            let other = advance(stub, config, &other, InstructionStatus::Rejected, Some(reason))?;
            return Ok(SubmitOutcome::pair(own, other));
        }
        Err(err) => return Err(err.into()),
    }

    if let (TransferType::Dvp, Some(leg)) = (terms.transfer_type, &terms.payment) {
        let record = payment::record(stub, &key, leg, &tx_id)?;
        if config.emit_events {
            LedgerEvent::PaymentUpdated(PaymentUpdated {
                key: key.clone(),
                amount: record.leg.payment_amount,
                currency: record.leg.payment_currency.clone(),
                status: record.status,
            })
            .emit(stub)?;
        }
    }

    let own = advance(stub, config, &own, InstructionStatus::Executed, None)?;
    let other = advance(stub, config, &other, InstructionStatus::Executed, None)?;
    info!(
        tx_id = %tx_id,
        %key,
        quantity = %own.terms.quantity,
        transfer_type = %own.terms.transfer_type,
        "transfer executed"
    );
    Ok(SubmitOutcome::pair(own, other))
}

fn reject<S: ChaincodeStub + ?Sized>(
    stub: &mut S,
    config: &ChaincodeConfig,
    instruction: &Instruction,
    reason: RejectReason,
) -> Result<Instruction, ChaincodeError> {
    advance(stub, config, instruction, InstructionStatus::Rejected, Some(reason))
}

fn advance<S: ChaincodeStub + ?Sized>(
    stub: &mut S,
    config: &ChaincodeConfig,
    instruction: &Instruction,
    status: InstructionStatus,
    reason: Option<RejectReason>,
) -> Result<Instruction, ChaincodeError> {
    let tx_id = stub.tx_id().to_string();
    persist(stub, config, &instruction.with_status(status, reason, &tx_id))
}

/// Write a status change together with its audit entry and event.
fn persist<S: ChaincodeStub + ?Sized>(
    stub: &mut S,
    config: &ChaincodeConfig,
    instruction: &Instruction,
) -> Result<Instruction, ChaincodeError> {
    let written = store::put(stub, instruction)?;
    let key = written.key();

    if config.record_history {
        let entry = HistoryEntry {
            status: written.status,
            reject_reason: written.reject_reason.clone(),
            tx_id: stub.tx_id().to_string(),
            timestamp: stub.tx_timestamp(),
        };
        store::append_history(stub, written.side, &key, entry)?;
    }

    if config.emit_events {
        LedgerEvent::StatusChanged(StatusChanged {
            side: written.side,
            key: key.clone(),
            status: written.status,
            reason: written.reject_reason.clone(),
        })
        .emit(stub)?;
    }

    debug!(side = %written.side, %key, status = %written.status, version = written.version, "instruction persisted");
    Ok(written)
}
