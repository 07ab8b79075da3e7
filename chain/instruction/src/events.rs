//! Chaincode events
//!
//! Events are emitted through the stub and committed with the transaction
//! that produced them, so listeners never see an event for a rolled-back
//! change.

use serde::{Deserialize, Serialize};
use types::instruction::{InstructionKey, InstructionStatus, PaymentStatus, Side};
use types::errors::RejectReason;
use types::numeric::Amount;

use crate::errors::StateError;
use crate::state::ChaincodeStub;

/// Participant loaded at bootstrap
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantRegistered {
    pub organization: String,
    pub deponent: String,
    pub balances: usize,
}

/// Instruction half changed status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChanged {
    pub side: Side,
    pub key: InstructionKey,
    pub status: InstructionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<RejectReason>,
}

/// Payment leg persisted or confirmed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentUpdated {
    pub key: InstructionKey,
    pub amount: Amount,
    pub currency: String,
    pub status: PaymentStatus,
}

/// Enum wrapper for all chaincode events, enabling uniform handling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    ParticipantRegistered(ParticipantRegistered),
    StatusChanged(StatusChanged),
    PaymentUpdated(PaymentUpdated),
}

impl LedgerEvent {
    /// Event name as seen by ledger listeners
    pub fn name(&self) -> &'static str {
        match self {
            LedgerEvent::ParticipantRegistered(_) => "ParticipantRegistered",
            LedgerEvent::StatusChanged(e) => match e.status {
                InstructionStatus::Initial => "InstructionSubmitted",
                InstructionStatus::Matched => "InstructionMatched",
                InstructionStatus::Executed => "InstructionExecuted",
                InstructionStatus::Rejected => "InstructionRejected",
            },
            LedgerEvent::PaymentUpdated(e) => match e.status {
                PaymentStatus::Pending => "PaymentRecorded",
                PaymentStatus::Confirmed => "PaymentConfirmed",
            },
        }
    }

    /// Serialize and hand the event to the stub.
    pub fn emit<S: ChaincodeStub + ?Sized>(&self, stub: &mut S) -> Result<(), StateError> {
        let payload = serde_json::to_vec(self)?;
        stub.set_event(self.name(), payload);
        Ok(())
    }
}
