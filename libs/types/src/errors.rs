//! Rejection reasons and parse errors
//!
//! A `RejectReason` is not an invocation failure: it is recorded on the
//! instruction, committed, and kept for audit. Each reason maps to one stable
//! taxonomy code so callers can tell which case fired.

use crate::instruction::{MirrorField, TransferType};
use crate::numeric::Quantity;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which leg of an instruction a check refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Leg {
    From,
    To,
}

impl std::fmt::Display for Leg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Leg::From => f.write_str("from"),
            Leg::To => f.write_str("to"),
        }
    }
}

/// Why an instruction ended up `Rejected`
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum RejectReason {
    #[error("quantity must be positive")]
    InvalidQuantity,

    #[error("security code is empty")]
    EmptySecurity,

    #[error("{leg} leg {account}/{division} is not held by deponent {deponent}")]
    UnauthenticatedLeg {
        leg: Leg,
        account: String,
        division: String,
        deponent: String,
    },

    #[error("payment amount must be positive")]
    InvalidPaymentAmount,

    #[error("payment currency is empty")]
    EmptyPaymentCurrency,

    #[error("payment leg does not match transfer type {transfer_type}")]
    LegTypeMismatch { transfer_type: TransferType },

    #[error("counter-instruction disagrees on {field}")]
    MatchMismatch { field: MirrorField },

    #[error("insufficient holding of {security}: required {required}, available {available}")]
    InsufficientHolding {
        security: String,
        required: Quantity,
        available: Quantity,
    },

    #[error("counter-instruction was already rejected")]
    CounterInstructionRejected,
}

impl RejectReason {
    /// Taxonomy code reported to callers
    pub fn code(&self) -> &'static str {
        match self {
            RejectReason::InvalidQuantity
            | RejectReason::EmptySecurity
            | RejectReason::UnauthenticatedLeg { .. }
            | RejectReason::InvalidPaymentAmount
            | RejectReason::EmptyPaymentCurrency
            | RejectReason::LegTypeMismatch { .. } => "VALIDATION_FAILED",
            RejectReason::MatchMismatch { .. } => "MATCH_MISMATCH",
            RejectReason::InsufficientHolding { .. } => "INSUFFICIENT_HOLDING",
            RejectReason::CounterInstructionRejected => "COUNTER_INSTRUCTION_REJECTED",
        }
    }

    /// Whether the reason came out of submission validation
    pub fn is_validation(&self) -> bool {
        self.code() == "VALIDATION_FAILED"
    }
}

/// Numeric parse errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NumericError {
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
}
