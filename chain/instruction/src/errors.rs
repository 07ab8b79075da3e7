//! Chaincode error types
//!
//! Errors abort the invocation: nothing an erroring invocation wrote is
//! committed. Outcomes that must be kept for audit (rejections) are not
//! errors, see `types::errors::RejectReason`.

use thiserror::Error;
use types::errors::NumericError;
use types::numeric::Quantity;

/// World-state access errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StateError {
    #[error("Invalid composite key: {reason}")]
    InvalidKey { reason: String },

    #[error("Codec error: {0}")]
    Codec(String),
}

impl StateError {
    pub fn code(&self) -> &'static str {
        match self {
            StateError::InvalidKey { .. } => "INVALID_KEY",
            StateError::Codec(_) => "CODEC",
        }
    }
}

impl From<serde_json::Error> for StateError {
    fn from(err: serde_json::Error) -> Self {
        StateError::Codec(err.to_string())
    }
}

/// Participant registry errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("Unknown balance: {account}/{division}")]
    UnknownBalance { account: String, division: String },

    #[error("Balance {account}/{division} already belongs to deponent {owner}")]
    DuplicateBalance {
        account: String,
        division: String,
        owner: String,
    },

    #[error("Participant not found: {deponent}")]
    UnknownParticipant { deponent: String },

    #[error(transparent)]
    State(#[from] StateError),
}

/// Holding (position) errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HoldingError {
    #[error("Insufficient holding {holding}: required {required}, available {available}")]
    Insufficient {
        holding: String,
        required: Quantity,
        available: Quantity,
    },

    #[error("Arithmetic overflow crediting holding {holding}")]
    Overflow { holding: String },

    #[error(transparent)]
    State(#[from] StateError),
}

/// Instruction and payment store errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Record not found: {key}")]
    NotFound { key: String },

    #[error("Record {key} is {status} and can no longer change")]
    ImmutableRecord { key: String, status: String },

    #[error("Illegal transition for {key}: {from} -> {to}")]
    IllegalTransition { key: String, from: String, to: String },

    #[error("Instruction {key} was already submitted with different terms")]
    DuplicateInstruction { key: String },

    #[error(transparent)]
    State(#[from] StateError),
}

/// Invocation argument errors, raised before any validation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ArgumentError {
    #[error("Expected {expected} arguments for {shape}, got {got}")]
    WrongArity {
        shape: &'static str,
        expected: usize,
        got: usize,
    },

    #[error(transparent)]
    InvalidNumber(#[from] NumericError),

    #[error("Invalid date (expected YYYY-MM-DD): {value}")]
    InvalidDate { value: String },

    #[error("Invalid side: {value}")]
    InvalidSide { value: String },

    #[error("Invalid transfer type: {value}")]
    InvalidTransferType { value: String },

    #[error("Missing transfer type discriminator")]
    MissingDiscriminator,

    #[error("Argument contains a NUL character: {value:?}")]
    InvalidCharacter { value: String },

    #[error("Invalid JSON payload: {0}")]
    InvalidJson(String),
}

/// Top-level chaincode error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChaincodeError {
    #[error("Malformed arguments: {0}")]
    Arguments(#[from] ArgumentError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Holding(#[from] HoldingError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error("Unknown function: {name}")]
    UnknownFunction { name: String },
}

impl ChaincodeError {
    /// Taxonomy code, unique per failure case
    pub fn code(&self) -> &'static str {
        match self {
            ChaincodeError::Arguments(_) => "MALFORMED_ARGUMENTS",
            ChaincodeError::Registry(err) => match err {
                RegistryError::UnknownBalance { .. } => "UNKNOWN_BALANCE",
                RegistryError::DuplicateBalance { .. } => "DUPLICATE_BALANCE",
                RegistryError::UnknownParticipant { .. } => "NOT_FOUND",
                RegistryError::State(state) => state.code(),
            },
            ChaincodeError::Holding(err) => match err {
                HoldingError::Insufficient { .. } => "INSUFFICIENT_HOLDING",
                HoldingError::Overflow { .. } => "HOLDING_OVERFLOW",
                HoldingError::State(state) => state.code(),
            },
            ChaincodeError::Store(err) => match err {
                StoreError::NotFound { .. } => "NOT_FOUND",
                StoreError::ImmutableRecord { .. } => "IMMUTABLE_RECORD",
                StoreError::IllegalTransition { .. } => "ILLEGAL_TRANSITION",
                StoreError::DuplicateInstruction { .. } => "DUPLICATE_INSTRUCTION",
                StoreError::State(state) => state.code(),
            },
            ChaincodeError::State(state) => state.code(),
            ChaincodeError::UnknownFunction { .. } => "UNKNOWN_FUNCTION",
        }
    }

    /// Whether the caller, not the ledger, is at fault
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self.code(),
            "INVALID_KEY" | "CODEC" | "HOLDING_OVERFLOW" | "ILLEGAL_TRANSITION"
        )
    }
}

/// Host-side commit errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    #[error("MVCC read conflict on {key}")]
    MvccConflict { key: String },
}

impl LedgerError {
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::MvccConflict { .. } => "MVCC_CONFLICT",
        }
    }
}
