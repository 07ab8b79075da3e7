//! Transfer instruction types
//!
//! An economic transfer is instructed twice: once by the transferer side and
//! once by the receiver side. Both halves share the same `InstructionKey`;
//! the store keys them apart by `Side`.

use crate::errors::RejectReason;
use crate::ids::{Balance, HoldingRef};
use crate::numeric::{Amount, Quantity};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Transfer type discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferType {
    /// Free of payment
    Fop,
    /// Delivery versus payment
    Dvp,
}

impl TransferType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferType::Fop => "fop",
            TransferType::Dvp => "dvp",
        }
    }
}

impl FromStr for TransferType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fop" => Ok(TransferType::Fop),
            "dvp" => Ok(TransferType::Dvp),
            _ => Err(()),
        }
    }
}

impl fmt::Display for TransferType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which half of the transfer a submission instructs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Delivering side (fromLeg), submitted through `transfer`
    Transferer,
    /// Receiving side (toLeg), submitted through `receive`
    Receiver,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Transferer => "transferer",
            Side::Receiver => "receiver",
        }
    }

    /// The side that must submit the counter-instruction
    pub fn counter(&self) -> Self {
        match self {
            Side::Transferer => Side::Receiver,
            Side::Receiver => Side::Transferer,
        }
    }
}

impl FromStr for Side {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "transferer" => Ok(Side::Transferer),
            "receiver" => Ok(Side::Receiver),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Instruction lifecycle status
///
/// `Initial → Matched → Executed`, with `Rejected` reachable from any
/// non-terminal state. Executed and Rejected are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstructionStatus {
    Initial,
    Matched,
    Executed,
    Rejected,
}

impl InstructionStatus {
    /// Check if status is terminal (no further transitions possible)
    pub fn is_terminal(&self) -> bool {
        matches!(self, InstructionStatus::Executed | InstructionStatus::Rejected)
    }

    /// Forward-only transition table
    pub fn can_transition_to(&self, next: InstructionStatus) -> bool {
        use InstructionStatus::*;
        matches!(
            (self, next),
            (Initial, Matched) | (Initial, Rejected) | (Matched, Executed) | (Matched, Rejected)
        )
    }

    /// Statuses a record may be created with
    pub fn is_initial_state(&self) -> bool {
        !matches!(self, InstructionStatus::Executed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InstructionStatus::Initial => "initial",
            InstructionStatus::Matched => "matched",
            InstructionStatus::Executed => "executed",
            InstructionStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for InstructionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cash leg of a DVP instruction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentLeg {
    pub transferer_account: String,
    pub transferer_bic: String,
    pub receiver_account: String,
    pub receiver_bic: String,
    pub payment_amount: Amount,
    pub payment_currency: String,
}

/// Identity of an economic transfer, shared by both halves.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstructionKey {
    pub transfer_type: TransferType,
    pub account_from: String,
    pub division_from: String,
    pub account_to: String,
    pub division_to: String,
    pub security: String,
    pub reference: String,
}

impl InstructionKey {
    /// Key attributes in composite-key order
    pub fn attributes(&self) -> [&str; 7] {
        [
            self.transfer_type.as_str(),
            &self.account_from,
            &self.division_from,
            &self.account_to,
            &self.division_to,
            &self.security,
            &self.reference,
        ]
    }
}

impl fmt::Display for InstructionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}/{}->{}/{}:{}:{}",
            self.transfer_type,
            self.account_from,
            self.division_from,
            self.account_to,
            self.division_to,
            self.security,
            self.reference
        )
    }
}

/// Fields whose values both halves must agree on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MirrorField {
    Quantity,
    TradeDate,
    DeponentFrom,
    DeponentTo,
    PaymentLeg,
}

impl fmt::Display for MirrorField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MirrorField::Quantity => "quantity",
            MirrorField::TradeDate => "tradeDate",
            MirrorField::DeponentFrom => "deponentFrom",
            MirrorField::DeponentTo => "deponentTo",
            MirrorField::PaymentLeg => "paymentLeg",
        };
        f.write_str(name)
    }
}

/// Everything a party instructs, as parsed from invocation arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferTerms {
    pub transfer_type: TransferType,
    pub account_from: String,
    pub division_from: String,
    pub account_to: String,
    pub division_to: String,
    pub security: String,
    pub quantity: Quantity,
    pub reference: String,
    pub instruction_date: NaiveDate,
    pub trade_date: NaiveDate,
    pub deponent_from: String,
    pub deponent_to: String,
    pub member_instruction_id: String,
    /// Opaque payload, stored as submitted
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment: Option<PaymentLeg>,
}

impl TransferTerms {
    pub fn key(&self) -> InstructionKey {
        InstructionKey {
            transfer_type: self.transfer_type,
            account_from: self.account_from.clone(),
            division_from: self.division_from.clone(),
            account_to: self.account_to.clone(),
            division_to: self.division_to.clone(),
            security: self.security.clone(),
            reference: self.reference.clone(),
        }
    }

    pub fn balance_from(&self) -> Balance {
        Balance::new(self.account_from.clone(), self.division_from.clone())
    }

    pub fn balance_to(&self) -> Balance {
        Balance::new(self.account_to.clone(), self.division_to.clone())
    }

    pub fn holding_from(&self) -> HoldingRef {
        HoldingRef::new(
            self.account_from.clone(),
            self.division_from.clone(),
            self.security.clone(),
        )
    }

    pub fn holding_to(&self) -> HoldingRef {
        HoldingRef::new(
            self.account_to.clone(),
            self.division_to.clone(),
            self.security.clone(),
        )
    }

    /// First mirrored field on which the counter-instruction disagrees.
    ///
    /// Key fields (type, accounts, divisions, security, reference) agree by
    /// construction since both halves were found under the same key.
    pub fn first_mirror_mismatch(&self, counter: &TransferTerms) -> Option<MirrorField> {
        if self.quantity != counter.quantity {
            return Some(MirrorField::Quantity);
        }
        if self.trade_date != counter.trade_date {
            return Some(MirrorField::TradeDate);
        }
        if self.deponent_from != counter.deponent_from {
            return Some(MirrorField::DeponentFrom);
        }
        if self.deponent_to != counter.deponent_to {
            return Some(MirrorField::DeponentTo);
        }
        if self.payment != counter.payment {
            return Some(MirrorField::PaymentLeg);
        }
        None
    }
}

/// Stored instruction half
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instruction {
    pub side: Side,
    #[serde(flatten)]
    pub terms: TransferTerms,
    pub status: InstructionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reject_reason: Option<RejectReason>,
    /// Incremented on every persisted change
    pub version: u64,
    pub created_tx: String,
    pub updated_tx: String,
}

impl Instruction {
    /// A fresh, not yet persisted instruction half
    pub fn new(side: Side, terms: TransferTerms, tx_id: &str) -> Self {
        Self {
            side,
            terms,
            status: InstructionStatus::Initial,
            reject_reason: None,
            version: 0,
            created_tx: tx_id.to_string(),
            updated_tx: tx_id.to_string(),
        }
    }

    pub fn key(&self) -> InstructionKey {
        self.terms.key()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Same party, same instructed terms
    pub fn same_submission(&self, other: &Instruction) -> bool {
        self.side == other.side && self.terms == other.terms
    }

    /// Copy with a new status, recording the rejection reason if any.
    pub fn with_status(
        &self,
        status: InstructionStatus,
        reason: Option<RejectReason>,
        tx_id: &str,
    ) -> Self {
        let mut next = self.clone();
        next.status = status;
        next.reject_reason = reason;
        next.updated_tx = tx_id.to_string();
        next
    }
}

/// One audit entry per status change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub status: InstructionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reject_reason: Option<RejectReason>,
    pub tx_id: String,
    pub timestamp: i64,
}

/// Settlement status of a DVP cash leg
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Recorded with the securities leg, awaiting cash confirmation
    Pending,
    /// Cash movement confirmed by the payment system
    Confirmed,
}

/// Payment leg persisted for a settled DVP transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    pub instruction: InstructionKey,
    pub leg: PaymentLeg,
    pub status: PaymentStatus,
    pub recorded_tx: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmed_tx: Option<String>,
}
