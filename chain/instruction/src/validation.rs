//! Submission validation
//!
//! Checks a submission against its own fields and the participant registry.
//! A failed check is not an error: the submission is recorded as rejected
//! with the returned reason.

use types::errors::{Leg, RejectReason};
use types::ids::Balance;
use types::instruction::{TransferTerms, TransferType};

use crate::errors::RegistryError;
use crate::registry;
use crate::state::StateStore;

/// Outcome of validating one submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    Pass,
    Reject(RejectReason),
}

impl ValidationResult {
    pub fn is_pass(&self) -> bool {
        matches!(self, ValidationResult::Pass)
    }
}

/// Validate instructed terms.
///
/// Returns the first failing check. Checks performed (in order):
/// 1. Quantity is positive
/// 2. Security code is present
/// 3. From leg is held by `deponentFrom`, then to leg by `deponentTo`
/// 4. DVP payment amount is positive and currency present
/// 5. Payment leg present exactly for DVP
pub fn validate_instruction<S: StateStore + ?Sized>(
    store: &mut S,
    terms: &TransferTerms,
) -> Result<ValidationResult, RegistryError> {
    if terms.quantity.is_zero() {
        return Ok(ValidationResult::Reject(RejectReason::InvalidQuantity));
    }

    if terms.security.trim().is_empty() {
        return Ok(ValidationResult::Reject(RejectReason::EmptySecurity));
    }

    let legs = [
        (Leg::From, terms.balance_from(), &terms.deponent_from),
        (Leg::To, terms.balance_to(), &terms.deponent_to),
    ];
    for (leg, balance, deponent) in legs {
        if !registry::authenticate(store, deponent, &balance)? {
            return Ok(ValidationResult::Reject(unauthenticated(leg, balance, deponent)));
        }
    }

    if let (TransferType::Dvp, Some(payment)) = (terms.transfer_type, &terms.payment) {
        if !payment.payment_amount.is_positive() {
            return Ok(ValidationResult::Reject(RejectReason::InvalidPaymentAmount));
        }
        if payment.payment_currency.trim().is_empty() {
            return Ok(ValidationResult::Reject(RejectReason::EmptyPaymentCurrency));
        }
    }

    let has_leg = terms.payment.is_some();
    let needs_leg = terms.transfer_type == TransferType::Dvp;
    if has_leg != needs_leg {
        return Ok(ValidationResult::Reject(RejectReason::LegTypeMismatch {
            transfer_type: terms.transfer_type,
        }));
    }

    Ok(ValidationResult::Pass)
}

fn unauthenticated(leg: Leg, balance: Balance, deponent: &str) -> RejectReason {
    RejectReason::UnauthenticatedLeg {
        leg,
        account: balance.account,
        division: balance.division,
        deponent: deponent.to_string(),
    }
}
