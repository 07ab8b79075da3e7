//! Holdings: quantity of each security per (account, division)
//!
//! Records live under `("Holding", account, division, security)`. A missing
//! record reads as zero; records are never deleted, a fully delivered
//! position stays at zero.

use types::ids::HoldingRef;
use types::numeric::Quantity;
use types::participant::HoldingRecord;

use crate::errors::{HoldingError, StateError};
use crate::state::{get_json, put_json, scan_json, CompositeKey, StateStore};

pub const HOLDING: &str = "Holding";

pub fn holding_key(holding: &HoldingRef) -> Result<CompositeKey, StateError> {
    CompositeKey::new(
        HOLDING,
        [&holding.account, &holding.division, &holding.security],
    )
}

/// Current record, zero if the position was never credited.
pub fn record<S: StateStore + ?Sized>(
    store: &mut S,
    holding: &HoldingRef,
) -> Result<HoldingRecord, HoldingError> {
    Ok(get_json(store, &holding_key(holding)?)?.unwrap_or_else(|| HoldingRecord::empty(holding)))
}

pub fn balance_of<S: StateStore + ?Sized>(
    store: &mut S,
    holding: &HoldingRef,
) -> Result<Quantity, HoldingError> {
    Ok(record(store, holding)?.quantity)
}

// ───────────────────────── Movements ─────────────────────────

/// Credit with overflow protection.
pub fn credit<S: StateStore + ?Sized>(
    store: &mut S,
    holding: &HoldingRef,
    quantity: Quantity,
) -> Result<Quantity, HoldingError> {
    let mut current = record(store, holding)?;
    current.quantity = current
        .quantity
        .checked_add(quantity)
        .ok_or_else(|| HoldingError::Overflow {
            holding: holding.to_string(),
        })?;
    put_json(store, &holding_key(holding)?, &current)?;
    Ok(current.quantity)
}

/// Debit, refusing to go below zero.
pub fn debit<S: StateStore + ?Sized>(
    store: &mut S,
    holding: &HoldingRef,
    quantity: Quantity,
) -> Result<Quantity, HoldingError> {
    let mut current = record(store, holding)?;
    current.quantity =
        current
            .quantity
            .checked_sub(quantity)
            .ok_or_else(|| HoldingError::Insufficient {
                holding: holding.to_string(),
                required: quantity,
                available: current.quantity,
            })?;
    put_json(store, &holding_key(holding)?, &current)?;
    Ok(current.quantity)
}

/// Move `quantity` from one position to another.
///
/// The debit is checked before anything is written, so an insufficient
/// source leaves both positions untouched.
pub fn transfer<S: StateStore + ?Sized>(
    store: &mut S,
    from: &HoldingRef,
    to: &HoldingRef,
    quantity: Quantity,
) -> Result<(), HoldingError> {
    debit(store, from, quantity)?;
    credit(store, to, quantity)?;
    Ok(())
}

/// Every non-empty position in a holding location.
pub fn positions<S: StateStore + ?Sized>(
    store: &mut S,
    account: &str,
    division: &str,
) -> Result<Vec<HoldingRecord>, HoldingError> {
    Ok(scan_json::<HoldingRecord, _>(store, HOLDING, &[account, division])?
        .into_iter()
        .map(|(_, record)| record)
        .filter(|record| !record.quantity.is_zero())
        .collect())
}
