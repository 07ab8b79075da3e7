//! DVP payment ledger
//!
//! A payment record is written in the same transaction that settles the
//! securities leg of a DVP transfer, under `("Payment", <instruction key>)`.
//! The cash movement itself happens off-ledger and is acknowledged through
//! `confirm`.

use types::instruction::{InstructionKey, PaymentLeg, PaymentRecord, PaymentStatus};

use crate::errors::{StateError, StoreError};
use crate::state::{get_json, put_json, CompositeKey, StateStore};

pub const PAYMENT: &str = "Payment";

pub fn payment_key(key: &InstructionKey) -> Result<CompositeKey, StateError> {
    CompositeKey::new(PAYMENT, key.attributes())
}

/// Write a pending payment record for a settled transfer.
pub fn record<S: StateStore + ?Sized>(
    store: &mut S,
    key: &InstructionKey,
    leg: &PaymentLeg,
    tx_id: &str,
) -> Result<PaymentRecord, StoreError> {
    let record = PaymentRecord {
        instruction: key.clone(),
        leg: leg.clone(),
        status: PaymentStatus::Pending,
        recorded_tx: tx_id.to_string(),
        confirmed_tx: None,
    };
    put_json(store, &payment_key(key)?, &record)?;
    Ok(record)
}

pub fn find<S: StateStore + ?Sized>(
    store: &mut S,
    key: &InstructionKey,
) -> Result<Option<PaymentRecord>, StoreError> {
    Ok(get_json(store, &payment_key(key)?)?)
}

pub fn get<S: StateStore + ?Sized>(
    store: &mut S,
    key: &InstructionKey,
) -> Result<PaymentRecord, StoreError> {
    find(store, key)?.ok_or_else(|| StoreError::NotFound {
        key: format!("payment:{}", key),
    })
}

/// Mark the payment as confirmed.
///
/// Confirming twice is a no-op; the returned flag tells whether anything
/// changed.
pub fn confirm<S: StateStore + ?Sized>(
    store: &mut S,
    key: &InstructionKey,
    tx_id: &str,
) -> Result<(PaymentRecord, bool), StoreError> {
    let mut record = get(store, key)?;
    if record.status == PaymentStatus::Confirmed {
        return Ok((record, false));
    }
    record.status = PaymentStatus::Confirmed;
    record.confirmed_tx = Some(tx_id.to_string());
    put_json(store, &payment_key(key)?, &record)?;
    Ok((record, true))
}
