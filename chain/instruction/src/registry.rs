//! Participant registry
//!
//! Every (account, division) of a participant is stored under
//! `("Authentication", account, division)` with the full organization record
//! as value, so authenticating a leg is a single key lookup. The same record
//! is kept under `("Participant", deponent)`.

use tracing::info;
use types::ids::Balance;
use types::participant::Organization;

use crate::errors::{RegistryError, StateError};
use crate::state::{get_json, put_json, CompositeKey, StateStore};

pub const AUTHENTICATION: &str = "Authentication";
pub const PARTICIPANT: &str = "Participant";

pub fn authentication_key(balance: &Balance) -> Result<CompositeKey, StateError> {
    CompositeKey::new(AUTHENTICATION, [&balance.account, &balance.division])
}

pub fn participant_key(deponent: &str) -> Result<CompositeKey, StateError> {
    CompositeKey::new(PARTICIPANT, [deponent])
}

/// Register a participant and all of its balances.
///
/// Fails without writing anything if one of the balances is owned by a
/// different deponent. Registering the same balance again for its owner
/// overwrites the record.
pub fn register<S: StateStore + ?Sized>(
    store: &mut S,
    organization: &Organization,
) -> Result<(), RegistryError> {
    for balance in &organization.balances {
        if let Some(owner) = find_owner(store, balance)? {
            if owner.deponent != organization.deponent {
                return Err(RegistryError::DuplicateBalance {
                    account: balance.account.clone(),
                    division: balance.division.clone(),
                    owner: owner.deponent,
                });
            }
        }
    }

    put_json(store, &participant_key(&organization.deponent)?, organization)?;
    for balance in &organization.balances {
        put_json(store, &authentication_key(balance)?, organization)?;
    }

    info!(
        organization = %organization.organization,
        deponent = %organization.deponent,
        balances = organization.balances.len(),
        "participant registered"
    );
    Ok(())
}

/// Organization holding the balance, if any.
pub fn find_owner<S: StateStore + ?Sized>(
    store: &mut S,
    balance: &Balance,
) -> Result<Option<Organization>, RegistryError> {
    Ok(get_json(store, &authentication_key(balance)?)?)
}

/// Deponent code of the balance owner.
pub fn resolve_owner<S: StateStore + ?Sized>(
    store: &mut S,
    balance: &Balance,
) -> Result<String, RegistryError> {
    find_owner(store, balance)?
        .map(|org| org.deponent)
        .ok_or_else(|| RegistryError::UnknownBalance {
            account: balance.account.clone(),
            division: balance.division.clone(),
        })
}

/// Whether `deponent` controls the balance. Unknown balances authenticate
/// nobody.
pub fn authenticate<S: StateStore + ?Sized>(
    store: &mut S,
    deponent: &str,
    balance: &Balance,
) -> Result<bool, RegistryError> {
    match resolve_owner(store, balance) {
        Ok(owner) => Ok(owner == deponent),
        Err(RegistryError::UnknownBalance { .. }) => Ok(false),
        Err(err) => Err(err),
    }
}

/// Registered organization by deponent code.
pub fn participant<S: StateStore + ?Sized>(
    store: &mut S,
    deponent: &str,
) -> Result<Organization, RegistryError> {
    get_json(store, &participant_key(deponent)?)?.ok_or_else(|| {
        RegistryError::UnknownParticipant {
            deponent: deponent.to_string(),
        }
    })
}
