//! Participants and their holdings
//!
//! An `Organization` is what the registry stores. A `ParticipantSeed` is what
//! the bootstrap loader hands over: the same shape, plus optional opening
//! positions per balance that are moved into holding records and never kept
//! on the organization itself.

use crate::ids::{Balance, HoldingRef};
use crate::numeric::Quantity;
use serde::{Deserialize, Serialize};

/// Registered custodial participant.
///
/// Field order matters: this is serialized verbatim under every
/// `Authentication` key of the participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub organization: String,
    pub deponent: String,
    pub balances: Vec<Balance>,
}

impl Organization {
    /// Whether this organization owns the given holding location.
    pub fn owns(&self, balance: &Balance) -> bool {
        self.balances.iter().any(|b| b == balance)
    }
}

/// Opening position of a security inside a balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub security: String,
    pub quantity: Quantity,
}

/// Balance entry of a bootstrap seed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSeed {
    pub account: String,
    pub division: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub holdings: Vec<Position>,
}

/// One element of the `init` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantSeed {
    pub organization: String,
    pub deponent: String,
    pub balances: Vec<BalanceSeed>,
}

impl ParticipantSeed {
    /// The registry record, opening positions stripped.
    pub fn to_organization(&self) -> Organization {
        Organization {
            organization: self.organization.clone(),
            deponent: self.deponent.clone(),
            balances: self
                .balances
                .iter()
                .map(|b| Balance::new(b.account.clone(), b.division.clone()))
                .collect(),
        }
    }

    /// Opening positions in seed order.
    pub fn positions(&self) -> Vec<(HoldingRef, Quantity)> {
        self.balances
            .iter()
            .flat_map(|b| {
                b.holdings.iter().map(move |p| {
                    (
                        HoldingRef::new(b.account.clone(), b.division.clone(), p.security.clone()),
                        p.quantity,
                    )
                })
            })
            .collect()
    }
}

/// Stored quantity of one security in one holding location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoldingRecord {
    pub account: String,
    pub division: String,
    pub security: String,
    pub quantity: Quantity,
}

impl HoldingRecord {
    pub fn empty(holding: &HoldingRef) -> Self {
        Self {
            account: holding.account.clone(),
            division: holding.division.clone(),
            security: holding.security.clone(),
            quantity: Quantity::ZERO,
        }
    }
}
