//! Types library for the securities instruction ledger
//!
//! This library provides the domain types shared by the chaincode and the
//! tooling around it. Every type here is serialized onto the ledger, so the
//! JSON shapes are part of the on-ledger format and must stay stable.
//!
//! # Modules
//! - `ids`: Holding locations (account/division, account/division/security)
//! - `numeric`: Lot quantities and payment amounts
//! - `participant`: Organizations, bootstrap seeds, holding records
//! - `instruction`: Transfer instructions, statuses, payment legs, history
//! - `errors`: Rejection reasons and parse errors

pub mod ids;
pub mod numeric;
pub mod participant;
pub mod instruction;
pub mod errors;

// Library version constant
pub const LIB_VERSION: &str = "1.0.0";

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::ids::*;
    pub use crate::numeric::*;
    pub use crate::participant::*;
    pub use crate::instruction::*;
    pub use crate::errors::*;
}
