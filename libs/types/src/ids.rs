//! Holding location identifiers
//!
//! Nothing here is generated: identities are derived from business fields so
//! that every node replaying the same invocations computes the same keys.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A holding location: an (account, division) pair.
///
/// Pairs are unique across the registry and owned by exactly one deponent.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Balance {
    pub account: String,
    pub division: String,
}

impl Balance {
    pub fn new(account: impl Into<String>, division: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            division: division.into(),
        }
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.account, self.division)
    }
}

/// A position inside a holding location: (account, division, security).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HoldingRef {
    pub account: String,
    pub division: String,
    pub security: String,
}

impl HoldingRef {
    pub fn new(
        account: impl Into<String>,
        division: impl Into<String>,
        security: impl Into<String>,
    ) -> Self {
        Self {
            account: account.into(),
            division: division.into(),
            security: security.into(),
        }
    }

    /// The holding location this position lives in.
    pub fn balance(&self) -> Balance {
        Balance::new(self.account.clone(), self.division.clone())
    }
}

impl fmt::Display for HoldingRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.account, self.division, self.security)
    }
}
