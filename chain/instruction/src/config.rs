//! Chaincode configuration

use serde::{Deserialize, Serialize};

/// Behaviour switches fixed at deployment time.
///
/// Every node of a network must run with the same configuration, otherwise
/// their replays diverge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChaincodeConfig {
    /// Accept `transfer` arguments without a leading `fop`/`dvp`, as `fop`
    pub legacy_fallback: bool,
    /// Append an audit entry for every status change
    pub record_history: bool,
    /// Emit ledger events for registrations and status changes
    pub emit_events: bool,
}

impl Default for ChaincodeConfig {
    fn default() -> Self {
        Self {
            legacy_fallback: true,
            record_history: true,
            emit_events: true,
        }
    }
}

impl ChaincodeConfig {
    /// Parse a JSON document; absent fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ChaincodeConfig::default();
        assert!(config.legacy_fallback);
        assert!(config.record_history);
        assert!(config.emit_events);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = ChaincodeConfig::from_json(r#"{"legacyFallback": false}"#).unwrap();
        assert!(!config.legacy_fallback);
        assert!(config.record_history);
    }

    #[test]
    fn test_empty_json() {
        assert_eq!(ChaincodeConfig::from_json("{}").unwrap(), ChaincodeConfig::default());
    }
}
