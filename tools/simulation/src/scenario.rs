//! Scenario scripts
//!
//! A scenario is a participant bootstrap followed by an ordered list of
//! invocations, optionally annotated with the status each one must return.
//! Scenarios are plain JSON so they can be written by hand, generated, or
//! captured from another run.

use instruction::ChaincodeConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use types::participant::{BalanceSeed, ParticipantSeed, Position};

#[derive(Error, Debug)]
pub enum ScenarioError {
    #[error("Cannot read scenario {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid scenario JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// One invocation of a scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub function: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Status the invocation must return, if checked
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expect_status: Option<u16>,
}

impl Step {
    pub fn new<I, S>(function: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            function: function.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            expect_status: None,
        }
    }

    pub fn expect(mut self, status: u16) -> Self {
        self.expect_status = Some(status);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub config: ChaincodeConfig,
    pub participants: Vec<ParticipantSeed>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Scenario {
    pub fn from_json(json: &str) -> Result<Self, ScenarioError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, ScenarioError> {
        let json = std::fs::read_to_string(path).map_err(|source| ScenarioError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String, ScenarioError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// `init` payload for the participants.
    pub fn init_payload(&self) -> Result<String, ScenarioError> {
        Ok(serde_json::to_string(&self.participants)?)
    }
}

/// Shape of a generated workload.
#[derive(Debug, Clone)]
pub struct WorkloadConfig {
    /// Number of transfers, each instructed by both sides
    pub pairs: usize,
    /// Lots per transfer
    pub quantity: u64,
    /// Lots seeded in the delivering account
    pub opening: u64,
    /// Every n-th receiver half disagrees on quantity
    pub mismatch_every: Option<usize>,
    /// Every n-th transfer is DVP instead of FOP
    pub dvp_every: Option<usize>,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            pairs: 100,
            quantity: 10,
            opening: 1_000_000,
            mismatch_every: None,
            dvp_every: None,
        }
    }
}

pub const SECURITY: &str = "RU000ABC0001";
pub const SENDER: (&str, &str) = ("MFONISSUEACC", "19000000000000000");
pub const RECEIVER: (&str, &str) = ("RBIOWNER0ACC", "00000000000000000");
const SENDER_DEPONENT: &str = "CA9861913023";
const RECEIVER_DEPONENT: &str = "DE000DB7HWY7";

/// Two-participant fixture, the sender seeded with `opening` lots.
pub fn fixture_participants(opening: u64) -> Vec<ParticipantSeed> {
    vec![
        ParticipantSeed {
            organization: "megafon.nsd.ru".to_string(),
            deponent: SENDER_DEPONENT.to_string(),
            balances: vec![BalanceSeed {
                account: SENDER.0.to_string(),
                division: SENDER.1.to_string(),
                holdings: vec![Position {
                    security: SECURITY.to_string(),
                    quantity: types::numeric::Quantity::new(opening),
                }],
            }],
        },
        ParticipantSeed {
            organization: "raiffeisen.nsd.ru".to_string(),
            deponent: RECEIVER_DEPONENT.to_string(),
            balances: vec![BalanceSeed {
                account: RECEIVER.0.to_string(),
                division: RECEIVER.1.to_string(),
                holdings: Vec::new(),
            }],
        },
    ]
}

/// Positional transfer arguments, discriminator first.
pub fn transfer_args(transfer_type: &str, reference: &str, quantity: u64) -> Vec<String> {
    let mut args: Vec<String> = [
        transfer_type,
        SENDER.0,
        SENDER.1,
        RECEIVER.0,
        RECEIVER.1,
        SECURITY,
        &quantity.to_string(),
        reference,
        "2017-12-31",
        "2017-12-31",
        SENDER_DEPONENT,
        RECEIVER_DEPONENT,
        reference,
        "{}",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    if transfer_type == "dvp" {
        args.extend(
            [
                "40701810000000001000",
                "044525505",
                "40701810000000001000",
                "044525505",
                "30000000",
                "RUB",
            ]
            .iter()
            .map(|s| s.to_string()),
        );
    }
    args
}

/// Deterministic workload: every transfer instructed by both sides.
pub fn paired_transfers(config: &WorkloadConfig) -> Scenario {
    let mut steps = Vec::with_capacity(config.pairs * 2);
    for i in 0..config.pairs {
        let n = i + 1;
        let transfer_type = match config.dvp_every {
            Some(every) if every > 0 && n % every == 0 => "dvp",
            _ => "fop",
        };
        let reference = format!("ref-{:06}", n);
        let mismatched = matches!(config.mismatch_every, Some(every) if every > 0 && n % every == 0);
        let receiver_quantity = if mismatched {
            config.quantity + 1
        } else {
            config.quantity
        };

        steps.push(Step::new("transfer", transfer_args(transfer_type, &reference, config.quantity)));
        steps.push(Step::new("receive", transfer_args(transfer_type, &reference, receiver_quantity)));
    }

    Scenario {
        name: format!("paired-transfers-{}", config.pairs),
        config: ChaincodeConfig::default(),
        participants: fixture_participants(config.opening),
        steps,
    }
}
