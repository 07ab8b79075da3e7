//! Chaincode logic for securities transfer instructions
//!
//! Two custodial participants instruct each side of a transfer of securities
//! between (account, division) holding locations. Matching halves are
//! settled immediately, free of payment (`fop`) or delivery versus payment
//! (`dvp`). All state goes through the `ChaincodeStub` handed to each call.
//!
//! # Modules
//! - `state`: Composite keys, `StateStore` / `ChaincodeStub` traits, `MockStub`
//! - `ledger`: In-memory hosting ledger with MVCC commit
//! - `registry`: Participants and balance ownership
//! - `holdings`: Security positions per holding location
//! - `store`: Instruction records and their audit trail
//! - `payment`: DVP payment leg records
//! - `validation`: Submission checks
//! - `matching`: Matching and settlement state machine
//! - `dispatch`: Invocation argument shapes
//! - `chaincode`: `init` / `invoke` entry point and `Response`
//! - `events`: Ledger events
//! - `config`: Deployment switches
//! - `errors`: Error taxonomy

pub mod errors;
pub mod config;
pub mod state;
pub mod events;
pub mod registry;
pub mod holdings;
pub mod store;
pub mod payment;
pub mod validation;
pub mod matching;
pub mod dispatch;
pub mod chaincode;
pub mod ledger;

pub use chaincode::{InstructionChaincode, Response};
pub use config::ChaincodeConfig;
pub use ledger::MemoryLedger;

/// Chaincode interface version, frozen after release
pub const CHAINCODE_VERSION: &str = "1.0.0";
