//! Chaincode entry point
//!
//! `init` loads the participant registry; `invoke` routes a function name
//! and its string arguments. Every call returns a `Response`, never an
//! error: failures are mapped to a status code and a `"CODE: detail"`
//! message, and the host commits the invocation's writes only for
//! `Response::OK` and `Response::REJECTED`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use types::instruction::{Instruction, InstructionKey, InstructionStatus, Side, TransferType};
use types::ids::HoldingRef;
use types::participant::ParticipantSeed;

use crate::config::ChaincodeConfig;
use crate::dispatch;
use crate::errors::{ArgumentError, ChaincodeError, LedgerError};
use crate::events::{LedgerEvent, ParticipantRegistered, PaymentUpdated};
use crate::holdings;
use crate::matching::{self, SubmitOutcome};
use crate::payment;
use crate::registry;
use crate::state::ChaincodeStub;
use crate::store;

/// Result of one chaincode call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub status: u16,
    pub message: String,
    pub payload: Vec<u8>,
}

impl Response {
    pub const OK: u16 = 200;
    /// Instruction durably recorded as rejected
    pub const REJECTED: u16 = 202;
    pub const BAD_REQUEST: u16 = 400;
    pub const ERROR: u16 = 500;

    pub fn ok(payload: Vec<u8>) -> Self {
        Self {
            status: Self::OK,
            message: String::new(),
            payload,
        }
    }

    pub fn from_error(err: &ChaincodeError) -> Self {
        let status = if err.is_client_error() {
            Self::BAD_REQUEST
        } else {
            Self::ERROR
        };
        Self {
            status,
            message: format!("{}: {}", err.code(), err),
            payload: Vec::new(),
        }
    }

    pub fn from_ledger_error(err: &LedgerError) -> Self {
        Self {
            status: Self::ERROR,
            message: format!("{}: {}", err.code(), err),
            payload: Vec::new(),
        }
    }

    /// Whether the host must commit the invocation's writes
    pub fn commits(&self) -> bool {
        matches!(self.status, Self::OK | Self::REJECTED)
    }

    pub fn is_success(&self) -> bool {
        self.status == Self::OK
    }

    pub fn is_rejected(&self) -> bool {
        self.status == Self::REJECTED
    }

    /// Taxonomy code of a failed or rejected call
    pub fn code(&self) -> Option<&str> {
        self.message.split_once(':').map(|(code, _)| code)
    }

    pub fn payload_json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.payload)
    }
}

/// Securities transfer instruction chaincode
#[derive(Debug, Clone, Default)]
pub struct InstructionChaincode {
    config: ChaincodeConfig,
}

impl InstructionChaincode {
    pub fn new(config: ChaincodeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ChaincodeConfig {
        &self.config
    }

    /// Register the participants of a JSON array of seeds.
    ///
    /// A leading `"init"` argument (the function name, as some hosts pass
    /// it) is skipped. No payload registers nothing.
    pub fn init<S: ChaincodeStub + ?Sized>(&self, stub: &mut S, args: &[&str]) -> Response {
        let args = match args.split_first() {
            Some((&"init", rest)) => rest,
            _ => args,
        };
        match self.load_participants(stub, args) {
            Ok(count) => {
                info!(tx_id = %stub.tx_id(), participants = count, "chaincode initialized");
                Response::ok(Vec::new())
            }
            Err(err) => self.fail(stub, "init", &err),
        }
    }

    fn load_participants<S: ChaincodeStub + ?Sized>(
        &self,
        stub: &mut S,
        args: &[&str],
    ) -> Result<usize, ChaincodeError> {
        let payload = match args {
            [] => return Ok(0),
            [payload] => payload,
            _ => {
                return Err(ArgumentError::WrongArity {
                    shape: "init",
                    expected: 1,
                    got: args.len(),
                }
                .into())
            }
        };
        let seeds: Vec<ParticipantSeed> = serde_json::from_str(payload)
            .map_err(|e| ArgumentError::InvalidJson(e.to_string()))?;

        for seed in &seeds {
            dispatch::check_characters(seed_key_parts(seed))?;
        }

        for seed in &seeds {
            let organization = seed.to_organization();
            registry::register(stub, &organization)?;
            for (holding, quantity) in seed.positions() {
                holdings::credit(stub, &holding, quantity)?;
            }
            if self.config.emit_events {
                LedgerEvent::ParticipantRegistered(ParticipantRegistered {
                    organization: organization.organization.clone(),
                    deponent: organization.deponent.clone(),
                    balances: organization.balances.len(),
                })
                .emit(stub)?;
            }
        }
        Ok(seeds.len())
    }

    /// Route one invocation.
    pub fn invoke<S: ChaincodeStub + ?Sized>(
        &self,
        stub: &mut S,
        function: &str,
        args: &[&str],
    ) -> Response {
        debug!(tx_id = %stub.tx_id(), function, args = args.len(), "invoke");

        if dispatch::is_transfer_function(function) {
            return match self.submit(stub, function, args) {
                Ok(outcome) => submission_response(&outcome),
                Err(err) => self.fail(stub, function, &err),
            };
        }

        match self.query(stub, function, args) {
            Ok(payload) => Response::ok(payload),
            Err(err) => self.fail(stub, function, &err),
        }
    }

    fn submit<S: ChaincodeStub + ?Sized>(
        &self,
        stub: &mut S,
        function: &str,
        args: &[&str],
    ) -> Result<SubmitOutcome, ChaincodeError> {
        let (side, terms) = dispatch::dispatch(function, args, self.config.legacy_fallback)?;
        matching::submit(stub, &self.config, side, terms)
    }

    fn query<S: ChaincodeStub + ?Sized>(
        &self,
        stub: &mut S,
        function: &str,
        args: &[&str],
    ) -> Result<Vec<u8>, ChaincodeError> {
        dispatch::check_characters(args.iter().copied())?;
        let payload = match function {
            "query" => {
                expect_arity("query", args, 0)?;
                to_json(&store::list(stub)?)?
            }
            "history" => {
                expect_arity("history", args, 8)?;
                let side = parse_side(args[0])?;
                let key = parse_key(&args[1..])?;
                to_json(&store::history(stub, side, &key)?)?
            }
            "payment" => {
                expect_arity("payment", args, 7)?;
                let key = parse_key(args)?;
                to_json(&payment::get(stub, &key)?)?
            }
            "confirmPayment" => {
                expect_arity("confirmPayment", args, 7)?;
                let key = parse_key(args)?;
                let tx_id = stub.tx_id().to_string();
                let (record, changed) = payment::confirm(stub, &key, &tx_id)?;
                if changed {
                    info!(tx_id = %tx_id, %key, "payment confirmed");
                    if self.config.emit_events {
                        LedgerEvent::PaymentUpdated(PaymentUpdated {
                            key: key.clone(),
                            amount: record.leg.payment_amount,
                            currency: record.leg.payment_currency.clone(),
                            status: record.status,
                        })
                        .emit(stub)?;
                    }
                }
                to_json(&record)?
            }
            "holding" => {
                expect_arity("holding", args, 3)?;
                let holding = HoldingRef::new(args[0], args[1], args[2]);
                to_json(&holdings::record(stub, &holding)?)?
            }
            "participant" => {
                expect_arity("participant", args, 1)?;
                to_json(&registry::participant(stub, args[0])?)?
            }
            _ => {
                return Err(ChaincodeError::UnknownFunction {
                    name: function.to_string(),
                })
            }
        };
        Ok(payload)
    }

    fn fail<S: ChaincodeStub + ?Sized>(&self, stub: &S, function: &str, err: &ChaincodeError) -> Response {
        let response = Response::from_error(err);
        warn!(
            tx_id = %stub.tx_id(),
            function,
            status = response.status,
            code = err.code(),
            error = %err,
            "invocation failed"
        );
        response
    }
}

fn submission_response(outcome: &SubmitOutcome) -> Response {
    let instruction = &outcome.instruction;
    let payload = match serde_json::to_vec(instruction) {
        Ok(payload) => payload,
        Err(err) => return Response::from_error(&ChaincodeError::State(err.into())),
    };

    match (instruction.status, &instruction.reject_reason) {
        (InstructionStatus::Rejected, Some(reason)) => Response {
            status: Response::REJECTED,
            message: format!("{}: {}", reason.code(), reason),
            payload,
        },
        _ => Response::ok(payload),
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<Vec<u8>, ChaincodeError> {
    serde_json::to_vec(value).map_err(|e| ChaincodeError::State(e.into()))
}

/// Every seed value that ends up inside a composite key.
fn seed_key_parts(seed: &ParticipantSeed) -> impl Iterator<Item = &str> {
    [seed.organization.as_str(), seed.deponent.as_str()]
        .into_iter()
        .chain(seed.balances.iter().flat_map(|balance| {
            [balance.account.as_str(), balance.division.as_str()]
                .into_iter()
                .chain(balance.holdings.iter().map(|position| position.security.as_str()))
        }))
}

fn expect_arity(shape: &'static str, args: &[&str], expected: usize) -> Result<(), ArgumentError> {
    if args.len() != expected {
        return Err(ArgumentError::WrongArity {
            shape,
            expected,
            got: args.len(),
        });
    }
    Ok(())
}

fn parse_side(value: &str) -> Result<Side, ArgumentError> {
    value.parse().map_err(|_| ArgumentError::InvalidSide {
        value: value.to_string(),
    })
}

/// Instruction key from its 7 attributes, type first.
fn parse_key(args: &[&str]) -> Result<InstructionKey, ArgumentError> {
    let transfer_type = args[0].parse::<TransferType>().map_err(|_| ArgumentError::InvalidTransferType {
        value: args[0].to_string(),
    })?;
    Ok(InstructionKey {
        transfer_type,
        account_from: args[1].to_string(),
        division_from: args[2].to_string(),
        account_to: args[3].to_string(),
        division_to: args[4].to_string(),
        security: args[5].to_string(),
        reference: args[6].to_string(),
    })
}

/// Stored instruction decoded from a submission response.
pub fn instruction_of(response: &Response) -> Result<Instruction, serde_json::Error> {
    response.payload_json()
}
