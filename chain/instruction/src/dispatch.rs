//! Transfer argument dispatch
//!
//! Three argument shapes reach the chaincode:
//!
//! ```text
//! transfer|receive  fop|dvp  <fields>          typed
//! transfer|receive  <fields>                   legacy, always fop
//! fop|dvp           transfer|receive  <fields> type in the function slot
//! ```
//!
//! Every shape is parsed into the same `TransferTerms` before validation
//! runs; arity, number and date errors surface here as `ArgumentError`.

use chrono::NaiveDate;
use types::instruction::{PaymentLeg, Side, TransferTerms, TransferType};

use crate::errors::ArgumentError;
use crate::state::DELIMITER;

pub const FOP_ARITY: usize = 13;
pub const DVP_ARITY: usize = 19;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Recognized argument shape of a transfer invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferArgs<'a> {
    /// Leading `fop`/`dvp` argument
    Typed(TransferType, &'a [&'a str]),
    /// No discriminator; treated as `fop`
    Legacy(&'a [&'a str]),
    /// Discriminator in the function-name slot, side as first argument
    TypeAsFunction(TransferType, &'a [&'a str]),
}

impl<'a> TransferArgs<'a> {
    pub fn transfer_type(&self) -> TransferType {
        match self {
            TransferArgs::Typed(t, _) | TransferArgs::TypeAsFunction(t, _) => *t,
            TransferArgs::Legacy(_) => TransferType::Fop,
        }
    }

    pub fn fields(&self) -> &'a [&'a str] {
        match self {
            TransferArgs::Typed(_, f) | TransferArgs::Legacy(f) | TransferArgs::TypeAsFunction(_, f) => *f,
        }
    }

    fn shape(&self) -> &'static str {
        match (self, self.transfer_type()) {
            (TransferArgs::Legacy(_), _) => "legacy fop",
            (_, TransferType::Fop) => "fop",
            (_, TransferType::Dvp) => "dvp",
        }
    }

    /// Parse the positional fields into instructed terms.
    pub fn parse(&self) -> Result<TransferTerms, ArgumentError> {
        let transfer_type = self.transfer_type();
        let fields = self.fields();
        let expected = match transfer_type {
            TransferType::Fop => FOP_ARITY,
            TransferType::Dvp => DVP_ARITY,
        };
        if fields.len() != expected {
            return Err(ArgumentError::WrongArity {
                shape: self.shape(),
                expected,
                got: fields.len(),
            });
        }
        check_characters(fields.iter().copied())?;

        let payment = match transfer_type {
            TransferType::Fop => None,
            TransferType::Dvp => Some(PaymentLeg {
                transferer_account: fields[13].to_string(),
                transferer_bic: fields[14].to_string(),
                receiver_account: fields[15].to_string(),
                receiver_bic: fields[16].to_string(),
                payment_amount: fields[17].parse()?,
                payment_currency: fields[18].to_string(),
            }),
        };

        Ok(TransferTerms {
            transfer_type,
            account_from: fields[0].to_string(),
            division_from: fields[1].to_string(),
            account_to: fields[2].to_string(),
            division_to: fields[3].to_string(),
            security: fields[4].to_string(),
            quantity: fields[5].parse()?,
            reference: fields[6].to_string(),
            instruction_date: parse_date(fields[7])?,
            trade_date: parse_date(fields[8])?,
            deponent_from: fields[9].to_string(),
            deponent_to: fields[10].to_string(),
            member_instruction_id: fields[11].to_string(),
            reason: fields[12].to_string(),
            payment,
        })
    }
}

fn parse_date(value: &str) -> Result<NaiveDate, ArgumentError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|_| ArgumentError::InvalidDate {
        value: value.to_string(),
    })
}

/// Refuse argument values that cannot be part of a composite key.
pub fn check_characters<'a>(args: impl IntoIterator<Item = &'a str>) -> Result<(), ArgumentError> {
    match args.into_iter().find(|arg| arg.contains(DELIMITER)) {
        Some(value) => Err(ArgumentError::InvalidCharacter {
            value: value.to_string(),
        }),
        None => Ok(()),
    }
}

/// Side submitted by a function name, if it is a submission function.
pub fn side_of(function: &str) -> Option<Side> {
    match function {
        "transfer" => Some(Side::Transferer),
        "receive" => Some(Side::Receiver),
        _ => None,
    }
}

/// Whether `function` routes to a transfer submission.
pub fn is_transfer_function(function: &str) -> bool {
    side_of(function).is_some() || function.parse::<TransferType>().is_ok()
}

/// Recognize the argument shape of a transfer invocation.
pub fn classify<'a>(
    function: &str,
    args: &'a [&'a str],
    legacy_fallback: bool,
) -> Result<(Side, TransferArgs<'a>), ArgumentError> {
    if let Ok(transfer_type) = function.parse::<TransferType>() {
        let (first, fields) = args.split_first().ok_or(ArgumentError::WrongArity {
            shape: transfer_type.as_str(),
            expected: 1 + arity(transfer_type),
            got: 0,
        })?;
        let side = side_of(first).ok_or_else(|| ArgumentError::InvalidSide {
            value: first.to_string(),
        })?;
        return Ok((side, TransferArgs::TypeAsFunction(transfer_type, fields)));
    }

    let side = side_of(function).ok_or_else(|| ArgumentError::InvalidSide {
        value: function.to_string(),
    })?;

    if let Some((first, fields)) = args.split_first() {
        if let Ok(transfer_type) = first.parse::<TransferType>() {
            return Ok((side, TransferArgs::Typed(transfer_type, fields)));
        }
    }

    if legacy_fallback {
        Ok((side, TransferArgs::Legacy(args)))
    } else {
        Err(ArgumentError::MissingDiscriminator)
    }
}

fn arity(transfer_type: TransferType) -> usize {
    match transfer_type {
        TransferType::Fop => FOP_ARITY,
        TransferType::Dvp => DVP_ARITY,
    }
}

/// Classify and parse in one step.
pub fn dispatch(
    function: &str,
    args: &[&str],
    legacy_fallback: bool,
) -> Result<(Side, TransferTerms), ArgumentError> {
    let (side, call) = classify(function, args, legacy_fallback)?;
    Ok((side, call.parse()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::errors::NumericError;
    use types::numeric::Quantity;

    const FIELDS: [&str; 13] = [
        "MFONISSUEACC",
        "19000000000000000",
        "RBIOWNER0ACC",
        "00000000000000000",
        "RU000ABC0001",
        "123",
        "ref-123",
        "2017-12-31",
        "2017-12-31",
        "CA9861913023",
        "DE000DB7HWY7",
        "memberInstructionId",
        "{\"json_reason\":\"any json\"}",
    ];

    const PAYMENT: [&str; 6] = [
        "40701810000000001000",
        "f044525505op",
        "40701810000000001000",
        "f044525505op",
        "30000000",
        "RUB",
    ];

    fn with_prefix(prefix: &[&'static str], payment: bool) -> Vec<&'static str> {
        let mut args = prefix.to_vec();
        args.extend_from_slice(&FIELDS);
        if payment {
            args.extend_from_slice(&PAYMENT);
        }
        args
    }

    #[test]
    fn test_typed_fop() {
        let args = with_prefix(&["fop"], false);
        let (side, terms) = dispatch("transfer", &args, true).unwrap();
        assert_eq!(side, Side::Transferer);
        assert_eq!(terms.transfer_type, TransferType::Fop);
        assert_eq!(terms.quantity, Quantity::new(123));
        assert_eq!(terms.trade_date, NaiveDate::from_ymd_opt(2017, 12, 31).unwrap());
        assert_eq!(terms.reason, "{\"json_reason\":\"any json\"}");
        assert!(terms.payment.is_none());
    }

    #[test]
    fn test_legacy_is_fop() {
        let args = with_prefix(&[], false);
        let (side, call) = classify("receive", &args, true).unwrap();
        assert_eq!(side, Side::Receiver);
        assert!(matches!(call, TransferArgs::Legacy(_)));
        assert_eq!(call.parse().unwrap().transfer_type, TransferType::Fop);
    }

    #[test]
    fn test_legacy_disabled() {
        let args = with_prefix(&[], false);
        assert_eq!(
            dispatch("transfer", &args, false).unwrap_err(),
            ArgumentError::MissingDiscriminator
        );
    }

    #[test]
    fn test_nul_character_is_refused_before_validation() {
        let mut args = with_prefix(&["dvp"], true);
        args[7] = "ref\u{0}123";
        assert_eq!(
            dispatch("transfer", &args, true).unwrap_err(),
            ArgumentError::InvalidCharacter {
                value: "ref\u{0}123".to_string()
            }
        );

        let mut args = with_prefix(&["dvp"], true);
        args[19] = "R\u{0}B";
        assert!(matches!(
            dispatch("transfer", &args, true),
            Err(ArgumentError::InvalidCharacter { .. })
        ));
    }

    #[test]
    fn test_type_as_function_dvp() {
        let args = with_prefix(&["transfer"], true);
        let (side, call) = classify("dvp", &args, true).unwrap();
        assert_eq!(side, Side::Transferer);
        assert!(matches!(call, TransferArgs::TypeAsFunction(TransferType::Dvp, _)));

        let terms = call.parse().unwrap();
        let leg = terms.payment.unwrap();
        assert_eq!(leg.transferer_bic, "f044525505op");
        assert_eq!(leg.payment_amount.to_string(), "30000000");
        assert_eq!(leg.payment_currency, "RUB");
    }

    #[test]
    fn test_type_as_function_requires_side() {
        let args = with_prefix(&["settle"], false);
        assert_eq!(
            dispatch("fop", &args, true).unwrap_err(),
            ArgumentError::InvalidSide {
                value: "settle".to_string()
            }
        );
        assert!(matches!(
            dispatch("fop", &[], true),
            Err(ArgumentError::WrongArity { got: 0, .. })
        ));
    }

    #[test]
    fn test_dvp_arity() {
        let args = with_prefix(&["dvp"], false);
        assert_eq!(
            dispatch("transfer", &args, true).unwrap_err(),
            ArgumentError::WrongArity {
                shape: "dvp",
                expected: 19,
                got: 13
            }
        );
    }

    #[test]
    fn test_fop_with_payment_fields_is_wrong_arity() {
        let args = with_prefix(&["fop"], true);
        assert!(matches!(
            dispatch("transfer", &args, true),
            Err(ArgumentError::WrongArity { expected: 13, got: 19, .. })
        ));
    }

    #[test]
    fn test_bad_quantity_and_date() {
        let mut args = with_prefix(&["fop"], false);
        args[6] = "-5";
        assert_eq!(
            dispatch("transfer", &args, true).unwrap_err(),
            ArgumentError::InvalidNumber(NumericError::InvalidQuantity("-5".to_string()))
        );

        let mut args = with_prefix(&["fop"], false);
        args[9] = "31.12.2017";
        assert_eq!(
            dispatch("transfer", &args, true).unwrap_err(),
            ArgumentError::InvalidDate {
                value: "31.12.2017".to_string()
            }
        );
    }

    #[test]
    fn test_function_classification() {
        for function in ["transfer", "receive", "fop", "dvp"] {
            assert!(is_transfer_function(function));
        }
        assert!(!is_transfer_function("query"));
    }
}
