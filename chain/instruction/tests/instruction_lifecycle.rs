//! Instruction Lifecycle Tests
//!
//! End-to-end invocations through the in-memory hosting ledger:
//! - Bootstrap of the participant registry
//! - Argument shapes (typed, legacy, type in the function slot)
//! - Matching, settlement and rejection of both halves
//! - DVP payment records
//! - Redelivery and failed invocations

use instruction::chaincode::instruction_of;
use instruction::registry::authentication_key;
use instruction::{ChaincodeConfig, InstructionChaincode, MemoryLedger, Response};
use rust_decimal::Decimal;
use types::ids::Balance;
use types::instruction::{HistoryEntry, Instruction, InstructionStatus, PaymentRecord, PaymentStatus, Side};
use types::participant::{HoldingRecord, Organization};

const MEGAFON: &str = "{\"organization\":\"megafon.nsd.ru\",\
    \"deponent\":\"CA9861913023\",\
    \"balances\":[{\"account\":\"MFONISSUEACC\",\"division\":\"19000000000000000\"},\
    {\"account\":\"MFONISSUEACC\",\"division\":\"22000000000000000\"}]}";

const RAIFFEISEN: &str = "{\"organization\":\"raiffeisen.nsd.ru\",\
    \"deponent\":\"DE000DB7HWY7\",\
    \"balances\":[{\"account\":\"RBIOWNER0ACC\",\"division\":\"00000000000000000\"}]}";

// ═══════════════════════════════════════════════════════════════════
// Bootstrap
// ═══════════════════════════════════════════════════════════════════

#[test]
fn test_init_stores_organization_json_verbatim() {
    let (ledger, _) = setup_ledger(None);

    let key = authentication_key(&Balance::new("RBIOWNER0ACC", "00000000000000000")).unwrap();
    let stored = ledger.get(&key).unwrap();
    assert_eq!(std::str::from_utf8(stored).unwrap(), RAIFFEISEN);
}

#[test]
fn test_init_registers_every_balance() {
    let (ledger, _) = setup_ledger(None);
    for division in ["19000000000000000", "22000000000000000"] {
        let key = authentication_key(&Balance::new("MFONISSUEACC", division)).unwrap();
        let org: Organization = ledger.read_json(&key).unwrap().unwrap();
        assert_eq!(org.deponent, "CA9861913023");
    }
}

#[test]
fn test_init_duplicate_balance_commits_nothing() {
    let chaincode = InstructionChaincode::default();
    let mut ledger = MemoryLedger::new();
    let intruder = "{\"organization\":\"intruder\",\"deponent\":\"XX0000000000\",\
        \"balances\":[{\"account\":\"RBIOWNER0ACC\",\"division\":\"00000000000000000\"}]}";
    let payload = format!("[{},{},{}]", MEGAFON, RAIFFEISEN, intruder);

    let response = ledger.init(&chaincode, &["init", &payload]);
    assert_eq!(response.status, Response::BAD_REQUEST);
    assert_eq!(response.code(), Some("DUPLICATE_BALANCE"));
    assert!(ledger.is_empty());
    assert_eq!(ledger.height(), 0);
}

// ═══════════════════════════════════════════════════════════════════
// Argument Shapes
// ═══════════════════════════════════════════════════════════════════

#[test]
fn test_typed_fop_transfer_is_initial() {
    let (mut ledger, chaincode) = setup_ledger(None);
    let response = invoke(&mut ledger, &chaincode, "transfer", &fop_args("ref-123", 123));

    assert_eq!(response.status, Response::OK, "{}", response.message);
    let instruction = instruction_of(&response).unwrap();
    assert_eq!(instruction.side, Side::Transferer);
    assert_eq!(instruction.status, InstructionStatus::Initial);
    assert_eq!(instruction.terms.reason, "{\"json_reason\":\"any json\"}");
}

#[test]
fn test_legacy_transfer_is_fop() {
    let (mut ledger, chaincode) = setup_ledger(None);
    let mut args = fop_args("ref-123", 123);
    args.remove(0);

    let response = invoke(&mut ledger, &chaincode, "transfer", &args);
    assert_eq!(response.status, Response::OK, "{}", response.message);
    assert_eq!(instruction_of(&response).unwrap().terms.transfer_type.as_str(), "fop");
}

#[test]
fn test_legacy_transfer_refused_when_disabled() {
    let config = ChaincodeConfig {
        legacy_fallback: false,
        ..ChaincodeConfig::default()
    };
    let (mut ledger, chaincode) = setup_ledger_with(config, None);
    let mut args = fop_args("ref-123", 123);
    args.remove(0);

    let response = invoke(&mut ledger, &chaincode, "transfer", &args);
    assert_eq!(response.status, Response::BAD_REQUEST);
    assert_eq!(response.code(), Some("MALFORMED_ARGUMENTS"));
}

#[test]
fn test_swapped_deponents_are_rejected_not_failed() {
    // Deponents swapped relative to the registry: the submission is
    // recorded as rejected rather than refused.
    let (mut ledger, chaincode) = setup_ledger(None);
    let mut args = fop_args("ref-123", 123);
    args.swap(10, 11);

    let response = invoke(&mut ledger, &chaincode, "transfer", &args);
    assert_eq!(response.status, Response::REJECTED);
    assert_eq!(response.code(), Some("VALIDATION_FAILED"));
    assert!(response.message.contains("from leg MFONISSUEACC/19000000000000000"));

    let stored = query_all(&ledger, &chaincode);
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].status, InstructionStatus::Rejected);
}

#[test]
fn test_unregistered_accounts_are_rejected() {
    let (mut ledger, chaincode) = setup_ledger(None);
    let args = strings(&[
        "fop",
        "MZ130605006C",
        "19000000000000000",
        "MS980129006C",
        "00000000000000000",
        "RU000A0JWGG3",
        "1",
        "test1",
        "2018-03-04",
        "2018-03-04",
        "CA9861913023",
        "DE000DB7HWY7",
        "123",
        "{}",
    ]);
    let response = invoke(&mut ledger, &chaincode, "transfer", &args);
    assert_eq!(response.status, Response::REJECTED);
    assert_eq!(response.code(), Some("VALIDATION_FAILED"));
}

#[test]
fn test_dvp_type_in_function_slot() {
    let (mut ledger, chaincode) = setup_ledger(Some(1000));
    let mut args = vec!["transfer".to_string()];
    args.extend(dvp_args("ref-123", 123).into_iter().skip(1));

    let response = invoke(&mut ledger, &chaincode, "dvp", &args);
    assert_eq!(response.status, Response::OK, "{}", response.message);
    let instruction = instruction_of(&response).unwrap();
    assert_eq!(instruction.terms.transfer_type.as_str(), "dvp");
    assert_eq!(instruction.status, InstructionStatus::Initial);

    args[0] = "receive".to_string();
    let response = invoke(&mut ledger, &chaincode, "dvp", &args);
    assert_eq!(instruction_of(&response).unwrap().status, InstructionStatus::Executed);
}

// ═══════════════════════════════════════════════════════════════════
// Matching and Settlement
// ═══════════════════════════════════════════════════════════════════

#[test]
fn test_fop_pair_executes_and_moves_holdings() {
    let (mut ledger, chaincode) = setup_ledger(Some(1000));
    invoke(&mut ledger, &chaincode, "transfer", &fop_args("ref-123", 123));
    let response = invoke(&mut ledger, &chaincode, "receive", &fop_args("ref-123", 123));

    assert_eq!(response.status, Response::OK, "{}", response.message);
    assert_eq!(instruction_of(&response).unwrap().status, InstructionStatus::Executed);
    assert_eq!(holding(&ledger, &chaincode, "MFONISSUEACC", "19000000000000000"), 877);
    assert_eq!(holding(&ledger, &chaincode, "RBIOWNER0ACC", "00000000000000000"), 123);

    for instruction in query_all(&ledger, &chaincode) {
        assert_eq!(instruction.status, InstructionStatus::Executed);
    }
}

#[test]
fn test_matched_state_visible_in_history() {
    let (mut ledger, chaincode) = setup_ledger(Some(1000));
    invoke(&mut ledger, &chaincode, "transfer", &fop_args("ref-123", 123));
    invoke(&mut ledger, &chaincode, "receive", &fop_args("ref-123", 123));

    let mut args = vec!["transferer".to_string()];
    args.extend(key_args("fop", "ref-123"));
    let response = query(&ledger, &chaincode, "history", &args);
    let history: Vec<HistoryEntry> = response.payload_json().unwrap();

    let statuses: Vec<InstructionStatus> = history.iter().map(|e| e.status).collect();
    assert_eq!(
        statuses,
        vec![InstructionStatus::Initial, InstructionStatus::Matched, InstructionStatus::Executed]
    );
    assert_eq!(history[0].tx_id, "tx-00000002");
    assert_eq!(history[2].tx_id, "tx-00000003");
    assert!(history[0].timestamp < history[2].timestamp);
}

#[test]
fn test_quantity_mismatch_rejects_both_halves() {
    let (mut ledger, chaincode) = setup_ledger(Some(1000));
    invoke(&mut ledger, &chaincode, "transfer", &fop_args("ref-123", 123));
    let response = invoke(&mut ledger, &chaincode, "receive", &fop_args("ref-123", 124));

    assert_eq!(response.status, Response::REJECTED);
    assert_eq!(response.code(), Some("MATCH_MISMATCH"));
    assert!(response.message.ends_with("counter-instruction disagrees on quantity"));
    for instruction in query_all(&ledger, &chaincode) {
        assert_eq!(instruction.status, InstructionStatus::Rejected);
    }
    assert_eq!(holding(&ledger, &chaincode, "MFONISSUEACC", "19000000000000000"), 1000);
}

#[test]
fn test_insufficient_holding_rejects_both_halves() {
    let (mut ledger, chaincode) = setup_ledger(None);
    invoke(&mut ledger, &chaincode, "transfer", &fop_args("ref-123", 123));
    let response = invoke(&mut ledger, &chaincode, "receive", &fop_args("ref-123", 123));

    assert_eq!(response.status, Response::REJECTED);
    assert_eq!(response.code(), Some("INSUFFICIENT_HOLDING"));
    let stored = query_all(&ledger, &chaincode);
    assert_eq!(stored.len(), 2);
    assert!(stored.iter().all(|i| i.status == InstructionStatus::Rejected));
    assert_eq!(holding(&ledger, &chaincode, "RBIOWNER0ACC", "00000000000000000"), 0);
}

#[test]
fn test_invalid_second_half_rejects_waiting_first_half() {
    let (mut ledger, chaincode) = setup_ledger(Some(1000));
    let first = invoke(&mut ledger, &chaincode, "transfer", &fop_args("ref-123", 123));
    assert_eq!(instruction_of(&first).unwrap().status, InstructionStatus::Initial);

    // receiver names the sending deponent on its own leg
    let mut bad = fop_args("ref-123", 123);
    bad[11] = "CA9861913023".to_string();
    let response = invoke(&mut ledger, &chaincode, "receive", &bad);
    assert_eq!(response.status, Response::REJECTED);
    assert_eq!(response.code(), Some("VALIDATION_FAILED"));

    let stored = query_all(&ledger, &chaincode);
    assert_eq!(stored.len(), 2);
    let transferer = stored.iter().find(|i| i.side == Side::Transferer).unwrap();
    assert_eq!(transferer.status, InstructionStatus::Rejected);
    assert_eq!(
        transferer.reject_reason.as_ref().map(|r| r.code()),
        Some("COUNTER_INSTRUCTION_REJECTED")
    );

    let hash = ledger.state_hash();
    let retry = invoke(&mut ledger, &chaincode, "receive", &fop_args("ref-123", 123));
    assert_eq!(retry.status, Response::REJECTED);
    assert_eq!(ledger.state_hash(), hash);
    assert_eq!(holding(&ledger, &chaincode, "RBIOWNER0ACC", "00000000000000000"), 0);
}

#[test]
fn test_submission_against_rejected_counter() {
    let (mut ledger, chaincode) = setup_ledger(Some(1000));
    invoke(&mut ledger, &chaincode, "transfer", &fop_args("ref-123", 0));
    let response = invoke(&mut ledger, &chaincode, "receive", &fop_args("ref-123", 123));

    assert_eq!(response.status, Response::REJECTED);
    assert_eq!(response.code(), Some("COUNTER_INSTRUCTION_REJECTED"));
}

// ═══════════════════════════════════════════════════════════════════
// DVP Payments
// ═══════════════════════════════════════════════════════════════════

#[test]
fn test_dvp_settlement_records_and_confirms_payment() {
    let (mut ledger, chaincode) = setup_ledger(Some(1000));
    invoke(&mut ledger, &chaincode, "transfer", &dvp_args("ref-123", 123));
    invoke(&mut ledger, &chaincode, "receive", &dvp_args("ref-123", 123));

    let key = key_args("dvp", "ref-123");
    let record: PaymentRecord = query(&ledger, &chaincode, "payment", &key).payload_json().unwrap();
    assert_eq!(record.status, PaymentStatus::Pending);
    assert_eq!(record.leg.payment_amount.as_decimal(), Decimal::from(30_000_000));
    assert_eq!(record.leg.payment_currency, "RUB");

    let confirmed = invoke(&mut ledger, &chaincode, "confirmPayment", &key);
    let record: PaymentRecord = confirmed.payload_json().unwrap();
    assert_eq!(record.status, PaymentStatus::Confirmed);

    let hash = ledger.state_hash();
    let again = invoke(&mut ledger, &chaincode, "confirmPayment", &key);
    assert!(again.is_success());
    assert_eq!(ledger.state_hash(), hash);
}

#[test]
fn test_dvp_payment_amount_mismatch_rejects_both_halves() {
    let (mut ledger, chaincode) = setup_ledger(Some(1000));
    invoke(&mut ledger, &chaincode, "transfer", &dvp_args("ref-123", 123));
    let mut altered = dvp_args("ref-123", 123);
    altered[18] = "30000001".to_string();
    let response = invoke(&mut ledger, &chaincode, "receive", &altered);

    assert_eq!(response.status, Response::REJECTED);
    assert_eq!(response.code(), Some("MATCH_MISMATCH"));
    let stored = query_all(&ledger, &chaincode);
    assert_eq!(stored.len(), 2);
    assert!(stored.iter().all(|i| i.status == InstructionStatus::Rejected));
    assert_eq!(holding(&ledger, &chaincode, "MFONISSUEACC", "19000000000000000"), 1000);
    assert_eq!(holding(&ledger, &chaincode, "RBIOWNER0ACC", "00000000000000000"), 0);

    let payment = query(&ledger, &chaincode, "payment", &key_args("dvp", "ref-123"));
    assert_eq!(payment.code(), Some("NOT_FOUND"));
}

#[test]
fn test_failed_dvp_leaves_no_payment() {
    let (mut ledger, chaincode) = setup_ledger(Some(10));
    invoke(&mut ledger, &chaincode, "transfer", &dvp_args("ref-123", 123));
    let response = invoke(&mut ledger, &chaincode, "receive", &dvp_args("ref-123", 123));
    assert_eq!(response.code(), Some("INSUFFICIENT_HOLDING"));

    let payment = query(&ledger, &chaincode, "payment", &key_args("dvp", "ref-123"));
    assert_eq!(payment.code(), Some("NOT_FOUND"));
}

// ═══════════════════════════════════════════════════════════════════
// Redelivery and Failures
// ═══════════════════════════════════════════════════════════════════

#[test]
fn test_redelivery_after_execution_is_noop() {
    let (mut ledger, chaincode) = setup_ledger(Some(1000));
    invoke(&mut ledger, &chaincode, "transfer", &fop_args("ref-123", 123));
    let executed = invoke(&mut ledger, &chaincode, "receive", &fop_args("ref-123", 123));
    let hash = ledger.state_hash();

    let again = invoke(&mut ledger, &chaincode, "receive", &fop_args("ref-123", 123));
    assert_eq!(again, executed);
    assert_eq!(ledger.state_hash(), hash);
    assert_eq!(holding(&ledger, &chaincode, "RBIOWNER0ACC", "00000000000000000"), 123);
}

#[test]
fn test_changed_resubmission_is_duplicate() {
    let (mut ledger, chaincode) = setup_ledger(Some(1000));
    invoke(&mut ledger, &chaincode, "transfer", &fop_args("ref-123", 123));
    let hash = ledger.state_hash();

    let response = invoke(&mut ledger, &chaincode, "transfer", &fop_args("ref-123", 50));
    assert_eq!(response.status, Response::BAD_REQUEST);
    assert_eq!(response.code(), Some("DUPLICATE_INSTRUCTION"));
    assert_eq!(ledger.state_hash(), hash);
}

#[test]
fn test_nul_in_reference_is_malformed_and_commits_nothing() {
    let (mut ledger, chaincode) = setup_ledger(Some(1000));
    let height = ledger.height();
    let response = invoke(&mut ledger, &chaincode, "transfer", &fop_args("ref\u{0}x", 123));

    assert_eq!(response.status, Response::BAD_REQUEST);
    assert_eq!(response.code(), Some("MALFORMED_ARGUMENTS"));
    assert_eq!(ledger.height(), height);
    assert!(query_all(&ledger, &chaincode).is_empty());
}

#[test]
fn test_failed_invocation_commits_nothing() {
    let (mut ledger, chaincode) = setup_ledger(Some(1000));
    let hash = ledger.state_hash();
    let height = ledger.height();

    let mut args = fop_args("ref-123", 123);
    args[8] = "2017-13-45".to_string();
    let response = invoke(&mut ledger, &chaincode, "transfer", &args);

    assert_eq!(response.status, Response::BAD_REQUEST);
    assert_eq!(ledger.state_hash(), hash);
    assert_eq!(ledger.height(), height);
}

#[test]
fn test_events_follow_committed_transactions() {
    let (mut ledger, chaincode) = setup_ledger(Some(1000));
    invoke(&mut ledger, &chaincode, "transfer", &fop_args("ref-123", 123));
    invoke(&mut ledger, &chaincode, "receive", &fop_args("ref-123", 123));
    invoke(&mut ledger, &chaincode, "transfer", &fop_args("ref-bad", 0));

    let names: Vec<&str> = ledger.events().iter().map(|e| e.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "ParticipantRegistered",
            "ParticipantRegistered",
            "InstructionSubmitted",
            "InstructionMatched",
            "InstructionMatched",
            "InstructionExecuted",
            "InstructionExecuted",
            "InstructionRejected",
        ]
    );
}

// ═══════════════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════════════

fn setup_ledger(opening: Option<u64>) -> (MemoryLedger, InstructionChaincode) {
    setup_ledger_with(ChaincodeConfig::default(), opening)
}

/// Ledger initialized with the megafon/raiffeisen fixture, optionally
/// seeding `RU000ABC0001` lots in the megafon issue account.
fn setup_ledger_with(config: ChaincodeConfig, opening: Option<u64>) -> (MemoryLedger, InstructionChaincode) {
    let chaincode = InstructionChaincode::new(config);
    let mut ledger = MemoryLedger::new();

    let megafon = match opening {
        Some(lots) => MEGAFON.replacen(
            "\"division\":\"19000000000000000\"}",
            &format!(
                "\"division\":\"19000000000000000\",\"holdings\":[{{\"security\":\"RU000ABC0001\",\"quantity\":{}}}]}}",
                lots
            ),
            1,
        ),
        None => MEGAFON.to_string(),
    };
    let payload = format!("[{},{}]", megafon, RAIFFEISEN);
    let response = ledger.init(&chaincode, &["init", &payload]);
    assert!(response.is_success(), "init failed: {}", response.message);
    (ledger, chaincode)
}

fn strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

fn fop_args(reference: &str, quantity: u64) -> Vec<String> {
    let quantity = quantity.to_string();
    strings(&[
        "fop",
        "MFONISSUEACC",
        "19000000000000000",
        "RBIOWNER0ACC",
        "00000000000000000",
        "RU000ABC0001",
        &quantity,
        reference,
        "2017-12-31",
        "2017-12-31",
        "CA9861913023",
        "DE000DB7HWY7",
        "memberInstructionId",
        "{\"json_reason\":\"any json\"}",
    ])
}

fn dvp_args(reference: &str, quantity: u64) -> Vec<String> {
    let mut args = fop_args(reference, quantity);
    args[0] = "dvp".to_string();
    args.extend(strings(&[
        "40701810000000001000",
        "f044525505op",
        "40701810000000001000",
        "f044525505op",
        "30000000",
        "RUB",
    ]));
    args
}

fn key_args(transfer_type: &str, reference: &str) -> Vec<String> {
    strings(&[
        transfer_type,
        "MFONISSUEACC",
        "19000000000000000",
        "RBIOWNER0ACC",
        "00000000000000000",
        "RU000ABC0001",
        reference,
    ])
}

fn invoke(ledger: &mut MemoryLedger, chaincode: &InstructionChaincode, function: &str, args: &[String]) -> Response {
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    ledger.invoke(chaincode, function, &args)
}

fn query(ledger: &MemoryLedger, chaincode: &InstructionChaincode, function: &str, args: &[String]) -> Response {
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    ledger.query(chaincode, function, &args)
}

fn query_all(ledger: &MemoryLedger, chaincode: &InstructionChaincode) -> Vec<Instruction> {
    query(ledger, chaincode, "query", &[]).payload_json().unwrap()
}

fn holding(ledger: &MemoryLedger, chaincode: &InstructionChaincode, account: &str, division: &str) -> u64 {
    let args = strings(&[account, division, "RU000ABC0001"]);
    let record: HoldingRecord = query(ledger, chaincode, "holding", &args).payload_json().unwrap();
    record.quantity.lots()
}
