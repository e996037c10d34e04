//! ledger-runner: command-line driver for the loan ledger.
//!
//! Usage:
//!   ledger-runner --db ledger.db --data-dir ./data
//!   ledger-runner --db ledger.db --ipc-mode
//!
//! Without `--ipc-mode` it walks one loan through its whole lifecycle and
//! prints a summary. With it, it reads one JSON command per line on stdin
//! and answers one JSON line per command on stdout.

use anyhow::Result;
use chrono::{Duration, Utc};
use loan_ledger_core::{
    config::EngineConfig,
    ledger::CommitRequest,
    lifecycle::{ApprovalRequest, DisbursementRequest, LoanProposal, SurveyRequest},
    model::PartyRole,
    types::{InvestmentId, LoanId},
    LedgerError, LedgerResult, LoanEngine,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::env;
use std::io::{self, BufRead, Write};
use uuid::Uuid;

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    RegisterParty {
        role:         PartyRole,
        display_name: String,
    },
    Propose(LoanProposal),
    RecordSurvey(SurveyRequest),
    Approve(ApprovalRequest),
    Invest(CommitRequest),
    RegenerateAgreement {
        investment_id: InvestmentId,
    },
    Disburse(DisbursementRequest),
    Status {
        loan_id: LoanId,
    },
    Loan {
        loan_id: LoanId,
    },
    Investments {
        loan_id: LoanId,
    },
    Events {
        loan_id: LoanId,
    },
    Quit,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let db = parse_str_arg(&args, "--db", ":memory:");
    let data_dir = parse_str_arg(&args, "--data-dir", "./data");

    let config = EngineConfig::load(data_dir)?;

    if !ipc_mode {
        println!("Loan Ledger: ledger-runner");
        println!("  db:          {db}");
        println!("  data_dir:    {data_dir}");
        println!("  agreements:  {}", config.agreements_dir);
        println!();
    }

    let mut engine = LoanEngine::open(db, &config)?;
    engine.migrate()?;

    if ipc_mode {
        run_ipc_loop(&mut engine)?;
    } else {
        run_demo(&mut engine, &config)?;
    }

    Ok(())
}

fn run_ipc_loop(engine: &mut LoanEngine) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }
        if buffer.trim().is_empty() {
            continue;
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                let err_json = serde_json::json!({
                    "error": { "kind": "bad_request", "message": e.to_string() }
                });
                writeln!(stdout, "{}", err_json)?;
                stdout.flush()?;
                continue;
            }
        };
        if matches!(cmd, IpcCommand::Quit) {
            break;
        }

        let reply = match handle_command(engine, cmd) {
            Ok(value) => serde_json::json!({ "ok": value }),
            Err(e) => {
                log::debug!("command failed: {e}");
                serde_json::json!({ "error": { "kind": e.kind(), "message": e.to_string() } })
            }
        };
        writeln!(stdout, "{}", reply)?;
        stdout.flush()?;
    }
    Ok(())
}

fn handle_command(engine: &mut LoanEngine, cmd: IpcCommand) -> LedgerResult<serde_json::Value> {
    let value = match cmd {
        IpcCommand::RegisterParty { role, display_name } => {
            serde_json::to_value(engine.register_party(role, &display_name)?)?
        }
        IpcCommand::Propose(req) => serde_json::to_value(engine.propose(&req)?)?,
        IpcCommand::RecordSurvey(req) => serde_json::to_value(engine.record_survey(&req)?)?,
        IpcCommand::Approve(req) => serde_json::to_value(engine.approve(&req)?)?,
        IpcCommand::Invest(req) => serde_json::to_value(engine.commit(&req)?)?,
        IpcCommand::RegenerateAgreement { investment_id } => {
            let agreement_ref = engine.regenerate_funding_agreement(investment_id)?;
            serde_json::json!({ "investment_id": investment_id, "agreement_ref": agreement_ref })
        }
        IpcCommand::Disburse(req) => serde_json::to_value(engine.disburse(&req)?)?,
        IpcCommand::Status { loan_id } => serde_json::to_value(engine.funding_status(loan_id)?)?,
        IpcCommand::Loan { loan_id } => serde_json::to_value(engine.loan(loan_id)?)?,
        IpcCommand::Investments { loan_id } => serde_json::to_value(engine.investments(loan_id)?)?,
        IpcCommand::Events { loan_id } => serde_json::to_value(engine.events(loan_id)?)?,
        IpcCommand::Quit => serde_json::Value::Null,
    };
    Ok(value)
}

/// One loan of 5,000,000 at an 8% investor return, funded by two
/// investors after a third overshoots, then disbursed.
fn run_demo(engine: &mut LoanEngine, config: &EngineConfig) -> Result<()> {
    let borrower = engine.register_party(PartyRole::Borrower, "Siti Rahma")?;
    let validator = engine.register_party(PartyRole::Employee, "Budi Santoso")?;
    let officer = engine.register_party(PartyRole::Employee, "Dewi Lestari")?;
    let investor_x = engine.register_party(PartyRole::Investor, "Investor X")?;
    let investor_y = engine.register_party(PartyRole::Investor, "Investor Y")?;
    let investor_z = engine.register_party(PartyRole::Investor, "Investor Z")?;

    let loan = engine.propose(&LoanProposal {
        borrower_id:      borrower.party_id,
        principal_amount: dec!(5000000),
        interest_rate:    dec!(10),
        return_rate:      dec!(8),
        term_months:      12,
    })?;
    let loan_id = loan.loan_id;

    engine.record_survey(&SurveyRequest {
        loan_id,
        validator_id: validator.party_id,
        survey_date:  (Utc::now() - Duration::days(1)).date_naive(),
        document_ref: None,
    })?;
    let approved = engine.approve(&ApprovalRequest {
        loan_id,
        employee_id: validator.party_id,
        notes:       "field survey satisfactory".into(),
    })?;

    let mut rejected = Vec::new();
    for (investor_id, amount) in [
        (investor_x.party_id, dec!(2000000)),
        (investor_z.party_id, dec!(4000000)),
        (investor_y.party_id, dec!(3000000)),
    ] {
        match engine.commit(&CommitRequest { loan_id, investor_id, amount }) {
            Ok(receipt) => log::info!(
                "committed {amount}; loan now {}",
                receipt.commitment.loan_state
            ),
            Err(e @ LedgerError::CapacityExceeded { .. }) => rejected.push(e.to_string()),
            Err(e) => return Err(e.into()),
        }
    }

    let signed_ref = approved
        .approval
        .as_ref()
        .map(|a| a.agreement_ref.replace(".txt", "_signed.txt"))
        .unwrap_or_default();
    let disbursed = engine.disburse(&DisbursementRequest {
        loan_id,
        officer_id: officer.party_id,
        notes: "transferred".into(),
        signed_agreement_ref: signed_ref,
    })?;

    print_summary(engine, config, loan_id, &rejected)?;
    println!();
    println!("  final state:    {}", disbursed.state);
    Ok(())
}

fn print_summary(
    engine: &mut LoanEngine,
    config: &EngineConfig,
    loan_id: Uuid,
    rejected: &[String],
) -> Result<()> {
    let status = engine.funding_status(loan_id)?;
    let investments = engine.investments(loan_id)?;
    let total_return: Decimal = investments.iter().map(|i| i.expected_return).sum();
    let events = engine.events(loan_id)?;

    println!("=== LOAN SUMMARY ===");
    println!("  loan_id:        {loan_id}");
    println!("  principal:      {} {}", config.currency, status.principal);
    println!("  committed:      {} {}", config.currency, status.total_committed);
    println!("  remaining:      {} {}", config.currency, status.remaining);
    println!("  investors:      {}", status.investor_count);
    println!("  total return:   {} {}", config.currency, total_return);
    println!("  journal events: {}", events.len());
    println!();

    println!("=== INVESTMENTS ===");
    for inv in &investments {
        let agreement = engine
            .funding_agreement_ref(inv.investment_id)?
            .unwrap_or_else(|| "(pending)".into());
        println!(
            "  {} | {} {} | return {} | {}",
            inv.investor_id, config.currency, inv.amount, inv.expected_return, agreement
        );
    }
    if !rejected.is_empty() {
        println!();
        println!("=== REJECTED ===");
        for r in rejected {
            println!("  {r}");
        }
    }
    Ok(())
}

fn parse_str_arg<'a>(args: &'a [String], flag: &str, default: &'a str) -> &'a str {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
        .unwrap_or(default)
}
