//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use loan_ledger_core::{
    config::EngineConfig,
    documents::{DocumentError, DocumentGenerator},
    ledger::{CommitRequest, FundingReceipt},
    lifecycle::{ApprovalRequest, LoanProposal, SurveyRequest},
    model::{Investment, Loan, PartyRole},
    types::{Amount, LoanId, PartyId, Rate},
    LedgerResult, LoanEngine,
};
use chrono::{Duration, Utc};
use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
};

/// Document generator that hands back references without touching disk
/// and can be switched into failure.
#[derive(Default)]
pub struct RecordingDocuments {
    pub fail_approval: AtomicBool,
    pub fail_funding:  AtomicBool,
    pub approvals:     AtomicUsize,
    pub fundings:      AtomicUsize,
}

impl DocumentGenerator for RecordingDocuments {
    fn approval_agreement(&self, loan: &Loan, _borrower_name: &str) -> Result<String, DocumentError> {
        if self.fail_approval.load(Ordering::SeqCst) {
            return Err(DocumentError::Rejected("renderer offline".into()));
        }
        self.approvals.fetch_add(1, Ordering::SeqCst);
        Ok(format!("/agreements/loan_{}.txt", loan.loan_id))
    }

    fn funding_agreement(
        &self,
        investment: &Investment,
        _loan: &Loan,
        _investor_name: &str,
    ) -> Result<String, DocumentError> {
        if self.fail_funding.load(Ordering::SeqCst) {
            return Err(DocumentError::Rejected("renderer offline".into()));
        }
        self.fundings.fetch_add(1, Ordering::SeqCst);
        Ok(format!("/agreements/investment_{}.txt", investment.investment_id))
    }
}

pub struct Desk {
    pub engine:   LoanEngine,
    pub docs:     Arc<RecordingDocuments>,
    pub borrower: PartyId,
    pub employee: PartyId,
    pub officer:  PartyId,
}

impl Desk {
    pub fn new() -> Self {
        let docs = Arc::new(RecordingDocuments::default());
        let engine = LoanEngine::in_memory(docs.clone()).expect("in-memory engine");
        Self::with_engine(engine, docs)
    }

    /// A desk on a real database file, so other engines can join it.
    pub fn on_file(path: &str) -> Self {
        let docs = Arc::new(RecordingDocuments::default());
        let engine = LoanEngine::open_with(path, &EngineConfig::default_test(), docs.clone())
            .expect("open engine");
        engine.migrate().expect("migrate");
        Self::with_engine(engine, docs)
    }

    fn with_engine(mut engine: LoanEngine, docs: Arc<RecordingDocuments>) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let borrower = engine.register_party(PartyRole::Borrower, "Siti Rahma").unwrap().party_id;
        let employee = engine.register_party(PartyRole::Employee, "Budi Santoso").unwrap().party_id;
        let officer = engine.register_party(PartyRole::Employee, "Dewi Lestari").unwrap().party_id;
        Self { engine, docs, borrower, employee, officer }
    }

    pub fn investor(&mut self, name: &str) -> PartyId {
        self.engine
            .register_party(PartyRole::Investor, name)
            .expect("register investor")
            .party_id
    }

    pub fn propose(&mut self, principal: Amount, return_rate: Rate) -> Loan {
        self.engine
            .propose(&LoanProposal {
                borrower_id:      self.borrower,
                principal_amount: principal,
                interest_rate:    Rate::from(10),
                return_rate,
                term_months:      12,
            })
            .expect("propose")
    }

    pub fn survey(&mut self, loan_id: LoanId) -> Loan {
        self.engine
            .record_survey(&SurveyRequest {
                loan_id,
                validator_id: self.employee,
                survey_date:  (Utc::now() - Duration::days(1)).date_naive(),
                document_ref: Some(format!("/uploads/survey_documents/{loan_id}.jpg")),
            })
            .expect("record survey")
    }

    pub fn approve(&mut self, loan_id: LoanId) -> LedgerResult<Loan> {
        self.engine.approve(&ApprovalRequest {
            loan_id,
            employee_id: self.employee,
            notes:       "income verified".into(),
        })
    }

    /// A loan ready to take commitments.
    pub fn approved_loan(&mut self, principal: Amount, return_rate: Rate) -> LoanId {
        let loan = self.propose(principal, return_rate);
        self.survey(loan.loan_id);
        self.approve(loan.loan_id).expect("approve");
        loan.loan_id
    }

    pub fn invest(&mut self, loan_id: LoanId, investor_id: PartyId, amount: Amount) -> LedgerResult<FundingReceipt> {
        self.engine.commit(&CommitRequest { loan_id, investor_id, amount })
    }
}

/// A fresh database path under the system temp dir.
pub struct TempDb {
    pub path: PathBuf,
}

impl TempDb {
    pub fn new(label: &str) -> Self {
        let path = std::env::temp_dir().join(format!("loan-ledger-{label}-{}.db", uuid::Uuid::new_v4()));
        Self { path }
    }

    pub fn as_str(&self) -> &str {
        self.path.to_str().expect("utf-8 temp path")
    }
}

impl Drop for TempDb {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{suffix}", self.path.display()));
        }
    }
}
