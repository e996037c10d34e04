//! The loan engine: one unit-of-work entry point per operation.
//!
//! Each call acquires its own transaction handle from the store, hands it
//! to the lifecycle controller or the funding ledger, and commits only if
//! the operation succeeded. Concurrent callers each own a `LoanEngine`
//! opened on the same database file; the store serializes their writes.

use crate::{
    aggregate::FundingStatus,
    config::EngineConfig,
    documents::{DocumentGenerator, FileAgreementWriter},
    error::{LedgerError, LedgerResult},
    event::LoanEvent,
    ledger::{self, CommitRequest, FundingLedger, FundingReceipt},
    lifecycle::{
        ApprovalRequest, DisbursementRequest, LifecycleController, LoanProposal, SurveyRequest,
    },
    model::{Investment, Loan, Party, PartyRole},
    store::{LedgerStore, ReadAccess, WriteAccess},
    types::{InvestmentId, LoanId},
};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

pub struct LoanEngine {
    store:     LedgerStore,
    documents: Arc<dyn DocumentGenerator>,
}

impl LoanEngine {
    pub fn new(store: LedgerStore, documents: Arc<dyn DocumentGenerator>) -> Self {
        Self { store, documents }
    }

    /// Open the database at `path` with agreements written to disk per
    /// `config`. Does not migrate; call `migrate()` once per database.
    pub fn open(path: &str, config: &EngineConfig) -> LedgerResult<Self> {
        let documents: Arc<dyn DocumentGenerator> = Arc::new(FileAgreementWriter::from_config(config));
        Self::open_with(path, config, documents)
    }

    pub fn open_with(
        path: &str,
        config: &EngineConfig,
        documents: Arc<dyn DocumentGenerator>,
    ) -> LedgerResult<Self> {
        let store = LedgerStore::open(path)?;
        store.set_busy_timeout(config.busy_timeout())?;
        Ok(Self::new(store, documents))
    }

    /// Migrated in-memory engine. Used in tests.
    pub fn in_memory(documents: Arc<dyn DocumentGenerator>) -> LedgerResult<Self> {
        let store = LedgerStore::in_memory()?;
        store.migrate()?;
        Ok(Self::new(store, documents))
    }

    pub fn migrate(&self) -> LedgerResult<()> {
        self.store.migrate()
    }

    /// Another engine on the same database, sharing this document generator.
    pub fn reopen(&self) -> LedgerResult<Self> {
        Ok(Self::new(self.store.reopen()?, Arc::clone(&self.documents)))
    }

    pub fn store_mut(&mut self) -> &mut LedgerStore {
        &mut self.store
    }

    // ── Directory ──────────────────────────────────────────────

    pub fn register_party(&mut self, role: PartyRole, display_name: &str) -> LedgerResult<Party> {
        let name = display_name.trim();
        if name.is_empty() {
            return Err(LedgerError::validation("display_name", "must not be empty"));
        }
        let party = Party {
            party_id:     Uuid::new_v4(),
            role,
            display_name: name.to_string(),
            created_at:   Utc::now(),
        };
        let tx = self.store.write()?;
        tx.insert_party(&party)?;
        tx.commit()?;
        log::debug!("registered {role} {} ({})", party.party_id, party.display_name);
        Ok(party)
    }

    // ── Lifecycle ──────────────────────────────────────────────

    pub fn propose(&mut self, proposal: &LoanProposal) -> LedgerResult<Loan> {
        let controller = LifecycleController::new(self.documents.as_ref());
        let tx = self.store.write()?;
        let loan = controller.propose(&tx, proposal)?;
        tx.commit()?;
        Ok(loan)
    }

    pub fn record_survey(&mut self, req: &SurveyRequest) -> LedgerResult<Loan> {
        let controller = LifecycleController::new(self.documents.as_ref());
        let tx = self.store.write()?;
        let loan = controller.record_survey(&tx, req)?;
        tx.commit()?;
        Ok(loan)
    }

    pub fn approve(&mut self, req: &ApprovalRequest) -> LedgerResult<Loan> {
        let controller = LifecycleController::new(self.documents.as_ref());
        let tx = self.store.write()?;
        let loan = controller.approve(&tx, req)?;
        tx.commit()?;
        Ok(loan)
    }

    pub fn disburse(&mut self, req: &DisbursementRequest) -> LedgerResult<Loan> {
        let controller = LifecycleController::new(self.documents.as_ref());
        let tx = self.store.write()?;
        let loan = controller.disburse(&tx, req)?;
        tx.commit()?;
        Ok(loan)
    }

    // ── Funding ────────────────────────────────────────────────

    pub fn commit(&mut self, req: &CommitRequest) -> LedgerResult<FundingReceipt> {
        FundingLedger::new(self.documents.as_ref()).commit(&mut self.store, req)
    }

    /// Retry the agreement for an investment whose generation failed.
    pub fn regenerate_funding_agreement(&mut self, investment_id: InvestmentId) -> LedgerResult<String> {
        FundingLedger::new(self.documents.as_ref()).issue_agreement(&mut self.store, investment_id)
    }

    // ── Queries ────────────────────────────────────────────────

    pub fn loan(&mut self, loan_id: LoanId) -> LedgerResult<Loan> {
        self.store.read()?.load_loan(loan_id)
    }

    pub fn funding_status(&mut self, loan_id: LoanId) -> LedgerResult<FundingStatus> {
        ledger::funding_status(&self.store.read()?, loan_id)
    }

    pub fn investments(&mut self, loan_id: LoanId) -> LedgerResult<Vec<Investment>> {
        let tx = self.store.read()?;
        tx.load_loan(loan_id)?;
        tx.investments_for_loan(loan_id)
    }

    pub fn funding_agreement_ref(&mut self, investment_id: InvestmentId) -> LedgerResult<Option<String>> {
        self.store.read()?.funding_agreement_ref(investment_id)
    }

    /// The loan's journal, oldest first.
    pub fn events(&mut self, loan_id: LoanId) -> LedgerResult<Vec<LoanEvent>> {
        let entries = self.store.read()?.events_for_loan(loan_id)?;
        entries
            .iter()
            .map(|e| e.decode().map_err(LedgerError::from))
            .collect()
    }
}
