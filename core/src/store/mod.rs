//! SQLite persistence layer.
//!
//! RULE: Only the store modules talk to the database.
//! Everything else goes through a transaction handle:
//!   - `ReadTx`:  deferred transaction, read capability only
//!   - `WriteTx`: `BEGIN IMMEDIATE`, read + write capability
//!
//! A handle dropped without `commit()` rolls back. `WriteTx` takes the
//! database write lock before its first read, so every read-then-write
//! sequence inside it is serialized against all other writers.
//!
//! SQLite has one writer lock per database, not per loan: write handles
//! for different loans queue behind each other instead of running in
//! parallel. Each holds the lock only for its own short check-and-write,
//! and readers are never blocked (WAL).

use crate::{
    aggregate::FundingAggregate,
    error::{LedgerError, LedgerResult},
    event::{LoanEvent, LoanEventEntry},
    model::{ApprovalRecord, DisbursementRecord, Investment, Loan, Party, SurveyRecord},
    state::LoanState,
    types::{InvestmentId, LoanId, PartyId},
};
use chrono::{DateTime, Utc};
use rusqlite::{types::Type, Connection, Row, Transaction, TransactionBehavior};
use rust_decimal::Decimal;
use std::{str::FromStr, time::Duration};
use uuid::Uuid;

mod event;
mod investment;
mod loan;
mod party;

pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct LedgerStore {
    conn: Connection,
    path: Option<String>, // None for :memory:, Some(path) for file
}

impl LedgerStore {
    pub fn open(path: &str) -> LedgerResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // Readers keep working while a writer holds the lock.
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        log::debug!("store {path}: journal_mode={mode}");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
        Ok(Self {
            conn,
            path: Some(path.to_string()),
        })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> LedgerResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn, path: None })
    }

    /// Open a second connection to the same database, for another unit
    /// of work. An in-memory store reopens as a new, empty database.
    pub fn reopen(&self) -> LedgerResult<Self> {
        match &self.path {
            Some(p) => Self::open(p),
            None => Self::in_memory(),
        }
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn set_busy_timeout(&self, timeout: Duration) -> LedgerResult<()> {
        self.conn.busy_timeout(timeout)?;
        Ok(())
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> LedgerResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_ledger.sql"))?;
        Ok(())
    }

    pub fn read(&mut self) -> LedgerResult<ReadTx<'_>> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Deferred)?;
        Ok(ReadTx { tx })
    }

    pub fn write(&mut self) -> LedgerResult<WriteTx<'_>> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        Ok(WriteTx { tx })
    }
}

/// Read-only view of the ledger at one consistent snapshot.
pub struct ReadTx<'c> {
    tx: Transaction<'c>,
}

/// Exclusive read-write unit of work.
pub struct WriteTx<'c> {
    tx: Transaction<'c>,
}

impl WriteTx<'_> {
    pub fn commit(self) -> LedgerResult<()> {
        self.tx.commit()?;
        Ok(())
    }
}

mod sealed {
    /// Raw connection access stays inside the crate.
    pub trait Handle {
        fn conn(&self) -> &rusqlite::Connection;
    }
}

impl sealed::Handle for ReadTx<'_> {
    fn conn(&self) -> &Connection {
        &self.tx
    }
}

impl sealed::Handle for WriteTx<'_> {
    fn conn(&self) -> &Connection {
        &self.tx
    }
}

/// Queries available on every handle.
pub trait ReadAccess: sealed::Handle {
    fn find_loan(&self, loan_id: LoanId) -> LedgerResult<Option<Loan>> {
        loan::find(self.conn(), loan_id)
    }

    fn load_loan(&self, loan_id: LoanId) -> LedgerResult<Loan> {
        self.find_loan(loan_id)?
            .ok_or_else(|| LedgerError::loan_not_found(loan_id))
    }

    fn find_party(&self, party_id: PartyId) -> LedgerResult<Option<Party>> {
        party::find(self.conn(), party_id)
    }

    fn find_investment(&self, investment_id: InvestmentId) -> LedgerResult<Option<Investment>> {
        investment::find(self.conn(), investment_id)
    }

    fn investments_for_loan(&self, loan_id: LoanId) -> LedgerResult<Vec<Investment>> {
        investment::for_loan(self.conn(), loan_id)
    }

    fn investment_exists(&self, loan_id: LoanId, investor_id: PartyId) -> LedgerResult<bool> {
        investment::exists(self.conn(), loan_id, investor_id)
    }

    /// Σ of every recorded commitment against `loan`, read fresh.
    fn funding_aggregate(&self, loan: &Loan) -> LedgerResult<FundingAggregate> {
        let amounts = investment::amounts_for_loan(self.conn(), loan.loan_id)?;
        Ok(FundingAggregate::from_amounts(loan.principal_amount, amounts))
    }

    fn funding_agreement_ref(&self, investment_id: InvestmentId) -> LedgerResult<Option<String>> {
        investment::agreement_ref(self.conn(), investment_id)
    }

    fn events_for_loan(&self, loan_id: LoanId) -> LedgerResult<Vec<LoanEventEntry>> {
        event::for_loan(self.conn(), loan_id)
    }
}

/// Mutations. Only `WriteTx` carries this capability.
///
/// Conditional updates return whether a row matched, so callers can tell
/// "state moved underneath us" apart from a successful write.
pub trait WriteAccess: ReadAccess {
    fn insert_party(&self, party: &Party) -> LedgerResult<()> {
        party::insert(self.conn(), party)
    }

    fn insert_loan(&self, loan: &Loan) -> LedgerResult<()> {
        loan::insert(self.conn(), loan)
    }

    fn record_survey(
        &self,
        loan_id: LoanId,
        survey: &SurveyRecord,
        at: DateTime<Utc>,
    ) -> LedgerResult<bool> {
        loan::record_survey(self.conn(), loan_id, survey, at)
    }

    fn record_approval(
        &self,
        loan_id: LoanId,
        approval: &ApprovalRecord,
        at: DateTime<Utc>,
    ) -> LedgerResult<bool> {
        loan::record_approval(self.conn(), loan_id, approval, at)
    }

    fn record_disbursement(
        &self,
        loan_id: LoanId,
        disbursement: &DisbursementRecord,
        at: DateTime<Utc>,
    ) -> LedgerResult<bool> {
        loan::record_disbursement(self.conn(), loan_id, disbursement, at)
    }

    fn update_state(
        &self,
        loan_id: LoanId,
        from: LoanState,
        to: LoanState,
        at: DateTime<Utc>,
    ) -> LedgerResult<bool> {
        loan::update_state(self.conn(), loan_id, from, to, at)
    }

    fn insert_investment(&self, investment: &Investment) -> LedgerResult<()> {
        investment::insert(self.conn(), investment)
    }

    fn upsert_funding_agreement(
        &self,
        investment_id: InvestmentId,
        agreement_ref: &str,
        at: DateTime<Utc>,
    ) -> LedgerResult<()> {
        investment::upsert_agreement(self.conn(), investment_id, agreement_ref, at)
    }

    fn append_event(&self, loan_id: LoanId, event: &LoanEvent, at: DateTime<Utc>) -> LedgerResult<()> {
        let entry = LoanEventEntry::new(loan_id, event, at)?;
        event::append(self.conn(), &entry)
    }
}

impl ReadAccess for ReadTx<'_> {}
impl ReadAccess for WriteTx<'_> {}
impl WriteAccess for WriteTx<'_> {}

// ── Column helpers ─────────────────────────────────────────────

fn conversion_failure<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn decimal_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let raw: String = row.get(idx)?;
    Decimal::from_str(&raw).map_err(|e| conversion_failure(idx, e))
}

fn uuid_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw).map_err(|e| conversion_failure(idx, e))
}

fn opt_uuid_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Uuid>> {
    row.get::<_, Option<String>>(idx)?
        .map(|raw| Uuid::parse_str(&raw).map_err(|e| conversion_failure(idx, e)))
        .transpose()
}
