use super::{decimal_at, uuid_at};
use crate::{
    error::LedgerResult,
    model::Investment,
    types::{Amount, InvestmentId, LoanId, PartyId},
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

fn investment_row_mapper(row: &rusqlite::Row<'_>) -> rusqlite::Result<Investment> {
    Ok(Investment {
        investment_id:   uuid_at(row, 0)?,
        loan_id:         uuid_at(row, 1)?,
        investor_id:     uuid_at(row, 2)?,
        amount:          decimal_at(row, 3)?,
        expected_return: decimal_at(row, 4)?,
        committed_at:    row.get(5)?,
        created_at:      row.get(6)?,
    })
}

pub(super) fn insert(conn: &Connection, inv: &Investment) -> LedgerResult<()> {
    conn.execute(
        "INSERT INTO investment (
            investment_id, loan_id, investor_id, amount, expected_return,
            committed_at, created_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            inv.investment_id.to_string(),
            inv.loan_id.to_string(),
            inv.investor_id.to_string(),
            inv.amount.to_string(),
            inv.expected_return.to_string(),
            inv.committed_at,
            inv.created_at,
        ],
    )?;
    Ok(())
}

pub(super) fn find(conn: &Connection, investment_id: InvestmentId) -> LedgerResult<Option<Investment>> {
    let inv = conn
        .query_row(
            "SELECT investment_id, loan_id, investor_id, amount, expected_return,
                    committed_at, created_at
             FROM investment WHERE investment_id = ?1",
            params![investment_id.to_string()],
            investment_row_mapper,
        )
        .optional()?;
    Ok(inv)
}

pub(super) fn for_loan(conn: &Connection, loan_id: LoanId) -> LedgerResult<Vec<Investment>> {
    let mut stmt = conn.prepare(
        "SELECT investment_id, loan_id, investor_id, amount, expected_return,
                committed_at, created_at
         FROM investment WHERE loan_id = ?1
         ORDER BY committed_at ASC, rowid ASC",
    )?;
    let rows = stmt.query_map(params![loan_id.to_string()], investment_row_mapper)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
}

/// Raw committed amounts; summed by the caller in exact decimal.
pub(super) fn amounts_for_loan(conn: &Connection, loan_id: LoanId) -> LedgerResult<Vec<Amount>> {
    let mut stmt = conn.prepare("SELECT amount FROM investment WHERE loan_id = ?1")?;
    let rows = stmt.query_map(params![loan_id.to_string()], |row| decimal_at(row, 0))?;
    rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
}

pub(super) fn exists(conn: &Connection, loan_id: LoanId, investor_id: PartyId) -> LedgerResult<bool> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM investment WHERE loan_id = ?1 AND investor_id = ?2)",
        params![loan_id.to_string(), investor_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(exists)
}

pub(super) fn agreement_ref(conn: &Connection, investment_id: InvestmentId) -> LedgerResult<Option<String>> {
    let url = conn
        .query_row(
            "SELECT agreement_ref FROM funding_agreement WHERE investment_id = ?1",
            params![investment_id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(url)
}

pub(super) fn upsert_agreement(
    conn: &Connection,
    investment_id: InvestmentId,
    agreement_ref: &str,
    at: DateTime<Utc>,
) -> LedgerResult<()> {
    conn.execute(
        "INSERT INTO funding_agreement (investment_id, agreement_ref, generated_at)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(investment_id) DO UPDATE SET
             agreement_ref = excluded.agreement_ref,
             generated_at  = excluded.generated_at",
        params![investment_id.to_string(), agreement_ref, at],
    )?;
    Ok(())
}
