use super::uuid_at;
use crate::{error::LedgerResult, event::LoanEventEntry, types::LoanId};
use rusqlite::{params, Connection};

pub(super) fn append(conn: &Connection, entry: &LoanEventEntry) -> LedgerResult<()> {
    conn.execute(
        "INSERT INTO loan_event (loan_id, event_type, payload, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            entry.loan_id.to_string(),
            &entry.event_type,
            &entry.payload,
            entry.created_at,
        ],
    )?;
    Ok(())
}

pub(super) fn for_loan(conn: &Connection, loan_id: LoanId) -> LedgerResult<Vec<LoanEventEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, loan_id, event_type, payload, created_at
         FROM loan_event WHERE loan_id = ?1
         ORDER BY id ASC",
    )?;
    let entries = stmt
        .query_map(params![loan_id.to_string()], |row| {
            Ok(LoanEventEntry {
                id:         Some(row.get(0)?),
                loan_id:    uuid_at(row, 1)?,
                event_type: row.get(2)?,
                payload:    row.get(3)?,
                created_at: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(entries)
}
