use super::{decimal_at, opt_uuid_at, uuid_at};
use crate::{
    error::LedgerResult,
    model::{ApprovalRecord, DisbursementRecord, Loan, SurveyRecord},
    state::LoanState,
    types::LoanId,
};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};

const LOAN_COLUMNS: &str = "
    loan_id, borrower_id, principal_amount, interest_rate, return_rate,
    term_months, current_state,
    validator_id, survey_date, survey_document_ref,
    approving_employee_id, approval_date, approval_notes, agreement_ref,
    field_officer_id, disbursement_date, disbursement_notes, signed_agreement_ref,
    created_at, updated_at";

// Helper function for mapping loan rows
fn loan_row_mapper(row: &rusqlite::Row<'_>) -> rusqlite::Result<Loan> {
    let state: String = row.get(6)?;
    let state = state
        .parse::<LoanState>()
        .map_err(|e| super::conversion_failure(6, e))?;

    let survey = match (opt_uuid_at(row, 7)?, row.get::<_, Option<NaiveDate>>(8)?) {
        (Some(validator_id), Some(survey_date)) => Some(SurveyRecord {
            validator_id,
            survey_date,
            document_ref: row.get(9)?,
        }),
        _ => None,
    };

    let approval = match (
        opt_uuid_at(row, 10)?,
        row.get::<_, Option<NaiveDate>>(11)?,
        row.get::<_, Option<String>>(13)?,
    ) {
        (Some(employee_id), Some(approval_date), Some(agreement_ref)) => Some(ApprovalRecord {
            employee_id,
            approval_date,
            notes: row.get::<_, Option<String>>(12)?.unwrap_or_default(),
            agreement_ref,
        }),
        _ => None,
    };

    let disbursement = match (
        opt_uuid_at(row, 14)?,
        row.get::<_, Option<NaiveDate>>(15)?,
        row.get::<_, Option<String>>(17)?,
    ) {
        (Some(officer_id), Some(disbursement_date), Some(signed_agreement_ref)) => {
            Some(DisbursementRecord {
                officer_id,
                disbursement_date,
                notes: row.get::<_, Option<String>>(16)?.unwrap_or_default(),
                signed_agreement_ref,
            })
        }
        _ => None,
    };

    Ok(Loan {
        loan_id:          uuid_at(row, 0)?,
        borrower_id:      uuid_at(row, 1)?,
        principal_amount: decimal_at(row, 2)?,
        interest_rate:    decimal_at(row, 3)?,
        return_rate:      decimal_at(row, 4)?,
        term_months:      row.get(5)?,
        state,
        survey,
        approval,
        disbursement,
        created_at:       row.get(18)?,
        updated_at:       row.get(19)?,
    })
}

pub(super) fn insert(conn: &Connection, loan: &Loan) -> LedgerResult<()> {
    conn.execute(
        "INSERT INTO loan (
            loan_id, borrower_id, principal_amount, interest_rate, return_rate,
            term_months, current_state, created_at, updated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            loan.loan_id.to_string(),
            loan.borrower_id.to_string(),
            loan.principal_amount.to_string(),
            loan.interest_rate.to_string(),
            loan.return_rate.to_string(),
            loan.term_months,
            loan.state.as_str(),
            loan.created_at,
            loan.updated_at,
        ],
    )?;
    Ok(())
}

pub(super) fn find(conn: &Connection, loan_id: LoanId) -> LedgerResult<Option<Loan>> {
    let loan = conn
        .query_row(
            &format!("SELECT {LOAN_COLUMNS} FROM loan WHERE loan_id = ?1"),
            params![loan_id.to_string()],
            loan_row_mapper,
        )
        .optional()?;
    Ok(loan)
}

pub(super) fn record_survey(
    conn: &Connection,
    loan_id: LoanId,
    survey: &SurveyRecord,
    at: DateTime<Utc>,
) -> LedgerResult<bool> {
    let changed = conn.execute(
        "UPDATE loan SET validator_id = ?1, survey_date = ?2, survey_document_ref = ?3,
                         updated_at = ?4
         WHERE loan_id = ?5 AND current_state = 'PROPOSED'",
        params![
            survey.validator_id.to_string(),
            survey.survey_date,
            survey.document_ref.as_deref(),
            at,
            loan_id.to_string(),
        ],
    )?;
    Ok(changed == 1)
}

/// Approval metadata and the APPROVED state land in one statement.
pub(super) fn record_approval(
    conn: &Connection,
    loan_id: LoanId,
    approval: &ApprovalRecord,
    at: DateTime<Utc>,
) -> LedgerResult<bool> {
    let changed = conn.execute(
        "UPDATE loan SET current_state = 'APPROVED',
                         approving_employee_id = ?1, approval_date = ?2,
                         approval_notes = ?3, agreement_ref = ?4, updated_at = ?5
         WHERE loan_id = ?6 AND current_state = 'PROPOSED'
           AND validator_id IS NOT NULL AND survey_date IS NOT NULL",
        params![
            approval.employee_id.to_string(),
            approval.approval_date,
            &approval.notes,
            &approval.agreement_ref,
            at,
            loan_id.to_string(),
        ],
    )?;
    Ok(changed == 1)
}

pub(super) fn record_disbursement(
    conn: &Connection,
    loan_id: LoanId,
    disbursement: &DisbursementRecord,
    at: DateTime<Utc>,
) -> LedgerResult<bool> {
    let changed = conn.execute(
        "UPDATE loan SET current_state = 'DISBURSED',
                         field_officer_id = ?1, disbursement_date = ?2,
                         disbursement_notes = ?3, signed_agreement_ref = ?4, updated_at = ?5
         WHERE loan_id = ?6 AND current_state = 'INVESTED'",
        params![
            disbursement.officer_id.to_string(),
            disbursement.disbursement_date,
            &disbursement.notes,
            &disbursement.signed_agreement_ref,
            at,
            loan_id.to_string(),
        ],
    )?;
    Ok(changed == 1)
}

pub(super) fn update_state(
    conn: &Connection,
    loan_id: LoanId,
    from: LoanState,
    to: LoanState,
    at: DateTime<Utc>,
) -> LedgerResult<bool> {
    let changed = conn.execute(
        "UPDATE loan SET current_state = ?1, updated_at = ?2
         WHERE loan_id = ?3 AND current_state = ?4",
        params![to.as_str(), at, loan_id.to_string(), from.as_str()],
    )?;
    Ok(changed == 1)
}
