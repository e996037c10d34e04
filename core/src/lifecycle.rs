//! Loan lifecycle controller for the operator-driven transitions.
//!
//! Every operation runs against a caller-supplied `WriteAccess` handle:
//! preconditions are read and the change is written inside the same
//! transaction, and nothing is written unless every check passes.
//! Commit and rollback belong to the caller.
//!
//! FUNDING and INVESTED are never set here directly; the funding ledger
//! moves loans into them through `advance_state`.

use crate::{
    aggregate,
    documents::DocumentGenerator,
    error::{Action, AgreementKind, LedgerError, LedgerResult, Precondition},
    event::LoanEvent,
    identity::IdentityProvider,
    model::{ApprovalRecord, DisbursementRecord, Loan, PartyRole, SurveyRecord},
    state::LoanState,
    store::WriteAccess,
    types::{Amount, LoanId, PartyId, Rate},
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanProposal {
    pub borrower_id:      PartyId,
    pub principal_amount: Amount,
    pub interest_rate:    Rate,
    pub return_rate:      Rate,
    pub term_months:      u32,
}

impl LoanProposal {
    pub fn validate(&self) -> LedgerResult<()> {
        if self.principal_amount <= Decimal::ZERO {
            return Err(LedgerError::validation("principal_amount", "must be greater than zero"));
        }
        if self.interest_rate < Decimal::ZERO {
            return Err(LedgerError::validation("interest_rate", "must not be negative"));
        }
        if self.return_rate < Decimal::ZERO {
            return Err(LedgerError::validation("return_rate", "must not be negative"));
        }
        if self.term_months == 0 {
            return Err(LedgerError::validation("term_months", "must be greater than zero"));
        }
        // Repayment totals and investor returns derive from these products;
        // both must fit so later operations cannot overflow.
        for (field, rate) in [("interest_rate", self.interest_rate), ("return_rate", self.return_rate)] {
            if aggregate::with_flat_rate(self.principal_amount, rate).is_none() {
                return Err(LedgerError::validation(field, "too large for the principal amount"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveyRequest {
    pub loan_id:      LoanId,
    pub validator_id: PartyId,
    pub survey_date:  NaiveDate,
    /// Reference to the survey document, already stored by the upload service.
    #[serde(default)]
    pub document_ref: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub loan_id:     LoanId,
    pub employee_id: PartyId,
    #[serde(default)]
    pub notes:       String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisbursementRequest {
    pub loan_id:              LoanId,
    pub officer_id:           PartyId,
    #[serde(default)]
    pub notes:                String,
    pub signed_agreement_ref: String,
}

pub struct LifecycleController<'a> {
    documents: &'a dyn DocumentGenerator,
}

impl<'a> LifecycleController<'a> {
    pub fn new(documents: &'a dyn DocumentGenerator) -> Self {
        Self { documents }
    }

    /// Create a loan in PROPOSED.
    pub fn propose<W: WriteAccess>(&self, tx: &W, proposal: &LoanProposal) -> LedgerResult<Loan> {
        proposal.validate()?;
        tx.resolve(PartyRole::Borrower, proposal.borrower_id)?;

        let now = Utc::now();
        let loan = Loan {
            loan_id:          Uuid::new_v4(),
            borrower_id:      proposal.borrower_id,
            principal_amount: proposal.principal_amount,
            interest_rate:    proposal.interest_rate,
            return_rate:      proposal.return_rate,
            term_months:      proposal.term_months,
            state:            LoanState::Proposed,
            survey:           None,
            approval:         None,
            disbursement:     None,
            created_at:       now,
            updated_at:       now,
        };
        tx.insert_loan(&loan)?;
        tx.append_event(
            loan.loan_id,
            &LoanEvent::Proposed {
                borrower_id:      loan.borrower_id,
                principal_amount: loan.principal_amount,
            },
            now,
        )?;

        log::info!(
            "loan {}: proposed by borrower {} for {} over {} months",
            loan.loan_id, loan.borrower_id, loan.principal_amount, loan.term_months
        );
        Ok(loan)
    }

    /// Attach field-survey metadata to a PROPOSED loan. Re-recording
    /// replaces the previous survey; the state does not change.
    pub fn record_survey<W: WriteAccess>(&self, tx: &W, req: &SurveyRequest) -> LedgerResult<Loan> {
        let today = Utc::now().date_naive();
        if req.survey_date > today {
            return Err(LedgerError::validation("survey_date", "must not be in the future"));
        }

        let loan = tx.load_loan(req.loan_id)?;
        if loan.state != LoanState::Proposed {
            return Err(LedgerError::InvalidStateTransition {
                loan_id: loan.loan_id,
                state:   loan.state,
                action:  Action::RecordSurvey,
            });
        }
        tx.resolve(PartyRole::Employee, req.validator_id)?;

        let now = Utc::now();
        let survey = SurveyRecord {
            validator_id: req.validator_id,
            survey_date:  req.survey_date,
            document_ref: req.document_ref.clone(),
        };
        if !tx.record_survey(loan.loan_id, &survey, now)? {
            return Err(state_moved(tx, loan.loan_id, Action::RecordSurvey));
        }
        tx.append_event(
            loan.loan_id,
            &LoanEvent::SurveyRecorded {
                validator_id: survey.validator_id,
                survey_date:  survey.survey_date,
            },
            now,
        )?;

        log::info!("loan {}: survey recorded by {}", loan.loan_id, req.validator_id);
        tx.load_loan(loan.loan_id)
    }

    /// PROPOSED → APPROVED.
    ///
    /// Checks run in a fixed order: the loan exists, its survey is on
    /// record, it is still PROPOSED. The agreement is generated before
    /// anything is written; if generation fails the loan is untouched.
    pub fn approve<W: WriteAccess>(&self, tx: &W, req: &ApprovalRequest) -> LedgerResult<Loan> {
        let loan = tx.load_loan(req.loan_id)?;
        if loan.survey.is_none() {
            return Err(LedgerError::PreconditionFailed {
                loan_id:      loan.loan_id,
                precondition: Precondition::SurveyIncomplete,
            });
        }
        if loan.state != LoanState::Proposed {
            return Err(LedgerError::InvalidStateTransition {
                loan_id: loan.loan_id,
                state:   loan.state,
                action:  Action::Approve,
            });
        }
        tx.resolve(PartyRole::Employee, req.employee_id)?;
        let borrower_name = tx.display_name(PartyRole::Borrower, loan.borrower_id)?;

        let agreement_ref = self
            .documents
            .approval_agreement(&loan, &borrower_name)
            .map_err(|source| {
                log::warn!("loan {}: approval agreement failed: {source}", loan.loan_id);
                LedgerError::AgreementGenerationFailed {
                    document:      AgreementKind::Approval,
                    loan_id:       loan.loan_id,
                    investment_id: None,
                    source,
                }
            })?;

        let now = Utc::now();
        let approval = ApprovalRecord {
            employee_id:   req.employee_id,
            approval_date: now.date_naive(),
            notes:         req.notes.clone(),
            agreement_ref: agreement_ref.clone(),
        };
        if !tx.record_approval(loan.loan_id, &approval, now)? {
            return Err(state_moved(tx, loan.loan_id, Action::Approve));
        }
        tx.append_event(
            loan.loan_id,
            &LoanEvent::Approved {
                employee_id: req.employee_id,
                agreement_ref,
            },
            now,
        )?;

        log::info!("loan {}: PROPOSED -> APPROVED by {}", loan.loan_id, req.employee_id);
        tx.load_loan(loan.loan_id)
    }

    /// INVESTED → DISBURSED.
    pub fn disburse<W: WriteAccess>(&self, tx: &W, req: &DisbursementRequest) -> LedgerResult<Loan> {
        if req.signed_agreement_ref.trim().is_empty() {
            return Err(LedgerError::validation("signed_agreement_ref", "must not be empty"));
        }

        let loan = tx.load_loan(req.loan_id)?;
        if loan.state != LoanState::Invested {
            return Err(LedgerError::InvalidStateTransition {
                loan_id: loan.loan_id,
                state:   loan.state,
                action:  Action::Disburse,
            });
        }
        tx.resolve(PartyRole::Employee, req.officer_id)?;

        let now = Utc::now();
        let disbursement = DisbursementRecord {
            officer_id:           req.officer_id,
            disbursement_date:    now.date_naive(),
            notes:                req.notes.clone(),
            signed_agreement_ref: req.signed_agreement_ref.clone(),
        };
        if !tx.record_disbursement(loan.loan_id, &disbursement, now)? {
            return Err(state_moved(tx, loan.loan_id, Action::Disburse));
        }
        tx.append_event(
            loan.loan_id,
            &LoanEvent::Disbursed {
                officer_id:           req.officer_id,
                signed_agreement_ref: req.signed_agreement_ref.clone(),
            },
            now,
        )?;

        log::info!("loan {}: INVESTED -> DISBURSED by {}", loan.loan_id, req.officer_id);
        tx.load_loan(loan.loan_id)
    }
}

/// Move `loan` along one forward edge of the lifecycle graph.
pub(crate) fn advance_state<W: WriteAccess>(
    tx: &W,
    loan: &Loan,
    to: LoanState,
    action: Action,
    at: DateTime<Utc>,
) -> LedgerResult<()> {
    if !loan.state.can_advance_to(to) {
        return Err(LedgerError::InvalidStateTransition {
            loan_id: loan.loan_id,
            state:   loan.state,
            action,
        });
    }
    if !tx.update_state(loan.loan_id, loan.state, to, at)? {
        return Err(state_moved(tx, loan.loan_id, action));
    }
    tx.append_event(loan.loan_id, &LoanEvent::StateAdvanced { from: loan.state, to }, at)?;

    log::info!("loan {}: {} -> {}", loan.loan_id, loan.state, to);
    Ok(())
}

/// A conditional update matched no row: report the state actually found.
fn state_moved<W: WriteAccess>(tx: &W, loan_id: LoanId, action: Action) -> LedgerError {
    match tx.load_loan(loan_id) {
        Ok(current) => LedgerError::InvalidStateTransition {
            loan_id,
            state: current.state,
            action,
        },
        Err(e) => e,
    }
}
