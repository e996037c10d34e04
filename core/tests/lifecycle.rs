mod common;

use chrono::{Duration, Utc};
use common::Desk;
use loan_ledger_core::{
    error::{Action, Entity, Precondition},
    event::LoanEvent,
    lifecycle::{DisbursementRequest, LoanProposal, SurveyRequest},
    model::PartyRole,
    state::LoanState,
    ErrorKind, LedgerError,
};
use rust_decimal_macros::dec;
use std::sync::atomic::Ordering;
use uuid::Uuid;

fn disbursement(desk: &Desk, loan_id: Uuid) -> DisbursementRequest {
    DisbursementRequest {
        loan_id,
        officer_id:           desk.officer,
        notes:                "transferred to borrower account".into(),
        signed_agreement_ref: format!("/uploads/signed/{loan_id}.pdf"),
    }
}

#[test]
fn proposal_starts_in_proposed_with_no_metadata() {
    let mut desk = Desk::new();
    let loan = desk.propose(dec!(5000000), dec!(8));

    assert_eq!(loan.state, LoanState::Proposed);
    assert!(loan.survey.is_none());
    assert!(loan.approval.is_none());
    assert!(loan.disbursement.is_none());

    let stored = desk.engine.loan(loan.loan_id).unwrap();
    assert_eq!(stored.principal_amount, dec!(5000000));
    assert_eq!(stored.borrower_id, desk.borrower);
}

#[test]
fn proposal_with_bad_terms_is_rejected() {
    let mut desk = Desk::new();
    let err = desk
        .engine
        .propose(&LoanProposal {
            borrower_id:      desk.borrower,
            principal_amount: dec!(0),
            interest_rate:    dec!(10),
            return_rate:      dec!(8),
            term_months:      12,
        })
        .unwrap_err();
    assert!(matches!(err, LedgerError::Validation { field: "principal_amount", .. }));
}

#[test]
fn proposal_for_unknown_or_wrong_role_borrower_is_not_found() {
    let mut desk = Desk::new();
    let investor = desk.investor("Andi");

    for borrower_id in [Uuid::new_v4(), investor] {
        let err = desk
            .engine
            .propose(&LoanProposal {
                borrower_id,
                principal_amount: dec!(1000),
                interest_rate:    dec!(10),
                return_rate:      dec!(8),
                term_months:      6,
            })
            .unwrap_err();
        assert!(
            matches!(err, LedgerError::NotFound { entity: Entity::Party(PartyRole::Borrower), .. }),
            "{err}"
        );
    }
}

#[test]
fn survey_is_recorded_without_changing_state() {
    let mut desk = Desk::new();
    let loan = desk.propose(dec!(1000), dec!(8));
    let surveyed = desk.survey(loan.loan_id);

    assert_eq!(surveyed.state, LoanState::Proposed);
    let survey = surveyed.survey.expect("survey on record");
    assert_eq!(survey.validator_id, desk.employee);
    assert!(survey.document_ref.is_some());
}

#[test]
fn survey_dated_in_the_future_is_rejected() {
    let mut desk = Desk::new();
    let loan = desk.propose(dec!(1000), dec!(8));
    let err = desk
        .engine
        .record_survey(&SurveyRequest {
            loan_id:      loan.loan_id,
            validator_id: desk.employee,
            survey_date:  (Utc::now() + Duration::days(3)).date_naive(),
            document_ref: None,
        })
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(desk.engine.loan(loan.loan_id).unwrap().survey.is_none());
}

#[test]
fn survey_after_approval_is_an_invalid_transition() {
    let mut desk = Desk::new();
    let loan_id = desk.approved_loan(dec!(1000), dec!(8));
    let err = desk
        .engine
        .record_survey(&SurveyRequest {
            loan_id,
            validator_id: desk.employee,
            survey_date:  Utc::now().date_naive(),
            document_ref: None,
        })
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::InvalidStateTransition { state: LoanState::Approved, action: Action::RecordSurvey, .. }
    ));
}

#[test]
fn approval_without_survey_fails_precondition() {
    let mut desk = Desk::new();
    let loan = desk.propose(dec!(1000), dec!(8));

    let err = desk.approve(loan.loan_id).unwrap_err();
    assert!(matches!(
        err,
        LedgerError::PreconditionFailed { precondition: Precondition::SurveyIncomplete, .. }
    ));
    assert_eq!(desk.engine.loan(loan.loan_id).unwrap().state, LoanState::Proposed);
    assert_eq!(desk.docs.approvals.load(Ordering::SeqCst), 0);
}

#[test]
fn approval_records_metadata_and_agreement() {
    let mut desk = Desk::new();
    let loan = desk.propose(dec!(1000), dec!(8));
    desk.survey(loan.loan_id);

    let approved = desk.approve(loan.loan_id).unwrap();
    assert_eq!(approved.state, LoanState::Approved);
    let approval = approved.approval.expect("approval on record");
    assert_eq!(approval.employee_id, desk.employee);
    assert_eq!(approval.notes, "income verified");
    assert_eq!(approval.agreement_ref, format!("/agreements/loan_{}.txt", loan.loan_id));
    assert_eq!(approval.approval_date, Utc::now().date_naive());
}

#[test]
fn second_approval_is_an_invalid_transition() {
    let mut desk = Desk::new();
    let loan_id = desk.approved_loan(dec!(1000), dec!(8));

    let err = desk.approve(loan_id).unwrap_err();
    assert!(matches!(
        err,
        LedgerError::InvalidStateTransition { state: LoanState::Approved, action: Action::Approve, .. }
    ));
    assert_eq!(desk.docs.approvals.load(Ordering::SeqCst), 1);
}

#[test]
fn approval_by_a_non_employee_is_not_found() {
    let mut desk = Desk::new();
    let loan = desk.propose(dec!(1000), dec!(8));
    desk.survey(loan.loan_id);
    let investor = desk.investor("Andi");

    let err = desk
        .engine
        .approve(&loan_ledger_core::lifecycle::ApprovalRequest {
            loan_id:     loan.loan_id,
            employee_id: investor,
            notes:       String::new(),
        })
        .unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { entity: Entity::Party(PartyRole::Employee), .. }));
    assert_eq!(desk.engine.loan(loan.loan_id).unwrap().state, LoanState::Proposed);
}

#[test]
fn failed_approval_agreement_leaves_loan_proposed() {
    let mut desk = Desk::new();
    let loan = desk.propose(dec!(1000), dec!(8));
    desk.survey(loan.loan_id);
    desk.docs.fail_approval.store(true, Ordering::SeqCst);

    let err = desk.approve(loan.loan_id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AgreementGenerationFailed);

    let stored = desk.engine.loan(loan.loan_id).unwrap();
    assert_eq!(stored.state, LoanState::Proposed);
    assert!(stored.approval.is_none());

    desk.docs.fail_approval.store(false, Ordering::SeqCst);
    assert_eq!(desk.approve(loan.loan_id).unwrap().state, LoanState::Approved);
}

#[test]
fn unknown_loan_is_not_found_for_every_operation() {
    let mut desk = Desk::new();
    let missing = Uuid::new_v4();

    assert_eq!(desk.approve(missing).unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(desk.engine.loan(missing).unwrap_err().kind(), ErrorKind::NotFound);
    let req = disbursement(&desk, missing);
    assert_eq!(desk.engine.disburse(&req).unwrap_err().kind(), ErrorKind::NotFound);
}

#[test]
fn disbursement_before_full_funding_is_rejected() {
    let mut desk = Desk::new();
    let loan_id = desk.approved_loan(dec!(1000), dec!(8));

    let req = disbursement(&desk, loan_id);
    let err = desk.engine.disburse(&req).unwrap_err();
    assert!(matches!(
        err,
        LedgerError::InvalidStateTransition { state: LoanState::Approved, action: Action::Disburse, .. }
    ));

    let investor = desk.investor("Andi");
    desk.invest(loan_id, investor, dec!(400)).unwrap();
    let err = desk.engine.disburse(&req).unwrap_err();
    assert!(matches!(err, LedgerError::InvalidStateTransition { state: LoanState::Funding, .. }));
}

#[test]
fn disbursement_requires_signed_agreement() {
    let mut desk = Desk::new();
    let loan_id = desk.approved_loan(dec!(1000), dec!(8));
    let investor = desk.investor("Andi");
    desk.invest(loan_id, investor, dec!(1000)).unwrap();

    let req = DisbursementRequest { signed_agreement_ref: "  ".into(), ..disbursement(&desk, loan_id) };
    let err = desk.engine.disburse(&req).unwrap_err();
    assert!(matches!(err, LedgerError::Validation { field: "signed_agreement_ref", .. }));
    assert_eq!(desk.engine.loan(loan_id).unwrap().state, LoanState::Invested);
}

#[test]
fn full_lifecycle_ends_disbursed_and_is_journaled() {
    let mut desk = Desk::new();
    let loan_id = desk.approved_loan(dec!(1000), dec!(8));
    let investor = desk.investor("Andi");
    desk.invest(loan_id, investor, dec!(1000)).unwrap();

    let req = disbursement(&desk, loan_id);
    let loan = desk.engine.disburse(&req).unwrap();
    assert_eq!(loan.state, LoanState::Disbursed);
    let record = loan.disbursement.expect("disbursement on record");
    assert_eq!(record.officer_id, desk.officer);
    assert_eq!(record.signed_agreement_ref, req.signed_agreement_ref);

    // Terminal: nothing moves a disbursed loan.
    let err = desk.engine.disburse(&req).unwrap_err();
    assert!(matches!(err, LedgerError::InvalidStateTransition { state: LoanState::Disbursed, .. }));

    let kinds: Vec<&str> = desk
        .engine
        .events(loan_id)
        .unwrap()
        .iter()
        .map(LoanEvent::event_type)
        .collect();
    assert_eq!(
        kinds,
        [
            "proposed",
            "survey_recorded",
            "approved",
            "investment_committed",
            "state_advanced",
            "funding_agreement_recorded",
            "disbursed",
        ]
    );
}
