//! Funding ledger: per-investor commitments against a loan.
//!
//! RULES:
//!   - One commitment per (loan, investor). Commitments are final.
//!   - Σ commitments never exceeds the principal.
//!   - The aggregate is recomputed from the investment rows inside the
//!     same `WriteTx` that records the commitment. The handle holds the
//!     database write lock from its first read, so two commitments can
//!     never both see the same remaining capacity.
//!   - The funding agreement is requested only after the commitment has
//!     been committed. Its failure never unwinds the commitment.

use crate::{
    aggregate::{self, FundingAggregate, FundingStatus},
    documents::{DocumentError, DocumentGenerator},
    error::{Action, AgreementKind, Entity, LedgerError, LedgerResult},
    event::LoanEvent,
    identity::IdentityProvider,
    lifecycle,
    model::{Investment, PartyRole},
    state::LoanState,
    store::{LedgerStore, ReadAccess, WriteAccess},
    types::{Amount, InvestmentId, LoanId, PartyId},
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitRequest {
    pub loan_id:     LoanId,
    pub investor_id: PartyId,
    pub amount:      Amount,
}

/// What a recorded commitment did to its loan.
#[derive(Debug, Clone, Serialize)]
pub struct Commitment {
    pub investment:      Investment,
    pub previous_state:  LoanState,
    pub loan_state:      LoanState,
    pub total_committed: Amount,
    pub remaining:       Amount,
}

impl Commitment {
    /// True only for the one commitment that completed the funding.
    pub fn completed_funding(&self) -> bool {
        self.loan_state == LoanState::Invested && self.previous_state != LoanState::Invested
    }
}

/// Result of a full funding request: the commitment and its agreement.
#[derive(Debug, Clone, Serialize)]
pub struct FundingReceipt {
    #[serde(flatten)]
    pub commitment:    Commitment,
    pub agreement_ref: String,
}

pub struct FundingLedger<'a> {
    documents: &'a dyn DocumentGenerator,
}

impl<'a> FundingLedger<'a> {
    pub fn new(documents: &'a dyn DocumentGenerator) -> Self {
        Self { documents }
    }

    /// Validate and record one commitment inside `tx`, advancing the loan
    /// to FUNDING or INVESTED as the new aggregate dictates.
    ///
    /// On error nothing has been written through `tx` that the caller
    /// should keep; drop the handle to roll back.
    pub fn record_commitment<W: WriteAccess>(
        &self,
        tx: &W,
        req: &CommitRequest,
    ) -> LedgerResult<Commitment> {
        if req.amount <= Decimal::ZERO {
            return Err(LedgerError::validation("amount", "must be greater than zero"));
        }

        let loan = tx.load_loan(req.loan_id)?;
        tx.resolve(PartyRole::Investor, req.investor_id)?;

        // A fully funded loan still reaches the duplicate and capacity
        // checks; its zero remainder rejects any further amount.
        if !loan.state.accepts_funding() && loan.state != LoanState::Invested {
            return Err(LedgerError::InvalidStateTransition {
                loan_id: loan.loan_id,
                state:   loan.state,
                action:  Action::Commit,
            });
        }
        if tx.investment_exists(loan.loan_id, req.investor_id)? {
            return Err(LedgerError::DuplicateCommitment {
                loan_id:     loan.loan_id,
                investor_id: req.investor_id,
            });
        }

        let funding = tx.funding_aggregate(&loan)?;
        let remaining = funding.remaining();
        if req.amount > remaining {
            return Err(LedgerError::CapacityExceeded {
                loan_id:   loan.loan_id,
                requested: req.amount,
                remaining,
            });
        }

        let expected_return = aggregate::expected_return(req.amount, loan.return_rate)
            .ok_or_else(|| LedgerError::validation("amount", "expected return is out of range"))?;

        let now = Utc::now();
        let investment = Investment {
            investment_id:   Uuid::new_v4(),
            loan_id:         loan.loan_id,
            investor_id:     req.investor_id,
            amount:          req.amount,
            expected_return,
            committed_at:    now,
            created_at:      now,
        };
        tx.insert_investment(&investment)?;
        tx.append_event(
            loan.loan_id,
            &LoanEvent::InvestmentCommitted {
                investment_id:   investment.investment_id,
                investor_id:     investment.investor_id,
                amount:          investment.amount,
                expected_return: investment.expected_return,
            },
            now,
        )?;

        let after = funding.with_commitment(req.amount);
        let next = LoanState::after_commitment(after.remaining());
        if next != loan.state {
            lifecycle::advance_state(tx, &loan, next, Action::Commit, now)?;
        }

        log::info!(
            "loan {}: investor {} committed {} ({} of {} funded)",
            loan.loan_id, req.investor_id, req.amount, after.total_committed, after.principal
        );
        Ok(Commitment {
            investment,
            previous_state:  loan.state,
            loan_state:      next,
            total_committed: after.total_committed,
            remaining:       after.remaining(),
        })
    }

    /// The full funding operation: record and commit the investment,
    /// then issue its agreement.
    ///
    /// `AgreementGenerationFailed` from here means the commitment IS on
    /// the ledger; retry with `issue_agreement`. Every failure after the
    /// commitment is committed is reported that way, storage errors
    /// included, so callers always learn the investment id.
    pub fn commit(&self, store: &mut LedgerStore, req: &CommitRequest) -> LedgerResult<FundingReceipt> {
        let commitment = {
            let tx = store.write()?;
            let commitment = self.record_commitment(&tx, req).map_err(|e| {
                log::warn!("loan {}: commitment by {} rejected: {e}", req.loan_id, req.investor_id);
                e
            })?;
            tx.commit()?;
            commitment
        };

        let investment_id = commitment.investment.investment_id;
        let agreement_ref = self
            .issue_agreement(store, investment_id)
            .map_err(|e| match e {
                LedgerError::AgreementGenerationFailed { .. } => e,
                other => {
                    log::warn!(
                        "loan {}: investment {investment_id} recorded, agreement not stored: {other}",
                        req.loan_id
                    );
                    LedgerError::AgreementGenerationFailed {
                        document:      AgreementKind::Funding,
                        loan_id:       req.loan_id,
                        investment_id: Some(investment_id),
                        source:        DocumentError::Unrecorded(Box::new(other)),
                    }
                }
            })?;
        Ok(FundingReceipt { commitment, agreement_ref })
    }

    /// Generate (or regenerate) the agreement for a recorded investment
    /// and store its reference.
    pub fn issue_agreement(
        &self,
        store: &mut LedgerStore,
        investment_id: InvestmentId,
    ) -> LedgerResult<String> {
        let (investment, loan, investor_name) = {
            let tx = store.read()?;
            let investment = tx.find_investment(investment_id)?.ok_or(LedgerError::NotFound {
                entity: Entity::Investment,
                id:     investment_id,
            })?;
            let loan = tx.load_loan(investment.loan_id)?;
            let name = tx.display_name(PartyRole::Investor, investment.investor_id)?;
            (investment, loan, name)
        };

        let agreement_ref = self
            .documents
            .funding_agreement(&investment, &loan, &investor_name)
            .map_err(|source| {
                log::warn!(
                    "loan {}: investment {investment_id} recorded, agreement pending: {source}",
                    loan.loan_id
                );
                LedgerError::AgreementGenerationFailed {
                    document:      AgreementKind::Funding,
                    loan_id:       loan.loan_id,
                    investment_id: Some(investment_id),
                    source,
                }
            })?;

        let now = Utc::now();
        let tx = store.write()?;
        tx.upsert_funding_agreement(investment_id, &agreement_ref, now)?;
        tx.append_event(
            loan.loan_id,
            &LoanEvent::FundingAgreementRecorded {
                investment_id,
                agreement_ref: agreement_ref.clone(),
            },
            now,
        )?;
        tx.commit()?;

        log::debug!("investment {investment_id}: agreement stored at {agreement_ref}");
        Ok(agreement_ref)
    }
}

/// Current funding position of a loan, read at one snapshot.
pub fn funding_status<R: ReadAccess>(tx: &R, loan_id: LoanId) -> LedgerResult<FundingStatus> {
    let loan = tx.load_loan(loan_id)?;
    let aggregate: FundingAggregate = tx.funding_aggregate(&loan)?;
    Ok(FundingStatus::new(loan.loan_id, loan.state, &aggregate))
}
