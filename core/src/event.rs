//! The loan journal: an append-only record of every accepted mutation.
//!
//! RULE: an event is appended inside the same transaction as the change
//! it describes, so the journal never disagrees with the loan row.
//! Variants are added over time, never removed or reordered.

use crate::{
    state::LoanState,
    types::{Amount, InvestmentId, LoanId, PartyId},
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LoanEvent {
    Proposed {
        borrower_id:      PartyId,
        principal_amount: Amount,
    },
    SurveyRecorded {
        validator_id: PartyId,
        survey_date:  NaiveDate,
    },
    Approved {
        employee_id:   PartyId,
        agreement_ref: String,
    },
    InvestmentCommitted {
        investment_id:   InvestmentId,
        investor_id:     PartyId,
        amount:          Amount,
        expected_return: Amount,
    },
    StateAdvanced {
        from: LoanState,
        to:   LoanState,
    },
    Disbursed {
        officer_id:           PartyId,
        signed_agreement_ref: String,
    },
    FundingAgreementRecorded {
        investment_id: InvestmentId,
        agreement_ref: String,
    },
}

impl LoanEvent {
    /// Stable name stored in the event_type column.
    pub fn event_type(&self) -> &'static str {
        match self {
            LoanEvent::Proposed { .. }                 => "proposed",
            LoanEvent::SurveyRecorded { .. }           => "survey_recorded",
            LoanEvent::Approved { .. }                 => "approved",
            LoanEvent::InvestmentCommitted { .. }      => "investment_committed",
            LoanEvent::StateAdvanced { .. }            => "state_advanced",
            LoanEvent::Disbursed { .. }                => "disbursed",
            LoanEvent::FundingAgreementRecorded { .. } => "funding_agreement_recorded",
        }
    }
}

/// A journal row as persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanEventEntry {
    pub id:         Option<i64>,
    pub loan_id:    LoanId,
    pub event_type: String,
    pub payload:    String,
    pub created_at: DateTime<Utc>,
}

impl LoanEventEntry {
    pub fn new(loan_id: LoanId, event: &LoanEvent, at: DateTime<Utc>) -> serde_json::Result<Self> {
        Ok(Self {
            id:         None,
            loan_id,
            event_type: event.event_type().to_string(),
            payload:    serde_json::to_string(event)?,
            created_at: at,
        })
    }

    pub fn decode(&self) -> serde_json::Result<LoanEvent> {
        serde_json::from_str(&self.payload)
    }
}
