//! Ledger records: parties, loans and investments.

use crate::{
    state::LoanState,
    types::{Amount, InvestmentId, LoanId, PartyId, Rate},
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

// ── Parties ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartyRole {
    Borrower,
    Investor,
    Employee,
}

#[derive(Error, Debug)]
#[error("unknown party role '{0}'")]
pub struct UnknownPartyRole(pub String);

impl PartyRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            PartyRole::Borrower => "borrower",
            PartyRole::Investor => "investor",
            PartyRole::Employee => "employee",
        }
    }
}

impl fmt::Display for PartyRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PartyRole {
    type Err = UnknownPartyRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "borrower" => Ok(PartyRole::Borrower),
            "investor" => Ok(PartyRole::Investor),
            "employee" => Ok(PartyRole::Employee),
            other      => Err(UnknownPartyRole(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Party {
    pub party_id:     PartyId,
    pub role:         PartyRole,
    pub display_name: String,
    pub created_at:   DateTime<Utc>,
}

// ── Loan ───────────────────────────────────────────────────────

/// Field survey of the borrower. Approval is blocked until present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveyRecord {
    pub validator_id: PartyId,
    pub survey_date:  NaiveDate,
    pub document_ref: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRecord {
    pub employee_id:   PartyId,
    pub approval_date: NaiveDate,
    pub notes:         String,
    pub agreement_ref: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisbursementRecord {
    pub officer_id:           PartyId,
    pub disbursement_date:    NaiveDate,
    pub notes:                String,
    pub signed_agreement_ref: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub loan_id:          LoanId,
    pub borrower_id:      PartyId,
    /// Fixed at creation; the schema rejects any update to it.
    pub principal_amount: Amount,
    pub interest_rate:    Rate,
    pub return_rate:      Rate,
    pub term_months:      u32,
    pub state:            LoanState,
    pub survey:           Option<SurveyRecord>,
    pub approval:         Option<ApprovalRecord>,
    pub disbursement:     Option<DisbursementRecord>,
    pub created_at:       DateTime<Utc>,
    pub updated_at:       DateTime<Utc>,
}

// ── Investment ─────────────────────────────────────────────────

/// One investor's irrevocable commitment. Never updated, never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Investment {
    pub investment_id:   InvestmentId,
    pub loan_id:         LoanId,
    pub investor_id:     PartyId,
    pub amount:          Amount,
    pub expected_return: Amount,
    pub committed_at:    DateTime<Utc>,
    pub created_at:      DateTime<Utc>,
}
