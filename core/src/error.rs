use crate::{
    documents::DocumentError,
    model::PartyRole,
    state::LoanState,
    types::{Amount, InvestmentId, LoanId, PartyId},
};
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("{entity} {id} not found")]
    NotFound { entity: Entity, id: Uuid },

    #[error("Cannot {action} loan {loan_id} in state {state}")]
    InvalidStateTransition {
        loan_id: LoanId,
        state:   LoanState,
        action:  Action,
    },

    #[error("Precondition failed for loan {loan_id}: {precondition}")]
    PreconditionFailed {
        loan_id:      LoanId,
        precondition: Precondition,
    },

    #[error("Investor {investor_id} already committed to loan {loan_id}")]
    DuplicateCommitment {
        loan_id:     LoanId,
        investor_id: PartyId,
    },

    #[error("Commitment of {requested} exceeds remaining capacity {remaining} on loan {loan_id}")]
    CapacityExceeded {
        loan_id:   LoanId,
        requested: Amount,
        remaining: Amount,
    },

    /// For funding agreements this is raised after the commitment is
    /// final: `investment_id` names the recorded investment.
    #[error("{document} agreement generation failed for loan {loan_id}: {source}")]
    AgreementGenerationFailed {
        document:      AgreementKind,
        loan_id:       LoanId,
        investment_id: Option<InvestmentId>,
        source:        DocumentError,
    },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Closed classification of failures, for callers that branch on cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    InvalidStateTransition,
    PreconditionFailed,
    DuplicateCommitment,
    CapacityExceeded,
    AgreementGenerationFailed,
    Storage,
    Internal,
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::Validation { .. }                => ErrorKind::Validation,
            LedgerError::NotFound { .. }                  => ErrorKind::NotFound,
            LedgerError::InvalidStateTransition { .. }    => ErrorKind::InvalidStateTransition,
            LedgerError::PreconditionFailed { .. }        => ErrorKind::PreconditionFailed,
            LedgerError::DuplicateCommitment { .. }       => ErrorKind::DuplicateCommitment,
            LedgerError::CapacityExceeded { .. }          => ErrorKind::CapacityExceeded,
            LedgerError::AgreementGenerationFailed { .. } => ErrorKind::AgreementGenerationFailed,
            LedgerError::Database(_)                      => ErrorKind::Storage,
            LedgerError::Serialization(_) | LedgerError::Other(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn loan_not_found(loan_id: LoanId) -> Self {
        LedgerError::NotFound { entity: Entity::Loan, id: loan_id }
    }

    pub(crate) fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        LedgerError::Validation { field, reason: reason.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
    Loan,
    Investment,
    Party(PartyRole),
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::Loan       => f.write_str("loan"),
            Entity::Investment => f.write_str("investment"),
            Entity::Party(r)   => write!(f, "{r}"),
        }
    }
}

/// The operation a state-transition error was raised from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    RecordSurvey,
    Approve,
    Commit,
    Disburse,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::RecordSurvey => "record survey on",
            Action::Approve      => "approve",
            Action::Commit       => "commit funds to",
            Action::Disburse     => "disburse",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Precondition {
    SurveyIncomplete,
}

impl fmt::Display for Precondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Precondition::SurveyIncomplete => f.write_str("survey incomplete"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AgreementKind {
    Approval,
    Funding,
}

impl fmt::Display for AgreementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AgreementKind::Approval => "Approval",
            AgreementKind::Funding  => "Funding",
        })
    }
}
