//! Loan lifecycle states and the forward-only transition graph.
//!
//!   PROPOSED → APPROVED → FUNDING → INVESTED → DISBURSED
//!                    └──────────────↗
//!
//! APPROVED may jump straight to INVESTED when a single commitment
//! covers the whole principal. Nothing ever moves backward.

use crate::types::Amount;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoanState {
    Proposed,
    Approved,
    Funding,
    Invested,
    Disbursed,
}

#[derive(Error, Debug)]
#[error("unknown loan state '{0}'")]
pub struct UnknownLoanState(pub String);

impl LoanState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanState::Proposed  => "PROPOSED",
            LoanState::Approved  => "APPROVED",
            LoanState::Funding   => "FUNDING",
            LoanState::Invested  => "INVESTED",
            LoanState::Disbursed => "DISBURSED",
        }
    }

    /// Only these states take new commitments.
    pub fn accepts_funding(&self) -> bool {
        matches!(self, LoanState::Approved | LoanState::Funding)
    }

    /// State a loan lands in once a commitment leaves `remaining` behind.
    /// Exactly zero is the sole trigger for INVESTED.
    pub fn after_commitment(remaining: Amount) -> LoanState {
        if remaining.is_zero() {
            LoanState::Invested
        } else {
            LoanState::Funding
        }
    }

    /// Whether `self → next` is an edge of the lifecycle graph.
    pub fn can_advance_to(&self, next: LoanState) -> bool {
        use LoanState::*;
        matches!(
            (self, next),
            (Proposed, Approved)
                | (Approved, Funding)
                | (Approved, Invested)
                | (Funding, Invested)
                | (Invested, Disbursed)
        )
    }
}

impl fmt::Display for LoanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoanState {
    type Err = UnknownLoanState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PROPOSED"  => Ok(LoanState::Proposed),
            "APPROVED"  => Ok(LoanState::Approved),
            "FUNDING"   => Ok(LoanState::Funding),
            "INVESTED"  => Ok(LoanState::Invested),
            "DISBURSED" => Ok(LoanState::Disbursed),
            other       => Err(UnknownLoanState(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const ALL: [LoanState; 5] = [
        LoanState::Proposed,
        LoanState::Approved,
        LoanState::Funding,
        LoanState::Invested,
        LoanState::Disbursed,
    ];

    #[test]
    fn state_names_parse_back() {
        for state in ALL {
            assert_eq!(state.as_str().parse::<LoanState>().unwrap(), state);
        }
        assert!("funding".parse::<LoanState>().is_err());
    }

    #[test]
    fn no_edge_points_backward() {
        for (i, from) in ALL.iter().enumerate() {
            for to in &ALL[..=i] {
                assert!(!from.can_advance_to(*to), "{from} -> {to} must be rejected");
            }
        }
    }

    #[test]
    fn only_approved_and_funding_take_commitments() {
        let open: Vec<_> = ALL.iter().filter(|s| s.accepts_funding()).collect();
        assert_eq!(open, vec![&LoanState::Approved, &LoanState::Funding]);
    }

    #[test]
    fn exact_zero_remaining_means_invested() {
        assert_eq!(LoanState::after_commitment(dec!(0.00)), LoanState::Invested);
        assert_eq!(LoanState::after_commitment(dec!(0.01)), LoanState::Funding);
    }
}
