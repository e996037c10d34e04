//! Derived funding figures.
//!
//! RULE: an aggregate is built from the investment rows read inside the
//! current transaction and dropped with it. Nothing here is cached.

use crate::{
    state::LoanState,
    types::{Amount, LoanId, Rate},
};
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FundingAggregate {
    pub principal:       Amount,
    pub total_committed: Amount,
    pub investor_count:  usize,
}

impl FundingAggregate {
    pub fn from_amounts<I>(principal: Amount, amounts: I) -> Self
    where
        I: IntoIterator<Item = Amount>,
    {
        let (total_committed, investor_count) = amounts
            .into_iter()
            .fold((Decimal::ZERO, 0usize), |(sum, n), a| (sum + a, n + 1));
        Self { principal, total_committed, investor_count }
    }

    pub fn remaining(&self) -> Amount {
        self.principal - self.total_committed
    }

    pub fn is_fully_funded(&self) -> bool {
        self.remaining().is_zero()
    }

    /// The aggregate as it will be once `amount` is recorded.
    pub fn with_commitment(&self, amount: Amount) -> Self {
        Self {
            principal:       self.principal,
            total_committed: self.total_committed + amount,
            investor_count:  self.investor_count + 1,
        }
    }
}

/// Flat, non-compounding return: `amount × (rate / 100)`.
/// `None` when the product does not fit in a `Decimal`.
pub fn expected_return(amount: Amount, return_rate: Rate) -> Option<Amount> {
    amount.checked_mul(return_rate / Decimal::ONE_HUNDRED)
}

/// `amount × (1 + rate / 100)`: the amount plus flat interest, or `None`
/// on overflow.
pub fn with_flat_rate(amount: Amount, rate: Rate) -> Option<Amount> {
    let factor = Decimal::ONE.checked_add(rate / Decimal::ONE_HUNDRED)?;
    amount.checked_mul(factor)
}

/// Snapshot returned to callers asking where a loan's funding stands.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FundingStatus {
    pub loan_id:         LoanId,
    pub state:           LoanState,
    pub principal:       Amount,
    pub total_committed: Amount,
    pub remaining:       Amount,
    pub investor_count:  usize,
}

impl FundingStatus {
    pub fn new(loan_id: LoanId, state: LoanState, aggregate: &FundingAggregate) -> Self {
        Self {
            loan_id,
            state,
            principal:       aggregate.principal,
            total_committed: aggregate.total_committed,
            remaining:       aggregate.remaining(),
            investor_count:  aggregate.investor_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn remaining_is_principal_minus_commitments() {
        let agg = FundingAggregate::from_amounts(dec!(5000000), [dec!(2000000), dec!(1250000.50)]);
        assert_eq!(agg.total_committed, dec!(3250000.50));
        assert_eq!(agg.remaining(), dec!(1749999.50));
        assert_eq!(agg.investor_count, 2);
        assert!(!agg.is_fully_funded());
    }

    #[test]
    fn tenths_sum_to_exactly_one() {
        // 0.1 ten times is not 1.0 in binary floating point.
        let agg = FundingAggregate::from_amounts(dec!(1), std::iter::repeat(dec!(0.1)).take(10));
        assert!(agg.is_fully_funded());
        assert_eq!(agg.remaining(), Decimal::ZERO);
    }

    #[test]
    fn with_commitment_adds_one_investor() {
        let agg = FundingAggregate::from_amounts(dec!(100), std::iter::empty());
        let next = agg.with_commitment(dec!(100));
        assert!(next.is_fully_funded());
        assert_eq!(next.investor_count, 1);
        assert_eq!(agg.total_committed, Decimal::ZERO);
    }

    #[test]
    fn expected_return_is_flat_percentage() {
        assert_eq!(expected_return(dec!(2000000), dec!(8)), Some(dec!(160000)));
        assert_eq!(expected_return(dec!(1000000), dec!(12)), Some(dec!(120000)));
        assert_eq!(expected_return(dec!(333.33), dec!(7.5)), Some(dec!(24.99975)));
    }

    #[test]
    fn oversized_products_are_none_not_a_panic() {
        assert_eq!(expected_return(dec!(1e28), dec!(1000)), None);
        assert_eq!(with_flat_rate(dec!(1e28), dec!(1000)), None);
        assert_eq!(with_flat_rate(dec!(5000000), dec!(10)), Some(dec!(5500000)));
    }
}
