//! Shared primitive types used across the ledger.

use rust_decimal::Decimal;
use uuid::Uuid;

/// A loan identifier.
pub type LoanId = Uuid;

/// One investor's commitment against one loan.
pub type InvestmentId = Uuid;

/// Borrowers, investors and employees all share one identifier space.
pub type PartyId = Uuid;

/// Money. Always exact decimal, never floating point.
pub type Amount = Decimal;

/// A percentage, e.g. `8` means 8%.
pub type Rate = Decimal;
