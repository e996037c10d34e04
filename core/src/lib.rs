//! Loan funding ledger and lifecycle engine.
//!
//! A loan moves PROPOSED → APPROVED → FUNDING → INVESTED → DISBURSED.
//! The lifecycle controller owns the operator transitions; the funding
//! ledger owns investor commitments and the transitions they trigger.
//! Both work on transaction handles borrowed from the SQLite store.

pub mod aggregate;
pub mod config;
pub mod documents;
pub mod engine;
pub mod error;
pub mod event;
pub mod identity;
pub mod ledger;
pub mod lifecycle;
pub mod model;
pub mod state;
pub mod store;
pub mod types;

pub use engine::LoanEngine;
pub use error::{ErrorKind, LedgerError, LedgerResult};
