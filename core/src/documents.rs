//! Agreement documents.
//!
//! The ledger only needs a reference back from the generator. Generation
//! may fail on its own; the caller decides what that means for the loan.

use crate::{
    aggregate,
    config::EngineConfig,
    error::LedgerError,
    model::{Investment, Loan},
};
use chrono::Utc;
use rust_decimal::Decimal;
use std::{fmt::Write as _, fs, path::PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Rejected(String),

    /// Generated, but the reference could not be stored.
    #[error("agreement not recorded: {0}")]
    Unrecorded(#[source] Box<LedgerError>),
}

pub trait DocumentGenerator: Send + Sync {
    /// Loan agreement issued when a loan is approved.
    fn approval_agreement(&self, loan: &Loan, borrower_name: &str) -> Result<String, DocumentError>;

    /// Per-investor agreement issued once a commitment is recorded.
    fn funding_agreement(
        &self,
        investment: &Investment,
        loan: &Loan,
        investor_name: &str,
    ) -> Result<String, DocumentError>;
}

/// Renders plain-text agreements into a directory.
pub struct FileAgreementWriter {
    dir:          PathBuf,
    url_prefix:   String,
    currency:     String,
    organisation: String,
}

impl FileAgreementWriter {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            dir:          PathBuf::from(&config.agreements_dir),
            url_prefix:   config.agreement_url_prefix.trim_end_matches('/').to_string(),
            currency:     config.currency.clone(),
            organisation: config.organisation.clone(),
        }
    }

    fn write(&self, file_name: &str, body: &str) -> Result<String, DocumentError> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.dir.join(file_name), body)?;
        Ok(format!("{}/{}", self.url_prefix, file_name))
    }

    fn money(&self, amount: Decimal) -> String {
        format!("{} {:.2}", self.currency, amount)
    }
}

/// Flat total repayment and the equal monthly installment. `None` if the
/// total overflows or the term is zero.
pub fn repayment_terms(loan: &Loan) -> Option<(Decimal, Decimal)> {
    let total = aggregate::with_flat_rate(loan.principal_amount, loan.interest_rate)?;
    let monthly = total.checked_div(Decimal::from(loan.term_months))?.round_dp(2);
    Some((total, monthly))
}

impl DocumentGenerator for FileAgreementWriter {
    fn approval_agreement(&self, loan: &Loan, borrower_name: &str) -> Result<String, DocumentError> {
        let survey = loan
            .survey
            .as_ref()
            .ok_or_else(|| DocumentError::Rejected("loan has no survey on record".into()))?;
        let (total, monthly) = repayment_terms(loan)
            .ok_or_else(|| DocumentError::Rejected("repayment terms out of range".into()))?;

        let mut doc = String::new();
        let _ = writeln!(doc, "LOAN AGREEMENT\n");
        let _ = writeln!(doc, "Loan ID: {}", loan.loan_id);
        let _ = writeln!(doc, "Date: {}\n", Utc::now().format("%Y-%m-%d"));
        let _ = writeln!(doc, "BORROWER INFORMATION:");
        let _ = writeln!(doc, "Name: {borrower_name}");
        let _ = writeln!(doc, "Borrower ID: {}\n", loan.borrower_id);
        let _ = writeln!(doc, "LOAN DETAILS:");
        let _ = writeln!(doc, "Principal Amount: {}", self.money(loan.principal_amount));
        let _ = writeln!(doc, "Interest Rate: {}% flat", loan.interest_rate);
        let _ = writeln!(doc, "Investor Return Rate: {}%", loan.return_rate);
        let _ = writeln!(doc, "Loan Term: {} months", loan.term_months);
        let _ = writeln!(doc, "Total Amount: {}", self.money(total));
        let _ = writeln!(doc, "Monthly Payment: {}\n", self.money(monthly));
        let _ = writeln!(doc, "SURVEY:");
        let _ = writeln!(doc, "Survey Date: {}", survey.survey_date);
        let _ = writeln!(doc, "Field Validator: {}\n", survey.validator_id);
        let _ = writeln!(doc, "_________________________    _________________________");
        let _ = writeln!(doc, "Borrower                     {}", self.organisation);

        self.write(&format!("loan_agreement_{}.txt", loan.loan_id), &doc)
    }

    fn funding_agreement(
        &self,
        investment: &Investment,
        loan: &Loan,
        investor_name: &str,
    ) -> Result<String, DocumentError> {
        let mut doc = String::new();
        let _ = writeln!(doc, "INVESTMENT AGREEMENT\n");
        let _ = writeln!(doc, "Investment ID: {}", investment.investment_id);
        let _ = writeln!(doc, "Loan ID: {}", loan.loan_id);
        let _ = writeln!(doc, "Date: {}\n", investment.committed_at.format("%Y-%m-%d"));
        let _ = writeln!(doc, "INVESTOR:");
        let _ = writeln!(doc, "Name: {investor_name}");
        let _ = writeln!(doc, "Investor ID: {}\n", investment.investor_id);
        let _ = writeln!(doc, "TERMS:");
        let _ = writeln!(doc, "Investment Amount: {}", self.money(investment.amount));
        let _ = writeln!(doc, "Return Rate: {}% flat", loan.return_rate);
        let _ = writeln!(doc, "Expected Return: {}", self.money(investment.expected_return));
        let _ = writeln!(doc, "Loan Principal: {}", self.money(loan.principal_amount));
        let _ = writeln!(doc, "Loan Term: {} months\n", loan.term_months);
        let _ = writeln!(doc, "This commitment is irrevocable once recorded.\n");
        let _ = writeln!(doc, "_________________________    _________________________");
        let _ = writeln!(doc, "Investor                     {}", self.organisation);

        self.write(
            &format!("investment_agreement_{}.txt", investment.investment_id),
            &doc,
        )
    }
}
