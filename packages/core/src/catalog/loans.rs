//! Borrow / return transitions for a single copy.
//!
//! These functions only mutate the in-memory [`BookInstance`]. The
//! repository loads the copy, applies the transition and writes it back
//! inside one transaction.

use chrono::{Days, NaiveDate};

use super::error::CatalogError;
use super::types::{BookInstance, LoanStatus};

/// Standard loan length in days.
pub const DEFAULT_LOAN_PERIOD_DAYS: u32 = 21;

/// Furthest a renewal may push the due date, in weeks from today.
pub const DEFAULT_MAX_RENEWAL_WEEKS: u32 = 4;

pub fn default_due_date(today: NaiveDate, loan_period_days: u32) -> Result<NaiveDate, CatalogError> {
    today
        .checked_add_days(Days::new(u64::from(loan_period_days)))
        .ok_or_else(|| {
            CatalogError::invalid_due_date(format!(
                "{} days after {} is out of range",
                loan_period_days, today
            ))
        })
}

impl BookInstance {
    /// Lend this copy to `borrower_id` until `due_back`.
    ///
    /// Only available or reserved copies can be lent.
    pub fn borrow(
        &mut self,
        borrower_id: i64,
        due_back: NaiveDate,
        today: NaiveDate,
    ) -> Result<(), CatalogError> {
        if !matches!(self.status, LoanStatus::Available | LoanStatus::Reserved) {
            return Err(CatalogError::InvalidTransition {
                action: "borrow",
                status: self.status,
            });
        }
        if due_back < today {
            return Err(CatalogError::invalid_due_date(format!(
                "{} is in the past",
                due_back
            )));
        }

        self.status = LoanStatus::OnLoan;
        self.borrower_id = Some(borrower_id);
        self.due_back = Some(due_back);
        Ok(())
    }

    /// Take the copy back onto the shelf.
    pub fn return_copy(&mut self) -> Result<(), CatalogError> {
        if self.status != LoanStatus::OnLoan {
            return Err(CatalogError::InvalidTransition {
                action: "return",
                status: self.status,
            });
        }

        self.status = LoanStatus::Available;
        self.borrower_id = None;
        self.due_back = None;
        Ok(())
    }

    /// Move the due date of an active loan.
    pub fn renew(
        &mut self,
        new_due: NaiveDate,
        today: NaiveDate,
        max_weeks: u32,
    ) -> Result<(), CatalogError> {
        if self.status != LoanStatus::OnLoan {
            return Err(CatalogError::InvalidTransition {
                action: "renew",
                status: self.status,
            });
        }
        if new_due < today {
            return Err(CatalogError::invalid_due_date(format!(
                "{} is in the past",
                new_due
            )));
        }
        let limit = today
            .checked_add_days(Days::new(u64::from(max_weeks) * 7))
            .ok_or_else(|| {
                CatalogError::invalid_due_date(format!(
                    "{} weeks after {} is out of range",
                    max_weeks, today
                ))
            })?;
        if new_due > limit {
            return Err(CatalogError::invalid_due_date(format!(
                "{} is more than {} weeks ahead",
                new_due, max_weeks
            )));
        }

        self.due_back = Some(new_due);
        Ok(())
    }

    /// Set the status outside of a loan.
    ///
    /// Lending goes through [`Self::borrow`], so `OnLoan` is refused unless
    /// the copy already is on loan. Any other status ends the loan and
    /// clears the borrower and due date.
    pub fn set_status(&mut self, status: LoanStatus) -> Result<(), CatalogError> {
        match status {
            LoanStatus::OnLoan if self.status == LoanStatus::OnLoan => Ok(()),
            LoanStatus::OnLoan => Err(CatalogError::InvalidTransition {
                action: "mark on loan",
                status: self.status,
            }),
            other => {
                self.status = other;
                self.borrower_id = None;
                self.due_back = None;
                Ok(())
            }
        }
    }
}
