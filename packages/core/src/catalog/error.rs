//! Error types for catalog operations

use sqlx::error::ErrorKind;
use thiserror::Error;

use super::types::LoanStatus;

/// Errors raised by the catalog model and its repository
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Validation failed: {message}")]
    Validation { message: String },

    #[error("Invalid loan status '{value}'. Must be one of: m, o, a, r")]
    InvalidStatus { value: String },

    #[error("Cannot {action} a copy that is {status}")]
    InvalidTransition { action: &'static str, status: LoanStatus },

    #[error("Invalid due date: {message}")]
    InvalidDueDate { message: String },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl CatalogError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into() }
    }

    pub fn invalid_due_date(message: impl Into<String>) -> Self {
        Self::InvalidDueDate { message: message.into() }
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound { entity, id: id.to_string() }
    }
}

/// Constraint failures reported by SQLite surface as `Validation`.
impl From<sqlx::Error> for CatalogError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            let constraint = matches!(
                db_err.kind(),
                ErrorKind::CheckViolation
                    | ErrorKind::NotNullViolation
                    | ErrorKind::ForeignKeyViolation
                    | ErrorKind::UniqueViolation
            );
            if constraint || db_err.message().contains("constraint failed") {
                return Self::Validation { message: db_err.message().to_string() };
            }
        }
        Self::Database(err)
    }
}
