use std::error::Error;
use std::fmt;

use crate::catalog::CatalogError;

/// Unified application error.
///
/// Catalog failures keep their typed cause; everything at the process
/// boundary (config, database setup, output) is carried as a message.
#[derive(Debug)]
pub enum AppError {
    Config(String),
    Database(String),
    Catalog(CatalogError),
    Unknown(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(msg) => write!(f, "Config error: {}", msg),
            AppError::Database(msg) => write!(f, "Database error: {}", msg),
            AppError::Catalog(err) => write!(f, "Catalog error: {}", err),
            AppError::Unknown(msg) => write!(f, "Unknown error: {}", msg),
        }
    }
}

impl Error for AppError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AppError::Catalog(err) => Some(err),
            _ => None,
        }
    }
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        AppError::Catalog(err)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Unknown(format!("could not render JSON: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_errors_keep_their_message() {
        let err = AppError::from(CatalogError::not_found("Book", 3));
        assert_eq!(err.to_string(), "Catalog error: Book 3 not found");
        assert!(err.source().is_some());
    }

    #[test]
    fn config_error_display() {
        let err = AppError::Config("DATABASE_URL is required".into());
        assert_eq!(err.to_string(), "Config error: DATABASE_URL is required");
    }
}
