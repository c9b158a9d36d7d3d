//! Catalog Domain Model
//!
//! Genres, languages, authors, books and the individual copies that can
//! be lent out, plus the derived values shown in listings.

pub mod error;
pub mod loans;
pub mod types;

pub use error::CatalogError;
pub use loans::{default_due_date, DEFAULT_LOAN_PERIOD_DAYS, DEFAULT_MAX_RENEWAL_WEEKS};
pub use types::*;
