//! Core data types for the library catalog

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::CatalogError;

/// Maximum number of genre names rendered by [`display_genre`].
pub const DISPLAY_GENRE_LIMIT: usize = 3;

/// A book category label, e.g. "Science Fiction".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genre {
    pub id: i64,
    pub name: String,
}

/// The natural language a book is written in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Language {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub date_of_death: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAuthor {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub date_of_death: Option<NaiveDate>,
}

/// A title in the catalog (not a specific copy of it).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub id: i64,
    pub title: String,
    /// Cleared, not cascaded, when the author is deleted.
    pub author_id: Option<i64>,
    pub summary: String,
    pub isbn: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBook {
    pub title: String,
    pub author_id: Option<i64>,
    pub summary: String,
    pub isbn: String,
    pub genre_ids: Vec<i64>,
}

/// A library account that can borrow copies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
}

/// Availability of a single copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LoanStatus {
    #[default]
    #[serde(rename = "m")]
    Maintenance,
    #[serde(rename = "o")]
    OnLoan,
    #[serde(rename = "a")]
    Available,
    #[serde(rename = "r")]
    Reserved,
}

impl LoanStatus {
    pub const ALL: [LoanStatus; 4] = [
        LoanStatus::Maintenance,
        LoanStatus::OnLoan,
        LoanStatus::Available,
        LoanStatus::Reserved,
    ];

    /// One-letter code persisted in the `status` column.
    pub fn code(self) -> &'static str {
        match self {
            LoanStatus::Maintenance => "m",
            LoanStatus::OnLoan => "o",
            LoanStatus::Available => "a",
            LoanStatus::Reserved => "r",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            LoanStatus::Maintenance => "Maintenance",
            LoanStatus::OnLoan => "On loan",
            LoanStatus::Available => "Available",
            LoanStatus::Reserved => "Reserved",
        }
    }
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Accepts the stored code or the label, case-insensitively.
impl FromStr for LoanStatus {
    type Err = CatalogError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        LoanStatus::ALL
            .into_iter()
            .find(|status| {
                trimmed.eq_ignore_ascii_case(status.code())
                    || trimmed.eq_ignore_ascii_case(status.label())
            })
            .ok_or_else(|| CatalogError::InvalidStatus { value: value.to_string() })
    }
}

impl TryFrom<&str> for LoanStatus {
    type Error = CatalogError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// One physical copy of a [`Book`], tracked by a catalog-wide UUID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookInstance {
    pub id: Uuid,
    pub book_id: Option<i64>,
    /// Title of the referenced book, populated on read for display.
    pub book_title: Option<String>,
    pub imprint: String,
    pub due_back: Option<NaiveDate>,
    pub status: LoanStatus,
    pub borrower_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBookInstance {
    pub book_id: i64,
    pub imprint: String,
    pub due_back: Option<NaiveDate>,
    pub status: LoanStatus,
}

impl BookInstance {
    /// Build a fresh copy with a newly generated v4 identifier.
    pub fn new(book_id: i64, imprint: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            book_id: Some(book_id),
            book_title: None,
            imprint: imprint.into(),
            due_back: None,
            status: LoanStatus::default(),
            borrower_id: None,
        }
    }

    pub fn from_new(new: &NewBookInstance) -> Self {
        Self {
            due_back: new.due_back,
            status: new.status,
            ..Self::new(new.book_id, new.imprint.clone())
        }
    }

    /// `true` iff a due date is set and it is strictly before `today`.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        matches!(self.due_back, Some(due) if due < today)
    }

    /// [`Self::is_overdue`] against the local calendar date.
    pub fn is_overdue_now(&self) -> bool {
        self.is_overdue(Local::now().date_naive())
    }
}

impl fmt::Display for Genre {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl fmt::Display for Author {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.last_name, self.first_name)
    }
}

impl fmt::Display for Book {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title)
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.username)
    }
}

impl fmt::Display for BookInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.book_title {
            Some(title) => write!(f, "{} ({})", self.id, title),
            None => write!(f, "{} (no book)", self.id),
        }
    }
}

impl Book {
    /// Canonical detail path for this book.
    pub fn absolute_url(&self) -> String {
        book_url(self.id)
    }
}

impl Author {
    /// Canonical detail path for this author.
    pub fn absolute_url(&self) -> String {
        author_url(self.id)
    }
}

pub fn book_url(id: i64) -> String {
    format!("/catalog/book/{}", id)
}

pub fn author_url(id: i64) -> String {
    format!("/catalog/author/{}", id)
}

/// Join the first three genre names with ", ". Empty input gives "".
pub fn display_genre(genres: &[Genre]) -> String {
    genres
        .iter()
        .take(DISPLAY_GENRE_LIMIT)
        .map(|genre| genre.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Compare by due date ascending; undated copies sort last.
pub fn due_back_order(a: &BookInstance, b: &BookInstance) -> Ordering {
    match (a.due_back, b.due_back) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

pub fn sort_by_due_back(instances: &mut [BookInstance]) {
    instances.sort_by(due_back_order);
}

/// Sort by last name, then first name.
pub fn sort_authors(authors: &mut [Author]) {
    authors.sort_by(|a, b| {
        a.last_name
            .cmp(&b.last_name)
            .then_with(|| a.first_name.cmp(&b.first_name))
    });
}
