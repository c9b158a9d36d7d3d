//! Database repository for the library catalog.
//!
//! All SQLite read/write logic lives here. Deleting an author, book, user
//! or genre never removes dependents: references to the deleted row are
//! cleared explicitly inside the same transaction as the delete.
//!
//! Loan transitions ([`CatalogRepository::borrow`],
//! [`CatalogRepository::return_copy`], [`CatalogRepository::renew`]) load
//! the copy, apply the rule from [`crate::catalog::loans`] and write it
//! back in one transaction.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::catalog::{
    display_genre, Author, Book, BookInstance, CatalogError, Genre, Language, LoanStatus,
    NewAuthor, NewBook, NewBookInstance, User, DISPLAY_GENRE_LIMIT,
};

const INSTANCE_SELECT: &str = "SELECT bi.id, bi.book_id, b.title AS book_title, bi.imprint,
        bi.due_back, bi.status, bi.borrower_id
     FROM book_instances bi
     LEFT JOIN books b ON b.id = bi.book_id";

/// Copies with a due date come first, earliest first; undated copies last.
/// SQLite sorts NULL first by default, so `due_back IS NULL` leads the key.
const INSTANCE_ORDER: &str = "ORDER BY bi.due_back IS NULL, bi.due_back ASC, bi.id ASC";

/// Headline counts for the catalog home page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSummary {
    pub books: i64,
    pub instances: i64,
    pub available_instances: i64,
    pub authors: i64,
    pub genres: i64,
}

/// Repository for reading and writing catalog rows to SQLite.
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ---- Genres / languages ----

    pub async fn create_genre(&self, name: &str) -> Result<Genre, CatalogError> {
        let result = sqlx::query("INSERT INTO genres (name) VALUES (?)")
            .bind(name)
            .execute(&self.pool)
            .await?;

        let id = result.last_insert_rowid();
        tracing::debug!(genre_id = id, name, "Genre created");
        Ok(Genre { id, name: name.to_string() })
    }

    pub async fn list_genres(&self) -> Result<Vec<Genre>, CatalogError> {
        let rows = sqlx::query("SELECT id, name FROM genres ORDER BY name ASC, id ASC")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(genre_from_row).collect()
    }

    /// Remove a genre. Books lose the genre link but are otherwise untouched.
    pub async fn delete_genre(&self, id: i64) -> Result<(), CatalogError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM book_genres WHERE genre_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM genres WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CatalogError::not_found("Genre", id));
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn create_language(&self, name: &str) -> Result<Language, CatalogError> {
        let result = sqlx::query("INSERT INTO languages (name) VALUES (?)")
            .bind(name)
            .execute(&self.pool)
            .await?;

        Ok(Language { id: result.last_insert_rowid(), name: name.to_string() })
    }

    pub async fn list_languages(&self) -> Result<Vec<Language>, CatalogError> {
        let rows = sqlx::query("SELECT id, name FROM languages ORDER BY name ASC, id ASC")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(language_from_row).collect()
    }

    // ---- Authors ----

    pub async fn create_author(&self, author: &NewAuthor) -> Result<Author, CatalogError> {
        let result = sqlx::query(
            "INSERT INTO authors (first_name, last_name, date_of_birth, date_of_death)
             VALUES (?, ?, ?, ?)",
        )
        .bind(&author.first_name)
        .bind(&author.last_name)
        .bind(author.date_of_birth.map(|d| d.to_string()))
        .bind(author.date_of_death.map(|d| d.to_string()))
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        tracing::info!(author_id = id, "Author created");
        Ok(Author {
            id,
            first_name: author.first_name.clone(),
            last_name: author.last_name.clone(),
            date_of_birth: author.date_of_birth,
            date_of_death: author.date_of_death,
        })
    }

    pub async fn get_author(&self, id: i64) -> Result<Author, CatalogError> {
        let row = sqlx::query(
            "SELECT id, first_name, last_name, date_of_birth, date_of_death
             FROM authors WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| CatalogError::not_found("Author", id))?;

        author_from_row(&row)
    }

    /// All authors, ordered by last name then first name.
    pub async fn list_authors(&self) -> Result<Vec<Author>, CatalogError> {
        let rows = sqlx::query(
            "SELECT id, first_name, last_name, date_of_birth, date_of_death
             FROM authors ORDER BY last_name ASC, first_name ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(author_from_row).collect()
    }

    /// Delete an author and detach their books. Returns the number of
    /// books whose author reference was cleared.
    pub async fn delete_author(&self, id: i64) -> Result<u64, CatalogError> {
        let mut tx = self.pool.begin().await?;

        let detached = sqlx::query("UPDATE books SET author_id = NULL WHERE author_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let result = sqlx::query("DELETE FROM authors WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CatalogError::not_found("Author", id));
        }
        tx.commit().await?;

        tracing::info!(author_id = id, books_detached = detached, "Author deleted");
        Ok(detached)
    }

    // ---- Books ----

    /// Insert a book together with its genre links.
    pub async fn create_book(&self, book: &NewBook) -> Result<Book, CatalogError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "INSERT INTO books (title, author_id, summary, isbn) VALUES (?, ?, ?, ?)",
        )
        .bind(&book.title)
        .bind(book.author_id)
        .bind(&book.summary)
        .bind(&book.isbn)
        .execute(&mut *tx)
        .await?;
        let id = result.last_insert_rowid();

        for &genre_id in &book.genre_ids {
            sqlx::query("INSERT OR IGNORE INTO book_genres (book_id, genre_id) VALUES (?, ?)")
                .bind(id)
                .bind(genre_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        tracing::info!(book_id = id, genres = book.genre_ids.len(), "Book created");
        Ok(Book {
            id,
            title: book.title.clone(),
            author_id: book.author_id,
            summary: book.summary.clone(),
            isbn: book.isbn.clone(),
        })
    }

    pub async fn get_book(&self, id: i64) -> Result<Book, CatalogError> {
        let row = sqlx::query("SELECT id, title, author_id, summary, isbn FROM books WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| CatalogError::not_found("Book", id))?;

        book_from_row(&row)
    }

    pub async fn list_books(&self) -> Result<Vec<Book>, CatalogError> {
        let rows = sqlx::query(
            "SELECT id, title, author_id, summary, isbn FROM books ORDER BY title ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(book_from_row).collect()
    }

    pub async fn books_by_author(&self, author_id: i64) -> Result<Vec<Book>, CatalogError> {
        let rows = sqlx::query(
            "SELECT id, title, author_id, summary, isbn FROM books
             WHERE author_id = ? ORDER BY title ASC, id ASC",
        )
        .bind(author_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(book_from_row).collect()
    }

    /// Replace the genre set of a book.
    pub async fn set_book_genres(&self, book_id: i64, genre_ids: &[i64]) -> Result<(), CatalogError> {
        let mut tx = self.pool.begin().await?;

        let exists = sqlx::query("SELECT 1 FROM books WHERE id = ?")
            .bind(book_id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(CatalogError::not_found("Book", book_id));
        }

        sqlx::query("DELETE FROM book_genres WHERE book_id = ?")
            .bind(book_id)
            .execute(&mut *tx)
            .await?;
        for &genre_id in genre_ids {
            sqlx::query("INSERT OR IGNORE INTO book_genres (book_id, genre_id) VALUES (?, ?)")
                .bind(book_id)
                .bind(genre_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Genres of a book in the order they were linked.
    pub async fn book_genres(&self, book_id: i64) -> Result<Vec<Genre>, CatalogError> {
        self.fetch_book_genres(book_id, None).await
    }

    /// Up to three genre names of a book, comma-joined, in link order.
    pub async fn display_genre(&self, book_id: i64) -> Result<String, CatalogError> {
        let genres = self.fetch_book_genres(book_id, Some(DISPLAY_GENRE_LIMIT)).await?;
        Ok(display_genre(&genres))
    }

    async fn fetch_book_genres(
        &self,
        book_id: i64,
        limit: Option<usize>,
    ) -> Result<Vec<Genre>, CatalogError> {
        // SQLite treats a negative LIMIT as "no limit".
        let limit = limit.map(|n| n as i64).unwrap_or(-1);

        let rows = sqlx::query(
            "SELECT g.id, g.name FROM book_genres bg
             JOIN genres g ON g.id = bg.genre_id
             WHERE bg.book_id = ?
             ORDER BY bg.rowid ASC
             LIMIT ?",
        )
        .bind(book_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(genre_from_row).collect()
    }

    /// Delete a book. Its copies remain with their book reference cleared.
    /// Returns the number of copies detached.
    pub async fn delete_book(&self, id: i64) -> Result<u64, CatalogError> {
        let mut tx = self.pool.begin().await?;

        let detached = sqlx::query("UPDATE book_instances SET book_id = NULL WHERE book_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        sqlx::query("DELETE FROM book_genres WHERE book_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM books WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CatalogError::not_found("Book", id));
        }
        tx.commit().await?;

        tracing::info!(book_id = id, copies_detached = detached, "Book deleted");
        Ok(detached)
    }

    // ---- Users ----

    pub async fn create_user(&self, username: &str) -> Result<User, CatalogError> {
        let result = sqlx::query("INSERT INTO users (username) VALUES (?)")
            .bind(username)
            .execute(&self.pool)
            .await?;

        Ok(User { id: result.last_insert_rowid(), username: username.to_string() })
    }

    pub async fn get_user(&self, id: i64) -> Result<User, CatalogError> {
        let row = sqlx::query("SELECT id, username FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| CatalogError::not_found("User", id))?;

        Ok(User { id: row.try_get("id")?, username: row.try_get("username")? })
    }

    /// Delete an account. Copies it was borrowing keep their status but
    /// lose the borrower reference. Returns the number of copies detached.
    pub async fn delete_user(&self, id: i64) -> Result<u64, CatalogError> {
        let mut tx = self.pool.begin().await?;

        let detached =
            sqlx::query("UPDATE book_instances SET borrower_id = NULL WHERE borrower_id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CatalogError::not_found("User", id));
        }
        tx.commit().await?;

        tracing::info!(user_id = id, copies_detached = detached, "User deleted");
        Ok(detached)
    }

    // ---- Book instances ----

    /// Insert a new copy under a freshly generated UUID.
    pub async fn create_instance(
        &self,
        instance: &NewBookInstance,
    ) -> Result<BookInstance, CatalogError> {
        let copy = BookInstance::from_new(instance);

        sqlx::query(
            "INSERT INTO book_instances (id, book_id, imprint, due_back, status)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(copy.id.to_string())
        .bind(copy.book_id)
        .bind(&copy.imprint)
        .bind(copy.due_back.map(|d| d.to_string()))
        .bind(copy.status.code())
        .execute(&self.pool)
        .await?;

        tracing::info!(instance_id = %copy.id, book_id = instance.book_id, "Book instance created");
        self.get_instance(copy.id).await
    }

    pub async fn get_instance(&self, id: Uuid) -> Result<BookInstance, CatalogError> {
        fetch_instance(&self.pool, id).await
    }

    /// All copies, earliest due date first, undated copies last.
    pub async fn list_instances(&self) -> Result<Vec<BookInstance>, CatalogError> {
        let sql = format!("{} {}", INSTANCE_SELECT, INSTANCE_ORDER);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        rows.iter().map(instance_from_row).collect()
    }

    pub async fn instances_for_book(&self, book_id: i64) -> Result<Vec<BookInstance>, CatalogError> {
        let sql = format!("{} WHERE bi.book_id = ? {}", INSTANCE_SELECT, INSTANCE_ORDER);
        let rows = sqlx::query(&sql).bind(book_id).fetch_all(&self.pool).await?;

        rows.iter().map(instance_from_row).collect()
    }

    /// Copies currently on loan to `user_id`, soonest due first.
    pub async fn loaned_by(&self, user_id: i64) -> Result<Vec<BookInstance>, CatalogError> {
        let sql = format!(
            "{} WHERE bi.borrower_id = ? AND bi.status = ? {}",
            INSTANCE_SELECT, INSTANCE_ORDER
        );
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .bind(LoanStatus::OnLoan.code())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(instance_from_row).collect()
    }

    /// Copies whose due date is strictly before `today`.
    pub async fn overdue_instances(&self, today: NaiveDate) -> Result<Vec<BookInstance>, CatalogError> {
        let sql = format!(
            "{} WHERE bi.due_back IS NOT NULL AND bi.due_back < ? {}",
            INSTANCE_SELECT, INSTANCE_ORDER
        );
        let rows = sqlx::query(&sql)
            .bind(today.to_string())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(instance_from_row).collect()
    }

    /// Change a copy's status outside the borrow/return flow.
    ///
    /// Leaving `OnLoan` this way ends the loan: borrower and due date are
    /// cleared. Moving a copy onto loan requires [`Self::borrow`].
    pub async fn update_status(&self, id: Uuid, status: LoanStatus) -> Result<BookInstance, CatalogError> {
        let mut tx = self.pool.begin().await?;

        let mut copy = fetch_instance(&mut *tx, id).await?;
        copy.set_status(status)
            .map_err(|err| log_rejected("update status", id, err))?;
        save_loan_state(&mut tx, &copy).await?;
        tx.commit().await?;

        tracing::debug!(instance_id = %id, status = status.code(), "Status updated");
        Ok(copy)
    }

    pub async fn borrow(
        &self,
        id: Uuid,
        user_id: i64,
        due_back: NaiveDate,
        today: NaiveDate,
    ) -> Result<BookInstance, CatalogError> {
        let mut tx = self.pool.begin().await?;

        let user = sqlx::query("SELECT 1 FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;
        if user.is_none() {
            return Err(CatalogError::not_found("User", user_id));
        }

        let mut copy = fetch_instance(&mut *tx, id).await?;
        copy.borrow(user_id, due_back, today)
            .map_err(|err| log_rejected("borrow", id, err))?;
        save_loan_state(&mut tx, &copy).await?;
        tx.commit().await?;

        tracing::info!(instance_id = %id, user_id, %due_back, "Copy borrowed");
        Ok(copy)
    }

    pub async fn return_copy(&self, id: Uuid) -> Result<BookInstance, CatalogError> {
        let mut tx = self.pool.begin().await?;

        let mut copy = fetch_instance(&mut *tx, id).await?;
        copy.return_copy()
            .map_err(|err| log_rejected("return", id, err))?;
        save_loan_state(&mut tx, &copy).await?;
        tx.commit().await?;

        tracing::info!(instance_id = %id, "Copy returned");
        Ok(copy)
    }

    pub async fn renew(
        &self,
        id: Uuid,
        new_due: NaiveDate,
        today: NaiveDate,
        max_weeks: u32,
    ) -> Result<BookInstance, CatalogError> {
        let mut tx = self.pool.begin().await?;

        let mut copy = fetch_instance(&mut *tx, id).await?;
        copy.renew(new_due, today, max_weeks)
            .map_err(|err| log_rejected("renew", id, err))?;
        save_loan_state(&mut tx, &copy).await?;
        tx.commit().await?;

        tracing::info!(instance_id = %id, %new_due, "Loan renewed");
        Ok(copy)
    }

    // ---- Summary ----

    pub async fn catalog_summary(&self) -> Result<CatalogSummary, CatalogError> {
        let row = sqlx::query(
            "SELECT
                (SELECT COUNT(*) FROM books) AS books,
                (SELECT COUNT(*) FROM book_instances) AS instances,
                (SELECT COUNT(*) FROM book_instances WHERE status = ?) AS available_instances,
                (SELECT COUNT(*) FROM authors) AS authors,
                (SELECT COUNT(*) FROM genres) AS genres",
        )
        .bind(LoanStatus::Available.code())
        .fetch_one(&self.pool)
        .await?;

        Ok(CatalogSummary {
            books: row.try_get("books")?,
            instances: row.try_get("instances")?,
            available_instances: row.try_get("available_instances")?,
            authors: row.try_get("authors")?,
            genres: row.try_get("genres")?,
        })
    }
}

async fn fetch_instance<'e, E>(executor: E, id: Uuid) -> Result<BookInstance, CatalogError>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let sql = format!("{} WHERE bi.id = ?", INSTANCE_SELECT);
    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| CatalogError::not_found("BookInstance", id))?;

    instance_from_row(&row)
}

fn log_rejected(action: &'static str, id: Uuid, err: CatalogError) -> CatalogError {
    tracing::error!(instance_id = %id, action, error = %err, "Loan transition rejected");
    err
}

async fn save_loan_state(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    copy: &BookInstance,
) -> Result<(), CatalogError> {
    sqlx::query("UPDATE book_instances SET status = ?, due_back = ?, borrower_id = ? WHERE id = ?")
        .bind(copy.status.code())
        .bind(copy.due_back.map(|d| d.to_string()))
        .bind(copy.borrower_id)
        .bind(copy.id.to_string())
        .execute(&mut **tx)
        .await?;
    Ok(())
}

fn parse_date(value: Option<String>) -> Result<Option<NaiveDate>, CatalogError> {
    value
        .map(|raw| {
            NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                .map_err(|_| CatalogError::validation(format!("Stored date '{}' is not YYYY-MM-DD", raw)))
        })
        .transpose()
}

fn genre_from_row(row: &SqliteRow) -> Result<Genre, CatalogError> {
    Ok(Genre { id: row.try_get("id")?, name: row.try_get("name")? })
}

fn language_from_row(row: &SqliteRow) -> Result<Language, CatalogError> {
    Ok(Language { id: row.try_get("id")?, name: row.try_get("name")? })
}

fn author_from_row(row: &SqliteRow) -> Result<Author, CatalogError> {
    Ok(Author {
        id: row.try_get("id")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        date_of_birth: parse_date(row.try_get("date_of_birth")?)?,
        date_of_death: parse_date(row.try_get("date_of_death")?)?,
    })
}

fn book_from_row(row: &SqliteRow) -> Result<Book, CatalogError> {
    Ok(Book {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        author_id: row.try_get("author_id")?,
        summary: row.try_get("summary")?,
        isbn: row.try_get("isbn")?,
    })
}

fn instance_from_row(row: &SqliteRow) -> Result<BookInstance, CatalogError> {
    let id: String = row.try_get("id")?;
    let status: String = row.try_get("status")?;

    Ok(BookInstance {
        id: Uuid::parse_str(&id)
            .map_err(|_| CatalogError::validation(format!("Stored id '{}' is not a UUID", id)))?,
        book_id: row.try_get("book_id")?,
        book_title: row.try_get("book_title")?,
        imprint: row.try_get("imprint")?,
        due_back: parse_date(row.try_get("due_back")?)?,
        status: status.parse()?,
        borrower_id: row.try_get("borrower_id")?,
    })
}
