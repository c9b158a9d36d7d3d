//! SQLite pool construction and catalog schema.
//!
//! Field-length and choice constraints are enforced here as `CHECK`
//! constraints, so the store rejects bad rows regardless of caller.

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS genres (
        id   INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL CHECK (length(name) <= 200)
    )",
    "CREATE TABLE IF NOT EXISTS languages (
        id   INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL CHECK (length(name) <= 200)
    )",
    "CREATE TABLE IF NOT EXISTS authors (
        id            INTEGER PRIMARY KEY AUTOINCREMENT,
        first_name    TEXT NOT NULL CHECK (length(first_name) <= 100),
        last_name     TEXT NOT NULL CHECK (length(last_name) <= 100),
        date_of_birth TEXT,
        date_of_death TEXT
    )",
    "CREATE TABLE IF NOT EXISTS books (
        id        INTEGER PRIMARY KEY AUTOINCREMENT,
        title     TEXT NOT NULL CHECK (length(title) <= 200),
        author_id INTEGER REFERENCES authors(id) ON DELETE SET NULL,
        summary   TEXT NOT NULL DEFAULT '' CHECK (length(summary) <= 1000),
        isbn      TEXT NOT NULL CHECK (length(isbn) <= 13)
    )",
    "CREATE TABLE IF NOT EXISTS book_genres (
        book_id  INTEGER NOT NULL REFERENCES books(id) ON DELETE CASCADE,
        genre_id INTEGER NOT NULL REFERENCES genres(id) ON DELETE CASCADE,
        PRIMARY KEY (book_id, genre_id)
    )",
    "CREATE TABLE IF NOT EXISTS users (
        id       INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL UNIQUE CHECK (length(username) <= 150)
    )",
    "CREATE TABLE IF NOT EXISTS book_instances (
        id          TEXT PRIMARY KEY,
        book_id     INTEGER REFERENCES books(id) ON DELETE SET NULL,
        imprint     TEXT NOT NULL CHECK (length(imprint) <= 200),
        due_back    TEXT,
        status      TEXT NOT NULL DEFAULT 'm' CHECK (status IN ('m', 'o', 'a', 'r')),
        borrower_id INTEGER REFERENCES users(id) ON DELETE SET NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_book_instances_due_back ON book_instances (due_back)",
    "CREATE INDEX IF NOT EXISTS idx_books_author_id ON books (author_id)",
];

/// Open a pool for `database_url` and make sure the schema exists.
///
/// `sqlite::memory:` databases live only as long as their connection, so
/// they are pinned to a single connection that is never recycled.
pub async fn create_pool(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool_options = if is_in_memory(database_url) {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(5)
    };

    let pool = pool_options.connect_with(options).await?;
    apply_schema(&pool).await?;

    tracing::debug!(database_url, "Catalog database ready");
    Ok(pool)
}

/// Create all catalog tables. Safe to run against an existing database.
pub async fn apply_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    for statement in SCHEMA {
        sqlx::query(statement).execute(&mut *tx).await?;
    }
    tx.commit().await?;
    Ok(())
}

fn is_in_memory(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::Row;

    #[tokio::test]
    async fn memory_pool_has_catalog_tables() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        let rows = sqlx::query("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .fetch_all(&pool)
            .await
            .unwrap();
        let names: Vec<String> = rows.iter().map(|r| r.get("name")).collect();

        for table in ["authors", "book_genres", "book_instances", "books", "genres", "languages", "users"] {
            assert!(names.iter().any(|n| n == table), "missing table {}", table);
        }
    }

    #[tokio::test]
    async fn schema_can_be_applied_twice() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        assert!(apply_schema(&pool).await.is_ok());
    }

    #[tokio::test]
    async fn status_outside_choice_set_is_rejected() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        let result = sqlx::query(
            "INSERT INTO book_instances (id, imprint, status) VALUES ('x', 'Penguin', 'z')",
        )
        .execute(&pool)
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn overlong_isbn_is_rejected() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        let result = sqlx::query("INSERT INTO books (title, isbn) VALUES ('Dune', '97804410135931')")
            .execute(&pool)
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn detects_memory_urls() {
        assert!(is_in_memory("sqlite::memory:"));
        assert!(is_in_memory("sqlite://file:catalog?mode=memory&cache=shared"));
        assert!(!is_in_memory("sqlite://catalog.db"));
    }
}
