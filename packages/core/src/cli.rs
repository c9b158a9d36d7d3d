use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::catalog::LoanStatus;

/// Local library catalog CLI arguments
#[derive(Debug, Parser)]
#[command(
    name = "local-library",
    version,
    about = "Catalog of books, authors and lendable copies"
)]
pub struct Cli {
    /// SQLite database URL (overrides DATABASE_URL)
    #[arg(long, global = true)]
    pub database_url: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage genres
    #[command(subcommand)]
    Genre(GenreCommand),

    /// Manage languages
    #[command(subcommand)]
    Language(LanguageCommand),

    /// Manage authors
    #[command(subcommand)]
    Author(AuthorCommand),

    /// Manage books
    #[command(subcommand)]
    Book(BookCommand),

    /// Manage borrower accounts
    #[command(subcommand)]
    User(UserCommand),

    /// Manage individual copies
    #[command(subcommand)]
    Instance(InstanceCommand),

    /// Lend a copy to a user
    Borrow {
        instance: Uuid,
        #[arg(long)]
        user: i64,
        /// Due date (YYYY-MM-DD); defaults to today plus the loan period
        #[arg(long)]
        due: Option<NaiveDate>,
    },

    /// Take a copy back
    Return { instance: Uuid },

    /// Move the due date of an active loan
    Renew {
        instance: Uuid,
        #[arg(long)]
        due: NaiveDate,
    },

    /// List copies currently on loan to a user
    Loans { user: i64 },

    /// List copies past their due date
    Overdue,

    /// Show catalog counts
    Summary,
}

#[derive(Debug, Subcommand)]
pub enum GenreCommand {
    Add { name: String },
    List,
    Delete { id: i64 },
}

#[derive(Debug, Subcommand)]
pub enum LanguageCommand {
    Add { name: String },
    List,
}

#[derive(Debug, Subcommand)]
pub enum AuthorCommand {
    Add {
        #[arg(long)]
        first: String,
        #[arg(long)]
        last: String,
        #[arg(long)]
        born: Option<NaiveDate>,
        #[arg(long)]
        died: Option<NaiveDate>,
    },
    List,
    Show { id: i64 },
    Delete { id: i64 },
}

#[derive(Debug, Subcommand)]
pub enum BookCommand {
    Add {
        #[arg(long)]
        title: String,
        #[arg(long)]
        author: Option<i64>,
        #[arg(long, default_value = "")]
        summary: String,
        #[arg(long)]
        isbn: String,
        /// Genre id; repeat for several genres
        #[arg(long = "genre")]
        genres: Vec<i64>,
    },
    List,
    Show { id: i64 },
    Delete { id: i64 },
}

#[derive(Debug, Subcommand)]
pub enum UserCommand {
    Add { username: String },
    Delete { id: i64 },
}

#[derive(Debug, Subcommand)]
pub enum InstanceCommand {
    Add {
        #[arg(long)]
        book: i64,
        #[arg(long)]
        imprint: String,
        #[arg(long)]
        due: Option<NaiveDate>,
        /// m, o, a, r or the full label
        #[arg(long, default_value = "m")]
        status: LoanStatus,
    },
    List {
        /// Only copies of this book
        #[arg(long)]
        book: Option<i64>,
    },
    Status { id: Uuid, status: LoanStatus },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_borrow_with_due_date() {
        let id = Uuid::new_v4();
        let id_arg = id.to_string();
        let cli = Cli::try_parse_from([
            "local-library",
            "borrow",
            id_arg.as_str(),
            "--user",
            "3",
            "--due",
            "2024-02-01",
        ])
        .unwrap();

        match cli.command {
            Command::Borrow { instance, user, due } => {
                assert_eq!(instance, id);
                assert_eq!(user, 3);
                assert_eq!(due, NaiveDate::from_ymd_opt(2024, 2, 1));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn instance_status_defaults_to_maintenance() {
        let cli = Cli::try_parse_from([
            "local-library",
            "instance",
            "add",
            "--book",
            "1",
            "--imprint",
            "Penguin",
        ])
        .unwrap();

        match cli.command {
            Command::Instance(InstanceCommand::Add { status, .. }) => {
                assert_eq!(status, LoanStatus::Maintenance)
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn rejects_unknown_status() {
        let result = Cli::try_parse_from([
            "local-library",
            "instance",
            "add",
            "--book",
            "1",
            "--imprint",
            "Penguin",
            "--status",
            "lost",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn global_flags_follow_subcommand() {
        let cli = Cli::try_parse_from(["local-library", "summary", "--json", "--database-url", "sqlite::memory:"])
            .unwrap();
        assert!(cli.json);
        assert_eq!(cli.database_url.as_deref(), Some("sqlite::memory:"));
    }

    #[test]
    fn book_add_collects_repeated_genres() {
        let cli = Cli::try_parse_from([
            "local-library", "book", "add", "--title", "Dune", "--isbn", "9780441013593",
            "--genre", "1", "--genre", "2",
        ])
        .unwrap();

        match cli.command {
            Command::Book(BookCommand::Add { genres, summary, .. }) => {
                assert_eq!(genres, vec![1, 2]);
                assert_eq!(summary, "");
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
