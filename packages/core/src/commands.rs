//! Command dispatch for the CLI.
//!
//! Each subcommand maps onto one or two repository calls and renders the
//! result either as plain text (using the entities' `Display`) or as
//! pretty-printed JSON when `--json` is set.

use chrono::NaiveDate;
use serde::Serialize;

use crate::catalog::{
    default_due_date, Author, Book, BookInstance, Genre, NewAuthor, NewBook, NewBookInstance,
};
use crate::cli::{
    AuthorCommand, BookCommand, Command, GenreCommand, InstanceCommand, LanguageCommand,
    UserCommand,
};
use crate::config::Config;
use crate::error::AppError;
use crate::repository::{CatalogRepository, CatalogSummary};

/// A copy together with its derived overdue flag.
#[derive(Debug, Clone, Serialize)]
pub struct InstanceView {
    #[serde(flatten)]
    pub instance: BookInstance,
    pub overdue: bool,
}

impl InstanceView {
    pub fn new(instance: BookInstance, today: NaiveDate) -> Self {
        let overdue = instance.is_overdue(today);
        Self { instance, overdue }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BookListItem {
    #[serde(flatten)]
    pub book: Book,
    pub genre: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookDetail {
    pub book: Book,
    pub author: Option<Author>,
    pub genre: String,
    pub genres: Vec<Genre>,
    pub url: String,
    pub instances: Vec<InstanceView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthorDetail {
    pub author: Author,
    pub url: String,
    pub books: Vec<Book>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Deleted {
    pub entity: &'static str,
    pub id: String,
    /// Dependents whose reference was cleared.
    pub detached: u64,
}

/// Run one CLI command against the repository and return its output.
pub async fn execute(
    command: Command,
    repo: &CatalogRepository,
    config: &Config,
    today: NaiveDate,
    json: bool,
) -> Result<String, AppError> {
    match command {
        Command::Genre(cmd) => genre_command(cmd, repo, json).await,
        Command::Language(cmd) => language_command(cmd, repo, json).await,
        Command::Author(cmd) => author_command(cmd, repo, json).await,
        Command::Book(cmd) => book_command(cmd, repo, today, json).await,
        Command::User(cmd) => user_command(cmd, repo, json).await,
        Command::Instance(cmd) => instance_command(cmd, repo, today, json).await,
        Command::Borrow { instance, user, due } => {
            let due = match due {
                Some(due) => due,
                None => default_due_date(today, config.loan_period_days)?,
            };
            let copy = repo.borrow(instance, user, due, today).await?;
            render_instance(InstanceView::new(copy, today), json)
        }
        Command::Return { instance } => {
            let copy = repo.return_copy(instance).await?;
            render_instance(InstanceView::new(copy, today), json)
        }
        Command::Renew { instance, due } => {
            let copy = repo
                .renew(instance, due, today, config.max_renewal_weeks)
                .await?;
            render_instance(InstanceView::new(copy, today), json)
        }
        Command::Loans { user } => {
            let copies = repo.loaned_by(user).await?;
            render_instances(copies, today, json)
        }
        Command::Overdue => {
            let copies = repo.overdue_instances(today).await?;
            render_instances(copies, today, json)
        }
        Command::Summary => {
            let summary = repo.catalog_summary().await?;
            render(json, &summary, summary_text)
        }
    }
}

async fn genre_command(cmd: GenreCommand, repo: &CatalogRepository, json: bool) -> Result<String, AppError> {
    match cmd {
        GenreCommand::Add { name } => {
            let genre = repo.create_genre(&name).await?;
            render(json, &genre, |g| format!("{}\t{}", g.id, g))
        }
        GenreCommand::List => {
            let genres = repo.list_genres().await?;
            render(json, &genres, |list| lines(list, |g| format!("{}\t{}", g.id, g)))
        }
        GenreCommand::Delete { id } => {
            repo.delete_genre(id).await?;
            render_deleted("Genre", id.to_string(), 0, json)
        }
    }
}

async fn language_command(
    cmd: LanguageCommand,
    repo: &CatalogRepository,
    json: bool,
) -> Result<String, AppError> {
    match cmd {
        LanguageCommand::Add { name } => {
            let language = repo.create_language(&name).await?;
            render(json, &language, |l| format!("{}\t{}", l.id, l))
        }
        LanguageCommand::List => {
            let languages = repo.list_languages().await?;
            render(json, &languages, |list| lines(list, |l| format!("{}\t{}", l.id, l)))
        }
    }
}

async fn author_command(cmd: AuthorCommand, repo: &CatalogRepository, json: bool) -> Result<String, AppError> {
    match cmd {
        AuthorCommand::Add { first, last, born, died } => {
            let author = repo
                .create_author(&NewAuthor {
                    first_name: first,
                    last_name: last,
                    date_of_birth: born,
                    date_of_death: died,
                })
                .await?;
            render(json, &author, |a| format!("{}\t{}", a.id, a))
        }
        AuthorCommand::List => {
            let authors = repo.list_authors().await?;
            render(json, &authors, |list| lines(list, author_line))
        }
        AuthorCommand::Show { id } => {
            let author = repo.get_author(id).await?;
            let books = repo.books_by_author(id).await?;
            let detail = AuthorDetail { url: author.absolute_url(), author, books };
            render(json, &detail, |d| {
                let mut out = format!("{}\n{}", author_line(&d.author), d.url);
                for book in &d.books {
                    out.push_str(&format!("\n  {}\t{}", book.id, book));
                }
                out
            })
        }
        AuthorCommand::Delete { id } => {
            let detached = repo.delete_author(id).await?;
            render_deleted("Author", id.to_string(), detached, json)
        }
    }
}

async fn book_command(
    cmd: BookCommand,
    repo: &CatalogRepository,
    today: NaiveDate,
    json: bool,
) -> Result<String, AppError> {
    match cmd {
        BookCommand::Add { title, author, summary, isbn, genres } => {
            let book = repo
                .create_book(&NewBook {
                    title,
                    author_id: author,
                    summary,
                    isbn,
                    genre_ids: genres,
                })
                .await?;
            render(json, &book, |b| format!("{}\t{}", b.id, b))
        }
        BookCommand::List => {
            let mut items = Vec::new();
            for book in repo.list_books().await? {
                items.push(BookListItem {
                    genre: repo.display_genre(book.id).await?,
                    url: book.absolute_url(),
                    book,
                });
            }
            render(json, &items, |list| {
                lines(list, |item| format!("{}\t{}\t{}", item.book.id, item.book, item.genre))
            })
        }
        BookCommand::Show { id } => {
            let book = repo.get_book(id).await?;
            let author = match book.author_id {
                Some(author_id) => Some(repo.get_author(author_id).await?),
                None => None,
            };
            let genres = repo.book_genres(id).await?;
            let instances = repo
                .instances_for_book(id)
                .await?
                .into_iter()
                .map(|copy| InstanceView::new(copy, today))
                .collect();
            let detail = BookDetail {
                genre: repo.display_genre(id).await?,
                url: book.absolute_url(),
                book,
                author,
                genres,
                instances,
            };
            render(json, &detail, book_detail_text)
        }
        BookCommand::Delete { id } => {
            let detached = repo.delete_book(id).await?;
            render_deleted("Book", id.to_string(), detached, json)
        }
    }
}

async fn user_command(cmd: UserCommand, repo: &CatalogRepository, json: bool) -> Result<String, AppError> {
    match cmd {
        UserCommand::Add { username } => {
            let user = repo.create_user(&username).await?;
            render(json, &user, |u| format!("{}\t{}", u.id, u))
        }
        UserCommand::Delete { id } => {
            let detached = repo.delete_user(id).await?;
            render_deleted("User", id.to_string(), detached, json)
        }
    }
}

async fn instance_command(
    cmd: InstanceCommand,
    repo: &CatalogRepository,
    today: NaiveDate,
    json: bool,
) -> Result<String, AppError> {
    match cmd {
        InstanceCommand::Add { book, imprint, due, status } => {
            let copy = repo
                .create_instance(&NewBookInstance { book_id: book, imprint, due_back: due, status })
                .await?;
            render_instance(InstanceView::new(copy, today), json)
        }
        InstanceCommand::List { book } => {
            let copies = match book {
                Some(book_id) => repo.instances_for_book(book_id).await?,
                None => repo.list_instances().await?,
            };
            render_instances(copies, today, json)
        }
        InstanceCommand::Status { id, status } => {
            let copy = repo.update_status(id, status).await?;
            render_instance(InstanceView::new(copy, today), json)
        }
    }
}

fn render<T: Serialize>(
    json: bool,
    value: &T,
    text: impl FnOnce(&T) -> String,
) -> Result<String, AppError> {
    if json {
        Ok(serde_json::to_string_pretty(value)?)
    } else {
        Ok(text(value))
    }
}

fn render_instance(view: InstanceView, json: bool) -> Result<String, AppError> {
    render(json, &view, instance_line)
}

fn render_instances(
    copies: Vec<BookInstance>,
    today: NaiveDate,
    json: bool,
) -> Result<String, AppError> {
    let views: Vec<InstanceView> = copies
        .into_iter()
        .map(|copy| InstanceView::new(copy, today))
        .collect();
    render(json, &views, |list| lines(list, instance_line))
}

fn render_deleted(
    entity: &'static str,
    id: String,
    detached: u64,
    json: bool,
) -> Result<String, AppError> {
    let deleted = Deleted { entity, id, detached };
    render(json, &deleted, |d| {
        format!("Deleted {} {} ({} dependents detached)", d.entity, d.id, d.detached)
    })
}

fn lines<T>(items: &[T], line: impl Fn(&T) -> String) -> String {
    items.iter().map(line).collect::<Vec<_>>().join("\n")
}

fn author_line(author: &Author) -> String {
    let lifespan = match (author.date_of_birth, author.date_of_death) {
        (None, None) => String::new(),
        (born, died) => format!(
            " ({} - {})",
            born.map(|d| d.to_string()).unwrap_or_default(),
            died.map(|d| d.to_string()).unwrap_or_default()
        ),
    };
    format!("{}\t{}{}", author.id, author, lifespan)
}

fn instance_line(view: &InstanceView) -> String {
    let due = view
        .instance
        .due_back
        .map(|d| d.to_string())
        .unwrap_or_else(|| "-".to_string());
    let flag = if view.overdue { " OVERDUE" } else { "" };
    format!("{}\t{}\tdue {}{}", view.instance, view.instance.status, due, flag)
}

fn book_detail_text(detail: &BookDetail) -> String {
    let author = detail
        .author
        .as_ref()
        .map(|a| a.to_string())
        .unwrap_or_else(|| "(unknown author)".to_string());

    let mut out = format!(
        "{}\nAuthor: {}\nISBN: {}\nGenre: {}\n{}\n{}",
        detail.book, author, detail.book.isbn, detail.genre, detail.url, detail.book.summary
    );
    for view in &detail.instances {
        out.push_str("\n  ");
        out.push_str(&instance_line(view));
    }
    out
}

fn summary_text(summary: &CatalogSummary) -> String {
    format!(
        "Books: {}\nCopies: {}\nCopies available: {}\nAuthors: {}\nGenres: {}",
        summary.books,
        summary.instances,
        summary.available_instances,
        summary.authors,
        summary.genres
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogError, LoanStatus};
    use crate::db::create_pool;

    async fn make_repo() -> CatalogRepository {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        CatalogRepository::new(pool)
    }

    fn config() -> Config {
        Config {
            database_url: "sqlite::memory:".into(),
            loan_period_days: 21,
            max_renewal_weeks: 4,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn seed_copy(repo: &CatalogRepository, status: LoanStatus) -> BookInstance {
        let book = repo
            .create_book(&NewBook {
                title: "Dune".into(),
                author_id: None,
                summary: String::new(),
                isbn: "9780441013593".into(),
                genre_ids: vec![],
            })
            .await
            .unwrap();
        repo.create_instance(&NewBookInstance {
            book_id: book.id,
            imprint: "Ace, 1990".into(),
            due_back: None,
            status,
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn borrow_without_due_uses_loan_period() {
        let repo = make_repo().await;
        let user = repo.create_user("reader").await.unwrap();
        let copy = seed_copy(&repo, LoanStatus::Available).await;
        let today = date(2024, 1, 1);

        execute(
            Command::Borrow { instance: copy.id, user: user.id, due: None },
            &repo,
            &config(),
            today,
            false,
        )
        .await
        .unwrap();

        let stored = repo.get_instance(copy.id).await.unwrap();
        assert_eq!(stored.due_back, Some(date(2024, 1, 22)));
    }

    #[tokio::test]
    async fn borrow_with_out_of_range_loan_period_is_rejected() {
        let repo = make_repo().await;
        let user = repo.create_user("reader").await.unwrap();
        let copy = seed_copy(&repo, LoanStatus::Available).await;
        let config = Config { loan_period_days: u32::MAX, ..config() };

        let err = execute(
            Command::Borrow { instance: copy.id, user: user.id, due: None },
            &repo,
            &config,
            date(2024, 1, 1),
            false,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::Catalog(CatalogError::InvalidDueDate { .. })));
        let stored = repo.get_instance(copy.id).await.unwrap();
        assert_eq!(stored.status, LoanStatus::Available);
        assert_eq!(stored.borrower_id, None);
    }

    #[tokio::test]
    async fn overdue_text_output_flags_late_copies() {
        let repo = make_repo().await;
        let user = repo.create_user("reader").await.unwrap();
        let copy = seed_copy(&repo, LoanStatus::Available).await;
        repo.borrow(copy.id, user.id, date(2024, 1, 5), date(2024, 1, 1))
            .await
            .unwrap();

        let out = execute(Command::Overdue, &repo, &config(), date(2024, 1, 10), false)
            .await
            .unwrap();

        assert!(out.contains(&copy.id.to_string()));
        assert!(out.contains("(Dune)"));
        assert!(out.ends_with("OVERDUE"));
    }

    #[tokio::test]
    async fn summary_json_output() {
        let repo = make_repo().await;
        seed_copy(&repo, LoanStatus::Available).await;

        let out = execute(Command::Summary, &repo, &config(), date(2024, 1, 1), true)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();

        assert_eq!(value["books"], 1);
        assert_eq!(value["available_instances"], 1);
    }

    #[tokio::test]
    async fn book_show_json_includes_url_and_copies() {
        let repo = make_repo().await;
        let copy = seed_copy(&repo, LoanStatus::Maintenance).await;
        let book_id = copy.book_id.unwrap();

        let out = execute(
            Command::Book(BookCommand::Show { id: book_id }),
            &repo,
            &config(),
            date(2024, 1, 1),
            true,
        )
        .await
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();

        assert_eq!(value["url"], format!("/catalog/book/{}", book_id));
        assert_eq!(value["instances"][0]["status"], "m");
        assert_eq!(value["instances"][0]["overdue"], false);
        assert_eq!(value["genre"], "");
    }

    #[tokio::test]
    async fn author_delete_reports_detached_books() {
        let repo = make_repo().await;
        let author = repo
            .create_author(&NewAuthor {
                first_name: "Frank".into(),
                last_name: "Herbert".into(),
                date_of_birth: None,
                date_of_death: None,
            })
            .await
            .unwrap();
        repo.create_book(&NewBook {
            title: "Dune".into(),
            author_id: Some(author.id),
            summary: String::new(),
            isbn: "9780441013593".into(),
            genre_ids: vec![],
        })
        .await
        .unwrap();

        let out = execute(
            Command::Author(AuthorCommand::Delete { id: author.id }),
            &repo,
            &config(),
            date(2024, 1, 1),
            false,
        )
        .await
        .unwrap();

        assert_eq!(out, format!("Deleted Author {} (1 dependents detached)", author.id));
    }

    #[tokio::test]
    async fn returning_available_copy_is_a_catalog_error() {
        let repo = make_repo().await;
        let copy = seed_copy(&repo, LoanStatus::Available).await;

        let err = execute(
            Command::Return { instance: copy.id },
            &repo,
            &config(),
            date(2024, 1, 1),
            false,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::Catalog(_)));
    }

    #[test]
    fn author_line_includes_lifespan() {
        let author = Author {
            id: 1,
            first_name: "Mary".into(),
            last_name: "Shelley".into(),
            date_of_birth: Some(date(1797, 8, 30)),
            date_of_death: Some(date(1851, 2, 1)),
        };
        assert_eq!(author_line(&author), "1\tShelley, Mary (1797-08-30 - 1851-02-01)");
    }
}
