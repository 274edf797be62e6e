use std::str::FromStr;

use chrono::Utc;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::debug;
use url::Url;
use uuid::Uuid;

use crate::db::models::{Book, BookStats, NewReview, ReviewDetail, ReviewSummary, User};
use crate::error::{AppError, AppResult};

/// Plain substring searches return at most this many rows.
pub const SEARCH_LIMIT: i64 = 100;

const BOOK_COLUMNS: &str = "id, isbn, title, author, year";

/// Lowercasing for the `*_folded` search columns. SQLite's `LOWER` and
/// `LIKE` only fold ASCII, so both sides are folded here instead.
pub fn fold_case(s: &str) -> String {
    s.to_lowercase()
}

/// True for `sqlite::memory:` and for URLs opened with `mode=memory`.
/// Every pooled connection to such a database would see its own empty copy.
fn is_in_memory(url: &str) -> bool {
    if url.contains(":memory:") {
        return true;
    }
    Url::parse(url)
        .map(|parsed| {
            parsed
                .query_pairs()
                .any(|(key, value)| key == "mode" && value == "memory")
        })
        .unwrap_or(false)
}

const SCHEMA: [&str; 3] = [
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        username TEXT UNIQUE NOT NULL,
        password_hash TEXT NOT NULL,
        created_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS books (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        isbn TEXT UNIQUE NOT NULL,
        title TEXT NOT NULL,
        author TEXT NOT NULL,
        year INTEGER NOT NULL,
        isbn_folded TEXT NOT NULL,
        title_folded TEXT NOT NULL,
        author_folded TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS reviews (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id TEXT NOT NULL REFERENCES users(id),
        book_id INTEGER NOT NULL REFERENCES books(id),
        rating INTEGER NOT NULL,
        text TEXT NOT NULL,
        stamp TEXT NOT NULL,
        UNIQUE (user_id, book_id)
    )
    "#,
];

/// Owns the connection pool and exposes every query the handlers need.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to `url` and make sure the schema exists.
    ///
    /// An in-memory database only lives as long as its connection, so those
    /// URLs get a single connection that is never recycled.
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = if is_in_memory(url) {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(5)
                .connect_with(options)
                .await?
        };

        let db = Self::new(pool);
        db.create_tables().await?;
        Ok(db)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn create_tables(&self) -> Result<(), sqlx::Error> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        debug!("schema ready");
        Ok(())
    }

    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    // Users

    pub async fn username_exists(&self, username: &str) -> AppResult<bool> {
        let matches: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE username = ?")
            .bind(username)
            .fetch_one(&self.pool)
            .await?;
        Ok(matches > 0)
    }

    pub async fn user_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn insert_user(&self, username: &str, password_hash: &str) -> AppResult<User> {
        let user = User {
            id: Uuid::new_v4().to_string(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            created_at: Utc::now().timestamp(),
        };

        sqlx::query(
            r#"
            INSERT INTO users (id, username, password_hash, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| unique_as_conflict(e, "sorry that username is taken"))?;

        Ok(user)
    }

    // Books

    pub async fn insert_book(
        &self,
        isbn: &str,
        title: &str,
        author: &str,
        year: i64,
    ) -> AppResult<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO books (isbn, title, author, year, isbn_folded, title_folded, author_folded)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(isbn)
        .bind(title)
        .bind(author)
        .bind(year)
        .bind(fold_case(isbn))
        .bind(fold_case(title))
        .bind(fold_case(author))
        .execute(&self.pool)
        .await
        .map_err(|e| unique_as_conflict(e, "a book with that isbn already exists"))?;
        Ok(result.last_insert_rowid())
    }

    pub async fn book_by_isbn(&self, isbn: &str) -> AppResult<Book> {
        let sql = format!("SELECT {BOOK_COLUMNS} FROM books WHERE isbn = ?");
        sqlx::query_as::<_, Book>(&sql)
            .bind(isbn)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::not_found("Book does not exist in database"))
    }

    pub async fn book_by_id(&self, id: i64) -> AppResult<Book> {
        let sql = format!("SELECT {BOOK_COLUMNS} FROM books WHERE id = ?");
        sqlx::query_as::<_, Book>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::not_found("Can't seem to find that book!"))
    }

    /// Book details plus the count and mean of its reviews.
    pub async fn book_stats_by_isbn(&self, isbn: &str) -> AppResult<BookStats> {
        sqlx::query_as::<_, BookStats>(
            r#"
            SELECT books.title, books.author, books.year, books.isbn,
                   COUNT(reviews.id) AS review_count,
                   CAST(AVG(reviews.rating) AS REAL) AS average_score
            FROM books LEFT JOIN reviews ON reviews.book_id = books.id
            WHERE books.isbn = ?
            GROUP BY books.id
            "#,
        )
        .bind(isbn)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::not_found("Book does not exist in database"))
    }

    /// Case-insensitive substring match over isbn, title and author.
    pub async fn search_books(&self, query: &str) -> AppResult<Vec<Book>> {
        let sql = format!(
            r#"
            SELECT {BOOK_COLUMNS} FROM books
            WHERE isbn_folded LIKE '%' || ?1 || '%'
               OR title_folded LIKE '%' || ?1 || '%'
               OR author_folded LIKE '%' || ?1 || '%'
            ORDER BY title
            LIMIT ?2
            "#
        );
        let books = sqlx::query_as::<_, Book>(&sql)
            .bind(fold_case(query))
            .bind(SEARCH_LIMIT)
            .fetch_all(&self.pool)
            .await?;
        Ok(books)
    }

    /// Titles starting with `prefix`, case-insensitive.
    pub async fn browse_books(&self, prefix: &str) -> AppResult<Vec<Book>> {
        let sql = format!(
            "SELECT {BOOK_COLUMNS} FROM books WHERE title_folded LIKE ?1 || '%' ORDER BY title"
        );
        let books = sqlx::query_as::<_, Book>(&sql)
            .bind(fold_case(prefix))
            .fetch_all(&self.pool)
            .await?;
        Ok(books)
    }

    // Reviews

    /// Newest first.
    pub async fn reviews_for_book(&self, book_id: i64) -> AppResult<Vec<ReviewDetail>> {
        let reviews = sqlx::query_as::<_, ReviewDetail>(
            r#"
            SELECT reviews.id, users.username, reviews.rating, reviews.text, reviews.stamp
            FROM reviews JOIN users ON reviews.user_id = users.id
            WHERE reviews.book_id = ?
            ORDER BY reviews.stamp DESC, reviews.id DESC
            "#,
        )
        .bind(book_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(reviews)
    }

    pub async fn review_summary(&self, book_id: i64) -> AppResult<ReviewSummary> {
        let summary = sqlx::query_as::<_, ReviewSummary>(
            r#"
            SELECT COUNT(*) AS count, CAST(AVG(rating) AS REAL) AS average
            FROM reviews WHERE book_id = ?
            "#,
        )
        .bind(book_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(summary)
    }

    /// The rating `user_id` gave `book_id`, if they reviewed it.
    pub async fn user_review(&self, book_id: i64, user_id: &str) -> AppResult<Option<i64>> {
        let rating = sqlx::query_scalar::<_, i64>(
            "SELECT rating FROM reviews WHERE book_id = ? AND user_id = ?",
        )
        .bind(book_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(rating)
    }

    pub async fn insert_review(&self, review: &NewReview<'_>) -> AppResult<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO reviews (user_id, book_id, rating, text, stamp)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(review.user_id)
        .bind(review.book_id)
        .bind(review.rating)
        .bind(review.text)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| unique_as_conflict(e, "Only one submission per book allowed!"))?;
        Ok(result.last_insert_rowid())
    }
}

fn unique_as_conflict(err: sqlx::Error, msg: &str) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => AppError::conflict(msg),
        _ => AppError::Database(err),
    }
}
