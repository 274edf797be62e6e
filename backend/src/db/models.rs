use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Book {
    pub id: i64,
    pub isbn: String,
    pub title: String,
    pub author: String,
    pub year: i64,
}

/// One row of the per-ISBN aggregate served by the JSON API
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct BookStats {
    pub title: String,
    pub author: String,
    pub year: i64,
    pub isbn: String,
    pub review_count: i64,
    pub average_score: Option<f64>,
}

/// A review joined to the username of its author
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReviewDetail {
    pub id: i64,
    pub username: String,
    pub rating: i64,
    pub text: String,
    pub stamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, sqlx::FromRow)]
pub struct ReviewSummary {
    pub count: i64,
    pub average: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct NewReview<'a> {
    pub user_id: &'a str,
    pub book_id: i64,
    pub rating: i64,
    pub text: &'a str,
}
