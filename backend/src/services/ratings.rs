//! Third-party rating lookup
//!
//! Best-effort enrichment for the book page. Every failure mode collapses to
//! `None` so a slow or broken upstream never blocks a render.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

/// Aggregate rating data from the external service
#[derive(Debug, Clone, PartialEq)]
pub struct ThirdPartyRatings {
    pub average: f64,
    /// Rating count with thousands separators, e.g. `"1,234,567"`
    pub count: String,
}

#[async_trait]
pub trait RatingSource: Send + Sync {
    async fn lookup(&self, isbn: &str) -> Option<ThirdPartyRatings>;
}

#[derive(Debug, Deserialize)]
struct ReviewCounts {
    books: Vec<ReviewCountEntry>,
}

#[derive(Debug, Deserialize)]
struct ReviewCountEntry {
    average_rating: NumberOrString,
    work_ratings_count: u64,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(f64),
    String(String),
}

impl NumberOrString {
    fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::String(s) => s.trim().parse().ok(),
        }
    }
}

/// Client for the Goodreads-style `review_counts.json` endpoint
pub struct GoodreadsClient {
    client: Client,
    url: String,
    api_key: Option<String>,
}

impl GoodreadsClient {
    pub fn new(url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build rating HTTP client")?;

        Ok(Self {
            client,
            url: url.into(),
            api_key,
        })
    }

    async fn fetch(&self, key: &str, isbn: &str) -> reqwest::Result<String> {
        self.client
            .get(&self.url)
            .query(&[("key", key), ("isbns", isbn)])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    }
}

#[async_trait]
impl RatingSource for GoodreadsClient {
    async fn lookup(&self, isbn: &str) -> Option<ThirdPartyRatings> {
        let Some(key) = self.api_key.as_deref() else {
            debug!(isbn, "No rating API key configured, skipping lookup");
            return None;
        };

        let body = match self.fetch(key, isbn).await {
            Ok(body) => body,
            Err(e) => {
                warn!(isbn, error = %e, "Rating lookup failed");
                return None;
            }
        };

        let ratings = parse_ratings(&body);
        if ratings.is_none() {
            warn!(isbn, "Rating service returned an unexpected payload");
        }
        ratings
    }
}

/// Extract the first book's ratings from a response body.
pub fn parse_ratings(body: &str) -> Option<ThirdPartyRatings> {
    let counts: ReviewCounts = serde_json::from_str(body).ok()?;
    let entry = counts.books.first()?;

    Some(ThirdPartyRatings {
        average: entry.average_rating.as_f64()?,
        count: group_thousands(entry.work_ratings_count),
    })
}

pub fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Two decimals with thousands separators; empty when there is no value.
pub fn format_rating(value: Option<f64>) -> String {
    let Some(value) = value else {
        return String::new();
    };

    let fixed = format!("{:.2}", value.abs());
    let (whole, frac) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let whole = whole.parse::<u64>().map(group_thousands).unwrap_or_else(|_| whole.to_string());
    let sign = if value < 0.0 { "-" } else { "" };
    format!("{sign}{whole}.{frac}")
}
