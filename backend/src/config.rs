//! Application configuration loaded from the environment

use std::env;
use std::time::Duration;

use anyhow::{Context, Result, bail};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_RATINGS_URL: &str = "https://www.goodreads.com/book/review_counts.json";
const DEFAULT_SESSION_TTL_HOURS: u64 = 168;
const DEFAULT_RATINGS_TIMEOUT_SECS: u64 = 5;

/// One year. Longer lifetimes would also overflow the token's `exp` claim.
pub const MAX_SESSION_TTL_HOURS: u64 = 24 * 366;

/// Runtime settings for the web service
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite connection URL, e.g. `sqlite://bookshelf.db` or `sqlite::memory:`
    pub database_url: String,

    /// Socket address the HTTP listener binds to
    pub bind_addr: String,

    /// Secret used to sign session cookies. `None` means a random
    /// per-process secret, so sessions do not survive a restart.
    pub session_secret: Option<String>,

    /// Lifetime of a session cookie
    pub session_ttl: Duration,

    /// Third-party rating endpoint
    pub ratings_url: String,

    /// API key for the rating endpoint; lookups are skipped without one
    pub ratings_api_key: Option<String>,

    /// Upper bound on a single rating lookup
    pub ratings_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables (and `.env`, if present)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key lookup; `from_env` passes the
    /// process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let database_url = lookup("DATABASE_URL").context("DATABASE_URL is not set")?;

        let session_ttl_hours = parse_or("SESSION_TTL_HOURS", &lookup, DEFAULT_SESSION_TTL_HOURS)?;
        if session_ttl_hours == 0 || session_ttl_hours > MAX_SESSION_TTL_HOURS {
            bail!("SESSION_TTL_HOURS must be between 1 and {MAX_SESSION_TTL_HOURS}");
        }
        let session_ttl_secs = session_ttl_hours
            .checked_mul(3600)
            .context("SESSION_TTL_HOURS is out of range")?;

        let ratings_timeout_secs =
            parse_or("RATINGS_TIMEOUT_SECS", &lookup, DEFAULT_RATINGS_TIMEOUT_SECS)?;

        Ok(Self {
            database_url,
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            session_secret: lookup("SESSION_SECRET").filter(|s| !s.is_empty()),
            session_ttl: Duration::from_secs(session_ttl_secs),
            ratings_url: lookup("RATINGS_API_URL")
                .unwrap_or_else(|| DEFAULT_RATINGS_URL.to_string()),
            ratings_api_key: lookup("RATINGS_API_KEY").filter(|s| !s.is_empty()),
            ratings_timeout: Duration::from_secs(ratings_timeout_secs),
        })
    }
}

fn parse_or(key: &str, lookup: &impl Fn(&str) -> Option<String>, default: u64) -> Result<u64> {
    match lookup(key) {
        Some(raw) => raw.trim().parse().with_context(|| format!("Invalid {key}")),
        None => Ok(default),
    }
}
