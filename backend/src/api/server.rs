use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::State,
    middleware,
    routing::{get, post},
};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::api::session::{self, SessionKeys};
use crate::api::{auth, books, rest, search};
use crate::config::Config;
use crate::db::Database;
use crate::services::{GoodreadsClient, RatingSource};

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub ratings: Arc<dyn RatingSource>,
    pub sessions: SessionKeys,
}

#[derive(Serialize)]
struct ReadyResponse {
    ready: bool,
    database: bool,
}

async fn ready(State(state): State<AppState>) -> Json<ReadyResponse> {
    let database = match state.db.ping().await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "Readiness check failed");
            false
        }
    };
    Json(ReadyResponse {
        ready: database,
        database,
    })
}

pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/", get(books::index))
        .route("/book/{book_id}", get(books::show))
        .route("/review/{book_id}", post(books::submit_review))
        .route("/search", get(search::search))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            session::require_login,
        ));

    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/ready", get(ready))
        .route("/api/{isbn}", get(rest::book_by_isbn))
        .route("/check", get(auth::check))
        .route("/login", get(auth::login_form).post(auth::login))
        .route("/logout", get(auth::logout))
        .route("/register", get(auth::register_form).post(auth::register))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_server(config: Config) -> Result<()> {
    let db = Database::connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    info!("Database connected");

    let ratings = GoodreadsClient::new(
        config.ratings_url.clone(),
        config.ratings_api_key.clone(),
        config.ratings_timeout,
    )?;
    if config.ratings_api_key.is_none() {
        warn!("RATINGS_API_KEY not set; third-party ratings are disabled");
    }

    let state = AppState {
        db,
        ratings: Arc::new(ratings),
        sessions: SessionKeys::from_config(config.session_secret.as_deref(), config.session_ttl),
    };

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    info!(addr = %config.bind_addr, "Server listening");

    axum::serve(listener, router(state))
        .await
        .context("Server failed")?;

    Ok(())
}
