use axum::{
    extract::{Query, State},
    response::Html,
};
use serde::Deserialize;
use tracing::debug;

use crate::api::server::AppState;
use crate::api::views;
use crate::error::AppResult;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    /// Any value switches to title-prefix browsing.
    pub browse: Option<String>,
}

pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> AppResult<Html<String>> {
    let query = params.q.unwrap_or_default().to_lowercase();
    let browse = params.browse.is_some();

    let results = if browse {
        state.db.browse_books(&query).await?
    } else {
        state.db.search_books(&query).await?
    };
    debug!(query = %query, browse, results = results.len(), "Search");

    Ok(views::search_page(&query, browse, &results))
}
