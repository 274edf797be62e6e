//! Public JSON API

use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderName, StatusCode},
    response::{IntoResponse, Response},
};

use crate::api::server::AppState;
use crate::error::AppError;

pub const X_ERROR: HeaderName = HeaderName::from_static("x-error");

const INVALID_ISBN: &str = "Please provide a valid ISBN-10";
const UNKNOWN_BOOK: &str = "Book does not exist in database";

/// JSON error: the message as a bare JSON string, repeated in `X-Error`.
fn api_error(status: StatusCode, message: &'static str) -> Response {
    (status, [(X_ERROR, message)], Json(message)).into_response()
}

pub async fn book_by_isbn(State(state): State<AppState>, Path(isbn): Path<String>) -> Response {
    if isbn.chars().count() != 10 {
        return api_error(StatusCode::NOT_FOUND, INVALID_ISBN);
    }

    match state.db.book_by_isbn(&isbn).await {
        Ok(_) => {}
        Err(AppError::NotFound(_)) => return api_error(StatusCode::NOT_FOUND, UNKNOWN_BOOK),
        Err(e) => return e.into_response(),
    }

    match state.db.book_stats_by_isbn(&isbn).await {
        Ok(stats) => Json(stats).into_response(),
        Err(AppError::NotFound(_)) => api_error(StatusCode::NOT_FOUND, UNKNOWN_BOOK),
        Err(e) => e.into_response(),
    }
}
