use axum::{
    Extension,
    extract::{Form, Path, State},
    response::{Html, Redirect},
};
use serde::Deserialize;
use tracing::info;

use crate::api::server::AppState;
use crate::api::session::CurrentUser;
use crate::api::views::{self, BookPage};
use crate::db::models::NewReview;
use crate::error::{AppError, AppResult};

#[derive(Deserialize)]
pub struct ReviewForm {
    pub rating: Option<String>,
    #[serde(rename = "review-text")]
    pub text: Option<String>,
}

pub async fn index() -> Html<String> {
    views::index_page()
}

pub async fn show(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(book_id): Path<i64>,
) -> AppResult<Html<String>> {
    let book = state.db.book_by_id(book_id).await?;
    let third_party = state.ratings.lookup(&book.isbn).await;

    let reviews = state.db.reviews_for_book(book_id).await?;
    let summary = state.db.review_summary(book_id).await?;
    let own_rating = state.db.user_review(book_id, &user.id).await?;

    Ok(views::book_page(&BookPage {
        book: &book,
        third_party: third_party.as_ref(),
        reviews: &reviews,
        summary,
        own_rating,
    }))
}

fn parse_rating(raw: Option<&str>) -> AppResult<i64> {
    raw.and_then(|r| r.trim().parse::<i64>().ok())
        .filter(|r| (1..=5).contains(r))
        .ok_or_else(|| AppError::validation("Something went wrong with submission."))
}

pub async fn submit_review(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(book_id): Path<i64>,
    Form(form): Form<ReviewForm>,
) -> AppResult<Redirect> {
    let book = state.db.book_by_id(book_id).await?;

    if state.db.user_review(book.id, &user.id).await?.is_some() {
        return Err(AppError::forbidden("Only one submission per book allowed!"));
    }

    let rating = parse_rating(form.rating.as_deref())?;

    let text = form.text.unwrap_or_default();
    let review = NewReview {
        user_id: &user.id,
        book_id: book.id,
        rating,
        text: text.trim_end(),
    };

    // A concurrent duplicate slips past the check above and lands on the
    // unique index instead.
    let review_id = state.db.insert_review(&review).await.map_err(|e| match e {
        AppError::Conflict(msg) => AppError::Forbidden(msg),
        other => other,
    })?;
    info!(review_id, book_id = book.id, user_id = %user.id, rating, "Review saved");

    Ok(Redirect::to(&format!("/book/{}", book.id)))
}
