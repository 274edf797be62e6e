use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use crate::api::views;
use crate::error::AppError;

const CAPTION_ESCAPES: [(&str, &str); 8] = [
    ("-", "--"),
    (" ", "-"),
    ("_", "__"),
    ("?", "~q"),
    ("%", "~p"),
    ("#", "~h"),
    ("/", "~s"),
    ("\"", "''"),
];

/// Escape a message for use as a caption path segment on the error page.
/// Replacements run in table order, so `-` is doubled before spaces become `-`.
pub fn escape_caption(message: &str) -> String {
    CAPTION_ESCAPES
        .iter()
        .fold(message.to_string(), |s, (old, new)| s.replace(old, new))
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::Conflict(_) => StatusCode::BAD_REQUEST,
            Self::Auth(_) | Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn public_message(&self) -> String {
        match self {
            Self::Database(_) | Self::Internal(_) => "Something went wrong".to_string(),
            other => other.to_string(),
        }
    }
}

/// Render `message` as an error page with `status`.
pub fn error_page(message: &str, status: StatusCode) -> Response {
    let caption = escape_caption(message);
    (status, views::error_page(status.as_u16(), message, &caption)).into_response()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        error_page(&self.public_message(), status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_caption_table() {
        assert_eq!(escape_caption("a-b"), "a--b");
        assert_eq!(escape_caption("a b"), "a-b");
        assert_eq!(escape_caption("a_b"), "a__b");
        assert_eq!(escape_caption("why?"), "why~q");
        assert_eq!(escape_caption("100%"), "100~p");
        assert_eq!(escape_caption("#1"), "~h1");
        assert_eq!(escape_caption("and/or"), "and~sor");
        assert_eq!(escape_caption("say \"hi\""), "say-''hi''");
    }

    #[test]
    fn test_escape_caption_order() {
        assert_eq!(escape_caption("x - y"), "x----y");
        assert_eq!(
            escape_caption("password and confirmation must match"),
            "password-and-confirmation-must-match"
        );
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::validation("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::conflict("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::auth("x").status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::forbidden("x").status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::not_found("x").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::internal("boom").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_details_hidden() {
        assert_eq!(
            AppError::internal("secret detail").public_message(),
            "Something went wrong"
        );
        assert_eq!(AppError::auth("nope").public_message(), "nope");
    }
}
