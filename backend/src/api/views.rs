//! HTML pages. Markup is intentionally bare; every value that came from a
//! user or the database goes through [`escape_html`].

use axum::response::Html;

use crate::db::models::{Book, ReviewDetail, ReviewSummary};
use crate::services::ThirdPartyRatings;
use crate::services::ratings::format_rating;

const CAPTION_IMAGE_BASE: &str = "https://api.memegen.link/images/custom";

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(title: &str, logged_in: bool, body: &str) -> Html<String> {
    let nav = if logged_in {
        r#"<a href="/">Home</a> <a href="/logout">Log out</a>"#
    } else {
        r#"<a href="/login">Log in</a> <a href="/register">Register</a>"#
    };
    Html(format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head><meta charset=\"utf-8\"><title>{title} | Bookshelf</title></head>\n<body>\n<nav>{nav}</nav>\n<main>\n{body}\n</main>\n</body>\n</html>\n",
        title = escape_html(title),
    ))
}

pub fn login_page() -> Html<String> {
    layout(
        "Log in",
        false,
        r#"<form action="/login" method="post">
<input name="username" type="text" placeholder="Username" autocomplete="username" autofocus>
<input name="hash" type="password" placeholder="Password" autocomplete="current-password">
<button type="submit">Log in</button>
</form>"#,
    )
}

pub fn register_page() -> Html<String> {
    layout(
        "Register",
        false,
        r#"<form action="/register" method="post">
<input name="username" type="text" placeholder="Username" autocomplete="username" autofocus>
<input id="password" name="hash" type="password" placeholder="Password" autocomplete="new-password">
<input name="confirmation" type="password" placeholder="Confirm password" autocomplete="new-password">
<button type="submit">Register</button>
</form>"#,
    )
}

fn search_form(query: &str) -> String {
    format!(
        r#"<form action="/search" method="get">
<input name="q" type="search" placeholder="ISBN, title or author" value="{}">
<button type="submit">Search</button>
</form>"#,
        escape_html(query)
    )
}

fn alphabet_links() -> String {
    let links: String = ('A'..='Z')
        .map(|c| format!(r#"<li><a class="char-search" href="/search?q={c}&amp;browse=true">{c}</a></li>"#))
        .collect();
    format!(r#"<ul class="alphabet-links">{links}</ul>"#)
}

pub fn index_page() -> Html<String> {
    let body = format!("<h1>Find a book</h1>\n{}\n{}", search_form(""), alphabet_links());
    layout("Home", true, &body)
}

pub fn search_page(query: &str, browse: bool, results: &[Book]) -> Html<String> {
    let heading = if browse {
        format!("Titles starting with \u{201c}{}\u{201d}", escape_html(&query.to_uppercase()))
    } else {
        format!("Results for \u{201c}{}\u{201d}", escape_html(query))
    };

    let list = if results.is_empty() {
        "<p>No books found.</p>".to_string()
    } else {
        let items: String = results
            .iter()
            .map(|book| {
                format!(
                    r#"<li><a href="/book/{id}">{title}</a> by {author} ({year}) <small>{isbn}</small></li>"#,
                    id = book.id,
                    title = escape_html(&book.title),
                    author = escape_html(&book.author),
                    year = book.year,
                    isbn = escape_html(&book.isbn),
                )
            })
            .collect();
        format!("<ol class=\"results\">{items}</ol>")
    };

    let body = format!(
        "{}\n{}\n<h1>{heading}</h1>\n{list}",
        search_form(if browse { "" } else { query }),
        alphabet_links()
    );
    layout("Search", true, &body)
}

/// Everything the book page shows
pub struct BookPage<'a> {
    pub book: &'a Book,
    pub third_party: Option<&'a ThirdPartyRatings>,
    pub reviews: &'a [ReviewDetail],
    pub summary: ReviewSummary,
    pub own_rating: Option<i64>,
}

pub fn book_page(page: &BookPage<'_>) -> Html<String> {
    let book = page.book;

    let third_party = match page.third_party {
        Some(r) => format!(
            "<p class=\"third-party\">Goodreads: {} average from {} ratings</p>",
            format_rating(Some(r.average)),
            escape_html(&r.count)
        ),
        None => String::new(),
    };

    let summary = format!(
        "<p class=\"summary\">{} review{} here{}</p>",
        page.summary.count,
        if page.summary.count == 1 { "" } else { "s" },
        match page.summary.average {
            Some(avg) => format!(", averaging {}", format_rating(Some(avg))),
            None => String::new(),
        }
    );

    let review_form = match page.own_rating {
        Some(rating) => format!("<p class=\"own-review\">You rated this book {rating}/5.</p>"),
        None => format!(
            r#"<form action="/review/{id}" method="post">
<fieldset>{stars}</fieldset>
<textarea id="review-text" name="review-text" placeholder="What did you think?"></textarea>
<button type="submit">Submit review</button>
</form>"#,
            id = book.id,
            stars = (1..=5)
                .map(|n| format!(
                    r#"<label><input class="rating" type="radio" name="rating" value="{n}"{checked}> {n}</label>"#,
                    checked = if n == 5 { " checked" } else { "" }
                ))
                .collect::<String>()
        ),
    };

    let reviews: String = page
        .reviews
        .iter()
        .map(|r| {
            format!(
                "<li id=\"review-{id}\"><strong>{user}</strong> rated {rating}/5 on {date}<p>{text}</p></li>",
                id = r.id,
                user = escape_html(&r.username),
                rating = r.rating,
                date = r.stamp.format("%Y-%m-%d"),
                text = escape_html(&r.text),
            )
        })
        .collect();

    let body = format!(
        "<h1>{title}</h1>\n<p>{author}, {year}</p>\n<p>ISBN {isbn}</p>\n{third_party}\n{summary}\n{review_form}\n<ul class=\"reviews\">{reviews}</ul>",
        title = escape_html(&book.title),
        author = escape_html(&book.author),
        year = book.year,
        isbn = escape_html(&book.isbn),
    );
    layout(&book.title, true, &body)
}

/// `caption` is the message already escaped for the caption image path.
pub fn error_page(code: u16, message: &str, caption: &str) -> Html<String> {
    let image = format!("{CAPTION_IMAGE_BASE}/{code}/{caption}.jpg");
    let body = format!(
        "<img class=\"error\" alt=\"{alt}\" src=\"{src}\">\n<p class=\"error-message\">{code}: {msg}</p>",
        alt = escape_html(message),
        src = escape_html(&image),
        msg = escape_html(message),
    );
    layout("Error", false, &body)
}
