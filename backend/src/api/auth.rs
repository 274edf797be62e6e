use std::sync::OnceLock;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{
    Json,
    extract::{Form, Query, State},
    response::{Html, Redirect},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use tracing::info;

use crate::api::server::AppState;
use crate::api::{session, views};
use crate::db::models::User;
use crate::error::{AppError, AppResult};

#[derive(Deserialize)]
pub struct LoginForm {
    pub username: Option<String>,
    pub hash: Option<String>,
}

#[derive(Deserialize)]
pub struct RegisterForm {
    pub username: Option<String>,
    pub hash: Option<String>,
    pub confirmation: Option<String>,
}

#[derive(Deserialize)]
pub struct CheckParams {
    pub user_name: Option<String>,
}

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::internal(format!("failed to hash password: {e}")))
}

pub fn verify_password(password: &str, stored: &str) -> bool {
    PasswordHash::new(stored)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

static DUMMY_HASH: OnceLock<String> = OnceLock::new();

/// Returns the user only if the password matches. An unknown username
/// still pays for one argon2 verification, against a throwaway hash, so
/// both rejections take the same time.
pub fn check_credentials(user: Option<User>, password: &str) -> Option<User> {
    match user {
        Some(user) => verify_password(password, &user.password_hash).then_some(user),
        None => {
            let dummy = DUMMY_HASH
                .get_or_init(|| hash_password("not-a-real-password").unwrap_or_default());
            verify_password(password, dummy);
            None
        }
    }
}

fn non_empty(field: Option<String>) -> Option<String> {
    field.filter(|s| !s.is_empty())
}

pub async fn login_form(jar: CookieJar) -> (CookieJar, Html<String>) {
    (session::clear(jar), views::login_page())
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> (CookieJar, AppResult<Redirect>) {
    let jar = session::clear(jar);

    let (Some(username), Some(password)) = (non_empty(form.username), non_empty(form.hash)) else {
        return (jar, Err(AppError::auth("must provide username and password")));
    };

    let found = match state.db.user_by_username(&username).await {
        Ok(found) => found,
        Err(e) => return (jar, Err(e)),
    };
    let Some(user) = check_credentials(found, &password) else {
        info!(username = %username, "Rejected login");
        return (jar, Err(AppError::auth("invalid username and/or password")));
    };

    match session::persist_user(jar.clone(), &state.sessions, &user.id) {
        Ok(jar) => {
            info!(user_id = %user.id, "User logged in");
            (jar, Ok(Redirect::to("/")))
        }
        Err(e) => (jar, Err(e)),
    }
}

pub async fn logout(jar: CookieJar) -> (CookieJar, Redirect) {
    (session::clear(jar), Redirect::to("/login"))
}

pub async fn register_form() -> Html<String> {
    views::register_page()
}

pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<RegisterForm>,
) -> AppResult<(CookieJar, Redirect)> {
    let (Some(username), Some(password)) = (non_empty(form.username), non_empty(form.hash)) else {
        return Err(AppError::validation("must provide username and password"));
    };

    if form.confirmation.as_deref() != Some(password.as_str()) {
        return Err(AppError::validation("password and confirmation must match"));
    }

    if state.db.username_exists(&username).await? {
        return Err(AppError::conflict("sorry that username is taken"));
    }

    let password_hash = hash_password(&password)?;
    let user = state.db.insert_user(&username, &password_hash).await?;
    info!(user_id = %user.id, username = %user.username, "Registered new user");

    let jar = session::persist_user(jar, &state.sessions, &user.id)?;
    Ok((jar, Redirect::to("/")))
}

/// `true` when the username is still available.
pub async fn check(
    State(state): State<AppState>,
    Query(params): Query<CheckParams>,
) -> AppResult<Json<bool>> {
    let available = match params.user_name {
        Some(name) => !state.db.username_exists(&name).await?,
        None => true,
    };
    Ok(Json(available))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_round_trip() {
        let stored = hash_password("correct horse").unwrap();
        assert!(stored.starts_with("$argon2"));
        assert!(verify_password("correct horse", &stored));
        assert!(!verify_password("wrong horse", &stored));
    }

    #[test]
    fn test_hashes_are_salted() {
        assert_ne!(hash_password("same").unwrap(), hash_password("same").unwrap());
    }

    #[test]
    fn test_check_credentials() {
        let user = User {
            id: "user-1".to_string(),
            username: "ada".to_string(),
            password_hash: hash_password("lovelace").unwrap(),
            created_at: 0,
        };
        let found = check_credentials(Some(user.clone()), "lovelace");
        assert_eq!(found.map(|u| u.id), Some("user-1".to_string()));
        assert!(check_credentials(Some(user), "babbage").is_none());

        assert!(check_credentials(None, "not-a-real-password").is_none());
        let dummy = DUMMY_HASH.get().unwrap();
        assert!(dummy.starts_with("$argon2"));
    }

    #[test]
    fn test_garbage_stored_hash_never_verifies() {
        assert!(!verify_password("anything", "plaintext"));
    }
}
