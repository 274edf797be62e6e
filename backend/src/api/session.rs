//! Cookie-backed sessions and the login gate.
//!
//! The session cookie carries an HS256 token whose subject is the user id.
//! Handlers behind [`require_login`] receive the identity as an
//! `Extension<CurrentUser>`.

use std::time::Duration;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::api::server::AppState;
use crate::error::{AppError, AppResult};

pub const SESSION_COOKIE: &str = "session";

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: i64,
}

/// Identity of the logged-in user for the current request
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentUser {
    pub id: String,
}

/// Signing keys and lifetime for session tokens
#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl SessionKeys {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    /// Keys from a configured secret, or a fresh random one.
    pub fn from_config(secret: Option<&str>, ttl: Duration) -> Self {
        match secret {
            Some(secret) => Self::new(secret.as_bytes(), ttl),
            None => {
                warn!("SESSION_SECRET not set; sessions will not survive a restart");
                let random = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
                Self::new(random.as_bytes(), ttl)
            }
        }
    }

    pub fn issue(&self, user_id: &str) -> AppResult<String> {
        let exp = i64::try_from(self.ttl.as_secs())
            .ok()
            .and_then(|ttl| Utc::now().timestamp().checked_add(ttl))
            .ok_or_else(|| AppError::internal("session lifetime is out of range"))?;
        let claims = Claims {
            sub: user_id.to_string(),
            exp,
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AppError::internal(format!("failed to sign session: {e}")))
    }

    pub fn verify(&self, token: &str) -> Option<CurrentUser> {
        match decode::<Claims>(token, &self.decoding, &Validation::default()) {
            Ok(data) => Some(CurrentUser { id: data.claims.sub }),
            Err(e) => {
                debug!(error = %e, "Rejected session token");
                None
            }
        }
    }

    pub fn current_user(&self, jar: &CookieJar) -> Option<CurrentUser> {
        jar.get(SESSION_COOKIE)
            .and_then(|cookie| self.verify(cookie.value()))
    }
}

/// Store `user_id` in the session cookie.
pub fn persist_user(jar: CookieJar, keys: &SessionKeys, user_id: &str) -> AppResult<CookieJar> {
    let token = keys.issue(user_id)?;
    let cookie = Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax);
    Ok(jar.add(cookie))
}

pub fn clear(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(SESSION_COOKIE).path("/"))
}

/// Redirects to `/login` unless the request carries a valid session.
pub async fn require_login(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    match state.sessions.current_user(&jar) {
        Some(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        None => Redirect::to("/login").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> SessionKeys {
        SessionKeys::new(b"unit-secret", Duration::from_secs(60))
    }

    #[test]
    fn test_token_round_trip() {
        let keys = keys();
        let token = keys.issue("user-1").unwrap();
        assert_eq!(
            keys.verify(&token),
            Some(CurrentUser {
                id: "user-1".to_string()
            })
        );
    }

    #[test]
    fn test_foreign_and_garbage_tokens_rejected() {
        let token = keys().issue("user-1").unwrap();
        let other = SessionKeys::new(b"other-secret", Duration::from_secs(60));
        assert_eq!(other.verify(&token), None);
        assert_eq!(keys().verify("not-a-token"), None);
    }

    #[test]
    fn test_expired_token_rejected() {
        let keys = keys();
        let claims = Claims {
            sub: "user-1".to_string(),
            exp: Utc::now().timestamp() - 3600,
        };
        let token = encode(&Header::default(), &claims, &keys.encoding).unwrap();
        assert_eq!(keys.verify(&token), None);
    }

    #[test]
    fn test_oversized_ttl_is_an_error() {
        let keys = SessionKeys::new(b"unit-secret", Duration::from_secs(u64::MAX));
        assert!(matches!(keys.issue("user-1"), Err(AppError::Internal(_))));
        assert!(persist_user(CookieJar::new(), &keys, "user-1").is_err());
    }

    #[test]
    fn test_jar_persist_and_clear() {
        let keys = keys();
        let jar = persist_user(CookieJar::new(), &keys, "user-2").unwrap();
        assert_eq!(keys.current_user(&jar).map(|u| u.id), Some("user-2".to_string()));

        let jar = clear(jar);
        assert_eq!(keys.current_user(&jar), None);
    }
}
