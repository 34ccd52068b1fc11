//! Session tokens, password hashing and the per-role route guards.
//!
//! A login sets an `HttpOnly` cookie named [`SESSION_COOKIE`] carrying a
//! signed token; API clients may send the same token as
//! `Authorization: Bearer <token>` instead.

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{
        header::{AUTHORIZATION, COOKIE},
        request::Parts,
        HeaderMap,
    },
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use thiserror::Error;

use crate::{db::models::Role, error::AppError, state::AppState};

pub mod password;
pub mod token;

pub use password::{hash_password, verify_password};
pub use token::{issue_token, verify_token, Claims};

pub const SESSION_COOKIE: &str = "token";

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Password must be at least {0} characters long")]
    WeakPassword(usize),
    #[error("Stored password hash is malformed")]
    MalformedHash,
    #[error("Invalid session token")]
    InvalidToken,
    #[error("Session expired")]
    Expired,
}

/// Reads the session token from the cookie, falling back to the bearer header.
pub fn token_from_headers(headers: &HeaderMap) -> Option<&str> {
    let from_cookie = headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|pair| {
            pair.trim()
                .strip_prefix(SESSION_COOKIE)
                .and_then(|rest| rest.strip_prefix('='))
        })
        .filter(|token| !token.is_empty());

    from_cookie.or_else(|| {
        headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
    })
}

pub fn session_cookie(token: &str, max_age_secs: i64, secure: bool) -> String {
    let mut cookie =
        format!("{SESSION_COOKIE}={token}; HttpOnly; SameSite=Lax; Path=/; Max-Age={max_age_secs}");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn expired_cookie(secure: bool) -> String {
    session_cookie("", 0, secure)
}

/// Verifies the session token and checks that its account still exists.
async fn authenticate(headers: &HeaderMap, state: &AppState) -> Result<Claims, AppError> {
    let token = token_from_headers(headers)
        .ok_or_else(|| AppError::Unauthorized("Not logged in".to_string()))?;
    let claims = verify_token(token, state.settings.jwt_secret.as_bytes(), Utc::now())?;

    let store = state.store.as_ref();
    let exists = match claims.role {
        Role::Patient => store.get_patient(claims.sub).await?.is_some(),
        Role::Pharmacist => store.get_pharmacist(claims.sub).await?.is_some(),
        Role::Admin => store.get_admin(claims.sub).await?.is_some(),
    };
    if !exists {
        log::warn!("Session for deleted {} {} refused", claims.role, claims.sub);
        return Err(AppError::Unauthorized("Account no longer exists".to_string()));
    }
    Ok(claims)
}

#[async_trait]
impl FromRequestParts<AppState> for Claims {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(claims) = parts.extensions.get::<Claims>() {
            return Ok(claims.clone());
        }
        authenticate(&parts.headers, state).await
    }
}

async fn authorize(
    state: &AppState,
    mut request: Request,
    next: Next,
    role: Role,
) -> Result<Response, AppError> {
    let claims = authenticate(request.headers(), state).await?;
    if claims.role != role {
        log::warn!(
            "{} {} refused for role {}",
            request.method(),
            request.uri().path(),
            claims.role
        );
        return Err(AppError::Forbidden(format!("Requires the {role} role")));
    }
    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

pub async fn require_patient(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    authorize(&state, request, next, Role::Patient).await
}

pub async fn require_pharmacist(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    authorize(&state, request, next, Role::Pharmacist).await
}

pub async fn require_admin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    authorize(&state, request, next, Role::Admin).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn cookie_takes_precedence_over_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("theme=dark; token=abc.def.ghi"));
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer other"));
        assert_eq!(token_from_headers(&headers), Some("abc.def.ghi"));
    }

    #[test]
    fn bearer_header_is_accepted() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(token_from_headers(&headers), Some("abc"));
    }

    #[test]
    fn similarly_named_cookies_are_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("tokenish=nope; token="));
        assert_eq!(token_from_headers(&headers), None);
    }

    #[test]
    fn session_cookie_is_http_only() {
        let cookie = session_cookie("abc", 3600, true);
        assert_eq!(
            cookie,
            "token=abc; HttpOnly; SameSite=Lax; Path=/; Max-Age=3600; Secure"
        );
        assert!(expired_cookie(false).contains("Max-Age=0"));
    }
}
