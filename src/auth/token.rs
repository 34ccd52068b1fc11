use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

use super::AuthError;
use crate::db::models::Role;

type HmacSha256 = Hmac<Sha256>;

/// `{"alg":"HS256","typ":"JWT"}`, pre-encoded.
const HEADER: &str = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9";
const MAX_TOKEN_LEN: usize = 2048;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    /// Expiry as seconds since the Unix epoch.
    pub exp: i64,
}

impl Claims {
    pub fn new(sub: Uuid, role: Role, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            sub,
            role,
            exp: (now + ttl).timestamp(),
        }
    }
}

pub fn issue_token(claims: &Claims, secret: &[u8]) -> Result<String, AuthError> {
    let payload = serde_json::to_vec(claims).map_err(|_| AuthError::InvalidToken)?;
    let signing_input = format!("{HEADER}.{}", URL_SAFE_NO_PAD.encode(payload));

    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| AuthError::InvalidToken)?;
    mac.update(signing_input.as_bytes());
    let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    Ok(format!("{signing_input}.{signature}"))
}

pub fn verify_token(token: &str, secret: &[u8], now: DateTime<Utc>) -> Result<Claims, AuthError> {
    if token.len() > MAX_TOKEN_LEN {
        return Err(AuthError::InvalidToken);
    }

    let (signing_input, signature) = token.rsplit_once('.').ok_or(AuthError::InvalidToken)?;
    let (header, payload) = signing_input
        .split_once('.')
        .ok_or(AuthError::InvalidToken)?;
    if header != HEADER {
        return Err(AuthError::InvalidToken);
    }

    let signature = URL_SAFE_NO_PAD
        .decode(signature)
        .map_err(|_| AuthError::InvalidToken)?;
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| AuthError::InvalidToken)?;
    mac.update(signing_input.as_bytes());
    mac.verify_slice(&signature)
        .map_err(|_| AuthError::InvalidToken)?;

    let payload = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| AuthError::InvalidToken)?;
    let claims: Claims = serde_json::from_slice(&payload).map_err(|_| AuthError::InvalidToken)?;

    if claims.exp <= now.timestamp() {
        return Err(AuthError::Expired);
    }

    Ok(claims)
}
