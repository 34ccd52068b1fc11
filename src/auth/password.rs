use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;

use super::AuthError;

const SALT_LEN: usize = 16;
const KEY_LEN: usize = 32;
const MIN_PASSWORD_LEN: usize = 8;
/// PBKDF2-HMAC-SHA256 work factor for new hashes.
pub const DEFAULT_ROUNDS: u32 = 600_000;
const MIN_ROUNDS: u32 = 1_000;

/// Hashes `password` under a fresh random salt.
///
/// The stored form is `rounds$base64(salt)$base64(pbkdf2_sha256(password, salt, rounds))`.
/// Hashes stored with another round count still verify.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::WeakPassword(MIN_PASSWORD_LEN));
    }

    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);

    let key = derive_key(password, &salt, DEFAULT_ROUNDS);
    Ok(format!(
        "{}${}${}",
        DEFAULT_ROUNDS,
        STANDARD_NO_PAD.encode(salt),
        STANDARD_NO_PAD.encode(key)
    ))
}

/// Checks `password` against a hash produced by [`hash_password`] in constant time.
pub fn verify_password(password: &str, stored: &str) -> Result<bool, AuthError> {
    let mut parts = stored.splitn(3, '$');
    let (Some(rounds), Some(salt), Some(key)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(AuthError::MalformedHash);
    };
    let rounds: u32 = rounds.parse().map_err(|_| AuthError::MalformedHash)?;
    if rounds < MIN_ROUNDS {
        return Err(AuthError::MalformedHash);
    }
    let salt = STANDARD_NO_PAD
        .decode(salt)
        .map_err(|_| AuthError::MalformedHash)?;
    let expected = STANDARD_NO_PAD
        .decode(key)
        .map_err(|_| AuthError::MalformedHash)?;
    if expected.len() != KEY_LEN {
        return Err(AuthError::MalformedHash);
    }

    let actual = derive_key(password, &salt, rounds);
    let difference = actual
        .iter()
        .zip(&expected)
        .fold(0u8, |acc, (a, b)| acc | (a ^ b));
    Ok(difference == 0)
}

fn derive_key(password: &str, salt: &[u8], rounds: u32) -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, rounds, &mut key);
    key
}
