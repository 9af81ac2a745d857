/// Opaque bearer tokens
///
/// A token handed to a client has the form `{token_id}|{secret}`:
///
/// - `token_id`: UUID of the `access_tokens` row
/// - `secret`: 40 random base62 characters (`[A-Za-z0-9]`)
///
/// Only the hex SHA-256 of the secret is stored. Authentication looks the
/// row up by id and compares hashes in constant time, so a leaked database
/// does not yield usable tokens.
///
/// # Example
///
/// ```
/// use taskhub_shared::auth::token::{format_token, generate_secret, hash_secret, parse_token, verify_secret};
/// use uuid::Uuid;
///
/// let id = Uuid::new_v4();
/// let secret = generate_secret();
/// let stored = hash_secret(&secret);
///
/// let bearer = format_token(id, &secret);
/// let (parsed_id, parsed_secret) = parse_token(&bearer).unwrap();
/// assert_eq!(parsed_id, id);
/// assert!(verify_secret(parsed_secret, &stored));
/// ```

use rand::Rng;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Length of the random secret (characters)
pub const SECRET_LENGTH: usize = 40;

const SEPARATOR: char = '|';

/// Generates a random base62 secret
pub fn generate_secret() -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();

    (0..SECRET_LENGTH)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}

/// Hex SHA-256 of a secret (64 characters)
pub fn hash_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Builds the client-facing token string
pub fn format_token(id: Uuid, secret: &str) -> String {
    format!("{}{}{}", id, SEPARATOR, secret)
}

/// Splits a client token into row id and secret
///
/// Returns `None` for anything not shaped like `{uuid}|{base62 secret}`.
pub fn parse_token(token: &str) -> Option<(Uuid, &str)> {
    let (id, secret) = token.split_once(SEPARATOR)?;
    let id = Uuid::parse_str(id).ok()?;

    if secret.len() != SECRET_LENGTH || !secret.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some((id, secret))
}

/// Checks a presented secret against a stored hash
pub fn verify_secret(secret: &str, stored_hash: &str) -> bool {
    constant_time_compare(&hash_secret(secret), stored_hash)
}

/// Compares two strings without short-circuiting on the first difference
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}
