use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, TimeDelta, Utc};
use headers::{Cookie, HeaderMapExt};
use http::header::{HeaderMap, SET_COOKIE};
use ring::rand::SecureRandom;
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum UtilError {
    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Cookie error: {0}")]
    Cookie(String),

    #[error("Max age out of range: {0} seconds")]
    MaxAge(u64),
}

pub(crate) fn base64url_encode(input: impl AsRef<[u8]>) -> String {
    URL_SAFE_NO_PAD.encode(input)
}

/// Generate `len` random bytes and return them base64url encoded.
pub fn gen_random_string(len: usize) -> Result<String, UtilError> {
    let rng = ring::rand::SystemRandom::new();
    let mut bytes = vec![0u8; len];
    rng.fill(&mut bytes)
        .map_err(|_| UtilError::Crypto("Failed to generate random string".to_string()))?;
    Ok(base64url_encode(bytes))
}

/// S256 code challenge for a PKCE verifier
pub(crate) fn pkce_challenge(verifier: &str) -> String {
    base64url_encode(Sha256::digest(verifier.as_bytes()))
}

/// The instant `max_age` seconds from now
pub(crate) fn expiry_after(max_age: u64) -> Result<DateTime<Utc>, UtilError> {
    i64::try_from(max_age)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .and_then(|delta| Utc::now().checked_add_signed(delta))
        .ok_or(UtilError::MaxAge(max_age))
}

/// Append a `Set-Cookie` header.
///
/// A negative `max_age` expires the cookie immediately.
pub(crate) fn header_set_cookie(
    headers: &mut HeaderMap,
    name: &str,
    value: &str,
    same_site: &str,
    max_age: i64,
) -> Result<(), UtilError> {
    let cookie =
        format!("{name}={value}; SameSite={same_site}; Secure; HttpOnly; Path=/; Max-Age={max_age}");
    headers.append(
        SET_COOKIE,
        cookie
            .parse()
            .map_err(|_| UtilError::Cookie("Failed to parse cookie".to_string()))?,
    );
    Ok(())
}

/// Append a `Set-Cookie` header that removes `name` from the browser.
pub(crate) fn header_clear_cookie(headers: &mut HeaderMap, name: &str) -> Result<(), UtilError> {
    header_set_cookie(headers, name, "", "Lax", -86400)
}

/// Look up a cookie value by name in the request's `Cookie` headers.
pub(crate) fn get_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .typed_get::<Cookie>()
        .and_then(|cookies| cookies.get(name).map(String::from))
}
