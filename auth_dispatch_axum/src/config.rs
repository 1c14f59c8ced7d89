//! Settings of the axum integration

use std::sync::LazyLock;

/// Where a GET request without a valid session is sent
/// Default: "/"
pub static AUTH_REDIRECT_ANON: LazyLock<String> =
    LazyLock::new(|| std::env::var("AUTH_REDIRECT_ANON").unwrap_or_else(|_| "/".to_string()));

/// Largest request body the auth routes read, in bytes
/// Default: 65536
pub static AUTH_MAX_BODY_BYTES: LazyLock<usize> = LazyLock::new(|| {
    std::env::var("AUTH_MAX_BODY_BYTES")
        .ok()
        .and_then(|val| val.parse().ok())
        .unwrap_or(64 * 1024)
});
