//! OAuth2/OIDC client boundary
//!
//! The callback core never talks to the identity provider directly. It goes through
//! [`OAuthClient`], which performs the code exchange and validates the tokens. [`OidcClient`]
//! is the default implementation, backed by `reqwest` and `jsonwebtoken`.

mod client;
mod errors;
mod types;

pub use client::{OAuthClient, OidcClient};
pub use errors::OidcError;
pub use types::{Claims, LogoutTokenClaims, TokenRequest, TokenSet};
