use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum OidcError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Token exchange error: {0}")]
    TokenExchange(String),

    #[error("Id token error: {0}")]
    IdToken(String),

    #[error("Logout token error: {0}")]
    LogoutToken(String),

    #[error("Fetch user info error: {0}")]
    Userinfo(String),
}
