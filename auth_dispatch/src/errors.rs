//! Error types shared by every auth route

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use http::StatusCode;
use thiserror::Error;

use crate::oidc::OidcError;
use crate::session::SessionError;
use crate::utils::UtilError;

/// Error type returned by user hooks (`after_callback`, `on_error`, dynamic options)
pub type HookError = Box<dyn StdError + Send + Sync + 'static>;

/// Symbolic kind of a [`HandlerError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Missing or invalid static configuration
    Configuration,
    /// State/nonce mismatch, missing code or state, provider-reported denial
    Callback,
    /// Network or provider failure while exchanging the code
    TokenExchange,
    /// The after-callback hook failed or returned an invalid shape
    AfterCallback,
    RouteNotFound,
    MethodNotAllowed,
    Login,
    Logout,
    Profile,
    BackchannelLogout,
    /// The client went away before a response could be produced
    RequestAborted,
    /// A session or login transaction store failed
    Session,
}

impl ErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration => "configuration_error",
            Self::Callback => "callback_error",
            Self::TokenExchange => "token_exchange_error",
            Self::AfterCallback => "after_callback_error",
            Self::RouteNotFound => "route_not_found",
            Self::MethodNotAllowed => "method_not_allowed",
            Self::Login => "login_error",
            Self::Logout => "logout_error",
            Self::Profile => "profile_error",
            Self::BackchannelLogout => "backchannel_logout_error",
            Self::RequestAborted => "request_aborted",
            Self::Session => "session_error",
        }
    }

    /// Default HTTP status for the kind
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Callback | Self::BackchannelLogout => StatusCode::BAD_REQUEST,
            Self::RouteNotFound => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            // nginx's "client closed request"
            Self::RequestAborted => {
                StatusCode::from_u16(499).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            Self::Configuration
            | Self::TokenExchange
            | Self::AfterCallback
            | Self::Login
            | Self::Logout
            | Self::Profile
            | Self::Session => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A classified failure of an auth route
///
/// Constructed once where the failure happens and never mutated afterwards. The router hands
/// it to the `on_error` hook or renders it as an empty body with [`HandlerError::status`].
#[derive(Debug, Clone)]
pub struct HandlerError {
    kind: ErrorKind,
    status: StatusCode,
    message: String,
    cause: Option<Arc<dyn StdError + Send + Sync + 'static>>,
}

impl HandlerError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: kind.status(),
            message: message.into(),
            cause: None,
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    pub fn callback(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Callback, message)
    }

    pub fn token_exchange(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TokenExchange, message)
    }

    pub fn after_callback(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AfterCallback, message)
    }

    pub fn route_not_found(segment: &str) -> Self {
        Self::new(
            ErrorKind::RouteNotFound,
            format!("Unknown auth route: {segment}"),
        )
    }

    pub fn method_not_allowed(method: &http::Method, segment: &str) -> Self {
        Self::new(
            ErrorKind::MethodNotAllowed,
            format!("Method {method} is not allowed on {segment}"),
        )
    }

    pub fn aborted() -> Self {
        Self::new(ErrorKind::RequestAborted, "Request aborted by the client")
    }

    /// Wrap an error raised by the after-callback hook.
    ///
    /// A [`StatusError`] keeps its own status; anything else becomes a 500.
    pub fn from_hook(err: HookError) -> Self {
        let status = err
            .downcast_ref::<StatusError>()
            .map(|e| e.status)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self {
            kind: ErrorKind::AfterCallback,
            status,
            message: err.to_string(),
            cause: Some(Arc::from(err)),
        }
    }

    /// Attach the original failing condition.
    pub fn with_cause<E>(mut self, cause: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.cause = Some(Arc::new(cause));
        self
    }

    /// Override the HTTP status.
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn cause(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.cause.as_deref()
    }

    /// Log the error and return self
    pub fn log(self) -> Self {
        if self.status.is_server_error() {
            tracing::error!(code = self.code(), status = %self.status, "{}", self.message);
        } else {
            tracing::debug!(code = self.code(), status = %self.status, "{}", self.message);
        }
        self
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.kind, self.status.as_u16(), self.message)
    }
}

impl StdError for HandlerError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause
            .as_deref()
            .map(|e| e as &(dyn StdError + 'static))
    }
}

/// An error carrying its own HTTP status, for hooks that want to customize the response
///
/// ```
/// use auth_dispatch::StatusError;
/// use http::StatusCode;
///
/// let err = StatusError::new(StatusCode::FORBIDDEN, "user is not allowed");
/// assert_eq!(err.status, StatusCode::FORBIDDEN);
/// ```
#[derive(Debug, Error, Clone)]
#[error("{message}")]
pub struct StatusError {
    pub status: StatusCode,
    pub message: String,
}

impl StatusError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

// Conversions from the lower level errors log as they classify, like the rest of the crate

impl From<OidcError> for HandlerError {
    fn from(err: OidcError) -> Self {
        let kind = match &err {
            OidcError::TokenExchange(_) | OidcError::Userinfo(_) => ErrorKind::TokenExchange,
            OidcError::Configuration(_) => ErrorKind::Configuration,
            _ => ErrorKind::Callback,
        };
        let error = Self::new(kind, err.to_string()).with_cause(err);
        tracing::error!("{}", error);
        error
    }
}

impl From<SessionError> for HandlerError {
    fn from(err: SessionError) -> Self {
        let error = Self::new(ErrorKind::Session, format!("Session error: {err}"))
            .with_cause(err);
        tracing::error!("{}", error);
        error
    }
}

impl From<UtilError> for HandlerError {
    fn from(err: UtilError) -> Self {
        let error =
            Self::new(ErrorKind::Configuration, format!("Utils error: {err}")).with_cause(err);
        tracing::error!("{}", error);
        error
    }
}
