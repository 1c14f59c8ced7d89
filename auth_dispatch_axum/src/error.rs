use auth_dispatch::{HookError, StatusError};
use http::StatusCode;

/// Helper trait for converting errors to a standard response error format
pub trait IntoResponseError<T> {
    fn into_response_error(self) -> Result<T, (StatusCode, String)>;
}

/// Errors escaping an `on_error` hook
///
/// A [`StatusError`] keeps its status and message; anything else is a 500.
impl<T> IntoResponseError<T> for Result<T, HookError> {
    fn into_response_error(self) -> Result<T, (StatusCode, String)> {
        self.map_err(|e| match e.downcast_ref::<StatusError>() {
            Some(status_error) => (status_error.status, status_error.message.clone()),
            None => {
                tracing::error!("Error hook failed: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
        })
    }
}
