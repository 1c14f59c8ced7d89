use crate::errors::HandlerError;
use crate::request::AbortSignal;
use crate::response::AuthResponse;

/// Collects the single response an app-router handler returns
#[derive(Debug)]
pub struct AppRouterAdapter {
    signal: AbortSignal,
    response: Option<AuthResponse>,
}

impl AppRouterAdapter {
    pub fn new(signal: AbortSignal) -> Self {
        Self {
            signal,
            response: None,
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.signal.is_aborted()
    }

    pub(super) fn is_finished(&self) -> bool {
        self.response.is_some()
    }

    pub(super) fn write(&mut self, response: AuthResponse) -> Result<(), HandlerError> {
        if self.is_aborted() {
            return Err(HandlerError::aborted());
        }
        if self.response.is_some() {
            tracing::warn!(
                "Response already produced, dropping {} response",
                response.status()
            );
            return Ok(());
        }
        self.response = Some(response);
        Ok(())
    }

    pub fn into_response(self) -> Option<AuthResponse> {
        self.response
    }
}
