use crate::response::{AuthResponse, PageResponse, ResponseWriteError};

/// Writes into a shared, mutable [`PageResponse`]
#[derive(Debug, Clone)]
pub struct PageRouterAdapter {
    response: PageResponse,
}

impl PageRouterAdapter {
    pub fn new(response: PageResponse) -> Self {
        Self { response }
    }

    pub fn response(&self) -> &PageResponse {
        &self.response
    }

    pub(super) async fn is_finished(&self) -> bool {
        self.response.is_finished().await
    }

    /// Send `response`. A write the page can no longer take is logged and dropped.
    pub(super) async fn write(&self, response: AuthResponse) {
        let status = response.status();
        match self.response.send_response(response).await {
            Ok(()) => {}
            Err(ResponseWriteError::Closed) => {
                tracing::warn!("Client disconnected, dropping {} response", status);
            }
            Err(ResponseWriteError::AlreadyFinished) => {
                tracing::warn!("Response already finished, dropping {} response", status);
            }
        }
    }
}
