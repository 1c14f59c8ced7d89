//! Emits route results in the caller's handler shape
//!
//! Routes compute what to send once and hand it to a [`ResponseAdapter`]; only the
//! mechanism that delivers it differs between the page-router and app-router shapes.

mod app;
mod page;

pub use app::AppRouterAdapter;
pub use page::PageRouterAdapter;

use http::HeaderMap;

use crate::callback::HookRequest;
use crate::errors::HandlerError;
use crate::request::AuthRequest;
use crate::response::{AuthResponse, empty_response, redirect_response};

#[derive(Debug)]
pub enum ResponseAdapter {
    Page(PageRouterAdapter),
    App(AppRouterAdapter),
}

impl ResponseAdapter {
    /// Redirect after a session has been persisted, emitting the store's cookie headers.
    pub async fn finalize_with_session(
        &mut self,
        session_headers: HeaderMap,
        location: &str,
    ) -> Result<(), HandlerError> {
        tracing::debug!("Session established, redirecting to {}", location);
        self.write(redirect_response(location, session_headers)).await
    }

    pub async fn finalize_with_redirect(
        &mut self,
        location: &str,
        headers: HeaderMap,
    ) -> Result<(), HandlerError> {
        self.write(redirect_response(location, headers)).await
    }

    /// Render `err` as an empty body carrying its status.
    pub async fn finalize_with_error(&mut self, err: &HandlerError) -> Result<(), HandlerError> {
        self.write(empty_response(err.status())).await
    }

    pub async fn finalize_with_response(
        &mut self,
        response: AuthResponse,
    ) -> Result<(), HandlerError> {
        self.write(response).await
    }

    async fn write(&mut self, response: AuthResponse) -> Result<(), HandlerError> {
        match self {
            Self::Page(page) => {
                page.write(response).await;
                Ok(())
            }
            Self::App(app) => app.write(response),
        }
    }

    /// Whether a final response has already been produced.
    pub async fn is_finished(&self) -> bool {
        match self {
            Self::Page(page) => page.is_finished().await,
            Self::App(app) => app.is_finished(),
        }
    }

    /// True only for an app-router request whose client went away.
    ///
    /// Page-router responses keep going and drop their writes instead.
    pub fn write_aborted(&self) -> bool {
        match self {
            Self::Page(_) => false,
            Self::App(app) => app.is_aborted(),
        }
    }

    /// The request in the shape hooks receive
    pub fn hook_request(&self, req: &AuthRequest) -> HookRequest {
        match self {
            Self::Page(page) => HookRequest::Page {
                request: req.clone(),
                response: page.response().clone(),
            },
            Self::App(_) => HookRequest::App {
                request: req.clone(),
            },
        }
    }

    pub fn is_page(&self) -> bool {
        matches!(self, Self::Page(_))
    }

    /// The response an app-router adapter accumulated
    pub fn into_app_response(self) -> Option<AuthResponse> {
        match self {
            Self::Page(_) => None,
            Self::App(app) => app.into_response(),
        }
    }
}
