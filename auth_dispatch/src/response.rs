//! Response types for the two handler shapes
//!
//! * [`AuthResponse`] is the immutable value returned by app-router style handlers.
//! * [`PageResponse`] is the mutable, written-in-place response of page-router style
//!   handlers. Clones share the same underlying response, and every write goes through one
//!   lock, so writes for a request never interleave.

use std::sync::Arc;

use http::header::{CACHE_CONTROL, CONTENT_TYPE, LOCATION};
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use thiserror::Error;
use tokio::sync::Mutex;

/// Immutable response returned by the app-router shape
pub type AuthResponse = http::Response<String>;

/// Build an empty-bodied response with `status`.
pub fn empty_response(status: StatusCode) -> AuthResponse {
    build_response(status, HeaderMap::new(), String::new())
}

/// Build a redirect to `location` carrying `headers` (e.g. `Set-Cookie`).
pub fn redirect_response(location: &str, headers: HeaderMap) -> AuthResponse {
    let mut response = build_response(StatusCode::FOUND, headers, String::new());
    match HeaderValue::from_str(location) {
        Ok(value) => {
            response.headers_mut().insert(LOCATION, value);
        }
        Err(e) => {
            tracing::error!("Invalid redirect location {:?}: {}", location, e);
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        }
    }
    response
}

/// Build a JSON response that must not be cached.
pub fn json_response(status: StatusCode, body: &serde_json::Value) -> AuthResponse {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    build_response(status, headers, body.to_string())
}

fn build_response(status: StatusCode, headers: HeaderMap, body: String) -> AuthResponse {
    let mut response = http::Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResponseWriteError {
    #[error("response already finished")]
    AlreadyFinished,

    #[error("client disconnected")]
    Closed,
}

#[derive(Debug)]
struct PageResponseInner {
    status: StatusCode,
    headers: HeaderMap,
    body: String,
    finished: bool,
    closed: bool,
}

impl PageResponseInner {
    fn writable(&self) -> Result<(), ResponseWriteError> {
        if self.closed {
            return Err(ResponseWriteError::Closed);
        }
        if self.finished {
            return Err(ResponseWriteError::AlreadyFinished);
        }
        Ok(())
    }
}

/// Mutable response of the page-router shape
#[derive(Debug, Clone)]
pub struct PageResponse {
    inner: Arc<Mutex<PageResponseInner>>,
}

impl Default for PageResponse {
    fn default() -> Self {
        Self::new()
    }
}

impl PageResponse {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(PageResponseInner {
                status: StatusCode::OK,
                headers: HeaderMap::new(),
                body: String::new(),
                finished: false,
                closed: false,
            })),
        }
    }

    pub async fn set_status(&self, status: StatusCode) -> Result<(), ResponseWriteError> {
        let mut inner = self.inner.lock().await;
        inner.writable()?;
        inner.status = status;
        Ok(())
    }

    pub async fn insert_header(
        &self,
        name: HeaderName,
        value: HeaderValue,
    ) -> Result<(), ResponseWriteError> {
        let mut inner = self.inner.lock().await;
        inner.writable()?;
        inner.headers.insert(name, value);
        Ok(())
    }

    /// Append every header of `headers`, keeping repeated names such as `Set-Cookie`.
    pub async fn append_headers(&self, headers: HeaderMap) -> Result<(), ResponseWriteError> {
        let mut inner = self.inner.lock().await;
        inner.writable()?;
        let mut last_name = None;
        for (name, value) in headers {
            if let Some(name) = name {
                last_name = Some(name);
            }
            if let Some(name) = &last_name {
                inner.headers.append(name.clone(), value);
            }
        }
        Ok(())
    }

    pub async fn write(&self, chunk: &str) -> Result<(), ResponseWriteError> {
        let mut inner = self.inner.lock().await;
        inner.writable()?;
        inner.body.push_str(chunk);
        Ok(())
    }

    /// Finish the response. Nothing can be written afterwards.
    pub async fn end(&self) -> Result<(), ResponseWriteError> {
        let mut inner = self.inner.lock().await;
        inner.writable()?;
        inner.finished = true;
        Ok(())
    }

    /// Set the status, write `body` and finish, in one step.
    pub async fn send(&self, status: StatusCode, body: &str) -> Result<(), ResponseWriteError> {
        let mut inner = self.inner.lock().await;
        inner.writable()?;
        inner.status = status;
        inner.body.push_str(body);
        inner.finished = true;
        Ok(())
    }

    /// Copy a complete response into this one and finish it.
    pub async fn send_response(&self, response: AuthResponse) -> Result<(), ResponseWriteError> {
        let (parts, body) = response.into_parts();
        let mut inner = self.inner.lock().await;
        inner.writable()?;
        inner.status = parts.status;
        for (name, value) in parts.headers.iter() {
            inner.headers.append(name.clone(), value.clone());
        }
        inner.body.push_str(&body);
        inner.finished = true;
        Ok(())
    }

    pub async fn is_finished(&self) -> bool {
        self.inner.lock().await.finished
    }

    /// Mark the client as gone; later writes fail with [`ResponseWriteError::Closed`].
    pub async fn close(&self) {
        self.inner.lock().await.closed = true;
    }

    pub async fn is_closed(&self) -> bool {
        self.inner.lock().await.closed
    }

    /// Snapshot of what has been written so far
    pub async fn to_response(&self) -> AuthResponse {
        let inner = self.inner.lock().await;
        build_response(inner.status, inner.headers.clone(), inner.body.clone())
    }
}
