//! Framework-agnostic request passed to every auth route

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use http::{HeaderMap, HeaderName, HeaderValue, Method, Uri};

/// Signals that the client went away before the response was produced
#[derive(Debug, Clone, Default)]
pub struct AbortSignal(Arc<AtomicBool>);

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// An incoming request, read-only once constructed
#[derive(Debug, Clone)]
pub struct AuthRequest {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
    signal: AbortSignal,
}

impl AuthRequest {
    pub fn new(method: Method, uri: Uri, headers: HeaderMap, body: String) -> Self {
        Self {
            method,
            uri,
            headers,
            body,
            signal: AbortSignal::new(),
        }
    }

    pub fn builder() -> AuthRequestBuilder {
        AuthRequestBuilder::default()
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn signal(&self) -> &AbortSignal {
        &self.signal
    }

    /// Attach an abort signal owned by the hosting framework.
    pub fn with_signal(mut self, signal: AbortSignal) -> Self {
        self.signal = signal;
        self
    }

    /// Decoded query string parameters (last value wins)
    pub fn query_params(&self) -> HashMap<String, String> {
        parse_urlencoded(self.uri.query().unwrap_or_default())
    }

    pub fn query_param(&self, name: &str) -> Option<String> {
        self.query_params().remove(name)
    }

    /// Decoded `application/x-www-form-urlencoded` body parameters
    pub fn form_params(&self) -> HashMap<String, String> {
        parse_urlencoded(&self.body)
    }

    pub fn cookie(&self, name: &str) -> Option<String> {
        crate::utils::get_cookie(&self.headers, name)
    }
}

impl From<http::Request<String>> for AuthRequest {
    fn from(req: http::Request<String>) -> Self {
        let (parts, body) = req.into_parts();
        Self::new(parts.method, parts.uri, parts.headers, body)
    }
}

pub(crate) fn parse_urlencoded(input: &str) -> HashMap<String, String> {
    url::form_urlencoded::parse(input.as_bytes())
        .into_owned()
        .collect()
}

#[derive(Debug, Default)]
pub struct AuthRequestBuilder {
    method: Option<Method>,
    uri: Option<Uri>,
    headers: HeaderMap,
    body: String,
}

impl AuthRequestBuilder {
    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Set the request URI. An unparsable URI falls back to `/`.
    pub fn uri(mut self, uri: &str) -> Self {
        self.uri = uri.parse().ok();
        self
    }

    /// Add a header. Invalid values are dropped.
    pub fn header(mut self, name: HeaderName, value: &str) -> Self {
        if let Ok(value) = HeaderValue::from_str(value) {
            self.headers.append(name, value);
        }
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn build(self) -> AuthRequest {
        AuthRequest::new(
            self.method.unwrap_or(Method::GET),
            self.uri.unwrap_or_else(|| Uri::from_static("/")),
            self.headers,
            self.body,
        )
    }
}
