//! Router serving every authentication endpoint

use auth_dispatch::{AbortSignal, AuthHandler, AuthRequest};
use axum::{
    Router,
    body::{Body, to_bytes},
    extract::{OriginalUri, Request, State},
    response::Response,
    routing::any,
};
use http::StatusCode;
use tower_http::LatencyUnit;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;

use super::config::AUTH_MAX_BODY_BYTES;
use super::error::IntoResponseError;

/// Create a router for all authentication endpoints
///
/// Mount it under the configured route prefix:
///
/// ```no_run
/// use std::sync::Arc;
///
/// use auth_dispatch::{AppConfig, Auth, Handlers, OidcClient, handle_auth};
/// use auth_dispatch_axum::{AUTH_ROUTE_PREFIX, auth_router};
/// use axum::Router;
///
/// let config = AppConfig::from_env().unwrap();
/// let client = OidcClient::with_hs256_secret(b"client-secret").unwrap();
/// let handler = handle_auth(Arc::new(Auth::new(config, client)), Handlers::new());
///
/// let app: Router = Router::new().nest(AUTH_ROUTE_PREFIX.as_str(), auth_router(handler));
/// ```
///
/// The endpoints will then be available at:
/// - {AUTH_ROUTE_PREFIX}/login
/// - {AUTH_ROUTE_PREFIX}/callback
/// - {AUTH_ROUTE_PREFIX}/logout
/// - {AUTH_ROUTE_PREFIX}/me
/// - {AUTH_ROUTE_PREFIX}/backchannel-logout
pub fn auth_router(handler: AuthHandler) -> Router {
    auth_router_no_trace(handler).layer(
        TraceLayer::new_for_http()
            .make_span_with(
                DefaultMakeSpan::new()
                    .level(Level::INFO)
                    .include_headers(true),
            )
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(
                DefaultOnResponse::new()
                    .level(Level::INFO)
                    .latency_unit(LatencyUnit::Millis),
            ),
    )
}

/// Create the authentication router without HTTP tracing
///
/// This is the same as `auth_router()` but without the HTTP tracing middleware.
/// Use this if you want to add your own tracing middleware.
pub fn auth_router_no_trace(handler: AuthHandler) -> Router {
    Router::new()
        .route("/{*segment}", any(dispatch))
        .with_state(handler)
}

async fn dispatch(
    State(handler): State<AuthHandler>,
    req: Request,
) -> Result<Response, (StatusCode, String)> {
    let signal = AbortSignal::new();
    let guard = DisconnectGuard(Some(signal.clone()));

    let auth_req = into_auth_request(req).await?.with_signal(signal);
    let response = handler.app(auth_req).await.into_response_error();

    guard.disarm();
    Ok(response?.map(Body::from))
}

async fn into_auth_request(req: Request) -> Result<AuthRequest, (StatusCode, String)> {
    let (parts, body) = req.into_parts();

    let bytes = to_bytes(body, *AUTH_MAX_BODY_BYTES).await.map_err(|e| {
        tracing::warn!("Failed to read request body: {}", e);
        (
            StatusCode::BAD_REQUEST,
            "Failed to read request body".to_string(),
        )
    })?;
    let body = String::from_utf8(bytes.to_vec()).map_err(|_| {
        tracing::warn!("Request body is not valid UTF-8");
        (
            StatusCode::BAD_REQUEST,
            "Request body is not valid UTF-8".to_string(),
        )
    })?;

    // Nested routers see the path with the mount point stripped
    let uri = parts
        .extensions
        .get::<OriginalUri>()
        .map(|OriginalUri(uri)| uri.clone())
        .unwrap_or(parts.uri);

    Ok(AuthRequest::new(parts.method, uri, parts.headers, body))
}

/// Aborts the request's signal if the handler future is dropped before completing,
/// which hyper does when the client disconnects.
struct DisconnectGuard(Option<AbortSignal>);

impl DisconnectGuard {
    fn disarm(mut self) {
        self.0 = None;
    }
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        if let Some(signal) = self.0.take() {
            tracing::debug!("Client disconnected before the auth route finished");
            signal.abort();
        }
    }
}
