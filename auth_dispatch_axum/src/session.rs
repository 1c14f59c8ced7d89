use std::ops::Deref;
use std::sync::Arc;

use auth_dispatch::{Auth, AuthRequest, Session};
use axum::{
    RequestPartsExt,
    extract::{FromRef, FromRequestParts, OptionalFromRequestParts},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::{TypedHeader, headers};
use http::{Method, StatusCode, request::Parts};

use super::config::AUTH_REDIRECT_ANON;

/// Rejection of [`AuthSession`]: GET requests are redirected, everything else gets a 401
pub struct AuthRedirect {
    method: Method,
}

impl AuthRedirect {
    fn new(method: Method) -> Self {
        Self { method }
    }

    fn into_response_with_method(self) -> Response {
        if self.method == Method::GET {
            tracing::debug!("Redirecting to {}", AUTH_REDIRECT_ANON.as_str());
            Redirect::temporary(AUTH_REDIRECT_ANON.as_str()).into_response()
        } else {
            tracing::debug!("Unauthorized");
            (StatusCode::UNAUTHORIZED, "Unauthorized").into_response()
        }
    }
}

impl IntoResponse for AuthRedirect {
    fn into_response(self) -> Response {
        self.into_response_with_method()
    }
}

/// The logged-in user's session, available as an Axum extractor
///
/// The application state must provide the shared [`Auth`] through `FromRef`.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
///
/// use auth_dispatch::Auth;
/// use auth_dispatch_axum::AuthSession;
/// use axum::{Router, routing::get};
///
/// async fn protected_handler(session: AuthSession) -> String {
///     format!("Hello, {}!", session.sub().unwrap_or("stranger"))
/// }
///
/// fn app(auth: Arc<Auth>) -> Router {
///     Router::new()
///         .route("/protected", get(protected_handler))
///         .with_state(auth)
/// }
/// ```
#[derive(Clone, Debug)]
pub struct AuthSession(pub Session);

impl Deref for AuthSession {
    type Target = Session;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S> FromRequestParts<S> for AuthSession
where
    Arc<Auth>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthRedirect;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = Arc::<Auth>::from_ref(state);
        let method = parts.method.clone();
        let req = AuthRequest::new(
            parts.method.clone(),
            parts.uri.clone(),
            parts.headers.clone(),
            String::new(),
        );

        let config = auth
            .config(&req)
            .map_err(|_| AuthRedirect::new(method.clone()))?;

        let cookies: TypedHeader<headers::Cookie> = parts.extract().await.map_err(|_| {
            tracing::debug!("No cookies on request");
            AuthRedirect::new(method.clone())
        })?;
        if cookies.get(&config.session_cookie_name).is_none() {
            tracing::debug!("No session cookie: {}", config.session_cookie_name);
            return Err(AuthRedirect::new(method));
        }

        match auth.load_session(&config, &req).await {
            Ok(Some(session)) => Ok(AuthSession(session)),
            Ok(None) => {
                tracing::debug!("Session cookie does not name a live session");
                Err(AuthRedirect::new(method))
            }
            Err(e) => {
                tracing::error!("Failed to load session: {}", e);
                Err(AuthRedirect::new(method))
            }
        }
    }
}

impl<S> OptionalFromRequestParts<S> for AuthSession
where
    Arc<Auth>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthRedirect;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        let result: Result<Self, Self::Rejection> =
            <AuthSession as FromRequestParts<S>>::from_request_parts(parts, state).await;
        Ok(result.ok())
    }
}
