//! Dispatches the auth route segments to their handlers

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use http::{Method, StatusCode};

use crate::Auth;
use crate::adapter::{AppRouterAdapter, PageRouterAdapter, ResponseAdapter};
use crate::callback::{CallbackOptions, HookRequest, handle_callback};
use crate::config::AppConfig;
use crate::errors::{ErrorKind, HandlerError, HookError};
use crate::handlers::{
    LoginOptions, LogoutOptions, ProfileOptions, handle_backchannel_logout, handle_login,
    handle_logout, handle_profile,
};
use crate::options::BoxFuture;
use crate::request::AuthRequest;
use crate::response::{AuthResponse, PageResponse, empty_response};

/// A single auth route
///
/// The route writes its result through `adapter` and returns an error for anything it could
/// not complete; the router renders that error. `config` is resolved once per request by the
/// router.
#[async_trait]
pub trait AuthRoute: Send + Sync {
    async fn handle(
        &self,
        auth: &Auth,
        config: &AppConfig,
        req: &AuthRequest,
        adapter: &mut ResponseAdapter,
    ) -> Result<(), HandlerError>;
}

/// Hook turning a route failure into a response
///
/// `Ok(None)` keeps the default rendering (unless a page response was already finished).
/// An `Err` is returned to the caller of the [`AuthHandler`].
pub type OnError = Arc<
    dyn Fn(HookRequest, HandlerError) -> BoxFuture<'static, Result<Option<AuthResponse>, HookError>>
        + Send
        + Sync,
>;

/// Wrap an async function as an [`OnError`] hook.
pub fn on_error<F, Fut>(f: F) -> OnError
where
    F: Fn(HookRequest, HandlerError) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Option<AuthResponse>, HookError>> + Send + 'static,
{
    Arc::new(
        move |req: HookRequest,
              err: HandlerError|
              -> BoxFuture<'static, Result<Option<AuthResponse>, HookError>> {
            Box::pin(f(req, err))
        },
    )
}

/// Route overrides for [`handle_auth`]; anything left unset uses the built-in route.
#[derive(Clone, Default)]
pub struct Handlers {
    login: Option<Arc<dyn AuthRoute>>,
    logout: Option<Arc<dyn AuthRoute>>,
    callback: Option<Arc<dyn AuthRoute>>,
    profile: Option<Arc<dyn AuthRoute>>,
    backchannel_logout: Option<Arc<dyn AuthRoute>>,
    on_error: Option<OnError>,
}

impl Handlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn login(mut self, route: impl AuthRoute + 'static) -> Self {
        self.login = Some(Arc::new(route));
        self
    }

    pub fn logout(mut self, route: impl AuthRoute + 'static) -> Self {
        self.logout = Some(Arc::new(route));
        self
    }

    pub fn callback(mut self, route: impl AuthRoute + 'static) -> Self {
        self.callback = Some(Arc::new(route));
        self
    }

    pub fn profile(mut self, route: impl AuthRoute + 'static) -> Self {
        self.profile = Some(Arc::new(route));
        self
    }

    pub fn backchannel_logout(mut self, route: impl AuthRoute + 'static) -> Self {
        self.backchannel_logout = Some(Arc::new(route));
        self
    }

    pub fn on_error(mut self, hook: OnError) -> Self {
        self.on_error = Some(hook);
        self
    }
}

const GET: &[Method] = &[Method::GET];
const GET_POST: &[Method] = &[Method::GET, Method::POST];
const POST: &[Method] = &[Method::POST];

struct RouteTable {
    login: Arc<dyn AuthRoute>,
    logout: Arc<dyn AuthRoute>,
    callback: Arc<dyn AuthRoute>,
    profile: Arc<dyn AuthRoute>,
    backchannel_logout: Arc<dyn AuthRoute>,
    on_error: Option<OnError>,
}

impl RouteTable {
    fn new(handlers: Handlers) -> Self {
        Self {
            login: handlers
                .login
                .unwrap_or_else(|| Arc::new(handle_login(LoginOptions::default()))),
            logout: handlers
                .logout
                .unwrap_or_else(|| Arc::new(handle_logout(LogoutOptions::default()))),
            callback: handlers
                .callback
                .unwrap_or_else(|| Arc::new(handle_callback(CallbackOptions::default()))),
            profile: handlers
                .profile
                .unwrap_or_else(|| Arc::new(handle_profile(ProfileOptions::default()))),
            backchannel_logout: handlers
                .backchannel_logout
                .unwrap_or_else(|| Arc::new(handle_backchannel_logout())),
            on_error: handlers.on_error,
        }
    }

    fn route(&self, segment: &str) -> Option<(&Arc<dyn AuthRoute>, &'static [Method])> {
        match segment {
            "login" => Some((&self.login, GET)),
            "callback" => Some((&self.callback, GET_POST)),
            "logout" => Some((&self.logout, GET_POST)),
            "me" => Some((&self.profile, GET)),
            "backchannel-logout" => Some((&self.backchannel_logout, POST)),
            _ => None,
        }
    }
}

/// Build the dispatcher for the auth routes.
///
/// Each call builds its own route table; nothing is registered globally.
pub fn handle_auth(auth: Arc<Auth>, handlers: Handlers) -> AuthHandler {
    AuthHandler {
        auth,
        routes: Arc::new(RouteTable::new(handlers)),
    }
}

/// Entry point for the auth routes in either handler shape
#[derive(Clone)]
pub struct AuthHandler {
    auth: Arc<Auth>,
    routes: Arc<RouteTable>,
}

impl AuthHandler {
    pub fn auth(&self) -> &Arc<Auth> {
        &self.auth
    }

    /// Handle `req` in the app-router shape and return the response.
    pub async fn app(&self, req: AuthRequest) -> Result<AuthResponse, HookError> {
        let mut adapter = ResponseAdapter::App(AppRouterAdapter::new(req.signal().clone()));
        self.run(&req, &mut adapter).await?;

        Ok(adapter.into_app_response().unwrap_or_else(|| {
            if req.signal().is_aborted() {
                empty_response(ErrorKind::RequestAborted.status())
            } else {
                tracing::warn!("Auth route {} produced no response", req.path());
                empty_response(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }))
    }

    /// Handle `req` in the page-router shape by writing into `res`.
    pub async fn page(&self, req: AuthRequest, res: PageResponse) -> Result<(), HookError> {
        let mut adapter = ResponseAdapter::Page(PageRouterAdapter::new(res));
        self.run(&req, &mut adapter).await
    }

    async fn run(&self, req: &AuthRequest, adapter: &mut ResponseAdapter) -> Result<(), HookError> {
        match self.dispatch(req, adapter).await {
            Ok(()) => Ok(()),
            Err(err) => self.render_error(req, adapter, err).await,
        }
    }

    async fn dispatch(
        &self,
        req: &AuthRequest,
        adapter: &mut ResponseAdapter,
    ) -> Result<(), HandlerError> {
        let config = self.auth.config(req)?;
        let segment = route_segment(req.path(), &config.route_prefix);

        let (route, methods) = self
            .routes
            .route(segment)
            .ok_or_else(|| HandlerError::route_not_found(segment))?;
        if !methods.contains(req.method()) {
            return Err(HandlerError::method_not_allowed(req.method(), segment));
        }

        tracing::debug!("Dispatching {} {} to '{}'", req.method(), req.path(), segment);
        route.handle(&self.auth, &config, req, adapter).await
    }

    async fn render_error(
        &self,
        req: &AuthRequest,
        adapter: &mut ResponseAdapter,
        err: HandlerError,
    ) -> Result<(), HookError> {
        tracing::debug!("Auth route {} failed: {}", req.path(), err);

        if let Some(on_error) = &self.routes.on_error {
            if let Some(response) = on_error(adapter.hook_request(req), err.clone()).await? {
                if let Err(e) = adapter.finalize_with_response(response).await {
                    tracing::debug!("onError response not sent: {}", e);
                }
                return Ok(());
            }
            if adapter.is_finished().await {
                return Ok(());
            }
        }

        if let Err(e) = adapter.finalize_with_error(&err).await {
            tracing::debug!("Error response not sent: {}", e);
        }
        Ok(())
    }
}

/// The single path segment after `prefix`, or the whole trimmed path when the prefix was
/// already stripped by the hosting router.
fn route_segment<'a>(path: &'a str, prefix: &str) -> &'a str {
    let prefix = prefix.trim_end_matches('/');
    let rest = if prefix.is_empty() {
        path
    } else {
        match path.strip_prefix(prefix) {
            Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
            _ => path,
        }
    };
    rest.trim_matches('/')
}
