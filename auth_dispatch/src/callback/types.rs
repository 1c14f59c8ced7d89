use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::errors::HookError;
use crate::options::BoxFuture;
use crate::request::AuthRequest;
use crate::response::{AuthResponse, PageResponse};
use crate::session::Session;
use crate::transaction::CallbackState;

/// The request as handed to user hooks, in the caller's handler shape
#[derive(Debug, Clone)]
pub enum HookRequest {
    /// Page-router shape: the hook may write to `response` and return
    /// [`AfterCallbackResult::Handled`].
    Page {
        request: AuthRequest,
        response: PageResponse,
    },
    /// App-router shape: the hook may return a complete [`AuthResponse`].
    App { request: AuthRequest },
}

impl HookRequest {
    pub fn request(&self) -> &AuthRequest {
        match self {
            Self::Page { request, .. } | Self::App { request } => request,
        }
    }

    pub fn page_response(&self) -> Option<&PageResponse> {
        match self {
            Self::Page { response, .. } => Some(response),
            Self::App { .. } => None,
        }
    }

    pub fn is_page(&self) -> bool {
        matches!(self, Self::Page { .. })
    }
}

/// What the after-callback hook decided
#[derive(Debug)]
pub enum AfterCallbackResult {
    /// Persist this session (the input session, or a replacement) verbatim.
    Session(Session),
    /// App-router shape only: send this response instead, no session is persisted.
    Response(AuthResponse),
    /// Page-router shape only: the hook already finished the page response.
    Handled,
}

/// Hook run after the callback verified the user but before the session is persisted
pub type AfterCallback = Arc<
    dyn Fn(HookRequest, Session, CallbackState) -> BoxFuture<'static, Result<AfterCallbackResult, HookError>>
        + Send
        + Sync,
>;

/// Wrap an async function as an [`AfterCallback`].
///
/// ```
/// use auth_dispatch::{AfterCallbackResult, after_callback};
///
/// let hook = after_callback(|_req, mut session, _state| async move {
///     session.user.remove("email");
///     Ok(AfterCallbackResult::Session(session))
/// });
/// # let _ = hook;
/// ```
pub fn after_callback<F, Fut>(f: F) -> AfterCallback
where
    F: Fn(HookRequest, Session, CallbackState) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<AfterCallbackResult, HookError>> + Send + 'static,
{
    Arc::new(
        move |req: HookRequest,
              session: Session,
              state: CallbackState|
              -> BoxFuture<'static, Result<AfterCallbackResult, HookError>> {
            Box::pin(f(req, session, state))
        },
    )
}

/// Options of the callback route
#[derive(Clone, Default)]
pub struct CallbackOptions {
    pub after_callback: Option<AfterCallback>,
    /// Overrides the `redirect_uri` recorded by the login
    pub redirect_uri: Option<String>,
    /// Organization (`org_...` id or name) the user must belong to
    pub organization: Option<String>,
    /// Extra parameters forwarded to the token endpoint
    pub authorization_params: BTreeMap<String, String>,
}

impl CallbackOptions {
    pub fn with_after_callback(mut self, hook: AfterCallback) -> Self {
        self.after_callback = Some(hook);
        self
    }
}

impl fmt::Debug for CallbackOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackOptions")
            .field("after_callback", &self.after_callback.as_ref().map(|_| ".."))
            .field("redirect_uri", &self.redirect_uri)
            .field("organization", &self.organization)
            .field("authorization_params", &self.authorization_params)
            .finish()
    }
}
