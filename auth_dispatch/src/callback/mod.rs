//! The authorization-code callback route

mod types;
mod verifier;

pub use types::{AfterCallback, AfterCallbackResult, CallbackOptions, HookRequest, after_callback};
pub use verifier::verify_callback;

use async_trait::async_trait;

use crate::Auth;
use crate::adapter::ResponseAdapter;
use crate::config::AppConfig;
use crate::errors::HandlerError;
use crate::options::HandlerOptions;
use crate::request::AuthRequest;
use crate::router::AuthRoute;

/// Default callback route
pub struct CallbackRoute {
    options: HandlerOptions<CallbackOptions>,
}

/// Build the callback route from static or request-derived options.
pub fn handle_callback(options: impl Into<HandlerOptions<CallbackOptions>>) -> CallbackRoute {
    CallbackRoute {
        options: options.into(),
    }
}

#[async_trait]
impl AuthRoute for CallbackRoute {
    async fn handle(
        &self,
        auth: &Auth,
        config: &AppConfig,
        req: &AuthRequest,
        adapter: &mut ResponseAdapter,
    ) -> Result<(), HandlerError> {
        let options = self.options.resolve(req).await?;
        verify_callback(auth, config, req, adapter, &options).await
    }
}
