use async_trait::async_trait;
use http::StatusCode;
use http::header::{CACHE_CONTROL, HeaderValue};

use crate::Auth;
use crate::adapter::ResponseAdapter;
use crate::config::AppConfig;
use crate::errors::{ErrorKind, HandlerError};
use crate::request::AuthRequest;
use crate::response::empty_response;
use crate::router::AuthRoute;

/// Provider-initiated logout: invalidates the sessions a logout token names
pub struct BackchannelLogoutRoute;

pub fn handle_backchannel_logout() -> BackchannelLogoutRoute {
    BackchannelLogoutRoute
}

#[async_trait]
impl AuthRoute for BackchannelLogoutRoute {
    async fn handle(
        &self,
        auth: &Auth,
        config: &AppConfig,
        req: &AuthRequest,
        adapter: &mut ResponseAdapter,
    ) -> Result<(), HandlerError> {
        if !config.backchannel_logout {
            return Err(backchannel_error("Back-channel logout is not enabled"));
        }

        let logout_token = req
            .form_params()
            .remove("logout_token")
            .filter(|token| !token.is_empty())
            .ok_or_else(|| backchannel_error("Missing logout_token"))?;

        let logout = auth
            .client()
            .verify_logout_token(config, &logout_token)
            .await
            .map_err(|e| backchannel_error(format!("Invalid logout token: {e}")))?;

        let revoked = auth.session_store().revoke(&logout).await.map_err(|e| {
            HandlerError::new(
                ErrorKind::BackchannelLogout,
                format!("Failed to revoke sessions: {e}"),
            )
            .with_status(StatusCode::INTERNAL_SERVER_ERROR)
            .log()
        })?;
        tracing::debug!("Back-channel logout revoked {} session(s)", revoked);

        let mut response = empty_response(StatusCode::NO_CONTENT);
        response
            .headers_mut()
            .insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
        adapter.finalize_with_response(response).await
    }
}

fn backchannel_error(message: impl Into<String>) -> HandlerError {
    HandlerError::new(ErrorKind::BackchannelLogout, message).log()
}
