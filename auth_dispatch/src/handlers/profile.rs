use async_trait::async_trait;
use http::header::{CACHE_CONTROL, HeaderValue};
use http::{HeaderMap, StatusCode};
use serde_json::Value;

use crate::Auth;
use crate::adapter::ResponseAdapter;
use crate::config::AppConfig;
use crate::errors::{ErrorKind, HandlerError};
use crate::options::HandlerOptions;
use crate::request::AuthRequest;
use crate::response::{empty_response, json_response};
use crate::router::AuthRoute;

#[derive(Debug, Clone, Default)]
pub struct ProfileOptions {
    /// Refresh the user claims from the userinfo endpoint and save them in the session
    pub refetch: bool,
}

pub struct ProfileRoute {
    options: HandlerOptions<ProfileOptions>,
}

pub fn handle_profile(options: impl Into<HandlerOptions<ProfileOptions>>) -> ProfileRoute {
    ProfileRoute {
        options: options.into(),
    }
}

#[async_trait]
impl AuthRoute for ProfileRoute {
    async fn handle(
        &self,
        auth: &Auth,
        config: &AppConfig,
        req: &AuthRequest,
        adapter: &mut ResponseAdapter,
    ) -> Result<(), HandlerError> {
        let options = self.options.resolve(req).await?;

        let Some(mut session) = auth
            .session_store()
            .load(config, req)
            .await
            .map_err(|e| profile_error(format!("Failed to load session: {e}")))?
        else {
            let mut response = empty_response(StatusCode::NO_CONTENT);
            response
                .headers_mut()
                .insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
            return adapter.finalize_with_response(response).await;
        };

        let mut headers = HeaderMap::new();
        if options.refetch {
            let access_token = session
                .access_token
                .as_deref()
                .ok_or_else(|| profile_error("Session has no access token to refetch with"))?;
            session.user = auth
                .client()
                .userinfo(config, access_token)
                .await
                .map_err(|e| profile_error(format!("Failed to refetch user: {e}")))?;
            headers = auth
                .session_store()
                .save(config, req, &session)
                .await
                .map_err(|e| profile_error(format!("Failed to save session: {e}")))?;
            tracing::debug!("Refetched user claims for sub {:?}", session.sub());
        }

        let mut response = json_response(StatusCode::OK, &Value::Object(session.user));
        response.headers_mut().extend(headers);
        adapter.finalize_with_response(response).await
    }
}

fn profile_error(message: impl Into<String>) -> HandlerError {
    HandlerError::new(ErrorKind::Profile, message).log()
}
