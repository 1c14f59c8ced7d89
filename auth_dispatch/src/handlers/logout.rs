use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::Auth;
use crate::adapter::ResponseAdapter;
use crate::config::AppConfig;
use crate::errors::{ErrorKind, HandlerError};
use crate::options::HandlerOptions;
use crate::request::AuthRequest;
use crate::router::AuthRoute;

use super::safe_return_to;

#[derive(Debug, Clone, Default)]
pub struct LogoutOptions {
    /// Where to land after logging out; defaults to the application base URL
    pub return_to: Option<String>,
    /// Extra parameters for the provider's end-session endpoint
    pub logout_params: BTreeMap<String, String>,
}

pub struct LogoutRoute {
    options: HandlerOptions<LogoutOptions>,
}

pub fn handle_logout(options: impl Into<HandlerOptions<LogoutOptions>>) -> LogoutRoute {
    LogoutRoute {
        options: options.into(),
    }
}

#[async_trait]
impl AuthRoute for LogoutRoute {
    async fn handle(
        &self,
        auth: &Auth,
        config: &AppConfig,
        req: &AuthRequest,
        adapter: &mut ResponseAdapter,
    ) -> Result<(), HandlerError> {
        let options = self.options.resolve(req).await?;

        let session = auth
            .session_store()
            .load(config, req)
            .await
            .map_err(|e| logout_error(format!("Failed to load session: {e}")))?;
        let headers = auth
            .session_store()
            .delete(config, req)
            .await
            .map_err(|e| logout_error(format!("Failed to delete session: {e}")))?;

        let return_to = req
            .query_param("returnTo")
            .and_then(|target| safe_return_to(&config.base_url, &target))
            .or(options.return_to.clone())
            .unwrap_or_else(|| config.base_url.clone());

        let id_token = session.as_ref().and_then(|s| s.id_token.as_deref());
        let location = match end_session_url(config, &options, id_token, &return_to)? {
            Some(url) => url,
            None => return_to,
        };

        tracing::info!(
            "Logged out sub {:?}",
            session.as_ref().and_then(|s| s.sub())
        );
        adapter.finalize_with_redirect(&location, headers).await
    }
}

fn logout_error(message: String) -> HandlerError {
    HandlerError::new(ErrorKind::Logout, message).log()
}

/// The provider logout URL, when provider logout is enabled and the provider has one.
fn end_session_url(
    config: &AppConfig,
    options: &LogoutOptions,
    id_token: Option<&str>,
    return_to: &str,
) -> Result<Option<String>, HandlerError> {
    let Some(endpoint) = config.end_session_endpoint.as_deref().filter(|_| config.idp_logout)
    else {
        return Ok(None);
    };

    let mut url = url::Url::parse(endpoint).map_err(|e| {
        HandlerError::configuration(format!("Invalid end session endpoint: {e}")).log()
    })?;
    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("client_id", &config.client_id)
            .append_pair("post_logout_redirect_uri", return_to);
        if let Some(id_token) = id_token {
            query.append_pair("id_token_hint", id_token);
        }
        for (key, value) in &options.logout_params {
            query.append_pair(key, value);
        }
    }
    Ok(Some(url.into()))
}
