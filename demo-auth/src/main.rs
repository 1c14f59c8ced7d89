use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, routing::get};
use chrono::Utc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use auth_dispatch::{
    AfterCallbackResult, AppConfig, Auth, CallbackOptions, Handlers, HookError, OidcClient,
    after_callback, handle_auth, handle_callback, on_error,
};
use auth_dispatch_axum::{AUTH_ROUTE_PREFIX, auth_router, init};

mod handlers;

use crate::handlers::{index, protected};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("{}=debug,auth_dispatch=debug", env!("CARGO_CRATE_NAME")).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    let client = match std::env::var("AUTH_ID_TOKEN_PUBLIC_KEY") {
        Ok(path) => OidcClient::with_rsa_pem(&std::fs::read(path)?)?,
        Err(_) => {
            let secret = config
                .client_secret
                .clone()
                .ok_or("AUTH_CLIENT_SECRET or AUTH_ID_TOKEN_PUBLIC_KEY must be set")?;
            OidcClient::with_hs256_secret(secret.as_bytes())?
        }
    };
    let auth = Arc::new(Auth::new(config, client));

    // Record when the user logged in; the session is persisted as returned
    let callback = handle_callback(CallbackOptions::default().with_after_callback(
        after_callback(|_req, mut session, _state| async move {
            session.user.insert(
                "logged_in_at".to_string(),
                serde_json::json!(Utc::now().timestamp()),
            );
            Ok::<_, HookError>(AfterCallbackResult::Session(session))
        }),
    ));
    let report = on_error(|_req, err| async move {
        tracing::warn!("Auth route failed: {} ({})", err.code(), err.message());
        Ok::<_, HookError>(None)
    });
    let handler = handle_auth(
        auth.clone(),
        Handlers::new().callback(callback).on_error(report),
    );

    let app = Router::new()
        .route("/", get(index))
        .route("/protected", get(protected))
        .with_state(auth)
        .nest(AUTH_ROUTE_PREFIX.as_str(), auth_router(handler));

    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3001);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::debug!("HTTP server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
