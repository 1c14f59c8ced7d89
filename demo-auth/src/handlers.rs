use auth_dispatch_axum::{AUTH_ROUTE_PREFIX, AuthSession};
use axum::response::Html;

pub(crate) async fn index(session: Option<AuthSession>) -> Html<String> {
    let prefix = AUTH_ROUTE_PREFIX.as_str();
    match session {
        Some(s) => Html(format!(
            r#"<p>Hey {}!</p>
<p><a href="/protected">Protected page</a> | <a href="{prefix}/me">Profile JSON</a></p>
<p><a href="{prefix}/logout">Logout</a></p>"#,
            display_name(&s)
        )),
        None => Html(format!(
            r#"<p>Click the Login button below.</p>
<p><a href="{prefix}/login?returnTo=%2Fprotected">Login</a></p>"#
        )),
    }
}

pub(crate) async fn protected(session: AuthSession) -> Html<String> {
    tracing::trace!("Session sid: {:?}", session.sid());
    let claims = serde_json::to_string_pretty(&session.user).unwrap_or_default();
    Html(format!(
        r#"<p>Welcome {}.</p>
<pre>{}</pre>
<p><a href="/">Home</a> | <a href="{}/logout">Logout</a></p>"#,
        display_name(&session),
        escape(&claims),
        AUTH_ROUTE_PREFIX.as_str()
    ))
}

fn display_name(session: &AuthSession) -> String {
    session
        .user
        .get("name")
        .or_else(|| session.user.get("email"))
        .and_then(|v| v.as_str())
        .or_else(|| session.sub())
        .map(escape)
        .unwrap_or_else(|| "stranger".to_string())
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
