//! Built-in login, logout, profile and back-channel logout routes

mod backchannel;
mod login;
mod logout;
mod profile;

pub use backchannel::{BackchannelLogoutRoute, handle_backchannel_logout};
pub use login::{GetLoginState, LoginOptions, LoginRoute, handle_login};
pub use logout::{LogoutOptions, LogoutRoute, handle_logout};
pub use profile::{ProfileOptions, ProfileRoute, handle_profile};

/// Resolve a user supplied `returnTo` against `base_url`.
///
/// Only relative targets and absolute targets on the application's own origin are accepted;
/// anything else would turn the route into an open redirect.
pub(crate) fn safe_return_to(base_url: &str, return_to: &str) -> Option<String> {
    let base = url::Url::parse(base_url).ok()?;
    let target = base.join(return_to).ok()?;
    if target.origin() != base.origin() {
        tracing::debug!("Ignoring cross-origin returnTo {}", return_to);
        return None;
    }
    Some(target.to_string())
}
