//! Application sessions
//!
//! A [`Session`] is built by the callback core once the identity provider's tokens have been
//! validated. Persisting it is the job of a [`SessionStore`]; [`InMemorySessionStore`] is the
//! reference implementation.

mod errors;
mod memory;
mod store;
mod types;

pub use errors::SessionError;
pub use memory::InMemorySessionStore;
pub use store::SessionStore;
pub use types::Session;
