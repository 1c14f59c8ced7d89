//! Outstanding login attempts
//!
//! The login route records a [`LoginTransaction`] keyed by the `state` it sends to the
//! identity provider; the callback consumes it exactly once.

mod memory;
mod types;

pub use memory::InMemoryTransactionStore;
pub use types::{CallbackState, LoginTransaction, TransactionStore};
