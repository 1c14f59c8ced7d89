#![allow(dead_code)]

pub mod fixtures;

pub use fixtures::*;
pub use mock_client::MockOAuthClient;
pub use session_utils::*;
