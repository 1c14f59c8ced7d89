use thiserror::Error;

use crate::utils::UtilError;

#[derive(Debug, Error, Clone)]
pub enum SessionError {
    /// Error from utils operations
    #[error("Utils error: {0}")]
    Utils(#[from] UtilError),
}
