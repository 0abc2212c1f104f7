//! CLI error types and conversions

use crate::orchestrator::OrchestratorError;
use crate::remote::{DirectoryError, RemoteError};
use crate::throttle::ThrottleError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Orchestrator error
    #[error("orchestrator error: {0}")]
    OrchestratorError(#[from] OrchestratorError),

    /// Remote service error
    #[error("remote error: {0}")]
    RemoteError(#[from] RemoteError),

    /// Job directory error
    #[error("directory error: {0}")]
    DirectoryError(#[from] DirectoryError),

    /// Throttle configuration error
    #[error("throttle error: {0}")]
    ThrottleError(#[from] ThrottleError),

    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Server error
    #[error("server error: {0}")]
    ServerError(String),
}
