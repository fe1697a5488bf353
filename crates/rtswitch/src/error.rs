use rtswitch_core::{CoreError, HomeValidationError};
use rtswitch_platform::{AppPathsError, EnvStoreError};
use thiserror::Error;

use crate::single_instance::AcquireError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{manager} is not available and could not be installed: {reason}")]
    ManagerUnavailable {
        manager: &'static str,
        reason: String,
    },

    #[error("Could not install '{input}' (tried {tried})")]
    NoCandidateSucceeded { input: String, tried: String },

    #[error("{0}")]
    OperationFailed(String),

    #[error("Invalid home directory: {0} (use --force to accept it anyway)")]
    InvalidHome(#[from] HomeValidationError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Failed to update environment: {0}")]
    Environment(#[from] EnvStoreError),

    #[error(transparent)]
    Instance(#[from] AcquireError),

    #[error(transparent)]
    Paths(#[from] AppPathsError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    pub fn manager_unavailable(manager: &'static str, reason: impl Into<String>) -> Self {
        Self::ManagerUnavailable {
            manager,
            reason: reason.into(),
        }
    }

    /// Process exit status for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::ManagerUnavailable { .. } => 2,
            Self::NoCandidateSucceeded { .. } => 3,
            _ => 1,
        }
    }
}
