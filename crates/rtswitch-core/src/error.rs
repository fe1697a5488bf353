use std::path::PathBuf;

use rtswitch_backend::RuntimeFamily;
use rtswitch_platform::EnvStoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Failed to update environment: {0}")]
    Environment(#[from] EnvStoreError),

    #[error("'{id}' is not installed")]
    NotInstalled { id: String },

    #[error("'{id}' is not a valid package identifier")]
    InvalidPackageId { id: String },

    #[error("'{id}' is not a {} package", family.display_name())]
    WrongFamily { id: String, family: RuntimeFamily },
}

/// Why a directory was rejected as a runtime home.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HomeValidationError {
    #[error("{} does not exist", path.display())]
    NotFound { path: PathBuf },

    #[error("{} is not a directory", path.display())]
    NotADirectory { path: PathBuf },

    #[error("{} has no {}", path.display(), expected.display())]
    MissingExecutable { path: PathBuf, expected: PathBuf },
}

impl HomeValidationError {
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::NotFound { path }
            | Self::NotADirectory { path }
            | Self::MissingExecutable { path, .. } => path,
        }
    }
}
