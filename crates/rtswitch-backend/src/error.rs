use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Package manager not found")]
    NotFound,

    #[error("Command failed: {stderr}")]
    CommandFailed { stderr: String },

    #[error("Failed to launch {program}: {details}")]
    SpawnFailed { program: String, details: String },

    #[error("Package manager installation failed during {phase}: {details}")]
    InstallFailed {
        phase: &'static str,
        details: String,
    },

    #[error("Network error during {operation}: {details}")]
    NetworkError {
        operation: &'static str,
        details: String,
    },

    #[error("IO error ({kind}): {message}")]
    IoError {
        kind: std::io::ErrorKind,
        message: String,
    },
}

impl BackendError {
    pub fn install_failed(phase: &'static str, details: impl Into<String>) -> Self {
        Self::InstallFailed {
            phase,
            details: details.into(),
        }
    }

    pub fn network<E>(operation: &'static str, error: E) -> Self
    where
        E: std::fmt::Display,
    {
        Self::NetworkError {
            operation,
            details: error.to_string(),
        }
    }

    pub fn spawn_failed(program: impl Into<String>, error: &std::io::Error) -> Self {
        Self::SpawnFailed {
            program: program.into(),
            details: error.to_string(),
        }
    }
}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        BackendError::IoError {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::BackendError;

    #[test]
    fn io_error_conversion_maps_to_io_variant() {
        let mapped = BackendError::from(std::io::Error::other("permission denied"));
        assert!(
            matches!(mapped, BackendError::IoError { kind, ref message } if kind == std::io::ErrorKind::Other && message.contains("permission denied"))
        );
    }

    #[test]
    fn command_failed_display_includes_stderr() {
        let error = BackendError::CommandFailed {
            stderr: "scoop: command not found".to_string(),
        };

        assert_eq!(error.to_string(), "Command failed: scoop: command not found");
    }

    #[test]
    fn spawn_failed_names_program() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let error = BackendError::spawn_failed("powershell", &io);

        assert_eq!(
            error.to_string(),
            "Failed to launch powershell: no such file"
        );
    }
}
