use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use fs2::FileExt;
use rtswitch_platform::AppPaths;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AcquireError {
    #[error("another rtswitch instance is already running")]
    AlreadyRunning,
    #[error("failed to resolve application paths: {0}")]
    Paths(#[from] rtswitch_platform::AppPathsError),
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

impl AcquireError {
    fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }
}

/// Exclusive lock held for the lifetime of the process.
pub struct SingleInstance {
    _file: File,
}

impl SingleInstance {
    pub fn acquire() -> Result<Self, AcquireError> {
        let paths = AppPaths::new()?;
        paths
            .ensure_dirs()
            .map_err(|error| AcquireError::io("failed to create app directories", error))?;
        Self::acquire_at(&paths.lock_file())
    }

    pub fn acquire_at(lock_file_path: &Path) -> Result<Self, AcquireError> {
        let mut lock_file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(lock_file_path)
            .map_err(|error| AcquireError::io("failed to open instance lock file", error))?;

        match lock_file.try_lock_exclusive() {
            Ok(()) => {}
            Err(error) if error.kind() == fs2::lock_contended_error().kind() => {
                return Err(AcquireError::AlreadyRunning);
            }
            Err(error) => {
                return Err(AcquireError::io("failed to acquire instance lock", error));
            }
        }

        lock_file
            .set_len(0)
            .and_then(|()| lock_file.seek(SeekFrom::Start(0)).map(|_| ()))
            .and_then(|()| writeln!(lock_file, "{}", std::process::id()))
            .map_err(|error| AcquireError::io("failed to write instance lock metadata", error))?;

        Ok(Self { _file: lock_file })
    }
}

#[cfg(test)]
mod tests {
    use super::{AcquireError, SingleInstance};

    #[test]
    fn second_acquire_reports_running_instance() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let lock_path = temp.path().join("rtswitch.lock");

        let first = SingleInstance::acquire_at(&lock_path).expect("first acquire");
        let second = SingleInstance::acquire_at(&lock_path);

        assert!(matches!(second, Err(AcquireError::AlreadyRunning)));
        drop(first);
        assert!(SingleInstance::acquire_at(&lock_path).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn lock_file_records_process_id() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let lock_path = temp.path().join("rtswitch.lock");

        let _guard = SingleInstance::acquire_at(&lock_path).expect("acquire");

        let contents = std::fs::read_to_string(&lock_path).expect("read lock file");
        assert_eq!(contents.trim(), std::process::id().to_string());
    }

    #[test]
    fn already_running_message() {
        assert_eq!(
            AcquireError::AlreadyRunning.to_string(),
            "another rtswitch instance is already running"
        );
    }
}
