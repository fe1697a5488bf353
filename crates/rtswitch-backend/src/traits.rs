use async_trait::async_trait;
use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::error::BackendError;
use crate::types::{CommandStatus, InstallLayout};

#[derive(Debug, Clone)]
pub struct ManagerDetection {
    pub found: bool,
    pub path: Option<PathBuf>,
    pub version: Option<String>,
    pub in_path: bool,
    pub root: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ManagerInfo {
    pub name: &'static str,
    pub path: PathBuf,
    pub version: Option<String>,
    pub in_path: bool,
}

/// Locates, bootstraps and constructs a package manager.
#[async_trait]
pub trait ManagerProvider: Send + Sync {
    fn name(&self) -> &'static str;
    fn display_name(&self) -> &'static str;
    async fn detect(&self) -> ManagerDetection;
    async fn install_manager(&self) -> Result<(), BackendError>;
    fn create_manager(&self, detection: &ManagerDetection) -> Box<dyn PackageManager>;
}

/// Primitives the engine drives. Mutating calls report the exit status
/// rather than failing; `Err` means the command could not run at all.
#[async_trait]
pub trait PackageManager: Send + Sync {
    fn name(&self) -> &'static str;

    fn info(&self) -> &ManagerInfo;

    fn layout(&self) -> &InstallLayout;

    async fn list_buckets(&self) -> Result<BTreeSet<String>, BackendError>;

    async fn add_bucket(&self, name: &str) -> Result<(), BackendError>;

    async fn install_package(&self, id: &str) -> Result<CommandStatus, BackendError>;

    async fn uninstall_package(&self, id: &str) -> Result<CommandStatus, BackendError>;

    async fn activate_package(&self, id: &str) -> Result<CommandStatus, BackendError>;

    async fn list_installed_packages(&self) -> Result<String, BackendError>;

    /// Adds `name` unless it is already known. Returns whether it was added.
    async fn ensure_bucket(&self, name: &str) -> Result<bool, BackendError> {
        if self.list_buckets().await?.contains(name) {
            return Ok(false);
        }
        self.add_bucket(name).await?;
        Ok(true)
    }
}
