use async_trait::async_trait;
use log::{debug, error, info, trace, warn};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tokio::process::Command;

use rtswitch_backend::{BackendError, CommandStatus, InstallLayout, ManagerInfo, PackageManager};
use rtswitch_platform::quiet_command;

use crate::listing::parse_bucket_list;

/// How the `scoop` entry point has to be started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Launcher {
    /// An executable or batch shim that can be spawned directly.
    Direct(PathBuf),
    /// `scoop.ps1`, run through PowerShell.
    PowerShell(PathBuf),
}

impl Launcher {
    #[must_use]
    pub fn for_path(path: PathBuf) -> Self {
        let is_script = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("ps1"));
        if is_script {
            Launcher::PowerShell(path)
        } else {
            Launcher::Direct(path)
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Launcher::Direct(path) | Launcher::PowerShell(path) => path,
        }
    }

    pub(crate) fn command(&self, args: &[&str]) -> Command {
        match self {
            Launcher::Direct(path) => {
                debug!("Building scoop command: {} {}", path.display(), args.join(" "));
                let mut cmd = quiet_command(path);
                cmd.args(args);
                cmd
            }
            Launcher::PowerShell(script) => {
                debug!(
                    "Building scoop command: powershell -File {} {}",
                    script.display(),
                    args.join(" ")
                );
                let mut cmd = quiet_command("powershell");
                cmd.args(["-NoProfile", "-ExecutionPolicy", "Bypass", "-File"]);
                cmd.arg(script);
                cmd.args(args);
                cmd
            }
        }
    }
}

#[derive(Clone)]
pub struct ScoopBackend {
    info: ManagerInfo,
    layout: InstallLayout,
    launcher: Launcher,
}

impl ScoopBackend {
    #[must_use]
    pub fn new(path: PathBuf, version: Option<String>, root: PathBuf) -> Self {
        Self {
            info: ManagerInfo {
                name: "scoop",
                path: path.clone(),
                version,
                in_path: true,
            },
            layout: InstallLayout::new(root),
            launcher: Launcher::for_path(path),
        }
    }

    #[must_use]
    pub fn with_in_path(mut self, in_path: bool) -> Self {
        self.info.in_path = in_path;
        self
    }

    #[must_use]
    pub fn launcher(&self) -> &Launcher {
        &self.launcher
    }

    fn build_command(&self, args: &[&str]) -> Command {
        let mut cmd = self.launcher.command(args);
        cmd.env("SCOOP", self.layout.root());
        cmd
    }

    /// Run scoop and capture its exit status. Only a spawn failure is an
    /// error.
    async fn execute(&self, args: &[&str]) -> Result<CommandStatus, BackendError> {
        info!("Executing scoop command: {}", args.join(" "));

        let output = self
            .build_command(args)
            .output()
            .await
            .map_err(|error| {
                error!("Failed to launch scoop for {args:?}: {error}");
                BackendError::spawn_failed(self.launcher.path().display().to_string(), &error)
            })?;

        let status = CommandStatus {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };

        debug!("scoop command exit status: {:?}", output.status);
        trace!("scoop stdout: {}", status.stdout);
        if !status.stderr.is_empty() {
            trace!("scoop stderr: {}", status.stderr);
        }

        Ok(status)
    }

    /// Like [`Self::execute`], but a non-zero exit becomes `CommandFailed`.
    async fn execute_checked(&self, args: &[&str]) -> Result<String, BackendError> {
        let status = self.execute(args).await?;
        if status.is_success() {
            debug!("scoop command succeeded, output: {} bytes", status.stdout.len());
            Ok(status.stdout)
        } else {
            let stderr = status.summary();
            error!("scoop command failed: args={args:?}, stderr='{stderr}'");
            Err(BackendError::CommandFailed { stderr })
        }
    }

    fn buckets_on_disk(&self) -> BTreeSet<String> {
        let Ok(entries) = std::fs::read_dir(self.layout.buckets_dir()) else {
            return BTreeSet::new();
        };
        entries
            .flatten()
            .filter(|entry| entry.file_type().is_ok_and(|kind| kind.is_dir()))
            .map(|entry| entry.file_name().to_string_lossy().to_string())
            .collect()
    }
}

#[async_trait]
impl PackageManager for ScoopBackend {
    fn name(&self) -> &'static str {
        "scoop"
    }

    fn info(&self) -> &ManagerInfo {
        &self.info
    }

    fn layout(&self) -> &InstallLayout {
        &self.layout
    }

    async fn list_buckets(&self) -> Result<BTreeSet<String>, BackendError> {
        let mut buckets = self.buckets_on_disk();
        match self.execute_checked(&["bucket", "list"]).await {
            Ok(output) => buckets.extend(parse_bucket_list(&output)),
            Err(error) if !buckets.is_empty() => {
                warn!("Falling back to on-disk bucket list: {error}");
            }
            Err(error) => return Err(error),
        }
        Ok(buckets)
    }

    async fn add_bucket(&self, name: &str) -> Result<(), BackendError> {
        let status = self.execute(&["bucket", "add", name]).await?;
        if status.is_success() || status.mentions("already exists") {
            Ok(())
        } else {
            Err(BackendError::CommandFailed {
                stderr: status.summary(),
            })
        }
    }

    async fn install_package(&self, id: &str) -> Result<CommandStatus, BackendError> {
        self.execute(&["install", id]).await
    }

    async fn uninstall_package(&self, id: &str) -> Result<CommandStatus, BackendError> {
        self.execute(&["uninstall", id]).await
    }

    async fn activate_package(&self, id: &str) -> Result<CommandStatus, BackendError> {
        self.execute(&["reset", id]).await
    }

    async fn list_installed_packages(&self) -> Result<String, BackendError> {
        self.execute_checked(&["list"]).await
    }
}
