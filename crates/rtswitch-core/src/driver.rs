use log::{debug, info, warn};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use rtswitch_backend::{CommandStatus, InstallLayout, PackageManager, RuntimeFamily};
use rtswitch_env::{EnvironmentSynchronizer, SyncReport, is_within};
use rtswitch_platform::EnvStore;

use crate::error::CoreError;
use crate::normalize::{PackageCandidate, normalize};
use crate::probe::{InstalledVariant, Probe, parse_shim_descriptor};

const MISSING_MANIFEST: &str = "Couldn't find manifest";
const SHIM_SIBLING_EXTENSIONS: [&str; 4] = ["exe", "cmd", "ps1", ""];
const SCRIPT_SHIM_EXTENSIONS: [&str; 2] = ["cmd", "ps1"];

/// Result of one package-manager attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationResult {
    Success,
    /// The next candidate may still work.
    FailedRecoverable(String),
    /// The package manager could not run at all.
    FailedFatal(String),
}

impl MutationResult {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    fn from_status(status: &CommandStatus) -> Self {
        if !status.is_success() || status.mentions(MISSING_MANIFEST) {
            Self::FailedRecoverable(status.summary())
        } else {
            Self::Success
        }
    }
}

impl fmt::Display for MutationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("succeeded"),
            Self::FailedRecoverable(details) => write!(f, "failed: {details}"),
            Self::FailedFatal(details) => write!(f, "could not run: {details}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    pub id: String,
    pub result: MutationResult,
}

#[derive(Debug, Clone)]
pub enum InstallOutcome {
    Installed {
        id: String,
        attempts: Vec<Attempt>,
        sync: SyncReport,
    },
    NoCandidateSucceeded {
        input: String,
        attempts: Vec<Attempt>,
    },
}

#[derive(Debug, Clone)]
pub enum SwitchOutcome {
    Switched { id: String, sync: SyncReport },
    SwitchFailed { id: String, result: MutationResult },
}

#[derive(Debug, Clone)]
pub enum UninstallOutcome {
    Uninstalled {
        id: String,
        sync: SyncReport,
    },
    /// The package manager failed and files were removed directly.
    UninstalledDegraded {
        id: String,
        cleanup: CleanupReport,
        sync: SyncReport,
    },
}

impl UninstallOutcome {
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Uninstalled { id, .. } | Self::UninstalledDegraded { id, .. } => id,
        }
    }
}

#[derive(Debug, Clone)]
pub enum ReplaceOutcome {
    /// A requested variant was already installed.
    Switched(SwitchOutcome),
    Reinstalled {
        removed: Vec<UninstallOutcome>,
        install: InstallOutcome,
    },
}

/// Paths removed by forced cleanup, and those that could not be.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub removed: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

impl CleanupReport {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    fn remove_file(&mut self, path: PathBuf) {
        match std::fs::remove_file(&path) {
            Ok(()) => self.removed.push(path),
            Err(error) => {
                warn!("Failed to remove {}: {error}", path.display());
                self.failed.push((path, error.to_string()));
            }
        }
    }

    fn remove_dir(&mut self, path: PathBuf) {
        make_writable(&path);
        match std::fs::remove_dir_all(&path) {
            Ok(()) => self.removed.push(path),
            Err(error) => {
                warn!("Failed to remove {}: {error}", path.display());
                self.failed.push((path, error.to_string()));
            }
        }
    }
}

#[cfg(unix)]
fn set_writable(permissions: &mut std::fs::Permissions) {
    use std::os::unix::fs::PermissionsExt;
    permissions.set_mode(permissions.mode() | 0o200);
}

#[cfg(not(unix))]
#[allow(clippy::permissions_set_readonly_false)]
fn set_writable(permissions: &mut std::fs::Permissions) {
    permissions.set_readonly(false);
}

/// Clear read-only bits below `path` without following links.
fn make_writable(path: &Path) {
    let Ok(metadata) = std::fs::symlink_metadata(path) else {
        return;
    };
    if metadata.file_type().is_symlink() {
        return;
    }

    let mut permissions = metadata.permissions();
    if permissions.readonly() {
        set_writable(&mut permissions);
        let _ = std::fs::set_permissions(path, permissions);
    }

    if metadata.is_dir()
        && let Ok(entries) = std::fs::read_dir(path)
    {
        for entry in entries.flatten() {
            make_writable(&entry.path());
        }
    }
}

/// Whether `app_dir` resolves to an entry directly below `apps_dir`.
fn is_app_entry(apps_dir: &Path, app_dir: &Path) -> bool {
    match (apps_dir.canonicalize(), app_dir.canonicalize()) {
        (Ok(apps), Ok(app)) => app.parent() == Some(apps.as_path()),
        _ => false,
    }
}

/// Whether a `.cmd`, `.ps1` or shell shim launches something inside
/// `app_dir`. Scoop writes either the absolute target or one relative to
/// `shims/`.
fn script_targets(content: &str, app_dir: &Path, id: &str) -> bool {
    let fold = |text: &str| {
        let text = text.replace('\\', "/");
        if cfg!(windows) { text.to_lowercase() } else { text }
    };
    let body = fold(content);
    let absolute = format!("{}/", fold(&app_dir.to_string_lossy()).trim_end_matches('/'));
    let relative = fold(&format!("../apps/{id}/"));
    body.contains(&absolute) || body.contains(&relative)
}

fn is_script_shim(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .is_none_or(|ext| SCRIPT_SHIM_EXTENSIONS.iter().any(|known| ext == *known))
}

/// Remove `apps/<id>` and every shim that launches something inside it.
///
/// Only used after the package manager failed to uninstall `id`. Nothing is
/// touched unless `apps/<id>` is a direct entry of the apps directory.
#[must_use]
pub fn forced_cleanup(layout: &InstallLayout, id: &str) -> CleanupReport {
    let apps_dir = layout.apps_dir();
    let app_dir = layout.app_dir(id);
    let shims_dir = layout.shims_dir();
    let mut report = CleanupReport::default();

    if !InstallLayout::is_package_id(id) || (app_dir.exists() && !is_app_entry(&apps_dir, &app_dir))
    {
        warn!(
            "Refusing to clean up {}: not an entry of {}",
            app_dir.display(),
            apps_dir.display()
        );
        report
            .failed
            .push((app_dir, format!("not inside {}", apps_dir.display())));
        return report;
    }

    let entries: Vec<PathBuf> = std::fs::read_dir(&shims_dir)
        .map(|entries| entries.flatten().map(|entry| entry.path()).collect())
        .unwrap_or_default();
    let mut handled: HashSet<PathBuf> = HashSet::new();

    for descriptor in entries
        .iter()
        .filter(|path| path.extension().is_some_and(|ext| ext == "shim"))
    {
        let Some(target) = std::fs::read_to_string(descriptor)
            .ok()
            .and_then(|content| parse_shim_descriptor(&content))
        else {
            continue;
        };
        if !is_within(&target, &app_dir) {
            continue;
        }

        let Some(stem) = descriptor.file_stem().map(|s| s.to_string_lossy().to_string())
        else {
            continue;
        };
        for ext in SHIM_SIBLING_EXTENSIONS {
            let sibling = if ext.is_empty() {
                shims_dir.join(&stem)
            } else {
                shims_dir.join(format!("{stem}.{ext}"))
            };
            if std::fs::symlink_metadata(&sibling).is_ok() && handled.insert(sibling.clone()) {
                report.remove_file(sibling);
            }
        }
        handled.insert(descriptor.clone());
        report.remove_file(descriptor.clone());
    }

    for script in entries
        .iter()
        .filter(|path| !handled.contains(*path) && is_script_shim(path))
    {
        let Ok(content) = std::fs::read_to_string(script) else {
            continue;
        };
        if script_targets(&content, &app_dir, id) {
            report.remove_file(script.clone());
        }
    }

    if app_dir.exists() {
        report.remove_dir(app_dir);
    }

    info!(
        "Forced cleanup of {id}: {} removed, {} failed",
        report.removed.len(),
        report.failed.len()
    );
    report
}

/// Runs install, switch and uninstall through the package manager and keeps
/// the environment in step afterwards.
pub struct MutationDriver<'a> {
    manager: &'a dyn PackageManager,
    env: &'a dyn EnvStore,
    auto_add_buckets: bool,
}

impl<'a> MutationDriver<'a> {
    #[must_use]
    pub fn new(manager: &'a dyn PackageManager, env: &'a dyn EnvStore) -> Self {
        Self {
            manager,
            env,
            auto_add_buckets: true,
        }
    }

    #[must_use]
    pub fn with_auto_add_buckets(mut self, enabled: bool) -> Self {
        self.auto_add_buckets = enabled;
        self
    }

    #[must_use]
    pub fn probe(&self) -> Probe<'_> {
        Probe::new(self.manager.layout(), self.env)
    }

    fn synchronizer(&self) -> EnvironmentSynchronizer<'_> {
        EnvironmentSynchronizer::new(self.env)
    }

    /// Normalize `raw` and install the first candidate that works.
    pub async fn install_version(
        &self,
        family: RuntimeFamily,
        raw: &str,
    ) -> Result<InstallOutcome, CoreError> {
        let candidates = normalize(family, raw);
        self.install_candidates(family, &candidates, raw).await
    }

    pub async fn install(
        &self,
        family: RuntimeFamily,
        candidates: &PackageCandidate,
    ) -> Result<InstallOutcome, CoreError> {
        self.install_candidates(family, candidates, candidates.primary())
            .await
    }

    async fn install_candidates(
        &self,
        family: RuntimeFamily,
        candidates: &PackageCandidate,
        input: &str,
    ) -> Result<InstallOutcome, CoreError> {
        debug!("Resolving {input:?} for {family}: {candidates}");

        if self.auto_add_buckets {
            match self.manager.ensure_bucket(family.bucket()).await {
                Ok(true) => info!("Added bucket {}", family.bucket()),
                Ok(false) => {}
                Err(error) => warn!("Could not ensure bucket {}: {error}", family.bucket()),
            }
        }

        let mut attempts = Vec::new();
        for id in candidates {
            info!("Attempting to install {id}");
            let result = self.attempt_install(family, id).await;

            if result.is_success() {
                attempts.push(Attempt {
                    id: id.to_string(),
                    result,
                });
                let sync = self.sync_activation(family, id)?;
                return Ok(InstallOutcome::Installed {
                    id: id.to_string(),
                    attempts,
                    sync,
                });
            }

            warn!("Install attempt for {id} {result}");
            let fatal = matches!(result, MutationResult::FailedFatal(_));
            attempts.push(Attempt {
                id: id.to_string(),
                result,
            });
            if fatal {
                break;
            }
        }

        Ok(InstallOutcome::NoCandidateSucceeded {
            input: input.to_string(),
            attempts,
        })
    }

    async fn attempt_install(&self, family: RuntimeFamily, id: &str) -> MutationResult {
        let status = match self.manager.install_package(id).await {
            Ok(status) => status,
            Err(error) => return MutationResult::FailedFatal(error.to_string()),
        };

        match MutationResult::from_status(&status) {
            MutationResult::Success if self.probe().installed_variant(family, id).is_none() => {
                MutationResult::FailedRecoverable(format!(
                    "{} reported success but no {} was found under {}",
                    self.manager.name(),
                    family.executable(),
                    self.manager.layout().current_dir(id).display()
                ))
            }
            result => result,
        }
    }

    /// Make an installed variant the active one.
    pub async fn switch(&self, family: RuntimeFamily, id: &str) -> Result<SwitchOutcome, CoreError> {
        if self.probe().installed_variant(family, id).is_none() {
            return Err(CoreError::NotInstalled { id: id.to_string() });
        }

        let result = match self.manager.activate_package(id).await {
            Ok(status) => MutationResult::from_status(&status),
            Err(error) => MutationResult::FailedFatal(error.to_string()),
        };

        if !result.is_success() {
            warn!("Switching to {id} {result}");
            return Ok(SwitchOutcome::SwitchFailed {
                id: id.to_string(),
                result,
            });
        }

        let sync = self.sync_activation(family, id)?;
        Ok(SwitchOutcome::Switched {
            id: id.to_string(),
            sync,
        })
    }

    /// Uninstall `id`, removing its files directly if the package manager
    /// fails. `id` must be a package of `family`.
    pub async fn uninstall(
        &self,
        family: RuntimeFamily,
        id: &str,
    ) -> Result<UninstallOutcome, CoreError> {
        if !InstallLayout::is_package_id(id) {
            return Err(CoreError::InvalidPackageId { id: id.to_string() });
        }
        if !family.owns(id) {
            return Err(CoreError::WrongFamily {
                id: id.to_string(),
                family,
            });
        }

        let layout = self.manager.layout();
        let app_dir = layout.app_dir(id);
        if !app_dir.exists() {
            return Err(CoreError::NotInstalled { id: id.to_string() });
        }

        let result = match self.manager.uninstall_package(id).await {
            Ok(status) if !status.is_success() => {
                MutationResult::FailedRecoverable(status.summary())
            }
            Ok(_) if app_dir.exists() => MutationResult::FailedRecoverable(format!(
                "{} is still present",
                app_dir.display()
            )),
            Ok(_) => MutationResult::Success,
            Err(error) => MutationResult::FailedFatal(error.to_string()),
        };

        if result.is_success() {
            let sync = self.sync_removal(family, &app_dir)?;
            return Ok(UninstallOutcome::Uninstalled {
                id: id.to_string(),
                sync,
            });
        }

        warn!("Uninstall of {id} {result}; removing files directly");
        let cleanup = forced_cleanup(layout, id);
        let sync = self.sync_removal(family, &app_dir)?;
        Ok(UninstallOutcome::UninstalledDegraded {
            id: id.to_string(),
            cleanup,
            sync,
        })
    }

    /// Change the family to the version `raw` names. Switches when a
    /// candidate is installed; otherwise uninstalls every installed variant
    /// and installs.
    pub async fn replace(
        &self,
        family: RuntimeFamily,
        raw: &str,
    ) -> Result<ReplaceOutcome, CoreError> {
        let candidates = normalize(family, raw);
        let installed = self.probe().list_installed(family)?;

        if let Some(id) = candidates
            .iter()
            .find(|id| installed.iter().any(|variant| variant.id == *id))
        {
            info!("{id} is already installed, switching");
            return Ok(ReplaceOutcome::Switched(self.switch(family, id).await?));
        }

        let mut removed = Vec::new();
        for variant in &installed {
            removed.push(self.uninstall(family, &variant.id).await?);
        }

        let install = self.install_candidates(family, &candidates, raw).await?;
        Ok(ReplaceOutcome::Reinstalled { removed, install })
    }

    fn sync_activation(&self, family: RuntimeFamily, id: &str) -> Result<SyncReport, CoreError> {
        let probe = self.probe();
        let Some(variant) = probe.installed_variant(family, id) else {
            return Err(CoreError::NotInstalled { id: id.to_string() });
        };

        let layout = self.manager.layout();
        let stale_dirs: Vec<PathBuf> = probe
            .list_installed(family)?
            .iter()
            .filter(|other| other.id != id)
            .map(|other| layout.app_dir(&other.id))
            .collect();

        let home = family.home_variable().map(|_| variant.install_path.as_path());
        let sync = self.synchronizer();
        let plan = sync.plan_activation(family, variant.executable_dir(), home, &stale_dirs)?;
        debug!("Activation plan for {id}:\n{}", plan.diff_preview());
        Ok(sync.apply(&plan)?)
    }

    fn sync_removal(&self, family: RuntimeFamily, app_dir: &Path) -> Result<SyncReport, CoreError> {
        let sync = self.synchronizer();
        let plan = sync.plan_removal(family, app_dir)?;
        debug!("Removal plan for {}:\n{}", app_dir.display(), plan.diff_preview());
        Ok(sync.apply(&plan)?)
    }
}

/// Variants of `family` other than `keep`, used as stale entries when a home
/// directory is chosen by hand.
#[must_use]
pub fn other_variant_dirs(
    layout: &InstallLayout,
    variants: &[InstalledVariant],
    keep: Option<&str>,
) -> Vec<PathBuf> {
    variants
        .iter()
        .filter(|variant| Some(variant.id.as_str()) != keep)
        .map(|variant| layout.app_dir(&variant.id))
        .collect()
}
