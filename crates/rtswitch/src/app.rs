use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use rtswitch_backend::{
    InstallLayout, ListedPackage, ManagerProvider, PackageManager, RuntimeFamily,
};
use rtswitch_core::{
    ActiveResolution, CoreError, DiscoveryScanner, HomeCandidate, InstallOutcome, MutationDriver,
    Probe, ReplaceOutcome, SwitchOutcome, activate_home, annotate_versions, normalize,
    other_variant_dirs, validate_home,
};
use rtswitch_env::{EnvironmentSynchronizer, ShellType, is_within, shell_export};
use rtswitch_platform::{EnvStore, Scope};
use rtswitch_scoop::parse_installed_packages;

use crate::cli::{Action, Request};
use crate::error::AppError;
use crate::menu::Menu;
use crate::report;
use crate::settings::Settings;

pub struct App {
    settings: Settings,
    provider: Box<dyn ManagerProvider>,
    env: Box<dyn EnvStore>,
    manager: Option<Box<dyn PackageManager>>,
}

/// Detect the package manager, bootstrapping it when absent.
async fn connect<R: BufRead, W: Write>(
    provider: &dyn ManagerProvider,
    menu: &mut Menu<R, W>,
) -> Result<Box<dyn PackageManager>, AppError> {
    let mut detection = provider.detect().await;

    if !detection.found {
        menu.say(format!(
            "{} was not found, installing it...",
            provider.display_name()
        ))?;
        provider.install_manager().await.map_err(|error| {
            AppError::manager_unavailable(provider.display_name(), error.to_string())
        })?;

        detection = provider.detect().await;
        if !detection.found {
            return Err(AppError::manager_unavailable(
                provider.display_name(),
                "the installer finished but no executable was found",
            ));
        }
    }

    info!(
        "Using {} {} at {:?}",
        provider.display_name(),
        detection.version.as_deref().unwrap_or("(unknown version)"),
        detection.path
    );
    Ok(provider.create_manager(&detection))
}

async fn ensure_manager<'m, R: BufRead, W: Write>(
    slot: &'m mut Option<Box<dyn PackageManager>>,
    provider: &dyn ManagerProvider,
    menu: &mut Menu<R, W>,
) -> Result<&'m dyn PackageManager, AppError> {
    let manager = match slot.take() {
        Some(manager) => manager,
        None => connect(provider, menu).await?,
    };
    Ok(&**slot.insert(manager))
}

/// First identifier for `raw` that `is_present` accepts, trying the raw
/// input last.
fn resolve_present(
    family: RuntimeFamily,
    raw: &str,
    is_present: impl Fn(&str) -> bool,
) -> Result<String, CoreError> {
    let candidates = normalize(family, raw);
    candidates
        .iter()
        .chain(std::iter::once(raw.trim()))
        .find(|id| !id.is_empty() && is_present(id))
        .map(ToString::to_string)
        .ok_or_else(|| CoreError::NotInstalled {
            id: candidates.primary().to_string(),
        })
}

async fn load_listing(manager: &dyn PackageManager) -> Option<BTreeMap<String, ListedPackage>> {
    match manager.list_installed_packages().await {
        Ok(raw) => Some(parse_installed_packages(&raw, manager.layout())),
        Err(error) => {
            warn!("Could not read the package listing: {error}");
            None
        }
    }
}

fn finish_install<R: BufRead, W: Write>(
    outcome: &InstallOutcome,
    menu: &mut Menu<R, W>,
) -> Result<(), AppError> {
    menu.say_all(report::install_lines(outcome))?;
    match outcome {
        InstallOutcome::Installed { .. } => Ok(()),
        InstallOutcome::NoCandidateSucceeded { input, attempts } => {
            Err(AppError::NoCandidateSucceeded {
                input: input.clone(),
                tried: attempts
                    .iter()
                    .map(|attempt| attempt.id.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
        }
    }
}

fn finish_switch<R: BufRead, W: Write>(
    outcome: &SwitchOutcome,
    menu: &mut Menu<R, W>,
) -> Result<(), AppError> {
    let lines = report::switch_lines(outcome);
    match outcome {
        SwitchOutcome::Switched { .. } => Ok(menu.say_all(lines)?),
        SwitchOutcome::SwitchFailed { .. } => Err(AppError::OperationFailed(lines.join("\n"))),
    }
}

async fn run_family_action<R: BufRead, W: Write>(
    driver: &MutationDriver<'_>,
    manager: &dyn PackageManager,
    env: &dyn EnvStore,
    family: RuntimeFamily,
    action: Action,
    menu: &mut Menu<R, W>,
) -> Result<(), AppError> {
    match action {
        Action::Install { version } => {
            menu.say(format!(
                "Installing {} {version}...",
                family.display_name()
            ))?;
            let outcome = driver.install_version(family, &version).await?;
            finish_install(&outcome, menu)
        }
        Action::Switch { version } => {
            let probe = driver.probe();
            let id = resolve_present(family, &version, |id| {
                probe.installed_variant(family, id).is_some()
            })?;
            let outcome = driver.switch(family, &id).await?;
            finish_switch(&outcome, menu)
        }
        Action::Uninstall { version } => {
            let layout = manager.layout();
            let id = resolve_present(family, &version, |id| {
                InstallLayout::is_package_id(id) && layout.app_dir(id).is_dir()
            })?;
            if !family.owns(&id) {
                return Err(CoreError::WrongFamily { id, family }.into());
            }
            menu.say(format!("Uninstalling {id}..."))?;
            let outcome = driver.uninstall(family, &id).await?;
            menu.say_all(report::uninstall_lines(&outcome))?;
            Ok(())
        }
        Action::Use { version } => {
            menu.say(format!(
                "Changing {} to {version}...",
                family.display_name()
            ))?;
            match driver.replace(family, &version).await? {
                ReplaceOutcome::Switched(outcome) => finish_switch(&outcome, menu),
                ReplaceOutcome::Reinstalled { removed, install } => {
                    for outcome in &removed {
                        menu.say_all(report::uninstall_lines(outcome))?;
                    }
                    finish_install(&install, menu)
                }
            }
        }
        Action::Status => status(manager, env, family, menu).await,
        Action::List => list(manager, env, family, menu).await,
    }
}

async fn status<R: BufRead, W: Write>(
    manager: &dyn PackageManager,
    env: &dyn EnvStore,
    family: RuntimeFamily,
    menu: &mut Menu<R, W>,
) -> Result<(), AppError> {
    let info = manager.info();
    menu.say(format!(
        "{} {} ({}), root {}",
        info.name,
        info.version.as_deref().unwrap_or("(unknown version)"),
        info.path.display(),
        manager.layout().root().display()
    ))?;

    let probe = Probe::new(manager.layout(), env);
    let resolution = probe.resolve_active(family)?;
    menu.say(report::active_line(family, &resolution))?;

    let sync = EnvironmentSynchronizer::new(env);
    if let Some(name) = family.home_variable() {
        let value = sync.variable(Scope::User, name)?;
        menu.say(format!("{name}: {}", value.as_deref().unwrap_or("(unset)")))?;
    }

    let mut variants = probe.list_installed(family)?;
    let listing = load_listing(manager).await;
    if let Some(listing) = &listing {
        annotate_versions(&mut variants, listing);
    }
    menu.say(format!("Installed: {}", variants.len()))?;
    menu.say_all(report::variant_lines(&variants))?;

    if let ActiveResolution::Managed(active) = &resolution {
        let preferred = active.executable_dir().to_string_lossy();
        let conflicts = sync.detect_conflicts(family, &preferred)?;
        menu.say_all(report::conflict_lines(&conflicts))?;
    }

    if let Some(listing) = &listing {
        let reconciliation = probe.reconcile(family, listing);
        if !reconciliation.is_consistent() {
            debug!("Reconciliation for {family}: {reconciliation:?}");
        }
        menu.say_all(report::reconciliation_lines(&reconciliation))?;
    }

    Ok(())
}

async fn list<R: BufRead, W: Write>(
    manager: &dyn PackageManager,
    env: &dyn EnvStore,
    family: RuntimeFamily,
    menu: &mut Menu<R, W>,
) -> Result<(), AppError> {
    let mut variants = Probe::new(manager.layout(), env).list_installed(family)?;
    if variants.is_empty() {
        menu.say(format!("No {} versions installed", family.display_name()))?;
        return Ok(());
    }

    if let Some(listing) = load_listing(manager).await {
        annotate_versions(&mut variants, &listing);
    }
    menu.say_all(report::variant_lines(&variants))?;
    Ok(())
}

/// Let the user pick a discovered home or type one in.
fn pick_home<R: BufRead, W: Write>(
    family: RuntimeFamily,
    candidates: &[HomeCandidate],
    force: bool,
    menu: &mut Menu<R, W>,
) -> Result<Option<PathBuf>, AppError> {
    let mut options: Vec<String> = candidates.iter().map(|c| c.label.clone()).collect();
    options.push("Enter a path".to_string());

    let title = format!("Select a {} home", family.display_name());
    let Some(choice) = menu.choose(&title, &options, "Cancel")? else {
        return Ok(None);
    };
    if let Some(candidate) = candidates.get(choice) {
        return Ok(Some(candidate.path.clone()));
    }

    let Some(entered) = menu.prompt(&format!("Path to the {} home", family.display_name()))?
    else {
        return Ok(None);
    };
    let path = PathBuf::from(entered);
    match validate_home(family, &path) {
        Ok(path) => Ok(Some(path)),
        Err(error) => {
            menu.say(error.to_string())?;
            if force || menu.confirm("Use it anyway?")? {
                warn!("Using unvalidated home {}", path.display());
                Ok(Some(path))
            } else {
                Ok(None)
            }
        }
    }
}

impl App {
    pub fn new(
        settings: Settings,
        provider: Box<dyn ManagerProvider>,
        env: Box<dyn EnvStore>,
    ) -> Self {
        Self {
            settings,
            provider,
            env,
            manager: None,
        }
    }

    pub async fn run<R: BufRead, W: Write>(
        &mut self,
        request: Request,
        menu: &mut Menu<R, W>,
    ) -> Result<(), AppError> {
        debug!("Running {request:?}");
        match request {
            Request::Family(family, action) => {
                let manager =
                    ensure_manager(&mut self.manager, self.provider.as_ref(), menu).await?;
                let env = self.env.as_ref();
                let driver = MutationDriver::new(manager, env)
                    .with_auto_add_buckets(self.settings.auto_add_buckets);
                run_family_action(&driver, manager, env, family, action, menu).await
            }
            Request::Home {
                family,
                path,
                force,
            } => self.set_home(family, path, force, menu).await,
            Request::Env(shell) => self.print_env(shell.unwrap_or_else(ShellType::detect), menu),
        }
    }

    fn print_env<R: BufRead, W: Write>(
        &self,
        shell: ShellType,
        menu: &mut Menu<R, W>,
    ) -> Result<(), AppError> {
        let snippet = shell_export(self.env.as_ref(), shell)?;
        if snippet.is_empty() {
            menu.say(format!(
                "# no rtswitch environment stored ({})",
                shell.name()
            ))?;
        } else {
            menu.say(snippet.trim_end())?;
        }
        Ok(())
    }

    /// Uses the package manager's installs when it is present, without
    /// bootstrapping it.
    async fn set_home<R: BufRead, W: Write>(
        &mut self,
        family: RuntimeFamily,
        path: Option<PathBuf>,
        force: bool,
        menu: &mut Menu<R, W>,
    ) -> Result<(), AppError> {
        if self.manager.is_none() {
            let detection = self.provider.detect().await;
            if detection.found {
                self.manager = Some(self.provider.create_manager(&detection));
            }
        }
        let layout = self.manager.as_ref().map(|manager| manager.layout().clone());

        let mut scanner = DiscoveryScanner::new(family)
            .with_extra_roots(self.settings.extra_home_roots.clone());
        if !self.settings.scan_system_homes {
            scanner = scanner.with_system_roots(Vec::new());
        }
        if let Some(layout) = &layout {
            scanner = scanner.with_layout(layout.clone());
        }
        let candidates = scanner.scan();

        let home = match path {
            Some(path) => match validate_home(family, &path) {
                Ok(path) => path,
                Err(error) if force => {
                    warn!("Using unvalidated home {}: {error}", path.display());
                    menu.say(format!("Warning: {error}"))?;
                    path
                }
                Err(error) => return Err(error.into()),
            },
            None => match pick_home(family, &candidates, force, menu)? {
                Some(home) => home,
                None => {
                    menu.say("No home selected")?;
                    return Ok(());
                }
            },
        };

        let stale_dirs = match &layout {
            Some(layout) => {
                let variants = Probe::new(layout, self.env.as_ref()).list_installed(family)?;
                let keep = variants
                    .iter()
                    .find(|variant| is_within(&home, &layout.app_dir(&variant.id)))
                    .map(|variant| variant.id.as_str());
                other_variant_dirs(layout, &variants, keep)
            }
            None => Vec::new(),
        };

        let sync = activate_home(self.env.as_ref(), family, &home, &stale_dirs)?;
        match family.home_variable() {
            Some(name) => menu.say(format!("{name} set to {}", home.display()))?,
            None => menu.say(format!("Using {}", home.display()))?,
        }
        menu.say_all(report::sync_lines(&sync))?;

        if !candidates.iter().any(|candidate| candidate.path == home) {
            self.remember_home_root(&home);
        }
        Ok(())
    }

    fn remember_home_root(&mut self, home: &Path) {
        let Some(root) = home.parent() else {
            return;
        };
        if self.settings.remember_home_root(root) {
            info!("Remembering {} as a home root", root.display());
            if let Err(error) = self.settings.save() {
                warn!("Failed to save settings: {error}");
            }
        }
    }

    /// Numbered family menu, then action menu, until the user exits.
    pub async fn interactive<R: BufRead, W: Write>(
        &mut self,
        menu: &mut Menu<R, W>,
    ) -> Result<(), AppError> {
        let families: Vec<String> = RuntimeFamily::ALL
            .iter()
            .map(|family| family.display_name().to_string())
            .collect();

        while let Some(choice) = menu.choose("Select a runtime", &families, "Exit")? {
            let family = RuntimeFamily::ALL[choice];
            self.family_menu(family, menu).await?;
        }
        Ok(())
    }

    async fn family_menu<R: BufRead, W: Write>(
        &mut self,
        family: RuntimeFamily,
        menu: &mut Menu<R, W>,
    ) -> Result<(), AppError> {
        let mut actions = vec![
            "Install a version".to_string(),
            "Change version".to_string(),
            "Switch to an installed version".to_string(),
            "Uninstall a version".to_string(),
            "Status".to_string(),
            "List installed versions".to_string(),
        ];
        if let Some(name) = family.home_variable() {
            actions.push(format!("Set {name}"));
        }

        let title = format!("{} actions", family.display_name());
        while let Some(choice) = menu.choose(&title, &actions, "Back")? {
            let Some(request) = self.request_for(family, choice, menu).await? else {
                continue;
            };
            match self.run(request, menu).await {
                Ok(()) => {}
                Err(error @ AppError::ManagerUnavailable { .. }) => return Err(error),
                Err(error) => {
                    warn!("{error}");
                    menu.say(format!("Error: {error}"))?;
                }
            }
        }
        Ok(())
    }

    async fn request_for<R: BufRead, W: Write>(
        &mut self,
        family: RuntimeFamily,
        choice: usize,
        menu: &mut Menu<R, W>,
    ) -> Result<Option<Request>, AppError> {
        let action = match choice {
            0 => menu
                .prompt("Version")?
                .map(|version| Action::Install { version }),
            1 => menu.prompt("Version")?.map(|version| Action::Use { version }),
            2 => self
                .pick_installed(family, menu)
                .await?
                .map(|version| Action::Switch { version }),
            3 => self
                .pick_installed(family, menu)
                .await?
                .map(|version| Action::Uninstall { version }),
            4 => Some(Action::Status),
            5 => Some(Action::List),
            _ => {
                return Ok(Some(Request::Home {
                    family,
                    path: None,
                    force: false,
                }));
            }
        };
        Ok(action.map(|action| Request::Family(family, action)))
    }

    async fn pick_installed<R: BufRead, W: Write>(
        &mut self,
        family: RuntimeFamily,
        menu: &mut Menu<R, W>,
    ) -> Result<Option<String>, AppError> {
        let manager = ensure_manager(&mut self.manager, self.provider.as_ref(), menu).await?;
        let variants = Probe::new(manager.layout(), self.env.as_ref()).list_installed(family)?;
        if variants.is_empty() {
            menu.say(format!("No {} versions installed", family.display_name()))?;
            return Ok(None);
        }

        let ids: Vec<String> = variants.iter().map(|variant| variant.id.clone()).collect();
        let options = report::variant_lines(&variants);
        Ok(menu
            .choose("Installed versions", &options, "Back")?
            .map(|choice| ids[choice].clone()))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::io::Cursor;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use rtswitch_backend::{
        BackendError, CommandStatus, InstallLayout, ManagerDetection, ManagerInfo,
        ManagerProvider, PackageManager, RuntimeFamily,
    };
    use rtswitch_platform::{EnvStore, MemoryEnvStore, Scope};
    use tempfile::TempDir;

    use super::App;
    use crate::cli::{Action, Request};
    use crate::error::AppError;
    use crate::menu::Menu;
    use crate::settings::Settings;

    type TestMenu = Menu<Cursor<Vec<u8>>, Vec<u8>>;

    fn menu(input: &str) -> TestMenu {
        Menu::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    fn output(menu: TestMenu) -> String {
        String::from_utf8(menu.into_output()).expect("utf8 output")
    }

    fn family_of(id: &str) -> RuntimeFamily {
        RuntimeFamily::ALL
            .into_iter()
            .find(|family| family.owns(id))
            .expect("id belongs to a family")
    }

    fn place_install(layout: &InstallLayout, id: &str) {
        let family = family_of(id);
        let current = layout.current_dir(id);
        let dir = if family == RuntimeFamily::Java {
            current.join("bin")
        } else {
            current
        };
        std::fs::create_dir_all(&dir).expect("create install dir");
        std::fs::write(dir.join(family.executable()), b"").expect("write executable");
    }

    struct FakeManager {
        info: ManagerInfo,
        layout: InstallLayout,
        available: Vec<String>,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl PackageManager for FakeManager {
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
            Ok(["main", "versions", "java"]
                .into_iter()
                .map(ToString::to_string)
                .collect())
        }

        async fn add_bucket(&self, _name: &str) -> Result<(), BackendError> {
            Ok(())
        }

        async fn install_package(&self, id: &str) -> Result<CommandStatus, BackendError> {
            self.calls
                .lock()
                .expect("calls lock")
                .push(format!("install {id}"));
            if self.available.iter().any(|known| known == id) {
                place_install(&self.layout, id);
                Ok(CommandStatus::success())
            } else {
                Ok(CommandStatus::with_code(1)
                    .with_output("", format!("Couldn't find manifest for '{id}'.")))
            }
        }

        async fn uninstall_package(&self, id: &str) -> Result<CommandStatus, BackendError> {
            self.calls
                .lock()
                .expect("calls lock")
                .push(format!("uninstall {id}"));
            std::fs::remove_dir_all(self.layout.app_dir(id))?;
            Ok(CommandStatus::success())
        }

        async fn activate_package(&self, id: &str) -> Result<CommandStatus, BackendError> {
            self.calls
                .lock()
                .expect("calls lock")
                .push(format!("reset {id}"));
            Ok(CommandStatus::success())
        }

        async fn list_installed_packages(&self) -> Result<String, BackendError> {
            Ok(String::new())
        }
    }

    struct FakeProvider {
        root: PathBuf,
        installed: AtomicBool,
        bootstrap_works: bool,
        available: Vec<String>,
    }

    impl FakeProvider {
        fn new(root: &Path, installed: bool, available: &[&str]) -> Self {
            Self {
                root: root.to_path_buf(),
                installed: AtomicBool::new(installed),
                bootstrap_works: true,
                available: available.iter().map(ToString::to_string).collect(),
            }
        }
    }

    #[async_trait]
    impl ManagerProvider for FakeProvider {
        fn name(&self) -> &'static str {
            "scoop"
        }

        fn display_name(&self) -> &'static str {
            "Scoop"
        }

        async fn detect(&self) -> ManagerDetection {
            let found = self.installed.load(Ordering::SeqCst);
            ManagerDetection {
                found,
                path: found.then(|| self.root.join("shims").join("scoop")),
                version: Some("0.5.2".to_string()),
                in_path: found,
                root: Some(self.root.clone()),
            }
        }

        async fn install_manager(&self) -> Result<(), BackendError> {
            if self.bootstrap_works {
                self.installed.store(true, Ordering::SeqCst);
                Ok(())
            } else {
                Err(BackendError::network("downloading installer", "offline"))
            }
        }

        fn create_manager(&self, _detection: &ManagerDetection) -> Box<dyn PackageManager> {
            Box::new(FakeManager {
                info: ManagerInfo {
                    name: "scoop",
                    path: self.root.join("shims").join("scoop"),
                    version: Some("0.5.2".to_string()),
                    in_path: true,
                },
                layout: InstallLayout::new(&self.root),
                available: self.available.clone(),
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    fn app(provider: FakeProvider) -> App {
        App::new(
            Settings {
                scan_system_homes: false,
                ..Settings::default()
            },
            Box::new(provider),
            Box::new(MemoryEnvStore::new()),
        )
    }

    fn user_path(app: &App) -> String {
        app.env
            .read(Scope::User, "PATH")
            .expect("read PATH")
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn failed_bootstrap_is_manager_unavailable() {
        let temp = TempDir::new().expect("create temp dir");
        let mut provider = FakeProvider::new(temp.path(), false, &[]);
        provider.bootstrap_works = false;
        let mut app = app(provider);
        let mut menu = menu("");

        let error = app
            .run(Request::Family(RuntimeFamily::Php, Action::Status), &mut menu)
            .await
            .expect_err("manager should be unavailable");

        assert!(matches!(error, AppError::ManagerUnavailable { .. }));
        assert_eq!(error.exit_code(), 2);
        assert!(output(menu).contains("Scoop was not found, installing it..."));
    }

    #[tokio::test]
    async fn install_bootstraps_manager_and_activates_variant() {
        let temp = TempDir::new().expect("create temp dir");
        let mut app = app(FakeProvider::new(temp.path(), false, &["php82"]));
        let mut menu = menu("");

        app.run(
            Request::Family(
                RuntimeFamily::Php,
                Action::Install {
                    version: "8.2".to_string(),
                },
            ),
            &mut menu,
        )
        .await
        .expect("install succeeds");

        let current = InstallLayout::new(temp.path()).current_dir("php82");
        assert!(user_path(&app).starts_with(current.to_string_lossy().as_ref()));
        assert!(output(menu).contains("Installed php82"));
    }

    #[tokio::test]
    async fn exhausted_candidates_exit_with_three_and_echo_input() {
        let temp = TempDir::new().expect("create temp dir");
        let mut app = app(FakeProvider::new(temp.path(), true, &[]));
        let mut menu = menu("");

        let error = app
            .run(
                Request::Family(
                    RuntimeFamily::Java,
                    Action::Install {
                        version: "8".to_string(),
                    },
                ),
                &mut menu,
            )
            .await
            .expect_err("nothing can be installed");

        assert_eq!(error.exit_code(), 3);
        assert_eq!(
            error.to_string(),
            "Could not install '8' (tried openjdk8, temurin8-jdk, ojdkbuild8, zulujdk8)"
        );
        assert!(output(menu).contains("zulujdk8 failed"));
    }

    #[tokio::test]
    async fn use_replaces_installed_variant() {
        let temp = TempDir::new().expect("create temp dir");
        let layout = InstallLayout::new(temp.path());
        place_install(&layout, "nodejs18");
        let mut app = app(FakeProvider::new(temp.path(), true, &["nodejs20"]));
        let mut menu = menu("");

        app.run(
            Request::Family(
                RuntimeFamily::Node,
                Action::Use {
                    version: "20".to_string(),
                },
            ),
            &mut menu,
        )
        .await
        .expect("replace succeeds");

        assert!(!layout.app_dir("nodejs18").exists());
        let text = output(menu);
        assert!(text.contains("Uninstalled nodejs18"));
        assert!(text.contains("Installed nodejs20"));
    }

    #[tokio::test]
    async fn switching_to_missing_version_is_an_error() {
        let temp = TempDir::new().expect("create temp dir");
        let mut app = app(FakeProvider::new(temp.path(), true, &[]));
        let mut menu = menu("");

        let error = app
            .run(
                Request::Family(
                    RuntimeFamily::Python,
                    Action::Switch {
                        version: "3.11".to_string(),
                    },
                ),
                &mut menu,
            )
            .await
            .expect_err("python311 is not installed");

        assert_eq!(error.to_string(), "'python311' is not installed");
        assert_eq!(error.exit_code(), 1);
    }

    #[tokio::test]
    async fn uninstall_refuses_packages_of_another_family() {
        let temp = TempDir::new().expect("create temp dir");
        let layout = InstallLayout::new(temp.path());
        place_install(&layout, "openjdk21");
        let mut app = app(FakeProvider::new(temp.path(), true, &[]));
        let mut menu = menu("");

        let error = app
            .run(
                Request::Family(
                    RuntimeFamily::Php,
                    Action::Uninstall {
                        version: "openjdk21".to_string(),
                    },
                ),
                &mut menu,
            )
            .await
            .expect_err("openjdk21 is not a PHP package");

        assert_eq!(error.to_string(), "'openjdk21' is not a PHP package");
        assert!(layout.app_dir("openjdk21").exists());
        assert!(!output(menu).contains("Uninstalling"));
    }

    #[tokio::test]
    async fn uninstall_treats_paths_as_unknown_packages() {
        let temp = TempDir::new().expect("create temp dir");
        let root = temp.path().join("scoop");
        let keep = temp.path().join("keep.txt");
        std::fs::write(&keep, b"keep").expect("write file");
        place_install(&InstallLayout::new(&root), "nodejs18");
        let mut app = app(FakeProvider::new(&root, true, &[]));

        let error = app
            .run(
                Request::Family(
                    RuntimeFamily::Node,
                    Action::Uninstall {
                        version: "../..".to_string(),
                    },
                ),
                &mut menu(""),
            )
            .await
            .expect_err("../.. is not a package");

        assert!(matches!(
            error,
            AppError::Core(rtswitch_core::CoreError::NotInstalled { .. })
        ));
        assert!(keep.exists());
        assert!(root.join("apps").join("nodejs18").exists());
    }

    #[tokio::test]
    async fn home_path_is_validated_unless_forced() {
        let temp = TempDir::new().expect("create temp dir");
        let jdk = temp.path().join("jdk-21");
        std::fs::create_dir_all(&jdk).expect("create jdk dir");
        let mut app = app(FakeProvider::new(&temp.path().join("scoop"), true, &[]));

        let error = app
            .run(
                Request::Home {
                    family: RuntimeFamily::Java,
                    path: Some(jdk.clone()),
                    force: false,
                },
                &mut menu(""),
            )
            .await
            .expect_err("jdk has no bin/java");
        assert!(matches!(error, AppError::InvalidHome(_)));

        app.settings.extra_home_roots.push(temp.path().to_path_buf());
        app.run(
            Request::Home {
                family: RuntimeFamily::Java,
                path: Some(jdk.clone()),
                force: true,
            },
            &mut menu(""),
        )
        .await
        .expect("forced home is accepted");

        assert_eq!(
            app.env.read(Scope::User, "JAVA_HOME").expect("read JAVA_HOME"),
            Some(jdk.to_string_lossy().to_string())
        );
    }

    #[tokio::test]
    async fn home_menu_lists_discovered_candidates() {
        let temp = TempDir::new().expect("create temp dir");
        let jdk = temp.path().join("jvm").join("temurin-17");
        std::fs::create_dir_all(jdk.join("bin")).expect("create bin");
        std::fs::write(jdk.join("bin").join(RuntimeFamily::Java.executable()), b"")
            .expect("write java");
        let mut app = app(FakeProvider::new(&temp.path().join("scoop"), true, &[]));
        app.settings.extra_home_roots = vec![temp.path().join("jvm")];
        let mut menu = menu("1\n");

        app.run(
            Request::Home {
                family: RuntimeFamily::Java,
                path: None,
                force: false,
            },
            &mut menu,
        )
        .await
        .expect("home selected");

        let text = output(menu);
        assert!(text.contains("1. temurin-17"));
        assert!(text.contains("JAVA_HOME set to"));
        assert!(user_path(&app).starts_with(jdk.join("bin").to_string_lossy().as_ref()));
    }

    #[tokio::test]
    async fn interactive_menu_runs_status_and_exits() {
        let temp = TempDir::new().expect("create temp dir");
        let mut app = app(FakeProvider::new(temp.path(), true, &[]));
        let mut menu = menu("1\n5\n0\n0\n");

        app.interactive(&mut menu).await.expect("menu exits cleanly");

        let text = output(menu);
        assert!(text.contains("Select a runtime"));
        assert!(text.contains("PHP actions"));
        assert!(text.contains("Active PHP: none"));
        assert!(text.contains("Installed: 0"));
    }

    #[tokio::test]
    async fn interactive_errors_are_reported_and_menu_continues() {
        let temp = TempDir::new().expect("create temp dir");
        let mut app = app(FakeProvider::new(temp.path(), true, &[]));
        let mut menu = menu("2\n1\nlts\n0\n0\n");

        app.interactive(&mut menu).await.expect("menu exits cleanly");

        let text = output(menu);
        assert!(text.contains("Error: Could not install 'lts'"));
        assert!(text.contains("Python actions"));
    }

    #[tokio::test]
    async fn env_prints_stored_path() {
        let temp = TempDir::new().expect("create temp dir");
        let mut app = App::new(
            Settings::default(),
            Box::new(FakeProvider::new(temp.path(), true, &[])),
            Box::new(MemoryEnvStore::new().with(Scope::User, "PATH", "/scoop/apps/php82/current")),
        );
        let mut menu = menu("");

        app.run(
            Request::Env(Some(rtswitch_env::ShellType::Bash)),
            &mut menu,
        )
        .await
        .expect("env renders");

        assert!(output(menu).starts_with("export PATH='/scoop/apps/php82/current'"));
    }
}
