use log::{debug, trace};
use std::path::{Path, PathBuf};

use rtswitch_backend::{InstallLayout, RuntimeFamily};
use rtswitch_env::{EnvironmentSynchronizer, SyncReport};
use rtswitch_platform::{EnvStore, EnvStoreError};

use crate::error::HomeValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HomeSource {
    PackageManager,
    System,
    Configured,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HomeCandidate {
    pub label: String,
    pub path: PathBuf,
    pub source: HomeSource,
}

/// Conventional install roots for `family` on this platform.
#[must_use]
pub fn conventional_roots(family: RuntimeFamily) -> Vec<PathBuf> {
    if family != RuntimeFamily::Java {
        return Vec::new();
    }

    let mut roots = Vec::new();

    #[cfg(windows)]
    {
        let program_files = std::env::var_os("ProgramFiles")
            .map_or_else(|| PathBuf::from(r"C:\Program Files"), PathBuf::from);
        for vendor in ["Java", "Eclipse Adoptium", "Zulu", "Microsoft", "Amazon Corretto"] {
            roots.push(program_files.join(vendor));
        }
        let program_files_x86 = std::env::var_os("ProgramFiles(x86)")
            .map_or_else(|| PathBuf::from(r"C:\Program Files (x86)"), PathBuf::from);
        roots.push(program_files_x86.join("Java"));
    }

    #[cfg(target_os = "macos")]
    {
        roots.push(PathBuf::from("/Library/Java/JavaVirtualMachines"));
        if let Some(home) = dirs::home_dir() {
            roots.push(home.join("Library/Java/JavaVirtualMachines"));
        }
    }

    #[cfg(all(unix, not(target_os = "macos")))]
    {
        for root in ["/usr/lib/jvm", "/usr/java", "/opt/java", "/opt/jdk"] {
            roots.push(PathBuf::from(root));
        }
    }

    roots
}

/// Check that `path` is a home directory for `family`.
pub fn validate_home(family: RuntimeFamily, path: &Path) -> Result<PathBuf, HomeValidationError> {
    if !path.exists() {
        return Err(HomeValidationError::NotFound {
            path: path.to_path_buf(),
        });
    }
    if !path.is_dir() {
        return Err(HomeValidationError::NotADirectory {
            path: path.to_path_buf(),
        });
    }

    let expected = path.join("bin").join(family.executable());
    if !expected.is_file() {
        return Err(HomeValidationError::MissingExecutable {
            path: path.to_path_buf(),
            expected,
        });
    }

    Ok(path.to_path_buf())
}

/// Finds home directories for a family: package-manager installs first,
/// then conventional locations, then configured extra roots.
pub struct DiscoveryScanner {
    family: RuntimeFamily,
    layout: Option<InstallLayout>,
    system_roots: Vec<PathBuf>,
    extra_roots: Vec<PathBuf>,
}

impl DiscoveryScanner {
    #[must_use]
    pub fn new(family: RuntimeFamily) -> Self {
        Self {
            family,
            layout: None,
            system_roots: conventional_roots(family),
            extra_roots: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_layout(mut self, layout: InstallLayout) -> Self {
        self.layout = Some(layout);
        self
    }

    #[must_use]
    pub fn with_system_roots(mut self, roots: Vec<PathBuf>) -> Self {
        self.system_roots = roots;
        self
    }

    #[must_use]
    pub fn with_extra_roots(mut self, roots: Vec<PathBuf>) -> Self {
        self.extra_roots = roots;
        self
    }

    #[must_use]
    pub fn scan(&self) -> Vec<HomeCandidate> {
        let mut found: Vec<(PathBuf, HomeCandidate)> = Vec::new();
        let mut push = |candidate: HomeCandidate| {
            let key = std::fs::canonicalize(&candidate.path)
                .unwrap_or_else(|_| candidate.path.clone());
            if found.iter().any(|(existing, _)| *existing == key) {
                trace!("Skipping duplicate home {}", candidate.path.display());
                return;
            }
            found.push((key, candidate));
        };

        for candidate in self.scan_layout() {
            push(candidate);
        }
        for root in &self.system_roots {
            for candidate in self.scan_root(root, HomeSource::System) {
                push(candidate);
            }
        }
        for root in &self.extra_roots {
            for candidate in self.scan_root(root, HomeSource::Configured) {
                push(candidate);
            }
        }

        debug!(
            "Discovered {} {} home candidate(s)",
            found.len(),
            self.family.display_name()
        );
        found.into_iter().map(|(_, candidate)| candidate).collect()
    }

    fn scan_layout(&self) -> Vec<HomeCandidate> {
        let Some(layout) = &self.layout else {
            return Vec::new();
        };
        let Ok(entries) = std::fs::read_dir(layout.apps_dir()) else {
            return Vec::new();
        };

        let mut ids: Vec<String> = entries
            .flatten()
            .map(|entry| entry.file_name().to_string_lossy().to_string())
            .filter(|id| self.family.owns(id))
            .collect();
        ids.sort();

        ids.into_iter()
            .filter_map(|id| {
                let path = layout.current_dir(&id);
                validate_home(self.family, &path).ok()?;
                Some(HomeCandidate {
                    label: format!("{id} (scoop)"),
                    path,
                    source: HomeSource::PackageManager,
                })
            })
            .collect()
    }

    /// The root itself, its children, and `Contents/Home` bundles below them.
    fn scan_root(&self, root: &Path, source: HomeSource) -> Vec<HomeCandidate> {
        let mut dirs = vec![root.to_path_buf()];
        if let Ok(entries) = std::fs::read_dir(root) {
            let mut children: Vec<PathBuf> = entries
                .flatten()
                .map(|entry| entry.path())
                .filter(|path| path.is_dir())
                .collect();
            children.sort();
            dirs.extend(children);
        }

        dirs.into_iter()
            .flat_map(|dir| [dir.join("Contents").join("Home"), dir])
            .filter(|dir| validate_home(self.family, dir).is_ok())
            .map(|path| HomeCandidate {
                label: label_for(&path),
                path,
                source,
            })
            .collect()
    }
}

fn label_for(path: &Path) -> String {
    let name = if path.ends_with("Contents/Home") {
        path.parent().and_then(Path::parent)
    } else {
        Some(path)
    }
    .and_then(Path::file_name)
    .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().to_string());
    format!("{name} ({})", path.display())
}

/// Point the family at a hand-picked home: `bin` goes first on `PATH` and the
/// home variable is set. `stale_dirs` are removed from `PATH`.
pub fn activate_home(
    env: &dyn EnvStore,
    family: RuntimeFamily,
    home: &Path,
    stale_dirs: &[PathBuf],
) -> Result<SyncReport, EnvStoreError> {
    let sync = EnvironmentSynchronizer::new(env);
    let plan = sync.plan_activation(family, &home.join("bin"), Some(home), stale_dirs)?;
    debug!("Home activation plan:\n{}", plan.diff_preview());
    sync.apply(&plan)
}

#[cfg(test)]
mod tests {
    use rtswitch_platform::{MemoryEnvStore, Scope};

    use super::*;

    fn make_home(path: &Path) {
        let bin = path.join("bin");
        std::fs::create_dir_all(&bin).expect("create bin dir");
        std::fs::write(bin.join(RuntimeFamily::Java.executable()), b"").expect("write java");
    }

    #[test]
    fn validate_home_requires_bin_executable() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let home = temp.path().join("jdk-21");
        std::fs::create_dir_all(&home).expect("create home");

        assert!(matches!(
            validate_home(RuntimeFamily::Java, &home),
            Err(HomeValidationError::MissingExecutable { .. })
        ));

        make_home(&home);
        assert_eq!(validate_home(RuntimeFamily::Java, &home), Ok(home.clone()));
    }

    #[test]
    fn validate_home_rejects_missing_and_files() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let file = temp.path().join("jdk.zip");
        std::fs::write(&file, b"").expect("write file");

        assert!(matches!(
            validate_home(RuntimeFamily::Java, &temp.path().join("nope")),
            Err(HomeValidationError::NotFound { .. })
        ));
        assert!(matches!(
            validate_home(RuntimeFamily::Java, &file),
            Err(HomeValidationError::NotADirectory { .. })
        ));
    }

    #[test]
    fn scan_orders_sources_and_skips_invalid_dirs() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let layout = InstallLayout::new(temp.path().join("scoop"));
        make_home(&layout.current_dir("openjdk21"));
        std::fs::create_dir_all(layout.current_dir("openjdk17")).expect("create broken install");

        let system = temp.path().join("jvm");
        make_home(&system.join("java-17-openjdk"));
        std::fs::create_dir_all(system.join("not-a-jdk")).expect("create stray dir");

        let bundles = temp.path().join("JavaVirtualMachines");
        make_home(&bundles.join("temurin-21.jdk").join("Contents").join("Home"));

        let extra = temp.path().join("extra");
        make_home(&extra.join("graalvm"));

        let candidates = DiscoveryScanner::new(RuntimeFamily::Java)
            .with_layout(layout.clone())
            .with_system_roots(vec![system.clone(), bundles.clone()])
            .with_extra_roots(vec![extra.clone()])
            .scan();

        let paths: Vec<PathBuf> = candidates.iter().map(|c| c.path.clone()).collect();
        assert_eq!(
            paths,
            vec![
                layout.current_dir("openjdk21"),
                system.join("java-17-openjdk"),
                bundles.join("temurin-21.jdk").join("Contents").join("Home"),
                extra.join("graalvm"),
            ]
        );
        assert_eq!(candidates[0].source, HomeSource::PackageManager);
        assert_eq!(candidates[3].source, HomeSource::Configured);
        assert!(candidates[2].label.starts_with("temurin-21.jdk"));
    }

    #[test]
    fn scan_deduplicates_by_canonical_path() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let root = temp.path().join("jvm");
        make_home(&root.join("jdk"));

        let candidates = DiscoveryScanner::new(RuntimeFamily::Java)
            .with_system_roots(vec![root.clone()])
            .with_extra_roots(vec![root.join(".").join("jdk"), root.clone()])
            .scan();

        assert_eq!(candidates.len(), 1);
    }

    #[test]
    fn non_java_families_have_no_conventional_roots() {
        assert!(conventional_roots(RuntimeFamily::Node).is_empty());
    }

    #[test]
    fn activate_home_sets_path_and_home_variable() {
        let store = MemoryEnvStore::new().with(Scope::User, "PATH", "/usr/bin");

        let report = activate_home(&store, RuntimeFamily::Java, Path::new("/opt/jdk-21"), &[])
            .expect("activate");

        assert_eq!(report.changes.len(), 2);
        assert_eq!(
            store.get(Scope::Process, "JAVA_HOME"),
            Some("/opt/jdk-21".to_string())
        );
        let user_path = store.get(Scope::User, "PATH").expect("user PATH");
        let bin = Path::new("/opt/jdk-21").join("bin");
        assert!(user_path.starts_with(bin.to_string_lossy().as_ref()));
    }
}
