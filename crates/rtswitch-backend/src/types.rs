use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// On-disk layout of a package manager root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallLayout {
    root: PathBuf,
}

impl InstallLayout {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn apps_dir(&self) -> PathBuf {
        self.root.join("apps")
    }

    #[must_use]
    pub fn shims_dir(&self) -> PathBuf {
        self.root.join("shims")
    }

    #[must_use]
    pub fn buckets_dir(&self) -> PathBuf {
        self.root.join("buckets")
    }

    /// Whether `id` names a single entry directly below `apps/`.
    #[must_use]
    pub fn is_package_id(id: &str) -> bool {
        if id.contains(['/', '\\']) {
            return false;
        }
        let mut components = Path::new(id).components();
        matches!(components.next(), Some(Component::Normal(_))) && components.next().is_none()
    }

    #[must_use]
    pub fn app_dir(&self, id: &str) -> PathBuf {
        self.apps_dir().join(id)
    }

    /// Stable marker pointing at the active build of a package.
    #[must_use]
    pub fn current_dir(&self, id: &str) -> PathBuf {
        self.app_dir(id).join("current")
    }
}

/// Exit status and captured output of one package-manager invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandStatus {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandStatus {
    #[must_use]
    pub fn success() -> Self {
        Self::with_code(0)
    }

    #[must_use]
    pub fn with_code(code: i32) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    #[must_use]
    pub fn with_output(mut self, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        self.stdout = stdout.into();
        self.stderr = stderr.into();
        self
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.code == Some(0)
    }

    /// Whether either stream mentions `needle`, ignoring ASCII case.
    #[must_use]
    pub fn mentions(&self, needle: &str) -> bool {
        let needle = needle.to_ascii_lowercase();
        self.stdout.to_ascii_lowercase().contains(&needle)
            || self.stderr.to_ascii_lowercase().contains(&needle)
    }

    /// Short diagnostic: the last non-empty line of stderr, else of stdout.
    #[must_use]
    pub fn summary(&self) -> String {
        let last_line = |text: &str| {
            text.lines()
                .map(str::trim)
                .rfind(|line| !line.is_empty())
                .map(str::to_string)
        };

        last_line(&self.stderr)
            .or_else(|| last_line(&self.stdout))
            .unwrap_or_else(|| match self.code {
                Some(code) => format!("exit code {code}"),
                None => "terminated by signal".to_string(),
            })
    }
}

/// One row of the package manager's installed-packages listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListedPackage {
    pub name: String,
    pub version: Option<String>,
    pub source: Option<String>,
    pub updated: Option<chrono::NaiveDateTime>,
    pub install_path: PathBuf,
    pub failed: bool,
}
