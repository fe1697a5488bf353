use log::warn;
use rtswitch_platform::AppPaths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Package-manager root used instead of `$SCOOP` / `~/scoop`.
    #[serde(default)]
    pub scoop_root: Option<PathBuf>,

    #[serde(default)]
    pub debug_logging: bool,

    #[serde(default = "default_max_log_size_bytes")]
    pub max_log_size_bytes: u64,

    #[serde(default = "default_true")]
    pub auto_add_buckets: bool,

    /// Look for runtime homes in the platform's conventional locations.
    #[serde(default = "default_true")]
    pub scan_system_homes: bool,

    /// Directories searched for runtime homes after the conventional ones.
    #[serde(default)]
    pub extra_home_roots: Vec<PathBuf>,
}

fn default_true() -> bool {
    true
}

fn default_max_log_size_bytes() -> u64 {
    5 * 1024 * 1024
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            scoop_root: None,
            debug_logging: false,
            max_log_size_bytes: default_max_log_size_bytes(),
            auto_add_buckets: true,
            scan_system_homes: true,
            extra_home_roots: Vec::new(),
        }
    }
}

impl Settings {
    pub fn load() -> Self {
        let Ok(paths) = AppPaths::new() else {
            return Self::default();
        };
        Self::load_from(&paths.settings_file())
    }

    /// Missing or unreadable files yield defaults.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|error| {
                warn!("Ignoring malformed settings {}: {error}", path.display());
                Self::default()
            }),
            Err(error) => {
                warn!("Could not read settings {}: {error}", path.display());
                Self::default()
            }
        }
    }

    pub fn save(&self) -> Result<(), std::io::Error> {
        let paths = AppPaths::new().map_err(std::io::Error::other)?;
        paths.ensure_dirs()?;
        self.save_to(&paths.settings_file())
    }

    /// Written to a sibling temp file, then renamed into place.
    pub fn save_to(&self, path: &Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self)?;
        let temp_path = path.with_extension("json.tmp");
        std::fs::write(&temp_path, content)?;
        std::fs::rename(&temp_path, path)
    }

    /// Record `root` as an extra home root. Returns whether it was new.
    pub fn remember_home_root(&mut self, root: &Path) -> bool {
        if self.extra_home_roots.iter().any(|known| known == root) {
            return false;
        }
        self.extra_home_roots.push(root.to_path_buf());
        true
    }
}
