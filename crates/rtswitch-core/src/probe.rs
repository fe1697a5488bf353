use log::{debug, trace};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rtswitch_backend::{InstallLayout, ListedPackage, RuntimeFamily};
use rtswitch_env::{PathList, entry_key, is_within};
use rtswitch_platform::{EnvStore, EnvStoreError, Scope};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledVariant {
    pub id: String,
    /// The `current` marker directory.
    pub install_path: PathBuf,
    pub executable: PathBuf,
    pub active: bool,
    /// Version reported by the package manager's listing, display only.
    pub version: Option<String>,
}

impl InstalledVariant {
    /// Directory holding the executable, the entry that goes on `PATH`.
    #[must_use]
    pub fn executable_dir(&self) -> &Path {
        self.executable.parent().unwrap_or(&self.install_path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActiveResolution {
    Managed(InstalledVariant),
    /// The executable resolves, but not into a managed install.
    Unmanaged(PathBuf),
    Absent,
}

/// Differences between what is on disk and what the package manager lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    pub listed_but_missing: Vec<String>,
    pub present_but_unlisted: Vec<String>,
    pub failed_installs: Vec<String>,
}

impl Reconciliation {
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.listed_but_missing.is_empty()
            && self.present_but_unlisted.is_empty()
            && self.failed_installs.is_empty()
    }
}

/// Reads the `path = "..."` target out of a Scoop `.shim` descriptor.
#[must_use]
pub fn parse_shim_descriptor(content: &str) -> Option<PathBuf> {
    content.lines().find_map(|line| {
        let (key, value) = line.split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("path") {
            return None;
        }
        let value = value.trim().trim_matches('"').trim();
        (!value.is_empty()).then(|| PathBuf::from(value))
    })
}

/// The descriptor sitting next to a shim launcher, if any.
#[must_use]
pub fn read_shim_target(launcher: &Path) -> Option<PathBuf> {
    let descriptor = launcher.with_extension("shim");
    let content = std::fs::read_to_string(&descriptor).ok()?;
    parse_shim_descriptor(&content)
}

/// Filesystem and search-path view of what is installed and active.
///
/// Nothing is cached: every call re-reads the disk and the process `PATH`.
pub struct Probe<'a> {
    layout: &'a InstallLayout,
    env: &'a dyn EnvStore,
}

impl<'a> Probe<'a> {
    #[must_use]
    pub fn new(layout: &'a InstallLayout, env: &'a dyn EnvStore) -> Self {
        Self { layout, env }
    }

    #[must_use]
    pub fn layout(&self) -> &InstallLayout {
        self.layout
    }

    /// `id` as a valid install: its `current` marker exists and holds the
    /// family executable.
    #[must_use]
    pub fn installed_variant(&self, family: RuntimeFamily, id: &str) -> Option<InstalledVariant> {
        let install_path = self.layout.current_dir(id);
        if !install_path.is_dir() {
            return None;
        }

        let executable = family
            .executable_subpaths()
            .into_iter()
            .map(|sub| install_path.join(sub))
            .find(|candidate| candidate.is_file())?;

        Some(InstalledVariant {
            id: id.to_string(),
            install_path,
            executable,
            active: false,
            version: None,
        })
    }

    fn owned_app_ids(&self, family: RuntimeFamily) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(self.layout.apps_dir()) else {
            return Vec::new();
        };
        let mut ids: Vec<String> = entries
            .flatten()
            .filter(|entry| entry.file_type().is_ok_and(|kind| kind.is_dir()))
            .map(|entry| entry.file_name().to_string_lossy().to_string())
            .filter(|id| family.owns(id))
            .collect();
        ids.sort();
        ids
    }

    /// Catalog identifiers first, then owned identifiers outside the
    /// catalog.
    fn candidate_ids(&self, family: RuntimeFamily) -> Vec<String> {
        let mut ids: Vec<String> = family
            .known_packages()
            .iter()
            .map(ToString::to_string)
            .collect();
        for id in self.owned_app_ids(family) {
            if !ids.iter().any(|known| known.eq_ignore_ascii_case(&id)) {
                ids.push(id);
            }
        }
        ids
    }

    fn enumerate(&self, family: RuntimeFamily) -> Vec<InstalledVariant> {
        self.candidate_ids(family)
            .iter()
            .filter_map(|id| self.installed_variant(family, id))
            .collect()
    }

    /// Installed variants with the active one flagged.
    pub fn list_installed(
        &self,
        family: RuntimeFamily,
    ) -> Result<Vec<InstalledVariant>, EnvStoreError> {
        let mut variants = self.enumerate(family);
        if variants.is_empty() {
            return Ok(variants);
        }

        if let ActiveResolution::Managed(active) = self.resolve_in(family, &variants)? {
            for variant in &mut variants {
                variant.active = variant.id == active.id;
            }
        }
        debug!(
            "Found {} installed {} variant(s)",
            variants.len(),
            family.display_name()
        );
        Ok(variants)
    }

    pub fn active_variant(
        &self,
        family: RuntimeFamily,
    ) -> Result<Option<InstalledVariant>, EnvStoreError> {
        Ok(match self.resolve_active(family)? {
            ActiveResolution::Managed(variant) => Some(variant),
            ActiveResolution::Unmanaged(_) | ActiveResolution::Absent => None,
        })
    }

    pub fn resolve_active(&self, family: RuntimeFamily) -> Result<ActiveResolution, EnvStoreError> {
        let variants = self.enumerate(family);
        self.resolve_in(family, &variants)
    }

    fn resolve_in(
        &self,
        family: RuntimeFamily,
        variants: &[InstalledVariant],
    ) -> Result<ActiveResolution, EnvStoreError> {
        let Some(resolved) = self.resolve_executable(family)? else {
            return Ok(ActiveResolution::Absent);
        };
        trace!("{} resolves to {}", family.executable(), resolved.display());

        let matched = variants
            .iter()
            .find(|variant| is_within(&resolved, &self.layout.app_dir(&variant.id)));

        Ok(match matched {
            Some(variant) => ActiveResolution::Managed(InstalledVariant {
                active: true,
                ..variant.clone()
            }),
            None => ActiveResolution::Unmanaged(resolved),
        })
    }

    /// First hit for the family executable along the process `PATH`, with
    /// Scoop shims followed to their target.
    fn resolve_executable(&self, family: RuntimeFamily) -> Result<Option<PathBuf>, EnvStoreError> {
        let search_path = self
            .env
            .read_expanded(Scope::Process, "PATH")?
            .map(|value| PathList::parse(&value))
            .unwrap_or_default();
        let exe = family.executable();
        let shims_key = entry_key(&self.layout.shims_dir().to_string_lossy());

        for entry in search_path.entries() {
            let candidate = Path::new(entry).join(&exe);
            if !candidate.is_file() {
                continue;
            }
            if entry_key(entry) == shims_key {
                return Ok(Some(read_shim_target(&candidate).unwrap_or(candidate)));
            }
            return Ok(Some(candidate));
        }
        Ok(None)
    }

    /// Compare the disk with a parsed package listing.
    pub fn reconcile(
        &self,
        family: RuntimeFamily,
        listing: &BTreeMap<String, ListedPackage>,
    ) -> Reconciliation {
        let on_disk: Vec<String> = self.enumerate(family).into_iter().map(|v| v.id).collect();
        let listed: Vec<&ListedPackage> = listing
            .values()
            .filter(|package| family.owns(&package.name))
            .collect();

        let mut report = Reconciliation::default();
        for package in &listed {
            if package.failed {
                report.failed_installs.push(package.name.clone());
            } else if !on_disk.contains(&package.name) {
                report.listed_but_missing.push(package.name.clone());
            }
        }
        for id in &on_disk {
            if !listed.iter().any(|package| &package.name == id) {
                report.present_but_unlisted.push(id.clone());
            }
        }
        report
    }
}

/// Copy listed versions onto the matching variants.
pub fn annotate_versions(
    variants: &mut [InstalledVariant],
    listing: &BTreeMap<String, ListedPackage>,
) {
    for variant in variants {
        variant.version = listing
            .get(&variant.id)
            .and_then(|package| package.version.clone());
    }
}
