use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use rtswitch_backend::RuntimeFamily;
use rtswitch_platform::{EnvStore, EnvStoreError, Scope};

use crate::path_list::{PathList, entry_key, is_within};
use crate::plan::{EnvironmentPlan, HomeChange};

const PATH_VAR: &str = "PATH";

/// A machine-scope `PATH` entry that also provides a family's executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathConflict {
    pub family: RuntimeFamily,
    pub entry: String,
    pub executable: PathBuf,
}

impl PathConflict {
    #[must_use]
    pub fn advisory(&self) -> String {
        if cfg!(windows) {
            format!(
                "System PATH entry {} also provides {}. Machine-scope entries are resolved \
                 before user-scope ones, so remove or reorder it in the system environment \
                 settings.",
                self.entry,
                self.executable.display()
            )
        } else {
            format!(
                "Inherited PATH entry {} also provides {}. Shells that do not load the \
                 rtswitch environment will resolve it first.",
                self.entry,
                self.executable.display()
            )
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub changes: Vec<String>,
    pub conflicts: Vec<PathConflict>,
}

/// Single owner of `PATH` and home-variable ordering rules.
pub struct EnvironmentSynchronizer<'a> {
    store: &'a dyn EnvStore,
}

impl<'a> EnvironmentSynchronizer<'a> {
    #[must_use]
    pub fn new(store: &'a dyn EnvStore) -> Self {
        Self { store }
    }

    /// Stored `PATH` for `scope`, empty when unset.
    pub fn path(&self, scope: Scope) -> Result<PathList, EnvStoreError> {
        Ok(self
            .store
            .read(scope, PATH_VAR)?
            .map(|value| PathList::parse(&value))
            .unwrap_or_default())
    }

    pub fn variable(&self, scope: Scope, name: &str) -> Result<Option<String>, EnvStoreError> {
        self.store.read(scope, name)
    }

    /// `PATH` for `scope` with `%NAME%` references resolved, for lookups on
    /// disk. Persisted values are always edited in their stored form.
    fn expanded_path(&self, scope: Scope) -> Result<PathList, EnvStoreError> {
        Ok(self
            .store
            .read_expanded(scope, PATH_VAR)?
            .map(|value| PathList::parse(&value))
            .unwrap_or_default())
    }

    /// Rebuild the process environment from persisted state: user `PATH`
    /// first, machine `PATH` after, duplicates dropped.
    pub fn refresh(&self) -> Result<(), EnvStoreError> {
        let user = self.store.read_expanded(Scope::User, PATH_VAR)?;
        let machine = self.store.read_expanded(Scope::Machine, PATH_VAR)?;

        if user.is_none() && machine.is_none() {
            debug!("No persisted PATH in any scope, keeping process PATH");
        } else {
            let user = user.map(|v| PathList::parse(&v)).unwrap_or_default();
            let machine = machine.map(|v| PathList::parse(&v)).unwrap_or_default();
            let merged = user.concat(&machine);
            debug!(
                "Refreshing process PATH: {} user + {} machine entries -> {}",
                user.entries().len(),
                machine.entries().len(),
                merged.entries().len()
            );
            self.store
                .write(Scope::Process, PATH_VAR, &merged.to_string())?;
        }

        for name in RuntimeFamily::ALL
            .iter()
            .filter_map(|family| family.home_variable())
        {
            let persisted = match self.store.read_expanded(Scope::User, name)? {
                Some(value) => Some(value),
                None => self.store.read_expanded(Scope::Machine, name)?,
            };
            match persisted {
                Some(value) => self.store.write(Scope::Process, name, &value)?,
                None => self.store.remove(Scope::Process, name)?,
            }
        }

        Ok(())
    }

    /// Put `dir` at the front of the user `PATH`, removing earlier
    /// occurrences.
    pub fn persist_path_prepend(&self, dir: &Path) -> Result<(), EnvStoreError> {
        let mut path = self.path(Scope::User)?;
        let entry = dir.to_string_lossy();
        path.prepend(&entry);
        info!("Persisting user PATH with {entry} first");
        self.store.write(Scope::User, PATH_VAR, &path.to_string())?;
        self.store.announce_change();
        Ok(())
    }

    pub fn persist_variable(&self, name: &str, value: &str) -> Result<(), EnvStoreError> {
        info!("Persisting user variable {name}={value}");
        self.store.write(Scope::User, name, value)?;
        self.store.announce_change();
        Ok(())
    }

    pub fn remove_variable(&self, name: &str) -> Result<(), EnvStoreError> {
        info!("Removing user variable {name}");
        self.store.remove(Scope::User, name)?;
        self.store.announce_change();
        Ok(())
    }

    /// Plan making `exe_dir` the family's first `PATH` hit, removing entries
    /// into `stale_dirs` and pointing the home variable at `home`.
    pub fn plan_activation(
        &self,
        family: RuntimeFamily,
        exe_dir: &Path,
        home: Option<&Path>,
        stale_dirs: &[PathBuf],
    ) -> Result<EnvironmentPlan, EnvStoreError> {
        let mut plan = EnvironmentPlan::new(family, self.path(Scope::User)?);

        for dir in stale_dirs {
            plan.drop_entries_within(dir);
        }
        plan.prefer(exe_dir);

        if let (Some(name), Some(home)) = (family.home_variable(), home) {
            let current = self.store.read(Scope::User, name)?;
            plan.set_home(name, home.to_path_buf(), current.as_deref());
        }

        Ok(plan)
    }

    /// Plan forgetting an install directory that no longer exists.
    pub fn plan_removal(
        &self,
        family: RuntimeFamily,
        app_dir: &Path,
    ) -> Result<EnvironmentPlan, EnvStoreError> {
        let mut plan = EnvironmentPlan::new(family, self.path(Scope::User)?);
        plan.drop_entries_within(app_dir);

        if let Some(name) = family.home_variable()
            && let Some(current) = self.store.read_expanded(Scope::User, name)?
            && is_within(Path::new(&current), app_dir)
        {
            plan.unset_home(name);
        }

        Ok(plan)
    }

    /// Write the plan to user scope, then refresh the process scope.
    pub fn apply(&self, plan: &EnvironmentPlan) -> Result<SyncReport, EnvStoreError> {
        if plan.path_changed() {
            self.store
                .write(Scope::User, PATH_VAR, &plan.path.to_string())?;
        }

        match &plan.home {
            Some(HomeChange::Set { name, value }) => {
                self.store
                    .write(Scope::User, name, &value.to_string_lossy())?;
            }
            Some(HomeChange::Unset { name }) => self.store.remove(Scope::User, name)?,
            None => {}
        }

        if plan.has_changes() {
            info!(
                "Applied {} environment change(s) for {}",
                plan.changes.len(),
                plan.family
            );
            self.store.announce_change();
        }

        self.refresh()?;

        let conflicts = match &plan.preferred {
            Some(preferred) => self.detect_conflicts(plan.family, preferred)?,
            None => Vec::new(),
        };

        Ok(SyncReport {
            changes: plan.changes.clone(),
            conflicts,
        })
    }

    /// Machine-scope entries, other than `preferred`, that contain the
    /// family's executable.
    pub fn detect_conflicts(
        &self,
        family: RuntimeFamily,
        preferred: &str,
    ) -> Result<Vec<PathConflict>, EnvStoreError> {
        let preferred_key = entry_key(preferred);
        let exe = family.executable();

        let conflicts: Vec<PathConflict> = self
            .expanded_path(Scope::Machine)?
            .entries()
            .iter()
            .filter(|entry| entry_key(entry) != preferred_key)
            .filter_map(|entry| {
                let candidate = Path::new(entry).join(&exe);
                candidate.is_file().then(|| PathConflict {
                    family,
                    entry: entry.clone(),
                    executable: candidate,
                })
            })
            .collect();

        for conflict in &conflicts {
            warn!("PATH conflict: {}", conflict.advisory());
        }

        Ok(conflicts)
    }
}
