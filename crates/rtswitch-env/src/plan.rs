use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use rtswitch_backend::RuntimeFamily;

use crate::path_list::{PathList, entry_key};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HomeChange {
    Set { name: &'static str, value: PathBuf },
    Unset { name: &'static str },
}

/// A proposed user-scope environment, computed before anything is written.
#[derive(Debug, Clone)]
pub struct EnvironmentPlan {
    pub family: RuntimeFamily,
    pub original_path: PathList,
    pub path: PathList,
    /// Entry the plan puts first, checked afterwards for machine-scope
    /// conflicts.
    pub preferred: Option<String>,
    pub home: Option<HomeChange>,
    pub changes: Vec<String>,
}

impl EnvironmentPlan {
    #[must_use]
    pub fn new(family: RuntimeFamily, user_path: PathList) -> Self {
        Self {
            family,
            original_path: user_path.clone(),
            path: user_path,
            preferred: None,
            home: None,
            changes: Vec::new(),
        }
    }

    /// Drop entries that point into `dir`.
    pub fn drop_entries_within(&mut self, dir: &Path) {
        for entry in self.path.remove_within(dir) {
            self.changes.push(format!("Remove PATH entry {entry}"));
        }
    }

    pub fn prefer(&mut self, dir: &Path) {
        let entry = dir.to_string_lossy().to_string();
        let already_first = self
            .path
            .first()
            .is_some_and(|first| entry_key(first) == entry_key(&entry))
            && self.path.occurrences(&entry) == 1;

        self.path.prepend(&entry);
        if !already_first {
            self.changes.push(format!("Prepend PATH entry {entry}"));
        }
        self.preferred = Some(entry);
    }

    pub fn set_home(&mut self, name: &'static str, value: PathBuf, current: Option<&str>) {
        if current.is_some_and(|current| entry_key(current) == entry_key(&value.to_string_lossy())) {
            return;
        }
        self.changes.push(format!("Set {name}={}", value.display()));
        self.home = Some(HomeChange::Set { name, value });
    }

    pub fn unset_home(&mut self, name: &'static str) {
        self.changes.push(format!("Unset {name}"));
        self.home = Some(HomeChange::Unset { name });
    }

    #[must_use]
    pub fn path_changed(&self) -> bool {
        self.path != self.original_path
    }

    #[must_use]
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    #[must_use]
    pub fn diff_preview(&self) -> String {
        if !self.has_changes() {
            return "No changes needed.".to_string();
        }

        let mut preview = String::new();
        for change in &self.changes {
            let _ = writeln!(preview, "+ {change}");
        }
        preview
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(entries: &[&str]) -> EnvironmentPlan {
        EnvironmentPlan::new(
            RuntimeFamily::Node,
            PathList::from_entries(entries.iter().copied()),
        )
    }

    #[test]
    fn prefer_records_change_only_when_order_moves() {
        let mut unchanged = plan(&["/scoop/apps/nodejs20/current", "/usr/bin"]);
        unchanged.prefer(Path::new("/scoop/apps/nodejs20/current"));
        assert!(!unchanged.has_changes());
        assert!(!unchanged.path_changed());

        let mut moved = plan(&["/usr/bin", "/scoop/apps/nodejs20/current"]);
        moved.prefer(Path::new("/scoop/apps/nodejs20/current"));
        assert!(moved.has_changes());
        assert_eq!(moved.path.first(), Some("/scoop/apps/nodejs20/current"));
    }

    #[test]
    fn drop_entries_within_lists_each_removed_entry() {
        let mut plan = plan(&["/scoop/apps/nodejs18/current", "/usr/bin"]);

        plan.drop_entries_within(Path::new("/scoop/apps/nodejs18"));

        assert_eq!(
            plan.changes,
            vec!["Remove PATH entry /scoop/apps/nodejs18/current".to_string()]
        );
        assert_eq!(plan.path.entries(), &["/usr/bin"]);
    }

    #[test]
    fn set_home_is_skipped_when_value_matches() {
        let mut plan = plan(&[]);

        plan.set_home("JAVA_HOME", PathBuf::from("/jdk"), Some("/jdk/"));

        assert!(plan.home.is_none());
        assert!(!plan.has_changes());
    }

    #[test]
    fn diff_preview_lists_changes() {
        let mut plan = plan(&["/usr/bin"]);
        plan.prefer(Path::new("/opt/node"));
        plan.unset_home("JAVA_HOME");

        let preview = plan.diff_preview();

        assert!(preview.contains("+ Prepend PATH entry /opt/node"));
        assert!(preview.contains("+ Unset JAVA_HOME"));
    }

    #[test]
    fn diff_preview_without_changes() {
        assert_eq!(plan(&["/usr/bin"]).diff_preview(), "No changes needed.");
    }
}
