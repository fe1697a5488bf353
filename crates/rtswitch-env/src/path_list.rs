use std::fmt;
use std::path::Path;

use rtswitch_platform::path_separator;

/// Comparison key for a `PATH` entry or filesystem path: separators unified,
/// trailing separators dropped and, on Windows, case folded.
#[must_use]
pub fn entry_key(entry: &str) -> String {
    let mut key = entry.trim().to_string();
    if cfg!(windows) {
        key = key.replace('/', "\\").to_lowercase();
    }
    while key.len() > 1 && (key.ends_with('/') || key.ends_with('\\')) {
        key.pop();
    }
    key
}

/// Whether `path` is `dir` or lies beneath it.
#[must_use]
pub fn is_within(path: &Path, dir: &Path) -> bool {
    let path = entry_key(&path.to_string_lossy());
    let dir = entry_key(&dir.to_string_lossy());
    if path == dir {
        return true;
    }
    let sep = if cfg!(windows) { '\\' } else { '/' };
    path.strip_prefix(&dir)
        .is_some_and(|rest| rest.starts_with(sep))
}

/// Ordered `PATH` entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathList {
    entries: Vec<String>,
}

impl PathList {
    /// Split a `PATH` value, dropping empty entries.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        Self {
            entries: value
                .split(path_separator())
                .map(str::trim)
                .filter(|entry| !entry.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    #[must_use]
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entries: entries.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn first(&self) -> Option<&str> {
        self.entries.first().map(String::as_str)
    }

    #[must_use]
    pub fn contains(&self, entry: &str) -> bool {
        let key = entry_key(entry);
        self.entries.iter().any(|existing| entry_key(existing) == key)
    }

    #[must_use]
    pub fn occurrences(&self, entry: &str) -> usize {
        let key = entry_key(entry);
        self.entries
            .iter()
            .filter(|existing| entry_key(existing) == key)
            .count()
    }

    /// Remove every occurrence of `entry`. Returns how many were removed.
    pub fn remove(&mut self, entry: &str) -> usize {
        let key = entry_key(entry);
        let before = self.entries.len();
        self.entries.retain(|existing| entry_key(existing) != key);
        before - self.entries.len()
    }

    /// Remove entries located inside `dir`, returning them in order.
    pub fn remove_within(&mut self, dir: &Path) -> Vec<String> {
        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.entries)
            .into_iter()
            .partition(|entry| is_within(Path::new(entry), dir));
        self.entries = kept;
        removed
    }

    /// Move `entry` to the front, dropping other occurrences while keeping
    /// the relative order of everything else.
    pub fn prepend(&mut self, entry: &str) {
        self.remove(entry);
        self.entries.insert(0, entry.to_string());
    }

    /// Append `other` after `self`, keeping the first occurrence of each
    /// entry.
    #[must_use]
    pub fn concat(&self, other: &PathList) -> PathList {
        let mut merged = PathList::default();
        for entry in self.entries.iter().chain(other.entries.iter()) {
            if !merged.contains(entry) {
                merged.entries.push(entry.clone());
            }
        }
        merged
    }
}

impl fmt::Display for PathList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for entry in &self.entries {
            if !first {
                write!(f, "{}", path_separator())?;
            }
            f.write_str(entry)?;
            first = false;
        }
        Ok(())
    }
}
