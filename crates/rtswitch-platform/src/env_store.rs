#[cfg(not(windows))]
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

use log::debug;
use thiserror::Error;

/// Precedence tier of an environment variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scope {
    /// The running process only.
    Process,
    /// Persisted for the current user.
    User,
    /// Persisted for every user of the machine.
    Machine,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Process => f.write_str("process"),
            Self::User => f.write_str("user"),
            Self::Machine => f.write_str("machine"),
        }
    }
}

#[derive(Debug, Error)]
pub enum EnvStoreError {
    #[error("{scope} scope is read-only")]
    ReadOnly { scope: Scope },

    #[error("Registry call {api} failed for {name}: code {code}")]
    Registry {
        api: &'static str,
        name: String,
        code: u32,
    },

    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Environment file {path} is malformed: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Read/write access to environment variables per [`Scope`].
pub trait EnvStore: Send + Sync {
    fn read(&self, scope: Scope, name: &str) -> Result<Option<String>, EnvStoreError>;

    fn write(&self, scope: Scope, name: &str, value: &str) -> Result<(), EnvStoreError>;

    fn remove(&self, scope: Scope, name: &str) -> Result<(), EnvStoreError>;

    /// Stored value with `%NAME%` references resolved against process scope.
    fn read_expanded(&self, scope: Scope, name: &str) -> Result<Option<String>, EnvStoreError> {
        let Some(raw) = self.read(scope, name)? else {
            return Ok(None);
        };
        Ok(Some(expand_references(&raw, |var| {
            self.read(Scope::Process, var).ok().flatten()
        })))
    }

    /// Tell other processes that persisted variables changed.
    fn announce_change(&self) {}
}

/// Separator between `PATH` entries on this platform.
#[must_use]
pub const fn path_separator() -> char {
    if cfg!(windows) { ';' } else { ':' }
}

/// Resolve `%NAME%` references the way Windows expands `REG_EXPAND_SZ`
/// values. Unknown names and unpaired `%` are kept as written.
#[must_use]
pub fn expand_references(value: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut expanded = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find('%') {
        expanded.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let Some(end) = after.find('%') else {
            expanded.push_str(&rest[start..]);
            return expanded;
        };

        let name = &after[..end];
        match (!name.is_empty()).then(|| lookup(name)).flatten() {
            Some(resolved) => expanded.push_str(&resolved),
            None => {
                expanded.push('%');
                expanded.push_str(name);
                expanded.push('%');
            }
        }
        rest = &after[end + 1..];
    }

    expanded.push_str(rest);
    expanded
}

/// Variables held in memory, used for previews and tests.
#[derive(Debug, Default)]
pub struct MemoryEnvStore {
    vars: Mutex<HashMap<(Scope, String), String>>,
    read_only: Vec<Scope>,
}

impl MemoryEnvStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(self, scope: Scope, name: &str, value: &str) -> Self {
        self.lock().insert((scope, name.to_string()), value.to_string());
        self
    }

    #[must_use]
    pub fn read_only(mut self, scope: Scope) -> Self {
        self.read_only.push(scope);
        self
    }

    #[must_use]
    pub fn get(&self, scope: Scope, name: &str) -> Option<String> {
        self.lock().get(&(scope, name.to_string())).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<(Scope, String), String>> {
        self.vars
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn check_writable(&self, scope: Scope) -> Result<(), EnvStoreError> {
        if self.read_only.contains(&scope) {
            Err(EnvStoreError::ReadOnly { scope })
        } else {
            Ok(())
        }
    }
}

impl EnvStore for MemoryEnvStore {
    fn read(&self, scope: Scope, name: &str) -> Result<Option<String>, EnvStoreError> {
        Ok(self.get(scope, name))
    }

    fn write(&self, scope: Scope, name: &str, value: &str) -> Result<(), EnvStoreError> {
        self.check_writable(scope)?;
        self.lock()
            .insert((scope, name.to_string()), value.to_string());
        Ok(())
    }

    fn remove(&self, scope: Scope, name: &str) -> Result<(), EnvStoreError> {
        self.check_writable(scope)?;
        self.lock().remove(&(scope, name.to_string()));
        Ok(())
    }
}

/// The operating system's variable stores.
///
/// On Windows user and machine scope live in the registry. Elsewhere user
/// scope is a JSON file owned by this tool and machine scope is the
/// environment the process inherited at startup.
pub struct SystemEnvStore {
    #[cfg_attr(windows, allow(dead_code))]
    user_file: PathBuf,
}

fn inherited_environment() -> &'static HashMap<String, String> {
    static INHERITED: OnceLock<HashMap<String, String>> = OnceLock::new();
    INHERITED.get_or_init(|| std::env::vars().collect())
}

impl SystemEnvStore {
    #[must_use]
    pub fn new(user_file: PathBuf) -> Self {
        let _ = inherited_environment();
        Self { user_file }
    }

    fn read_process(name: &str) -> Option<String> {
        std::env::var(name).ok()
    }

    fn write_process(name: &str, value: Option<&str>) {
        debug!("Setting process variable {name}");
        // SAFETY: the tool runs on a single thread; no other thread reads or
        // writes the environment concurrently.
        unsafe {
            match value {
                Some(value) => std::env::set_var(name, value),
                None => std::env::remove_var(name),
            }
        }
    }

    #[cfg(not(windows))]
    fn load_user_file(&self) -> Result<BTreeMap<String, String>, EnvStoreError> {
        match std::fs::read_to_string(&self.user_file) {
            Ok(content) if content.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(content) => {
                serde_json::from_str(&content).map_err(|source| EnvStoreError::Malformed {
                    path: self.user_file.clone(),
                    source,
                })
            }
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(source) => Err(EnvStoreError::Io {
                path: self.user_file.clone(),
                source,
            }),
        }
    }

    #[cfg(not(windows))]
    fn save_user_file(&self, vars: &BTreeMap<String, String>) -> Result<(), EnvStoreError> {
        let io_error = |source| EnvStoreError::Io {
            path: self.user_file.clone(),
            source,
        };

        if let Some(parent) = self.user_file.parent() {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
        let json = serde_json::to_string_pretty(vars).map_err(|source| {
            EnvStoreError::Malformed {
                path: self.user_file.clone(),
                source,
            }
        })?;
        let temp = self.user_file.with_extension("json.tmp");
        std::fs::write(&temp, json).map_err(io_error)?;
        std::fs::rename(&temp, &self.user_file).map_err(io_error)
    }
}

#[cfg(not(windows))]
impl EnvStore for SystemEnvStore {
    fn read(&self, scope: Scope, name: &str) -> Result<Option<String>, EnvStoreError> {
        match scope {
            Scope::Process => Ok(Self::read_process(name)),
            Scope::User => Ok(self.load_user_file()?.remove(name)),
            Scope::Machine => Ok(inherited_environment().get(name).cloned()),
        }
    }

    fn write(&self, scope: Scope, name: &str, value: &str) -> Result<(), EnvStoreError> {
        match scope {
            Scope::Process => {
                Self::write_process(name, Some(value));
                Ok(())
            }
            Scope::User => {
                let mut vars = self.load_user_file()?;
                vars.insert(name.to_string(), value.to_string());
                self.save_user_file(&vars)
            }
            Scope::Machine => Err(EnvStoreError::ReadOnly { scope }),
        }
    }

    fn remove(&self, scope: Scope, name: &str) -> Result<(), EnvStoreError> {
        match scope {
            Scope::Process => {
                Self::write_process(name, None);
                Ok(())
            }
            Scope::User => {
                let mut vars = self.load_user_file()?;
                if vars.remove(name).is_some() {
                    self.save_user_file(&vars)?;
                }
                Ok(())
            }
            Scope::Machine => Err(EnvStoreError::ReadOnly { scope }),
        }
    }
}

#[cfg(windows)]
impl EnvStore for SystemEnvStore {
    fn read(&self, scope: Scope, name: &str) -> Result<Option<String>, EnvStoreError> {
        match scope {
            Scope::Process => Ok(Self::read_process(name)),
            Scope::User | Scope::Machine => registry::read(scope, name),
        }
    }

    fn write(&self, scope: Scope, name: &str, value: &str) -> Result<(), EnvStoreError> {
        match scope {
            Scope::Process => {
                Self::write_process(name, Some(value));
                Ok(())
            }
            Scope::User => registry::write_user(name, value),
            Scope::Machine => Err(EnvStoreError::ReadOnly { scope }),
        }
    }

    fn remove(&self, scope: Scope, name: &str) -> Result<(), EnvStoreError> {
        match scope {
            Scope::Process => {
                Self::write_process(name, None);
                Ok(())
            }
            Scope::User => registry::delete_user(name),
            Scope::Machine => Err(EnvStoreError::ReadOnly { scope }),
        }
    }

    fn announce_change(&self) {
        registry::broadcast_environment_change();
    }
}

#[cfg(windows)]
mod registry {
    use std::ptr;

    use log::{debug, warn};
    use windows_sys::Win32::Foundation::{ERROR_FILE_NOT_FOUND, ERROR_SUCCESS};
    use windows_sys::Win32::System::Registry::{
        HKEY, HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE, KEY_SET_VALUE, REG_EXPAND_SZ, REG_SZ,
        RRF_NOEXPAND, RRF_RT_REG_EXPAND_SZ, RRF_RT_REG_SZ, RegCloseKey, RegDeleteValueW,
        RegGetValueW, RegOpenKeyExW, RegSetValueExW,
    };
    use windows_sys::Win32::UI::WindowsAndMessaging::{
        HWND_BROADCAST, SMTO_ABORTIFHUNG, SendMessageTimeoutW, WM_SETTINGCHANGE,
    };

    use super::{EnvStoreError, Scope};

    const USER_KEY: &str = "Environment";
    const MACHINE_KEY: &str = "SYSTEM\\CurrentControlSet\\Control\\Session Manager\\Environment";

    fn wide(value: &str) -> Vec<u16> {
        value.encode_utf16().chain(std::iter::once(0)).collect()
    }

    fn location(scope: Scope) -> (HKEY, &'static str) {
        match scope {
            Scope::Machine => (HKEY_LOCAL_MACHINE, MACHINE_KEY),
            Scope::User | Scope::Process => (HKEY_CURRENT_USER, USER_KEY),
        }
    }

    pub(super) fn read(scope: Scope, name: &str) -> Result<Option<String>, EnvStoreError> {
        let (root, subkey) = location(scope);
        let subkey = wide(subkey);
        let value_name = wide(name);
        let flags = RRF_RT_REG_SZ | RRF_RT_REG_EXPAND_SZ | RRF_NOEXPAND;

        // SAFETY: both calls receive NUL-terminated UTF-16 strings that outlive
        // the call; the second call writes at most `size` bytes into `buffer`.
        unsafe {
            let mut size: u32 = 0;
            let status = RegGetValueW(
                root,
                subkey.as_ptr(),
                value_name.as_ptr(),
                flags,
                ptr::null_mut(),
                ptr::null_mut(),
                &mut size,
            );
            if status == ERROR_FILE_NOT_FOUND {
                return Ok(None);
            }
            if status != ERROR_SUCCESS {
                return Err(EnvStoreError::Registry {
                    api: "RegGetValueW",
                    name: name.to_string(),
                    code: status,
                });
            }

            let mut buffer = vec![0u16; (size as usize).div_ceil(2)];
            let status = RegGetValueW(
                root,
                subkey.as_ptr(),
                value_name.as_ptr(),
                flags,
                ptr::null_mut(),
                buffer.as_mut_ptr().cast(),
                &mut size,
            );
            if status != ERROR_SUCCESS {
                return Err(EnvStoreError::Registry {
                    api: "RegGetValueW",
                    name: name.to_string(),
                    code: status,
                });
            }

            let len = buffer.iter().position(|&c| c == 0).unwrap_or(buffer.len());
            Ok(Some(String::from_utf16_lossy(&buffer[..len])))
        }
    }

    fn with_user_key<F>(name: &str, op: F) -> Result<(), EnvStoreError>
    where
        F: FnOnce(HKEY) -> (&'static str, u32),
    {
        let subkey = wide(USER_KEY);

        // SAFETY: `hkey` is only used after RegOpenKeyExW reports success and
        // is closed before returning.
        unsafe {
            let mut hkey = std::mem::zeroed();
            let status = RegOpenKeyExW(
                HKEY_CURRENT_USER,
                subkey.as_ptr(),
                0,
                KEY_SET_VALUE,
                &mut hkey,
            );
            if status != ERROR_SUCCESS {
                return Err(EnvStoreError::Registry {
                    api: "RegOpenKeyExW",
                    name: name.to_string(),
                    code: status,
                });
            }

            let (api, status) = op(hkey);
            RegCloseKey(hkey);

            if status == ERROR_SUCCESS || (api == "RegDeleteValueW" && status == ERROR_FILE_NOT_FOUND)
            {
                Ok(())
            } else {
                Err(EnvStoreError::Registry {
                    api,
                    name: name.to_string(),
                    code: status,
                })
            }
        }
    }

    pub(super) fn write_user(name: &str, value: &str) -> Result<(), EnvStoreError> {
        debug!("Writing user registry variable {name}");
        let value_name = wide(name);
        let data = wide(value);
        let kind = if value.contains('%') {
            REG_EXPAND_SZ
        } else {
            REG_SZ
        };

        with_user_key(name, |hkey| {
            let byte_len = u32::try_from(data.len() * 2).unwrap_or(u32::MAX);
            // SAFETY: `data` is a NUL-terminated UTF-16 buffer of `byte_len` bytes.
            let status = unsafe {
                RegSetValueExW(
                    hkey,
                    value_name.as_ptr(),
                    0,
                    kind,
                    data.as_ptr().cast(),
                    byte_len,
                )
            };
            ("RegSetValueExW", status)
        })
    }

    pub(super) fn delete_user(name: &str) -> Result<(), EnvStoreError> {
        debug!("Deleting user registry variable {name}");
        let value_name = wide(name);
        with_user_key(name, |hkey| {
            // SAFETY: `value_name` is NUL-terminated and outlives the call.
            let status = unsafe { RegDeleteValueW(hkey, value_name.as_ptr()) };
            ("RegDeleteValueW", status)
        })
    }

    pub(super) fn broadcast_environment_change() {
        let area = wide("Environment");
        let mut result = 0usize;

        // SAFETY: `area` is NUL-terminated and outlives the call; the timeout
        // bounds how long unresponsive windows can block us.
        let sent = unsafe {
            SendMessageTimeoutW(
                HWND_BROADCAST,
                WM_SETTINGCHANGE,
                0,
                area.as_ptr() as isize,
                SMTO_ABORTIFHUNG,
                5000,
                &mut result,
            )
        };

        if sent == 0 {
            warn!("Environment change broadcast timed out or failed");
        }
    }
}
