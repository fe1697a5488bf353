#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use rtswitch_backend::{
    BackendError, CommandStatus, InstallLayout, ManagerInfo, PackageManager, RuntimeFamily,
};

#[derive(Debug, Clone, Copy)]
pub enum InstallBehavior {
    Installs,
    MissingManifest,
    ExitsZeroWithoutFiles,
    CannotSpawn,
}

/// Package manager double that lays files out like Scoop and records every
/// call.
pub struct FakeManager {
    info: ManagerInfo,
    layout: InstallLayout,
    family: RuntimeFamily,
    behaviors: HashMap<String, InstallBehavior>,
    failing_uninstalls: HashSet<String>,
    failing_activations: HashSet<String>,
    buckets: Mutex<BTreeSet<String>>,
    calls: Mutex<Vec<String>>,
}

impl FakeManager {
    pub fn new(root: &Path, family: RuntimeFamily) -> Self {
        Self {
            info: ManagerInfo {
                name: "fake",
                path: PathBuf::from("fake-scoop"),
                version: None,
                in_path: true,
            },
            layout: InstallLayout::new(root),
            family,
            behaviors: HashMap::new(),
            failing_uninstalls: HashSet::new(),
            failing_activations: HashSet::new(),
            buckets: Mutex::new(BTreeSet::from(["main".to_string()])),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn on_install(mut self, id: &str, behavior: InstallBehavior) -> Self {
        self.behaviors.insert(id.to_string(), behavior);
        self
    }

    pub fn failing_uninstall(mut self, id: &str) -> Self {
        self.failing_uninstalls.insert(id.to_string());
        self
    }

    pub fn failing_activation(mut self, id: &str) -> Self {
        self.failing_activations.insert(id.to_string());
        self
    }

    /// Lay out an installed package without going through `install_package`.
    pub fn preinstall(&self, id: &str) -> PathBuf {
        let dir = self.layout.current_dir(id);
        let exe_dir = if self.family == RuntimeFamily::Java {
            dir.join("bin")
        } else {
            dir
        };
        std::fs::create_dir_all(&exe_dir).expect("create install dir");
        std::fs::write(exe_dir.join(self.family.executable()), b"").expect("write executable");
        exe_dir
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().expect("calls lock").push(call);
    }
}

#[async_trait]
impl PackageManager for FakeManager {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn info(&self) -> &ManagerInfo {
        &self.info
    }

    fn layout(&self) -> &InstallLayout {
        &self.layout
    }

    async fn list_buckets(&self) -> Result<BTreeSet<String>, BackendError> {
        Ok(self.buckets.lock().expect("bucket lock").clone())
    }

    async fn add_bucket(&self, name: &str) -> Result<(), BackendError> {
        self.record(format!("bucket add {name}"));
        self.buckets
            .lock()
            .expect("bucket lock")
            .insert(name.to_string());
        Ok(())
    }

    async fn install_package(&self, id: &str) -> Result<CommandStatus, BackendError> {
        self.record(format!("install {id}"));
        match self
            .behaviors
            .get(id)
            .copied()
            .unwrap_or(InstallBehavior::MissingManifest)
        {
            InstallBehavior::Installs => {
                self.preinstall(id);
                Ok(CommandStatus::success())
            }
            InstallBehavior::MissingManifest => Ok(CommandStatus::success().with_output(
                format!("Couldn't find manifest for '{id}'."),
                "",
            )),
            InstallBehavior::ExitsZeroWithoutFiles => Ok(CommandStatus::success()),
            InstallBehavior::CannotSpawn => Err(BackendError::SpawnFailed {
                program: "fake-scoop".to_string(),
                details: "No such file or directory".to_string(),
            }),
        }
    }

    async fn uninstall_package(&self, id: &str) -> Result<CommandStatus, BackendError> {
        self.record(format!("uninstall {id}"));
        if self.failing_uninstalls.contains(id) {
            return Ok(CommandStatus::with_code(1)
                .with_output("", format!("Access denied: {id} is in use")));
        }
        let _ = std::fs::remove_dir_all(self.layout.app_dir(id));
        Ok(CommandStatus::success())
    }

    async fn activate_package(&self, id: &str) -> Result<CommandStatus, BackendError> {
        self.record(format!("reset {id}"));
        if self.failing_activations.contains(id) {
            return Ok(CommandStatus::with_code(1).with_output("", "reset failed"));
        }
        Ok(CommandStatus::success())
    }

    async fn list_installed_packages(&self) -> Result<String, BackendError> {
        Ok(String::new())
    }
}
