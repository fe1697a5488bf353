use async_trait::async_trait;
use std::path::PathBuf;

use rtswitch_backend::{BackendError, ManagerDetection, ManagerProvider, PackageManager};
use rtswitch_platform::default_scoop_root;

use crate::backend::ScoopBackend;
use crate::detection::{detect_scoop, install_scoop};

#[derive(Default)]
pub struct ScoopProvider {
    root: Option<PathBuf>,
}

impl ScoopProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `root` instead of `$SCOOP` / `~/scoop`.
    #[must_use]
    pub fn with_root(mut self, root: PathBuf) -> Self {
        self.root = Some(root);
        self
    }
}

#[async_trait]
impl ManagerProvider for ScoopProvider {
    fn name(&self) -> &'static str {
        "scoop"
    }

    fn display_name(&self) -> &'static str {
        "Scoop"
    }

    async fn detect(&self) -> ManagerDetection {
        detect_scoop(self.root.clone()).await
    }

    async fn install_manager(&self) -> Result<(), BackendError> {
        install_scoop().await
    }

    fn create_manager(&self, detection: &ManagerDetection) -> Box<dyn PackageManager> {
        let path = detection
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from("scoop"));
        let root = self
            .root
            .clone()
            .or_else(|| detection.root.clone())
            .or_else(default_scoop_root)
            .unwrap_or_else(|| PathBuf::from("scoop"));
        Box::new(
            ScoopBackend::new(path, detection.version.clone(), root)
                .with_in_path(detection.in_path),
        )
    }
}
