use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use which::which;

use rtswitch_backend::{BackendError, ManagerDetection};
use rtswitch_platform::default_scoop_root;

use crate::backend::Launcher;

const BOOTSTRAP_URL: &str = "https://get.scoop.sh";
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);
const DOWNLOAD_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DOWNLOAD_RETRY_DELAYS_SECS: [u64; 3] = [0, 2, 5];

pub(crate) async fn detect_scoop(root_override: Option<PathBuf>) -> ManagerDetection {
    let root = root_override.or_else(detect_scoop_root);

    if let Ok(path) = which("scoop") {
        let version = get_scoop_version(&path).await;
        return ManagerDetection {
            found: true,
            path: Some(path),
            version,
            in_path: true,
            root,
        };
    }

    for path in shim_candidates(root.as_deref()) {
        if path.exists() {
            let version = get_scoop_version(&path).await;
            return ManagerDetection {
                found: true,
                path: Some(path),
                version,
                in_path: false,
                root,
            };
        }
    }

    ManagerDetection {
        found: false,
        path: None,
        version: None,
        in_path: false,
        root,
    }
}

/// `$SCOOP` when it exists, else `~/scoop` when it exists.
pub(crate) fn detect_scoop_root() -> Option<PathBuf> {
    let env_root = std::env::var_os("SCOOP")
        .filter(|value| !value.is_empty())
        .map(PathBuf::from);
    select_scoop_root(env_root, default_scoop_root())
}

fn select_scoop_root(env_root: Option<PathBuf>, fallback: Option<PathBuf>) -> Option<PathBuf> {
    env_root
        .filter(|path| path.exists())
        .or_else(|| fallback.filter(|path| path.join("apps").exists()))
}

fn shim_candidates(root: Option<&Path>) -> Vec<PathBuf> {
    let mut roots: Vec<PathBuf> = root.map(Path::to_path_buf).into_iter().collect();
    if let Some(home) = dirs::home_dir() {
        let home_root = home.join("scoop");
        if !roots.contains(&home_root) {
            roots.push(home_root);
        }
    }

    roots
        .iter()
        .flat_map(|root| {
            let shims = root.join("shims");
            ["scoop.cmd", "scoop.ps1", "scoop"]
                .into_iter()
                .map(move |name| shims.join(name))
        })
        .collect()
}

async fn get_scoop_version(path: &Path) -> Option<String> {
    let output = Launcher::for_path(path.to_path_buf())
        .command(&["--version"])
        .output()
        .await
        .ok()?;

    if !output.status.success() {
        return None;
    }

    parse_scoop_version(&String::from_utf8_lossy(&output.stdout))
}

/// Pull `0.5.2` out of `scoop --version` output such as
/// `Current Scoop version:\nv0.5.2 - Released at 2024-07-26`.
fn parse_scoop_version(output: &str) -> Option<String> {
    output
        .split_whitespace()
        .filter_map(|token| token.strip_prefix('v'))
        .find(|rest| rest.starts_with(|c: char| c.is_ascii_digit()))
        .map(ToString::to_string)
}

/// Download the official installer and run it with PowerShell.
pub(crate) async fn install_scoop() -> Result<(), BackendError> {
    if !cfg!(windows) {
        return Err(BackendError::install_failed(
            "platform check",
            "Scoop can only be bootstrapped on Windows",
        ));
    }

    let script_path = temp_script_path("scoop-install", "ps1");
    let result = async {
        download_installer(BOOTSTRAP_URL, &script_path).await?;
        info!("Running Scoop installer {}", script_path.display());
        rtswitch_platform::quiet_command("powershell")
            .args(["-NoProfile", "-ExecutionPolicy", "Bypass", "-File"])
            .arg(&script_path)
            .status()
            .await
            .map_err(|error| BackendError::spawn_failed("powershell", &error))
    }
    .await;
    let _ = tokio::fs::remove_file(&script_path).await;

    let status = result?;
    if status.success() {
        Ok(())
    } else {
        Err(BackendError::install_failed(
            "installer",
            format!("Scoop installer exited with {status}"),
        ))
    }
}

fn temp_script_path(prefix: &str, ext: &str) -> PathBuf {
    let nonce = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_nanos());
    std::env::temp_dir().join(format!("{prefix}-{}-{nonce}.{ext}", std::process::id()))
}

async fn download_installer(url: &str, path: &Path) -> Result<(), BackendError> {
    let client = reqwest::Client::builder()
        .timeout(DOWNLOAD_TIMEOUT)
        .connect_timeout(DOWNLOAD_CONNECT_TIMEOUT)
        .user_agent(format!("rtswitch/{}", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|error| BackendError::network("building download client", error))?;

    let mut last_error = None;
    for delay_secs in DOWNLOAD_RETRY_DELAYS_SECS {
        if delay_secs > 0 {
            debug!("Retrying installer download in {delay_secs}s");
            tokio::time::sleep(Duration::from_secs(delay_secs)).await;
        }

        match download_once(&client, url).await {
            Ok(script) => {
                tokio::fs::write(path, &script).await?;
                return Ok(());
            }
            Err(error) => {
                warn!("Installer download attempt failed: {error}");
                last_error = Some(error);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| {
        BackendError::network("downloading installer", "no attempt was made")
    }))
}

async fn download_once(client: &reqwest::Client, url: &str) -> Result<Vec<u8>, BackendError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|error| BackendError::network("downloading installer", error))?;

    if !response.status().is_success() {
        return Err(BackendError::network(
            "downloading installer",
            format!("HTTP {} for {url}", response.status()),
        ));
    }

    response
        .bytes()
        .await
        .map(|bytes| bytes.to_vec())
        .map_err(|error| BackendError::network("reading installer", error))
}
