#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use rtswitch_backend::PackageManager;
use rtswitch_scoop::{ScoopBackend, parse_installed_packages};

const FAKE_SCOOP: &str = r#"#!/bin/sh
echo "$@" >> "$SCOOP/calls.log"
case "$1 $2" in
  "bucket list")
    printf 'Name Source Updated Manifests\n---- ------ ------- ---------\nmain https://example.invalid/main 2024-01-01 10:00:00 10\n'
    ;;
  "bucket add")
    mkdir -p "$SCOOP/buckets/$3"
    ;;
  "install missing")
    echo "Couldn't find manifest for 'missing'." >&2
    exit 1
    ;;
  "list ")
    printf 'Installed apps:\n\nName Version Source Updated Info\n---- ------- ------ ------- ----\nphp82 8.2.15 versions 2024-01-03 08:00:00\n'
    ;;
esac
exit 0
"#;

fn fake_scoop(root: &Path) -> PathBuf {
    let path = root.join("scoop");
    std::fs::write(&path, FAKE_SCOOP).expect("write fake scoop");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("make fake scoop executable");
    path
}

fn calls(root: &Path) -> Vec<String> {
    std::fs::read_to_string(root.join("calls.log"))
        .unwrap_or_default()
        .lines()
        .map(ToString::to_string)
        .collect()
}

#[tokio::test]
async fn ensure_bucket_adds_missing_bucket_once() {
    let temp_dir = tempfile::tempdir().expect("create temp dir");
    let root = temp_dir.path().to_path_buf();
    let backend = ScoopBackend::new(fake_scoop(&root), None, root.clone());

    let added = backend.ensure_bucket("versions").await.expect("first ensure");
    let added_again = backend.ensure_bucket("versions").await.expect("second ensure");

    assert!(added);
    assert!(!added_again);
    let adds = calls(&root)
        .into_iter()
        .filter(|call| call.starts_with("bucket add"))
        .count();
    assert_eq!(adds, 1);
}

#[tokio::test]
async fn failed_install_reports_exit_status_and_output() {
    let temp_dir = tempfile::tempdir().expect("create temp dir");
    let root = temp_dir.path().to_path_buf();
    let backend = ScoopBackend::new(fake_scoop(&root), None, root);

    let status = backend
        .install_package("missing")
        .await
        .expect("command should run");

    assert_eq!(status.code, Some(1));
    assert!(status.mentions("couldn't find manifest"));
}

#[tokio::test]
async fn listing_round_trips_through_parser() {
    let temp_dir = tempfile::tempdir().expect("create temp dir");
    let root = temp_dir.path().to_path_buf();
    let backend = ScoopBackend::new(fake_scoop(&root), None, root.clone());

    let output = backend
        .list_installed_packages()
        .await
        .expect("list should succeed");
    let packages = parse_installed_packages(&output, backend.layout());

    assert_eq!(packages.len(), 1);
    assert_eq!(packages["php82"].install_path, root.join("apps/php82/current"));
}
