//! Human-readable lines for operation outcomes.

use rtswitch_backend::RuntimeFamily;
use rtswitch_core::{
    ActiveResolution, Attempt, InstallOutcome, InstalledVariant, Reconciliation, SwitchOutcome,
    UninstallOutcome,
};
use rtswitch_env::{PathConflict, SyncReport};

pub fn sync_lines(sync: &SyncReport) -> Vec<String> {
    let mut lines: Vec<String> = sync
        .changes
        .iter()
        .map(|change| format!("  - {change}"))
        .collect();
    lines.extend(conflict_lines(&sync.conflicts));
    lines
}

pub fn conflict_lines(conflicts: &[PathConflict]) -> Vec<String> {
    conflicts
        .iter()
        .map(|conflict| format!("Warning: {}", conflict.advisory()))
        .collect()
}

fn failed_attempt_lines(attempts: &[Attempt]) -> Vec<String> {
    attempts
        .iter()
        .filter(|attempt| !attempt.result.is_success())
        .map(|attempt| format!("  {} {}", attempt.id, attempt.result))
        .collect()
}

pub fn install_lines(outcome: &InstallOutcome) -> Vec<String> {
    match outcome {
        InstallOutcome::Installed { id, attempts, sync } => {
            let mut lines = failed_attempt_lines(attempts);
            lines.push(format!("Installed {id}"));
            lines.extend(sync_lines(sync));
            lines
        }
        InstallOutcome::NoCandidateSucceeded { attempts, .. } => failed_attempt_lines(attempts),
    }
}

pub fn switch_lines(outcome: &SwitchOutcome) -> Vec<String> {
    match outcome {
        SwitchOutcome::Switched { id, sync } => {
            let mut lines = vec![format!("Switched to {id}")];
            lines.extend(sync_lines(sync));
            lines
        }
        SwitchOutcome::SwitchFailed { id, result } => {
            vec![format!("Switching to {id} {result}")]
        }
    }
}

pub fn uninstall_lines(outcome: &UninstallOutcome) -> Vec<String> {
    match outcome {
        UninstallOutcome::Uninstalled { id, sync } => {
            let mut lines = vec![format!("Uninstalled {id}")];
            lines.extend(sync_lines(sync));
            lines
        }
        UninstallOutcome::UninstalledDegraded { id, cleanup, sync } => {
            let mut lines = vec![format!(
                "Uninstalled {id} (package manager failed, files removed directly)"
            )];
            for (path, error) in &cleanup.failed {
                lines.push(format!("  could not remove {}: {error}", path.display()));
            }
            lines.extend(sync_lines(sync));
            lines
        }
    }
}

pub fn variant_lines(variants: &[InstalledVariant]) -> Vec<String> {
    variants
        .iter()
        .map(|variant| {
            let marker = if variant.active { '*' } else { ' ' };
            match &variant.version {
                Some(version) => format!("{marker} {} ({version})", variant.id),
                None => format!("{marker} {}", variant.id),
            }
        })
        .collect()
}

pub fn active_line(family: RuntimeFamily, resolution: &ActiveResolution) -> String {
    match resolution {
        ActiveResolution::Managed(variant) => format!(
            "Active {}: {} ({})",
            family.display_name(),
            variant.id,
            variant.executable.display()
        ),
        ActiveResolution::Unmanaged(path) => format!(
            "Active {}: {} (not managed by Scoop)",
            family.display_name(),
            path.display()
        ),
        ActiveResolution::Absent => format!("Active {}: none", family.display_name()),
    }
}

pub fn reconciliation_lines(report: &Reconciliation) -> Vec<String> {
    let mut lines = Vec::new();
    if !report.listed_but_missing.is_empty() {
        lines.push(format!(
            "Listed by Scoop but missing on disk: {}",
            report.listed_but_missing.join(", ")
        ));
    }
    if !report.present_but_unlisted.is_empty() {
        lines.push(format!(
            "On disk but not listed by Scoop: {}",
            report.present_but_unlisted.join(", ")
        ));
    }
    if !report.failed_installs.is_empty() {
        lines.push(format!(
            "Failed installs left by Scoop: {}",
            report.failed_installs.join(", ")
        ));
    }
    lines
}
