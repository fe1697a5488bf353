#![allow(clippy::missing_errors_doc)]

mod discovery;
mod driver;
mod error;
mod normalize;
mod probe;

pub use discovery::{
    DiscoveryScanner, HomeCandidate, HomeSource, activate_home, conventional_roots, validate_home,
};
pub use driver::{
    Attempt, CleanupReport, InstallOutcome, MutationDriver, MutationResult, ReplaceOutcome,
    SwitchOutcome, UninstallOutcome, forced_cleanup, other_variant_dirs,
};
pub use error::{CoreError, HomeValidationError};
pub use normalize::{PackageCandidate, SpecKind, VersionSpec, candidates_for, normalize};
pub use probe::{
    ActiveResolution, InstalledVariant, Probe, Reconciliation, annotate_versions,
    parse_shim_descriptor, read_shim_target,
};
