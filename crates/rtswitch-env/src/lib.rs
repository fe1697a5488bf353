#![allow(clippy::missing_errors_doc)]

mod export;
mod path_list;
mod plan;
mod sync;

pub use export::{ShellType, UnknownShell, shell_export};
pub use path_list::{PathList, entry_key, is_within};
pub use plan::{EnvironmentPlan, HomeChange};
pub use sync::{EnvironmentSynchronizer, PathConflict, SyncReport};
