mod commands;
mod env_store;
mod paths;

pub use commands::{HideWindow, quiet_command};
pub use env_store::{
    EnvStore, EnvStoreError, MemoryEnvStore, Scope, SystemEnvStore, expand_references,
    path_separator,
};
pub use paths::{AppPaths, AppPathsError, default_scoop_root};
