mod backend;
mod detection;
mod listing;
mod provider;

pub use backend::{Launcher, ScoopBackend};
pub use listing::{parse_bucket_list, parse_installed_packages};
pub use provider::ScoopProvider;
