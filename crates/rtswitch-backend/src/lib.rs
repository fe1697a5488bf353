mod error;
mod family;
mod traits;
mod types;

pub use error::BackendError;
pub use family::{RuntimeFamily, UnknownFamily};
pub use traits::{ManagerDetection, ManagerInfo, ManagerProvider, PackageManager};
pub use types::{CommandStatus, InstallLayout, ListedPackage};
