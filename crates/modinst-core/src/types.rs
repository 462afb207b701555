pub use crate::config::{Module, ModuleCall, ModuleRequest, VersionConstraint};
pub use crate::source::{RegistryAddress, SourceKind};
pub use modinst_schema::{ModulePath, ModuleRecord, SourceRange};
pub use semver::{Version, VersionReq};
