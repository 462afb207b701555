//! Shared types and wire format for modinst.
//!
//! Everything in this crate is plain data: module paths, installation
//! records, the manifest snapshot layout and source locations used by
//! diagnostics. The installer itself lives in `modinst-core`.

pub mod range;
pub mod record;
pub mod types;

// Re-exports
pub use range::SourceRange;
pub use record::{
    MANIFEST_FILENAME, ManifestSnapshot, ModuleRecord, PACKAGES_DIRNAME, SNAPSHOT_FORMAT,
};
pub use types::{KEY_SEPARATOR, ModulePath};
