//! Installation records and the manifest snapshot wire format.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// File name of the manifest snapshot inside the modules directory.
pub const MANIFEST_FILENAME: &str = "modules.json";

/// Subdirectory of the modules directory holding fetched packages, one
/// directory per manifest key. Kept apart from the snapshot so that no key
/// can collide with it.
pub const PACKAGES_DIRNAME: &str = "packages";

/// Current snapshot format version.
pub const SNAPSHOT_FORMAT: u32 = 1;

/// Where and from what a single module was installed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRecord {
    /// Manifest key, i.e. the encoded module path. Empty for the root.
    pub key: String,

    /// Raw source address the module was installed from. Empty for the root.
    #[serde(rename = "source", default)]
    pub source_addr: String,

    /// Resolved version, absent for local and unversioned sources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<semver::Version>,

    /// Directory holding the installed copy of the module.
    pub dir: PathBuf,
}

impl ModuleRecord {
    /// Record for the root module living in `dir`.
    pub fn root(dir: impl Into<PathBuf>) -> Self {
        Self {
            key: String::new(),
            source_addr: String::new(),
            version: None,
            dir: dir.into(),
        }
    }

    /// Whether this is the root module's record.
    pub fn is_root(&self) -> bool {
        self.key.is_empty()
    }
}

/// On-disk layout of the module manifest (`modules.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestSnapshot {
    /// Snapshot format version
    #[serde(default = "default_format")]
    pub format: u32,

    /// Installed modules, ordered by key
    #[serde(default)]
    pub modules: Vec<ModuleRecord>,
}

fn default_format() -> u32 {
    SNAPSHOT_FORMAT
}

impl ManifestSnapshot {
    /// Build a snapshot from records, sorting them by key for stable output.
    pub fn new(records: impl IntoIterator<Item = ModuleRecord>) -> Self {
        let mut modules: Vec<ModuleRecord> = records.into_iter().collect();
        modules.sort_by(|a, b| a.key.cmp(&b.key));
        Self {
            format: SNAPSHOT_FORMAT,
            modules,
        }
    }
}

impl Default for ManifestSnapshot {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}
