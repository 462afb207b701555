//! Module registry lookups.
//!
//! A registry maps `namespace/name/provider` addresses to the versions
//! available for them and where each version's package can be downloaded.
//! The bundled [`IndexRegistry`] is backed by a TOML index file:
//!
//! ```toml
//! [modules."acme/vpc/aws"]
//! "1.2.0" = "https://example.com/vpc-1.2.0.tar.gz"
//! "1.3.1" = "archives/vpc-1.3.1.tar.gz"   # relative to the index file
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use semver::{Version, VersionReq};
use serde::Deserialize;
use thiserror::Error;

use crate::source::RegistryAddress;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Module {0} was not found in the registry")]
    NotFound(String),

    #[error("No version of {module} matches {constraint}")]
    NoMatchingVersion { module: String, constraint: String },

    #[error("Failed to read registry index {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse registry index: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid version {version:?} for {module} in registry index: {source}")]
    InvalidVersion {
        module: String,
        version: String,
        #[source]
        source: semver::Error,
    },
}

/// One downloadable version of a registry module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryRelease {
    pub version: Version,
    pub download_url: String,
}

/// Source of module versions for registry addresses.
pub trait ModuleRegistry {
    /// All releases known for `addr`, in no particular order.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if the registry does not know the
    /// module, or another error if the lookup itself fails.
    fn versions(&self, addr: &RegistryAddress) -> Result<Vec<RegistryRelease>, RegistryError>;
}

/// Pick the newest release allowed by `constraint`.
///
/// Without a constraint the newest stable release is chosen; pre-releases are
/// only selected when a constraint explicitly admits them.
pub fn select_version<'a>(
    releases: &'a [RegistryRelease],
    constraint: Option<&VersionReq>,
) -> Option<&'a RegistryRelease> {
    releases
        .iter()
        .filter(|r| match constraint {
            Some(req) => req.matches(&r.version),
            None => r.version.pre.is_empty(),
        })
        .max_by(|a, b| a.version.cmp(&b.version))
}

#[derive(Deserialize)]
struct RawIndex {
    #[serde(default)]
    modules: BTreeMap<String, BTreeMap<String, String>>,
}

/// A registry backed by a TOML index file.
#[derive(Debug, Clone, Default)]
pub struct IndexRegistry {
    modules: BTreeMap<String, Vec<RegistryRelease>>,
}

impl IndexRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load an index file. Relative download locations are resolved against
    /// the directory containing the index.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if it lists
    /// a version that is not valid semver.
    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let content = fs::read_to_string(path).map_err(|source| RegistryError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        Self::from_toml(&content, base)
    }

    /// Parse index content, resolving relative download locations against `base`.
    ///
    /// # Errors
    ///
    /// Returns an error if the content is not a valid index.
    pub fn from_toml(content: &str, base: &Path) -> Result<Self, RegistryError> {
        let raw: RawIndex = toml::from_str(content)?;
        let mut registry = Self::new();

        for (module, versions) in raw.modules {
            for (version, location) in versions {
                let parsed =
                    Version::parse(&version).map_err(|source| RegistryError::InvalidVersion {
                        module: module.clone(),
                        version: version.clone(),
                        source,
                    })?;
                registry.insert(
                    &module,
                    RegistryRelease {
                        version: parsed,
                        download_url: resolve_location(base, &location),
                    },
                );
            }
        }

        Ok(registry)
    }

    /// Register a release for the module address `module`.
    pub fn insert(&mut self, module: &str, release: RegistryRelease) {
        self.modules
            .entry(module.to_string())
            .or_default()
            .push(release);
    }
}

impl ModuleRegistry for IndexRegistry {
    fn versions(&self, addr: &RegistryAddress) -> Result<Vec<RegistryRelease>, RegistryError> {
        let key = addr.to_string();
        self.modules
            .get(&key)
            .cloned()
            .ok_or(RegistryError::NotFound(key))
    }
}

fn resolve_location(base: &Path, location: &str) -> String {
    if location.contains("://") || Path::new(location).is_absolute() {
        location.to_string()
    } else {
        base.join(location).to_string_lossy().into_owned()
    }
}
