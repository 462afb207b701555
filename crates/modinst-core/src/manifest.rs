//! Module manifest: which module paths are installed, where, and from what.
//!
//! The manifest lives in memory for the duration of an installation run and
//! is persisted as `modules.json` inside the modules directory. Records are
//! keyed by the encoded [`ModulePath`](modinst_schema::ModulePath).

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use modinst_schema::{
    KEY_SEPARATOR, MANIFEST_FILENAME, ManifestSnapshot, ModuleRecord, PACKAGES_DIRNAME,
    SNAPSHOT_FORMAT,
};
use thiserror::Error;

/// Errors that can occur while loading or persisting the manifest.
#[derive(Error, Debug)]
pub enum ManifestError {
    /// The snapshot exists but could not be read.
    #[error("Failed to read module manifest {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The snapshot is not valid JSON or does not match the schema.
    #[error("Module manifest {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The snapshot was written by a newer, incompatible version.
    #[error("Module manifest {path} has unsupported format version {found}")]
    UnsupportedFormat { path: PathBuf, found: u32 },

    /// Writing or renaming the snapshot failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The in-memory manifest could not be serialized.
    #[error("Serialize error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// In-memory module manifest bound to a modules directory.
#[derive(Debug, Clone)]
pub struct ModuleStore {
    dir: PathBuf,
    records: BTreeMap<String, ModuleRecord>,
}

impl ModuleStore {
    /// Create an empty store for `dir` without touching the filesystem.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            records: BTreeMap::new(),
        }
    }

    /// Load the manifest snapshot from `dir`.
    ///
    /// A missing snapshot yields an empty store so that the first run is
    /// treated the same as subsequent ones.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot exists but cannot be read, is not a
    /// valid snapshot, or uses an unknown format version.
    pub fn load(dir: impl Into<PathBuf>) -> Result<Self, ManifestError> {
        let mut store = Self::new(dir);
        let path = store.manifest_path();

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no module manifest yet");
                return Ok(store);
            }
            Err(source) => return Err(ManifestError::Read { path, source }),
        };

        let snapshot: ManifestSnapshot = serde_json::from_str(&content)
            .map_err(|source| ManifestError::Corrupt {
                path: path.clone(),
                source,
            })?;

        if snapshot.format > SNAPSHOT_FORMAT {
            return Err(ManifestError::UnsupportedFormat {
                path,
                found: snapshot.format,
            });
        }

        for record in snapshot.modules {
            store.records.insert(record.key.clone(), record);
        }
        tracing::debug!(records = store.records.len(), "loaded module manifest");

        Ok(store)
    }

    /// The modules directory this store persists into.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Location of the snapshot file.
    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(MANIFEST_FILENAME)
    }

    /// Install directory for the fetched package of the module at `key`.
    pub fn package_dir(&self, key: &str) -> PathBuf {
        self.dir.join(PACKAGES_DIRNAME).join(key)
    }

    pub fn get(&self, key: &str) -> Option<&ModuleRecord> {
        self.records.get(key)
    }

    /// Insert or overwrite the record for `record.key`.
    pub fn put(&mut self, record: ModuleRecord) {
        self.records.insert(record.key.clone(), record);
    }

    pub fn delete(&mut self, key: &str) -> Option<ModuleRecord> {
        self.records.remove(key)
    }

    /// Remove the record for `key` and every record below it in the tree.
    ///
    /// Returns the number of records removed.
    pub fn delete_subtree(&mut self, key: &str) -> usize {
        let before = self.records.len();
        if key.is_empty() {
            self.records.clear();
            return before;
        }

        let prefix = format!("{key}{KEY_SEPARATOR}");
        self.records
            .retain(|k, _| k != key && !k.starts_with(&prefix));
        before - self.records.len()
    }

    /// All records in key order.
    pub fn records(&self) -> impl Iterator<Item = &ModuleRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn snapshot(&self) -> ManifestSnapshot {
        ManifestSnapshot::new(self.records.values().cloned())
    }

    /// Atomically persist the manifest to `modules.json`.
    ///
    /// The snapshot is first written to a temporary file next to the target
    /// and then renamed over it, so readers never observe a partially written
    /// manifest.
    ///
    /// # Errors
    ///
    /// Returns an error if the modules directory cannot be created or if
    /// serialization, writing, or the rename fails.
    pub fn write_snapshot(&self) -> Result<(), ManifestError> {
        fs::create_dir_all(&self.dir)?;

        let content = serde_json::to_string_pretty(&self.snapshot())?;
        let path = self.manifest_path();
        let temp_path = path.with_extension("json.tmp");

        fs::write(&temp_path, content)?;
        fs::rename(&temp_path, &path)?;

        tracing::debug!(path = %path.display(), records = self.records.len(), "wrote module manifest");
        Ok(())
    }
}

impl PartialEq for ModuleStore {
    fn eq(&self, other: &Self) -> bool {
        self.records == other.records
    }
}
