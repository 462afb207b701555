//! Module installation: walk the module tree and bring every module into the
//! modules directory.
//!
//! # Implementation Note: Reuse, Replace, Install
//!
//! Every module call found while building the tree goes through one decision:
//!
//! 1. `Replace`: the call changed (new source, version no longer allowed, or
//!    an upgrade was requested). The record and every record below it are
//!    dropped, since descendants were resolved against the old content.
//! 2. `Reuse`: a record survived and its directory is still there. The module
//!    is re-read in place; nothing is written and no hooks fire.
//! 3. `Install`: no usable record. Local sources are loaded where they are;
//!    everything else goes through the strategy registered for its kind and
//!    is fetched into `<modules_dir>/packages/<key>`.

use std::io;
use std::path::{Component, Path, PathBuf};

use modinst_schema::ModuleRecord;
use thiserror::Error;

use crate::config::{
    ConfigParser, LoadedModule, ModuleParser, ModuleRequest, ModuleWalker, WalkError, build_tree,
};
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::hooks::InstallHooks;
use crate::io::fetch::{ArchiveFetcher, FetchError, PackageFetcher};
use crate::manifest::{ManifestError, ModuleStore};
use crate::registry::{IndexRegistry, RegistryError};
use crate::settings::Settings;
use crate::source::{SourceKind, classify};
use crate::strategies::{DirectStrategy, RegistryStrategy, Strategies};

/// Failures while assembling an [`Installer`] from settings.
#[derive(Error, Debug)]
pub enum SetupError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// Whether the module requested by `req` must be reinstalled given what the
/// manifest currently holds for it.
///
/// A record without a version (local and unversioned sources) satisfies any
/// constraint.
pub fn needs_replace(upgrade: bool, existing: Option<&ModuleRecord>, req: &ModuleRequest) -> bool {
    if upgrade {
        return true;
    }
    match existing {
        None => true,
        Some(record) if record.source_addr != req.source_addr => true,
        Some(record) => record
            .version
            .as_ref()
            .is_some_and(|v| !req.version.allows(v)),
    }
}

/// Installs module trees into a modules directory.
pub struct Installer<P = ModuleParser> {
    parser: P,
    store: ModuleStore,
    strategies: Strategies,
    fetcher: Box<dyn PackageFetcher>,
}

impl<P: std::fmt::Debug> std::fmt::Debug for Installer<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Installer")
            .field("parser", &self.parser)
            .field("modules_dir", &self.store.dir())
            .field("strategies", &self.strategies)
            .finish_non_exhaustive()
    }
}

impl Installer<ModuleParser> {
    /// Installer over `store` that handles remote archive URLs directly and
    /// has no registry configured.
    pub fn new(store: ModuleStore) -> Self {
        Self::with_parts(
            ModuleParser,
            store,
            Strategies::new().with(SourceKind::Remote, DirectStrategy),
            Box::new(ArchiveFetcher::new()),
        )
    }

    /// Build an installer from resolved settings, loading the existing
    /// manifest snapshot and the registry index if one is configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest or registry index cannot be loaded,
    /// or the HTTP client cannot be created.
    pub fn from_settings(settings: &Settings) -> Result<Self, SetupError> {
        let store = ModuleStore::load(&settings.modules_dir)?;

        let mut strategies = Strategies::new().with(SourceKind::Remote, DirectStrategy);
        if let Some(index) = &settings.registry_index {
            let registry = IndexRegistry::load(index)?;
            tracing::debug!(index = %index.display(), "using registry index");
            strategies = strategies.with(SourceKind::Registry, RegistryStrategy::new(registry));
        }

        #[cfg(feature = "network")]
        let fetcher = ArchiveFetcher::with_user_agent(&settings.user_agent)?;
        #[cfg(not(feature = "network"))]
        let fetcher = ArchiveFetcher::new();

        Ok(Self::with_parts(ModuleParser, store, strategies, Box::new(fetcher)))
    }
}

impl<P: ConfigParser> Installer<P> {
    pub fn with_parts(
        parser: P,
        store: ModuleStore,
        strategies: Strategies,
        fetcher: Box<dyn PackageFetcher>,
    ) -> Self {
        Self {
            parser,
            store,
            strategies,
            fetcher,
        }
    }

    pub fn with_strategies(mut self, strategies: Strategies) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn with_fetcher(mut self, fetcher: impl PackageFetcher + 'static) -> Self {
        self.fetcher = Box::new(fetcher);
        self
    }

    pub fn store(&self) -> &ModuleStore {
        &self.store
    }

    /// Install every module reachable from the root module in `root_dir`.
    ///
    /// Problems with individual modules are reported as diagnostics and the
    /// walk carries on with the rest of the tree. The manifest snapshot is
    /// written whenever the walk completes, even if some modules failed.
    ///
    /// # Errors
    ///
    /// Returns an error only when the manifest is internally inconsistent,
    /// in which case nothing is written.
    pub fn install_modules(
        &mut self,
        root_dir: &Path,
        upgrade: bool,
        hooks: &dyn InstallHooks,
    ) -> Result<Diagnostics, WalkError> {
        let (root, mut diags) = self.parser.load_dir(root_dir);
        let Some(root) = root else {
            return Ok(diags);
        };

        tracing::debug!(root = %root_dir.display(), upgrade, "installing modules");

        // Relative child sources of the root resolve against this record.
        self.store.put(ModuleRecord::root(root_dir));

        let mut walk = InstallWalk {
            parser: &self.parser,
            store: &mut self.store,
            strategies: &self.strategies,
            fetcher: &*self.fetcher,
            hooks,
            upgrade,
        };
        let (tree, tree_diags) = build_tree(root, &mut walk)?;
        diags.extend(tree_diags);
        tracing::debug!(modules = tree.len(), "module tree complete");

        if let Err(e) = self.store.write_snapshot() {
            diags.push(Diagnostic::error(
                "Failed to update module manifest",
                format!("Unable to write the module manifest file: {e}"),
            ));
        }

        Ok(diags)
    }
}

/// Per-run state handed to the tree builder.
struct InstallWalk<'a, P> {
    parser: &'a P,
    store: &'a mut ModuleStore,
    strategies: &'a Strategies,
    fetcher: &'a dyn PackageFetcher,
    hooks: &'a dyn InstallHooks,
    upgrade: bool,
}

impl<P: ConfigParser> ModuleWalker for InstallWalk<'_, P> {
    fn load_module(&mut self, req: &ModuleRequest) -> Result<LoadedModule, WalkError> {
        let key = req.path.key();
        let inst_path = self.store.package_dir(&key);

        if needs_replace(self.upgrade, self.store.get(&key), req) {
            let removed = self.store.delete_subtree(&key);
            if removed > 0 {
                tracing::debug!(module = %key, removed, "invalidated module records");
            }
        }

        match self.store.get(&key) {
            None => {
                if let Err(e) = remove_stale_dir(&inst_path) {
                    tracing::warn!(module = %key, path = %inst_path.display(), error = %e, "failed to remove stale module directory");
                    return Ok(LoadedModule::failed(
                        Diagnostic::error(
                            "Failed to remove local module cache",
                            format!(
                                "Tried to remove {} in order to reinstall this module, but encountered an error: {e}",
                                inst_path.display()
                            ),
                        )
                        .with_subject(Some(&req.call_range))
                        .into(),
                    ));
                }
            }
            Some(record) if record.dir.is_dir() => {
                tracing::debug!(module = %key, dir = %record.dir.display(), "reusing installed module");
                let version = record.version.clone();
                let (module, diagnostics) = self.parser.load_dir(&record.dir);
                return Ok(LoadedModule {
                    module,
                    version,
                    diagnostics,
                });
            }
            Some(_) => {}
        }

        match classify(&req.source_addr) {
            SourceKind::Local => self.install_local(&key, req),
            kind => Ok(self.install_package(kind, &key, &inst_path, req)),
        }
    }
}

impl<P: ConfigParser> InstallWalk<'_, P> {
    fn install_local(&mut self, key: &str, req: &ModuleRequest) -> Result<LoadedModule, WalkError> {
        let parent_key = req.parent_path.key();
        let parent_dir = self
            .store
            .get(&parent_key)
            .map(|r| r.dir.clone())
            .ok_or(WalkError::MissingParentRecord(parent_key))?;

        let mut diagnostics = Diagnostics::new();
        if !req.version.is_empty() {
            diagnostics.push(
                Diagnostic::error(
                    "Invalid version constraint",
                    "A version constraint cannot be applied to a module at a relative local path.",
                )
                .with_subject(req.version.decl_range.as_ref()),
            );
        }

        let dir = join_normalized(&parent_dir, &req.source_addr);
        let (module, load_diags) = self.parser.load_dir(&dir);
        let Some(module) = module else {
            diagnostics.push(unreadable_dir(&dir, req));
            return Ok(LoadedModule::failed(diagnostics));
        };
        diagnostics.extend(load_diags);

        tracing::debug!(module = key, dir = %dir.display(), "using local module");
        self.store.put(ModuleRecord {
            key: key.to_string(),
            source_addr: req.source_addr.clone(),
            version: None,
            dir: dir.clone(),
        });
        self.hooks.install(key, None, &dir);

        Ok(LoadedModule {
            module: Some(module),
            version: None,
            diagnostics,
        })
    }

    fn install_package(
        &mut self,
        kind: SourceKind,
        key: &str,
        inst_path: &Path,
        req: &ModuleRequest,
    ) -> LoadedModule {
        let mut diagnostics = Diagnostics::new();
        if kind == SourceKind::Remote && !req.version.is_empty() {
            diagnostics.push(
                Diagnostic::error(
                    "Invalid version constraint",
                    "A version constraint can only be applied to a module from a module registry.",
                )
                .with_subject(req.version.decl_range.as_ref()),
            );
        }

        let resolved = match self.strategies.resolve(kind, req) {
            Ok(resolved) => resolved,
            Err(e) => {
                diagnostics.push(
                    Diagnostic::error(
                        "Failed to resolve module source",
                        format!("Could not resolve {:?}: {e}", req.source_addr),
                    )
                    .with_subject(Some(&req.source_addr_range)),
                );
                return LoadedModule::failed(diagnostics);
            }
        };

        let version = resolved.version;
        let package_addr = if kind == SourceKind::Remote {
            self.anchor_file_addr(resolved.package_addr, req)
        } else {
            resolved.package_addr
        };

        self.hooks.download(key, &package_addr, version.as_ref());
        if let Err(e) = self
            .fetcher
            .fetch(&package_addr, version.as_ref(), inst_path)
        {
            tracing::warn!(module = key, package = %package_addr, error = %e, "fetch failed");
            diagnostics.push(
                Diagnostic::error(
                    "Failed to download module",
                    format!("Could not download module {key:?} from {package_addr}: {e}"),
                )
                .with_subject(Some(&req.call_range)),
            );
            return LoadedModule::failed(diagnostics);
        }

        let (module, load_diags) = self.parser.load_dir(inst_path);
        let Some(module) = module else {
            diagnostics.push(unreadable_dir(inst_path, req));
            return LoadedModule::failed(diagnostics);
        };
        diagnostics.extend(load_diags);

        tracing::info!(module = key, package = %package_addr, "installed module");
        self.store.put(ModuleRecord {
            key: key.to_string(),
            source_addr: req.source_addr.clone(),
            version: version.clone(),
            dir: inst_path.to_path_buf(),
        });
        self.hooks.install(key, version.as_ref(), inst_path);

        LoadedModule {
            module: Some(module),
            version,
            diagnostics,
        }
    }
}

impl<P> InstallWalk<'_, P> {
    /// A relative archive path is relative to the declaring module's
    /// directory, not to the working directory of the process.
    fn anchor_file_addr(&self, addr: String, req: &ModuleRequest) -> String {
        if addr.contains("://") || addr.contains("::") || Path::new(&addr).is_absolute() {
            return addr;
        }
        match self.store.get(&req.parent_path.key()) {
            Some(parent) => join_normalized(&parent.dir, &addr)
                .to_string_lossy()
                .into_owned(),
            None => addr,
        }
    }
}

fn unreadable_dir(dir: &Path, req: &ModuleRequest) -> Diagnostic {
    Diagnostic::error(
        "Unreadable module directory",
        format!("The directory {} could not be read.", dir.display()),
    )
    .with_subject(Some(&req.source_addr_range))
}

/// Remove a leftover install directory. A missing directory is fine.
fn remove_stale_dir(path: &Path) -> io::Result<()> {
    match std::fs::remove_dir_all(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Join a relative source address onto `base`, folding `.` and `..` lexically.
fn join_normalized(base: &Path, rel: &str) -> PathBuf {
    let mut out = base.to_path_buf();
    for component in Path::new(&rel.replace('\\', "/")).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = matches!(out.components().next_back(), Some(Component::Normal(_)))
                    && out.pop();
                if !popped {
                    out.push("..");
                }
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VersionConstraint;
    use modinst_schema::{ModulePath, SourceRange};
    use semver::{Version, VersionReq};

    fn request(source: &str, constraint: Option<&str>) -> ModuleRequest {
        ModuleRequest {
            name: "net".to_string(),
            path: ModulePath::new(["net"]),
            parent_path: ModulePath::root(),
            source_addr: source.to_string(),
            version: VersionConstraint {
                required: constraint.map(|c| VersionReq::parse(c).unwrap()),
                decl_range: None,
            },
            call_range: SourceRange::new("module.toml", 1, 1),
            source_addr_range: SourceRange::new("module.toml", 3, 10),
        }
    }

    fn record(source: &str, version: Option<&str>) -> ModuleRecord {
        ModuleRecord {
            key: "net".to_string(),
            source_addr: source.to_string(),
            version: version.map(|v| Version::parse(v).unwrap()),
            dir: "mods/net".into(),
        }
    }

    #[test]
    fn test_replace_when_unrecorded_or_upgrading() {
        let req = request("./net", None);
        assert!(needs_replace(false, None, &req));
        assert!(needs_replace(true, Some(&record("./net", None)), &req));
        assert!(!needs_replace(false, Some(&record("./net", None)), &req));
    }

    #[test]
    fn test_replace_when_source_changes() {
        let req = request("./network", None);
        assert!(needs_replace(false, Some(&record("./net", None)), &req));
    }

    #[test]
    fn test_replace_when_version_no_longer_allowed() {
        let existing = record("acme/net/aws", Some("1.2.0"));
        assert!(!needs_replace(
            false,
            Some(&existing),
            &request("acme/net/aws", Some("^1"))
        ));
        assert!(needs_replace(
            false,
            Some(&existing),
            &request("acme/net/aws", Some(">=2"))
        ));
        assert!(!needs_replace(
            false,
            Some(&existing),
            &request("acme/net/aws", None)
        ));
    }

    #[test]
    fn test_unversioned_record_satisfies_any_constraint() {
        let existing = record("./net", None);
        assert!(!needs_replace(
            false,
            Some(&existing),
            &request("./net", Some("=9.9.9"))
        ));
    }

    #[test]
    fn test_join_normalized() {
        assert_eq!(join_normalized(Path::new("root"), "./child"), Path::new("root/child"));
        assert_eq!(
            join_normalized(Path::new("root/a"), "../b"),
            Path::new("root/b")
        );
        assert_eq!(join_normalized(Path::new("root"), ".\\win"), Path::new("root/win"));
        assert_eq!(join_normalized(Path::new("root"), "../../up"), Path::new("../up"));
        assert_eq!(join_normalized(Path::new("root"), "./"), Path::new("root"));
    }

    #[test]
    fn test_local_child_without_parent_record_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ModuleStore::new(dir.path());
        let strategies = Strategies::new();
        let mut walk = InstallWalk {
            parser: &ModuleParser,
            store: &mut store,
            strategies: &strategies,
            fetcher: &ArchiveFetcher::new(),
            hooks: &crate::hooks::NoopHooks,
            upgrade: false,
        };

        let mut req = request("./net", None);
        req.parent_path = ModulePath::new(["missing"]);
        req.path = req.parent_path.child("net");

        assert_eq!(
            walk.load_module(&req).unwrap_err(),
            WalkError::MissingParentRecord("missing".to_string())
        );
    }

    #[test]
    fn test_remove_stale_dir_tolerates_missing() {
        let dir = tempfile::tempdir().unwrap();
        let stale = dir.path().join("net");
        remove_stale_dir(&stale).unwrap();

        std::fs::create_dir_all(stale.join("nested")).unwrap();
        remove_stale_dir(&stale).unwrap();
        assert!(!stale.exists());
    }
}
