//! Module configuration: loading module directories and building the tree.
//!
//! A module is a directory. Its child module calls are declared in an
//! optional `module.toml`; everything else in the directory belongs to the
//! module itself and is not interpreted here.

mod parser;
mod tree;

use std::path::{Path, PathBuf};

use modinst_schema::{ModulePath, SourceRange};
use semver::{Version, VersionReq};

use crate::diagnostics::Diagnostics;

pub use parser::{MODULE_FILENAME, ModuleParser, parse_module};
pub use tree::{LoadedModule, MAX_MODULE_DEPTH, ModuleTree, ModuleWalker, WalkError, build_tree};

/// Loads module directories.
pub trait ConfigParser {
    /// Load the module in `dir`.
    ///
    /// Returns `None` when the directory is missing or unreadable. A module
    /// with errors in its declarations is still returned, alongside error
    /// diagnostics, with the offending calls left out.
    fn load_dir(&self, dir: &Path) -> (Option<Module>, Diagnostics);
}

impl<T: ConfigParser + ?Sized> ConfigParser for &T {
    fn load_dir(&self, dir: &Path) -> (Option<Module>, Diagnostics) {
        (**self).load_dir(dir)
    }
}

/// The parsed declarations of one module directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    pub dir: PathBuf,
    pub calls: Vec<ModuleCall>,
}

impl Module {
    /// A module that declares no children.
    pub fn empty(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            calls: Vec::new(),
        }
    }
}

/// A `[[module]]` block: a reference from one module to a child module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleCall {
    pub name: String,
    pub source_addr: String,
    pub version: VersionConstraint,
    pub decl_range: SourceRange,
    pub source_addr_range: SourceRange,
}

/// An optional version requirement plus where it was declared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionConstraint {
    pub required: Option<VersionReq>,
    pub decl_range: Option<SourceRange>,
}

impl VersionConstraint {
    pub fn is_empty(&self) -> bool {
        self.required.is_none()
    }

    /// Whether `version` satisfies the constraint. No constraint allows anything.
    pub fn allows(&self, version: &Version) -> bool {
        self.required.as_ref().is_none_or(|req| req.matches(version))
    }
}

/// A request, issued while building the tree, to resolve one module call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRequest {
    pub name: String,
    pub path: ModulePath,
    pub parent_path: ModulePath,
    pub source_addr: String,
    pub version: VersionConstraint,
    pub call_range: SourceRange,
    pub source_addr_range: SourceRange,
}

impl ModuleRequest {
    /// Request for `call` declared by the module at `parent_path`.
    pub fn new(parent_path: &ModulePath, call: &ModuleCall) -> Self {
        Self {
            name: call.name.clone(),
            path: parent_path.child(&call.name),
            parent_path: parent_path.clone(),
            source_addr: call.source_addr.clone(),
            version: call.version.clone(),
            call_range: call.decl_range.clone(),
            source_addr_range: call.source_addr_range.clone(),
        }
    }
}
