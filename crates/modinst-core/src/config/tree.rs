use modinst_schema::ModulePath;
use semver::Version;
use thiserror::Error;

use super::{Module, ModuleRequest};
use crate::diagnostics::{Diagnostic, Diagnostics};

/// Deepest module nesting the tree builder will descend into.
pub const MAX_MODULE_DEPTH: usize = 64;

/// Failures that break the traversal itself rather than a single module.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum WalkError {
    /// A child was requested before its parent was recorded.
    #[error("missing manifest record for parent module {0:?}")]
    MissingParentRecord(String),
}

/// Result of resolving one module request.
#[derive(Debug, Default)]
pub struct LoadedModule {
    /// Loaded module content, or `None` if it could not be obtained.
    pub module: Option<Module>,
    pub version: Option<Version>,
    pub diagnostics: Diagnostics,
}

impl LoadedModule {
    /// A failed resolution carrying only diagnostics.
    pub fn failed(diagnostics: Diagnostics) -> Self {
        Self {
            module: None,
            version: None,
            diagnostics,
        }
    }
}

/// Resolves module requests while the tree is being built.
pub trait ModuleWalker {
    /// Produce the module for `req`.
    ///
    /// # Errors
    ///
    /// Returns an error only for failures that make continuing the walk
    /// meaningless; everything else is reported through diagnostics.
    fn load_module(&mut self, req: &ModuleRequest) -> Result<LoadedModule, WalkError>;
}

impl<F> ModuleWalker for F
where
    F: FnMut(&ModuleRequest) -> Result<LoadedModule, WalkError>,
{
    fn load_module(&mut self, req: &ModuleRequest) -> Result<LoadedModule, WalkError> {
        self(req)
    }
}

/// A module together with every child that could be resolved.
#[derive(Debug, Clone)]
pub struct ModuleTree {
    pub path: ModulePath,
    pub source_addr: String,
    pub version: Option<Version>,
    pub module: Module,
    pub children: Vec<ModuleTree>,
}

impl ModuleTree {
    /// Number of modules in the tree, including this one.
    pub fn len(&self) -> usize {
        1 + self.children.iter().map(ModuleTree::len).sum::<usize>()
    }
}

/// Build the full module tree below `root`, asking `walker` for every module
/// call encountered.
///
/// # Errors
///
/// Propagates the first [`WalkError`] returned by the walker.
pub fn build_tree(
    root: Module,
    walker: &mut dyn ModuleWalker,
) -> Result<(ModuleTree, Diagnostics), WalkError> {
    let mut diags = Diagnostics::new();
    let mut tree = ModuleTree {
        path: ModulePath::root(),
        source_addr: String::new(),
        version: None,
        module: root,
        children: Vec::new(),
    };

    build_children(&mut tree, walker, &mut diags)?;
    Ok((tree, diags))
}

fn build_children(
    node: &mut ModuleTree,
    walker: &mut dyn ModuleWalker,
    diags: &mut Diagnostics,
) -> Result<(), WalkError> {
    for call in &node.module.calls {
        let req = ModuleRequest::new(&node.path, call);

        if req.path.depth() > MAX_MODULE_DEPTH {
            diags.push(
                Diagnostic::error(
                    "Module nesting too deep",
                    format!(
                        "Module {} is nested more than {MAX_MODULE_DEPTH} levels deep; the module sources probably form a cycle.",
                        req.path
                    ),
                )
                .with_subject(Some(&req.call_range)),
            );
            continue;
        }

        let loaded = walker.load_module(&req)?;
        diags.extend(loaded.diagnostics);

        let Some(module) = loaded.module else {
            continue;
        };

        let mut child = ModuleTree {
            path: req.path,
            source_addr: req.source_addr,
            version: loaded.version,
            module,
            children: Vec::new(),
        };
        build_children(&mut child, walker, diags)?;
        node.children.push(child);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ModuleCall, VersionConstraint};
    use modinst_schema::SourceRange;

    fn call(name: &str, source: &str) -> ModuleCall {
        ModuleCall {
            name: name.to_string(),
            source_addr: source.to_string(),
            version: VersionConstraint::default(),
            decl_range: SourceRange::new("module.toml", 1, 1),
            source_addr_range: SourceRange::new("module.toml", 2, 1),
        }
    }

    #[test]
    fn test_requests_carry_parent_paths() {
        let root = Module {
            dir: "root".into(),
            calls: vec![call("a", "./a"), call("b", "./b")],
        };

        let mut seen = Vec::new();
        let mut walker = |req: &ModuleRequest| -> Result<LoadedModule, WalkError> {
            seen.push((req.path.key(), req.parent_path.key()));
            let calls = if req.name == "a" {
                vec![call("c", "./c")]
            } else {
                vec![]
            };
            Ok(LoadedModule {
                module: Some(Module {
                    dir: req.source_addr.clone().into(),
                    calls,
                }),
                ..LoadedModule::default()
            })
        };

        let (tree, diags) = build_tree(root, &mut walker).unwrap();
        assert!(diags.is_empty());
        assert_eq!(tree.len(), 4);
        assert_eq!(
            seen,
            vec![
                ("a".to_string(), String::new()),
                ("a.c".to_string(), "a".to_string()),
                ("b".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn test_failed_modules_are_not_descended() {
        let root = Module {
            dir: "root".into(),
            calls: vec![call("gone", "./gone")],
        };

        let mut walker = |_: &ModuleRequest| -> Result<LoadedModule, WalkError> {
            Ok(LoadedModule::failed(
                Diagnostic::error("Unreadable module directory", "").into(),
            ))
        };

        let (tree, diags) = build_tree(root, &mut walker).unwrap();
        assert!(tree.children.is_empty());
        assert_eq!(diags.summaries(), vec!["Unreadable module directory"]);
    }

    #[test]
    fn test_self_referencing_module_stops_at_depth_limit() {
        let root = Module {
            dir: "root".into(),
            calls: vec![call("loop", "./")],
        };

        let mut calls = 0;
        let mut walker = |_: &ModuleRequest| -> Result<LoadedModule, WalkError> {
            calls += 1;
            Ok(LoadedModule {
                module: Some(Module {
                    dir: "root".into(),
                    calls: vec![call("loop", "./")],
                }),
                ..LoadedModule::default()
            })
        };

        let (_, diags) = build_tree(root, &mut walker).unwrap();
        assert_eq!(calls, MAX_MODULE_DEPTH);
        assert_eq!(diags.summaries(), vec!["Module nesting too deep"]);
    }

    #[test]
    fn test_walk_error_aborts() {
        let root = Module {
            dir: "root".into(),
            calls: vec![call("a", "./a")],
        };
        let mut walker = |_: &ModuleRequest| -> Result<LoadedModule, WalkError> {
            Err(WalkError::MissingParentRecord(String::new()))
        };

        assert_eq!(
            build_tree(root, &mut walker).unwrap_err(),
            WalkError::MissingParentRecord(String::new())
        );
    }
}
