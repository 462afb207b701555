use std::collections::HashMap;
use std::fs;
use std::path::Path;

use modinst_schema::{ModulePath, SourceRange};
use semver::VersionReq;
use serde::Deserialize;
use toml::Spanned;

use super::{ConfigParser, Module, ModuleCall, VersionConstraint};
use crate::diagnostics::{Diagnostic, Diagnostics};

/// Name of the file declaring a module's children.
pub const MODULE_FILENAME: &str = "module.toml";

#[derive(Deserialize)]
struct RawModuleFile {
    #[serde(default, rename = "module")]
    calls: Vec<RawModuleCall>,
}

#[derive(Deserialize)]
struct RawModuleCall {
    name: Spanned<String>,
    source: Spanned<String>,
    #[serde(default)]
    version: Option<Spanned<String>>,
}

/// Reads `module.toml` files from module directories.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModuleParser;

impl ConfigParser for ModuleParser {
    fn load_dir(&self, dir: &Path) -> (Option<Module>, Diagnostics) {
        let mut diags = Diagnostics::new();

        match fs::metadata(dir) {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                diags.push(Diagnostic::error(
                    "Failed to read module directory",
                    format!("{} is not a directory.", dir.display()),
                ));
                return (None, diags);
            }
            Err(e) => {
                diags.push(Diagnostic::error(
                    "Failed to read module directory",
                    format!("Module directory {} could not be read: {e}", dir.display()),
                ));
                return (None, diags);
            }
        }

        let file = dir.join(MODULE_FILENAME);
        let text = match fs::read_to_string(&file) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return (Some(Module::empty(dir)), diags);
            }
            Err(e) => {
                diags.push(Diagnostic::error(
                    "Failed to read module file",
                    format!("The file {} could not be read: {e}", file.display()),
                ));
                return (Some(Module::empty(dir)), diags);
            }
        };

        let (module, parse_diags) = parse_module(dir, &file, &text);
        diags.extend(parse_diags);
        (Some(module), diags)
    }
}

/// Parse the contents of a module file living in `dir`.
///
/// Calls with invalid declarations are reported and left out of the module.
pub fn parse_module(dir: &Path, file: &Path, text: &str) -> (Module, Diagnostics) {
    let mut diags = Diagnostics::new();
    let mut module = Module::empty(dir);

    let raw: RawModuleFile = match toml::from_str(text) {
        Ok(raw) => raw,
        Err(e) => {
            let subject = e
                .span()
                .map(|span| SourceRange::from_offset(file, text, span.start));
            diags.push(
                Diagnostic::error("Invalid module file", e.message().to_string())
                    .with_subject(subject.as_ref()),
            );
            return (module, diags);
        }
    };

    // Anything besides `[[module]]` is ignored
    if let Ok(table) = text.parse::<toml::Table>() {
        for key in table.keys().filter(|k| k.as_str() != "module") {
            diags.push(Diagnostic::warning(
                "Unsupported setting",
                format!(
                    "{key:?} in {} is not a module file setting and has no effect.",
                    file.display()
                ),
            ));
        }
    }

    let range = |offset: usize| SourceRange::from_offset(file, text, offset);
    let mut seen: HashMap<String, SourceRange> = HashMap::new();

    for call in raw.calls {
        let decl_range = range(call.name.span().start);
        let name = call.name.into_inner();

        if !ModulePath::is_valid_segment(&name) {
            diags.push(
                Diagnostic::error(
                    "Invalid module name",
                    format!(
                        "{name:?} is not a valid module name. Names must start with a letter or underscore and may contain only letters, digits, underscores and dashes."
                    ),
                )
                .with_subject(Some(&decl_range)),
            );
            continue;
        }

        if let Some(previous) = seen.get(&name) {
            diags.push(
                Diagnostic::error(
                    "Duplicate module call",
                    format!("A module call named {name:?} was already declared at {previous}."),
                )
                .with_subject(Some(&decl_range)),
            );
            continue;
        }

        let source_addr_range = range(call.source.span().start);
        let source_addr = call.source.into_inner();
        if source_addr.trim().is_empty() {
            diags.push(
                Diagnostic::error(
                    "Missing source address",
                    format!("Module {name:?} must declare a non-empty source address."),
                )
                .with_subject(Some(&source_addr_range)),
            );
            continue;
        }

        let mut version = VersionConstraint::default();
        if let Some(raw_version) = call.version {
            let version_range = range(raw_version.span().start);
            match VersionReq::parse(raw_version.get_ref()) {
                Ok(req) => {
                    version.required = Some(req);
                    version.decl_range = Some(version_range);
                }
                Err(e) => {
                    diags.push(
                        Diagnostic::error(
                            "Invalid version constraint",
                            format!(
                                "{:?} is not a valid version constraint: {e}",
                                raw_version.get_ref()
                            ),
                        )
                        .with_subject(Some(&version_range)),
                    );
                    continue;
                }
            }
        }

        seen.insert(name.clone(), decl_range.clone());
        module.calls.push(ModuleCall {
            name,
            source_addr,
            version,
            decl_range,
            source_addr_range,
        });
    }

    (module, diags)
}
