pub mod config;
pub mod diagnostics;
pub mod hooks;
pub mod install;
pub mod io;
pub mod manifest;
pub mod registry;
pub mod settings;
pub mod source;
pub mod strategies;
pub mod types;

pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use hooks::{InstallHooks, NoopHooks, TracingHooks};
pub use install::{Installer, SetupError, needs_replace};
pub use manifest::{ManifestError, ModuleStore};
pub use settings::{Settings, SettingsError};
pub use strategies::Strategy;

/// User Agent string for registry and package downloads
pub const USER_AGENT: &str = concat!("modinst/", env!("CARGO_PKG_VERSION"));
