//! Install hooks for progress reporting.
//!
//! The walker notifies an [`InstallHooks`] implementation when a download
//! starts and when a module is ready for use. Calls are strictly sequential,
//! but no particular ordering across modules is promised. Hooks observe the
//! installation; they cannot influence it.

use std::path::Path;

use semver::Version;

pub trait InstallHooks {
    /// A remote package is about to be fetched for `module_addr`.
    fn download(&self, module_addr: &str, package_addr: &str, version: Option<&Version>);

    /// The module at `module_addr` is installed in `local_path`.
    ///
    /// Fired for every freshly installed module, including local ones that
    /// needed no download.
    fn install(&self, module_addr: &str, version: Option<&Version>, local_path: &Path);
}

impl<T: InstallHooks + ?Sized> InstallHooks for &T {
    fn download(&self, module_addr: &str, package_addr: &str, version: Option<&Version>) {
        (**self).download(module_addr, package_addr, version);
    }

    fn install(&self, module_addr: &str, version: Option<&Version>, local_path: &Path) {
        (**self).install(module_addr, version, local_path);
    }
}

impl<T: InstallHooks + ?Sized> InstallHooks for std::sync::Arc<T> {
    fn download(&self, module_addr: &str, package_addr: &str, version: Option<&Version>) {
        (**self).download(module_addr, package_addr, version);
    }

    fn install(&self, module_addr: &str, version: Option<&Version>, local_path: &Path) {
        (**self).install(module_addr, version, local_path);
    }
}

/// A no-op hook set for silent operations (e.g., scripting, testing).
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl InstallHooks for NoopHooks {
    fn download(&self, _: &str, _: &str, _: Option<&Version>) {}
    fn install(&self, _: &str, _: Option<&Version>, _: &Path) {}
}

/// Hooks that forward every event to `tracing` at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingHooks;

impl InstallHooks for TracingHooks {
    fn download(&self, module_addr: &str, package_addr: &str, version: Option<&Version>) {
        match version {
            Some(v) => tracing::info!(module = module_addr, package = package_addr, version = %v, "downloading"),
            None => tracing::info!(module = module_addr, package = package_addr, "downloading"),
        }
    }

    fn install(&self, module_addr: &str, version: Option<&Version>, local_path: &Path) {
        match version {
            Some(v) => tracing::info!(module = module_addr, version = %v, path = %local_path.display(), "installed"),
            None => tracing::info!(module = module_addr, path = %local_path.display(), "installed"),
        }
    }
}
