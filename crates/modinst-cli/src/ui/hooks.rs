//! Progress lines printed while modules are installed.

use std::cell::Cell;
use std::path::Path;

use crossterm::style::Stylize;
use modinst_core::InstallHooks;
use modinst_core::types::Version;

/// Prints one line per download and per installed module.
#[derive(Debug, Default)]
pub struct ConsoleHooks {
    downloads: Cell<usize>,
    installs: Cell<usize>,
}

impl ConsoleHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn downloads(&self) -> usize {
        self.downloads.get()
    }

    pub fn installs(&self) -> usize {
        self.installs.get()
    }
}

fn version_label(version: Option<&Version>) -> String {
    version.map_or_else(String::new, |v| format!(" {v}"))
}

impl InstallHooks for ConsoleHooks {
    fn download(&self, module_addr: &str, package_addr: &str, version: Option<&Version>) {
        self.downloads.set(self.downloads.get() + 1);
        println!(
            "{} {}{} {}",
            "↓".cyan(),
            module_addr.bold(),
            version_label(version),
            format!("from {package_addr}").dark_grey()
        );
    }

    fn install(&self, module_addr: &str, version: Option<&Version>, local_path: &Path) {
        self.installs.set(self.installs.get() + 1);
        println!(
            "{} {}{} {}",
            "✓".green(),
            module_addr.bold(),
            version_label(version),
            format!("in {}", local_path.display()).dark_grey()
        );
    }
}
