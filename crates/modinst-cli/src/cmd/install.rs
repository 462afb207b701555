use std::path::Path;

use anyhow::{Context, Result, bail};
use crossterm::style::Stylize;
use modinst_core::{Installer, Settings, TracingHooks};

use crate::ui::diagnostics;
use crate::ui::hooks::ConsoleHooks;

/// Install all modules called from the root module in `root`
pub fn install(settings: &Settings, root: &Path, upgrade: bool, quiet: bool) -> Result<()> {
    let mut installer = Installer::from_settings(settings).with_context(|| {
        format!(
            "Failed to prepare module directory {}",
            settings.modules_dir.display()
        )
    })?;

    let console = ConsoleHooks::new();
    let diags = if quiet {
        installer.install_modules(root, upgrade, &TracingHooks)
    } else {
        installer.install_modules(root, upgrade, &console)
    }
    .context("Module installation aborted")?;

    diagnostics::print(&diags);

    if diags.has_errors() {
        let errors = diags
            .iter()
            .filter(|d| d.severity == modinst_core::Severity::Error)
            .count();
        bail!("Module installation finished with {errors} error(s)");
    }

    if !quiet {
        let modules = installer.store().len().saturating_sub(1);
        let summary = if console.installs() == 0 {
            format!("All {modules} module(s) up to date.")
        } else {
            format!(
                "Installed {} module(s), {} downloaded. {modules} module(s) in total.",
                console.installs(),
                console.downloads()
            )
        };
        println!("{}", summary.green());
    }

    Ok(())
}
