//! modinst - module tree installer
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
//!
//! Installs every module reachable from a root module into a modules
//! directory and records what was installed in `modules.json`.
//!
//! # Directory Layout
//!
//! ```text
//! <root>/
//! ├── module.toml          # [[module]] calls of the root module
//! ├── modinst.toml         # optional settings
//! └── .modinst/modules/
//!     ├── modules.json     # manifest of installed modules
//!     └── packages/
//!         └── <key>/       # fetched copy of each non-local module
//! ```

pub mod cmd;
pub mod ui;

pub use modinst_core::USER_AGENT;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use modinst_core::Settings;

#[derive(Debug, Parser)]
#[command(name = "modinst")]
#[command(author, version, about = "modinst - install module trees")]
pub struct Cli {
    /// Show debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log progress instead of printing it
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Directory to install modules into (default: <root>/.modinst/modules)
    #[arg(long, global = true, env = "MODINST_MODULES_DIR")]
    pub modules_dir: Option<PathBuf>,

    /// Registry index used to resolve registry module addresses
    #[arg(long, global = true, env = "MODINST_REGISTRY_INDEX")]
    pub registry_index: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Install all modules called from the root module
    Install {
        /// Root module directory
        #[arg(default_value = ".")]
        dir: PathBuf,
        /// Reinstall every module even if it is already up to date
        #[arg(short, long)]
        upgrade: bool,
    },
    /// List installed modules
    List {
        /// Root module directory
        #[arg(default_value = ".")]
        dir: PathBuf,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

impl Cli {
    /// Settings for the root module in `root`, with command line and
    /// environment overrides applied.
    pub fn settings(&self, root: &Path) -> Result<Settings> {
        let mut settings = Settings::load(root).context("Failed to load settings")?;
        if let Some(dir) = &self.modules_dir {
            settings.modules_dir.clone_from(dir);
        }
        if let Some(index) = &self.registry_index {
            settings.registry_index = Some(index.clone());
        }
        Ok(settings)
    }
}
