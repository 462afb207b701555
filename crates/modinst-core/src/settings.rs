//! Installation settings.
//!
//! Defaults are relative to the root module directory. An optional
//! `modinst.toml` next to the root module overrides them; the CLI applies its
//! own flags and environment variables on top.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Settings file looked up in the root module directory.
pub const SETTINGS_FILENAME: &str = "modinst.toml";

/// Default modules directory, relative to the root module: `.modinst/modules`
pub const DEFAULT_MODULES_DIR: &str = ".modinst/modules";

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Where modules are installed and where registry modules come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub modules_dir: PathBuf,
    pub registry_index: Option<PathBuf>,
    pub user_agent: String,
}

#[derive(Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct SettingsFile {
    modules_dir: Option<PathBuf>,
    registry_index: Option<PathBuf>,
    user_agent: Option<String>,
}

impl Settings {
    /// Defaults for the root module in `root`.
    pub fn for_root(root: &Path) -> Self {
        Self {
            modules_dir: root.join(DEFAULT_MODULES_DIR),
            registry_index: None,
            user_agent: crate::USER_AGENT.to_string(),
        }
    }

    /// Defaults for `root`, overridden by `root/modinst.toml` if it exists.
    /// Relative paths in the file are resolved against `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings file exists but cannot be read or
    /// parsed.
    pub fn load(root: &Path) -> Result<Self, SettingsError> {
        let mut settings = Self::for_root(root);
        let path = root.join(SETTINGS_FILENAME);

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(settings),
            Err(source) => return Err(SettingsError::Read { path, source }),
        };
        let file: SettingsFile =
            toml::from_str(&content).map_err(|source| SettingsError::Parse {
                path: path.clone(),
                source,
            })?;

        if let Some(dir) = file.modules_dir {
            settings.modules_dir = root.join(dir);
        }
        if let Some(index) = file.registry_index {
            settings.registry_index = Some(root.join(index));
        }
        if let Some(agent) = file.user_agent {
            settings.user_agent = agent;
        }

        tracing::debug!(path = %path.display(), "loaded settings file");
        Ok(settings)
    }
}
