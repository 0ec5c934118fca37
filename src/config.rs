//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/pollcms/pollcms.toml`
//! 3. Explicit config file passed on the command line
//! 4. Environment variables: `POLLCMS_*` prefix

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::application::ApplicationError;
use crate::domain::expand_env_vars;

const APP_NAME: &str = "pollcms";

/// Raw settings for intermediate parsing; `None` means "not specified".
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub store_path: Option<PathBuf>,
    pub theme_path: Option<PathBuf>,
}

/// Unified configuration for pollcms.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// JSON file holding all stored entities
    pub store_path: PathBuf,
    /// TOML file holding the theme colours
    pub theme_path: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        let dirs = ProjectDirs::from("", "", APP_NAME);
        let store_path = dirs
            .as_ref()
            .map(|d| d.data_dir().join("store.json"))
            .unwrap_or_else(|| PathBuf::from("~/.pollcms/store.json"));
        let theme_path = dirs
            .as_ref()
            .map(|d| d.config_dir().join("theme.toml"))
            .unwrap_or_else(|| PathBuf::from("~/.pollcms/theme.toml"));
        Self {
            store_path,
            theme_path,
        }
    }
}

/// Get the XDG config directory for pollcms.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("pollcms.toml"))
}

fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

impl Settings {
    /// Expand `~`, `$VAR` and `${VAR}` in path-like fields.
    fn expand_paths(&mut self) {
        self.store_path = PathBuf::from(expand_env_vars(&self.store_path.to_string_lossy()));
        self.theme_path = PathBuf::from(expand_env_vars(&self.theme_path.to_string_lossy()));
    }

    /// Overlay wins where it specifies a value.
    fn merge_with(&self, overlay: &RawSettings) -> Self {
        Self {
            store_path: overlay
                .store_path
                .clone()
                .unwrap_or_else(|| self.store_path.clone()),
            theme_path: overlay
                .theme_path
                .clone()
                .unwrap_or_else(|| self.theme_path.clone()),
        }
    }

    /// Load settings with layered precedence.
    ///
    /// `config_file`, when given, must exist; the global file is optional.
    pub fn load(config_file: Option<&Path>) -> Result<Self, ApplicationError> {
        let mut current = Self::default();

        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                debug!("config: global {}", global_path.display());
                current = current.merge_with(&load_raw_settings(&global_path)?);
            }
        }

        if let Some(path) = config_file {
            debug!("config: explicit {}", path.display());
            current = current.merge_with(&load_raw_settings(path)?);
        }

        current = Self::apply_env_overrides(current)?;
        current.expand_paths();
        Ok(current)
    }

    /// Apply `POLLCMS_*` environment variables as explicit overrides.
    fn apply_env_overrides(mut settings: Self) -> Result<Self, ApplicationError> {
        let config = Config::builder()
            .add_source(Environment::with_prefix("POLLCMS").separator("__"))
            .build()
            .map_err(config_err)?;

        if let Ok(val) = config.get_string("store_path") {
            settings.store_path = PathBuf::from(val);
        }
        if let Ok(val) = config.get_string("theme_path") {
            settings.theme_path = PathBuf::from(val);
        }
        Ok(settings)
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# pollcms configuration
#
# Locations (by precedence, lowest to highest):
#   Global:   ~/.config/pollcms/pollcms.toml
#   Explicit: pollcms --config <file>
#   Env:      POLLCMS_* environment variables (e.g. POLLCMS_STORE_PATH)

# JSON file holding every stored entity
# store_path = "~/.local/share/pollcms/store.json"

# Theme colours (primary_color, link_color, ...)
# theme_path = "~/.config/pollcms/theme.toml"
"#
        .to_string()
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}
