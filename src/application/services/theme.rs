//! Theme settings persistence: a flat TOML table of colour keys

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::application::{ApplicationError, ApplicationResult, IoResultExt};
use crate::domain::ThemeSettings;

pub struct ThemeService {
    path: PathBuf,
}

impl ThemeService {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored values merged over the defaults; a missing file means defaults.
    pub fn load(&self) -> ApplicationResult<ThemeSettings> {
        if !self.path.exists() {
            debug!("theme: no file at {}, using defaults", self.path.display());
            return Ok(ThemeSettings::default());
        }
        let content = std::fs::read_to_string(&self.path).with_path_context("read theme", &self.path)?;
        let stored: BTreeMap<String, String> = toml::from_str(&content).map_err(|e| ApplicationError::Config {
            message: format!("parse {}: {}", self.path.display(), e),
        })?;
        Ok(ThemeSettings::from_map(&stored))
    }

    pub fn save(&self, theme: &ThemeSettings) -> ApplicationResult<()> {
        let content = toml::to_string_pretty(&theme.to_map()).map_err(|e| ApplicationError::Config {
            message: format!("serialize theme: {e}"),
        })?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).with_path_context("create theme dir", parent)?;
        }
        std::fs::write(&self.path, content).with_path_context("write theme", &self.path)?;
        debug!("theme: saved {}", self.path.display());
        Ok(())
    }

    pub fn set(&self, key: &str, value: &str) -> ApplicationResult<ThemeSettings> {
        let mut theme = self.load()?;
        theme.set(key, value)?;
        self.save(&theme)?;
        Ok(theme)
    }

    pub fn reset(&self) -> ApplicationResult<ThemeSettings> {
        let theme = ThemeSettings::default();
        self.save(&theme)?;
        Ok(theme)
    }
}
