//! Theme settings record: styling colours passed to the rendering layer

use std::collections::BTreeMap;

use crate::domain::error::DomainError;

/// Known keys with their default colours, in display order.
pub const THEME_DEFAULTS: &[(&str, &str)] = &[
    ("primary_color", "#424242"),
    ("primary_light_color", "#686868"),
    ("primary_dark_color", "#1c1c1c"),
    ("secondary_color", "#37474f"),
    ("secondary_light_color", "#56707c"),
    ("success_color", "#607d8b"),
    ("error_color", "#f44336"),
    ("link_color", "#039be5"),
];

/// Explicit key-value styling record. Load merges defaults, save returns
/// the full map; nothing is global.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeSettings {
    values: BTreeMap<String, String>,
}

impl Default for ThemeSettings {
    fn default() -> Self {
        Self {
            values: THEME_DEFAULTS
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

impl ThemeSettings {
    /// Merge stored values over the defaults. Unknown keys are dropped and
    /// empty values fall back to the default.
    pub fn from_map(stored: &BTreeMap<String, String>) -> Self {
        let mut settings = Self::default();
        for (key, value) in stored {
            if settings.values.contains_key(key) && !value.trim().is_empty() {
                settings.values.insert(key.clone(), value.trim().to_string());
            }
        }
        settings
    }

    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.values.clone()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<(), DomainError> {
        match self.values.get_mut(key) {
            Some(slot) => {
                *slot = value.trim().to_string();
                Ok(())
            }
            None => Err(DomainError::UnknownThemeKey(key.to_string())),
        }
    }

    /// Entries in the declared key order.
    pub fn entries(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
        THEME_DEFAULTS
            .iter()
            .map(|(k, default)| (*k, self.get(k).unwrap_or(default)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_partial_map_when_loading_then_defaults_fill_the_rest() {
        let stored = BTreeMap::from([
            ("primary_color".to_string(), "#000000".to_string()),
            ("link_color".to_string(), "  ".to_string()),
            ("bogus".to_string(), "#ffffff".to_string()),
        ]);

        let theme = ThemeSettings::from_map(&stored);

        assert_eq!(theme.get("primary_color"), Some("#000000"));
        assert_eq!(theme.get("link_color"), Some("#039be5"));
        assert_eq!(theme.get("bogus"), None);
        assert_eq!(theme.to_map().len(), THEME_DEFAULTS.len());
    }

    #[test]
    fn given_unknown_key_when_setting_then_error() {
        let mut theme = ThemeSettings::default();
        assert_eq!(
            theme.set("font", "serif"),
            Err(DomainError::UnknownThemeKey("font".into()))
        );
    }
}
