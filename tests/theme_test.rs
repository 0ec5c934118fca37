//! Theme settings service over a TOML file

use tempfile::TempDir;

use pollcms::application::services::ThemeService;
use pollcms::application::ApplicationError;
use pollcms::domain::theme::THEME_DEFAULTS;
use pollcms::domain::{DomainError, ThemeSettings};
use pollcms::util::testing;

fn service(dir: &TempDir) -> ThemeService {
    ThemeService::new(&dir.path().join("theme").join("theme.toml"))
}

#[test]
fn given_no_file_when_loading_then_defaults() {
    testing::init_test_setup();
    let dir = TempDir::new().unwrap();

    let theme = service(&dir).load().unwrap();

    assert_eq!(theme, ThemeSettings::default());
    assert_eq!(theme.get("success_color"), Some("#607d8b"));
}

#[test]
fn given_set_key_when_reloading_then_value_persisted() {
    // Arrange
    let dir = TempDir::new().unwrap();
    let themes = service(&dir);

    // Act
    themes.set("link_color", " #ff0000 ").unwrap();

    // Assert
    let reloaded = service(&dir).load().unwrap();
    assert_eq!(reloaded.get("link_color"), Some("#ff0000"));
    assert_eq!(reloaded.get("error_color"), Some("#f44336"));
    assert_eq!(reloaded.entries().count(), THEME_DEFAULTS.len());
}

#[test]
fn given_unknown_key_when_setting_then_domain_error_and_no_file() {
    let dir = TempDir::new().unwrap();
    let themes = service(&dir);

    let err = themes.set("font_family", "serif").unwrap_err();

    assert!(matches!(
        err,
        ApplicationError::Domain(DomainError::UnknownThemeKey(ref key)) if key == "font_family"
    ));
    assert!(!themes.path().exists());
}

#[test]
fn given_customized_theme_when_resetting_then_defaults_stored() {
    let dir = TempDir::new().unwrap();
    let themes = service(&dir);
    themes.set("primary_color", "#123456").unwrap();

    themes.reset().unwrap();

    assert_eq!(service(&dir).load().unwrap(), ThemeSettings::default());
}

#[test]
fn given_malformed_file_when_loading_then_config_error() {
    let dir = TempDir::new().unwrap();
    let themes = service(&dir);
    std::fs::create_dir_all(themes.path().parent().unwrap()).unwrap();
    std::fs::write(themes.path(), "primary_color = [").unwrap();

    let err = themes.load().unwrap_err();

    assert!(matches!(err, ApplicationError::Config { .. }));
}
