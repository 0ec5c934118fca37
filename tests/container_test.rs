//! Service container wiring: catalog lookup, forms and theme location

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use tempfile::TempDir;

use pollcms::application::services::{Listable, SubmitOutcome, Validatable};
use pollcms::application::ApplicationError;
use pollcms::catalog::{question, user};
use pollcms::config::Settings;
use pollcms::domain::{DomainError, Submission};
use pollcms::infrastructure::di::ServiceContainer;
use pollcms::infrastructure::memory::InMemoryStore;
use pollcms::infrastructure::traits::FixedClock;
use pollcms::infrastructure::InfraError;
use pollcms::util::testing;

fn container(dir: &TempDir) -> ServiceContainer {
    let settings = Settings {
        store_path: dir.path().join("store.json"),
        theme_path: dir.path().join("theme.toml"),
    };
    let clock = FixedClock(Utc.with_ymd_and_hms(2024, 4, 1, 12, 0, 0).unwrap());
    ServiceContainer::with_deps(settings, Arc::new(InMemoryStore::new()), Arc::new(clock)).unwrap()
}

#[test]
fn given_container_when_listing_registry_then_all_aggregates_present() {
    testing::init_test_setup();
    let dir = TempDir::new().unwrap();

    let container = container(&dir);

    let mut names: Vec<_> = container.registry.names().collect();
    names.sort();
    assert_eq!(names, [question::AGGREGATE, user::CREATE_AGGREGATE, user::UPDATE_AGGREGATE]);
}

#[test]
fn given_unknown_aggregate_when_loading_form_then_domain_error() {
    let dir = TempDir::new().unwrap();

    let result = container(&dir).form("ballot", None);

    assert!(matches!(
        result,
        Err(InfraError::Application(ApplicationError::Domain(DomainError::UnknownAggregate(_))))
    ));
}

#[test]
fn given_saved_question_when_loading_update_form_then_hydrated() {
    // Arrange
    let dir = TempDir::new().unwrap();
    let container = container(&dir);
    let submission = Submission::new()
        .with_value("question_text", "Team offsite?")
        .with_value("min_selection", "1")
        .with_row_value(question::CHOICES, 0, "choice_text", "Yes")
        .with_row_value(question::CHOICES, 1, "choice_text", "No");
    let outcome = container.form(question::AGGREGATE, None).unwrap().submit(&submission).unwrap();
    let SubmitOutcome::Saved(committed) = outcome else {
        panic!("expected save");
    };
    let id = committed.root_id().unwrap();

    // Act
    let form = container.form(question::AGGREGATE, Some(&id)).unwrap();

    // Assert
    assert!(form.initial().is_update());
    assert_eq!(form.initial().rows(question::CHOICES).len(), 2);
    assert!(form.validate(&Submission::new()).report.error_count() > 0);
}

#[test]
fn given_settings_when_getting_theme_service_then_uses_theme_path() {
    let dir = TempDir::new().unwrap();

    let themes = container(&dir).theme();

    assert_eq!(themes.path(), dir.path().join("theme.toml"));
}
