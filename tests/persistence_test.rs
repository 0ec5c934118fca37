//! Persistence orchestrator: write order, back-references, failures

use std::sync::Arc;

use chrono::{NaiveDate, TimeZone, Utc};

use pollcms::application::services::{
    AggregateForm, AggregateInitializer, BindValidateService, PersistenceOrchestrator, SubmitOutcome,
};
use pollcms::application::{ApplicationError, PersistStep};
use pollcms::catalog::{self, question, user};
use pollcms::domain::{
    AggregateDefinition, BoundAggregate, Entity, EntityId, Filter, SortKey, Submission, Value,
};
use pollcms::infrastructure::error::{StorageError, StorageResult};
use pollcms::infrastructure::memory::InMemoryStore;
use pollcms::infrastructure::traits::{Clock, FixedClock, Storage};
use pollcms::util::testing;

// ============================================================
// Helpers
// ============================================================

/// Store that rejects commits of one entity type.
struct FailingStore {
    inner: InMemoryStore,
    fail_type: &'static str,
    transactional: bool,
}

impl FailingStore {
    fn new(fail_type: &'static str, transactional: bool) -> Self {
        Self {
            inner: InMemoryStore::new(),
            fail_type,
            transactional,
        }
    }
}

impl Storage for FailingStore {
    fn get(&self, entity_type: &str, id: &EntityId) -> StorageResult<Option<Entity>> {
        self.inner.get(entity_type, id)
    }

    fn list(&self, entity_type: &str, filter: &Filter, order: &[SortKey]) -> StorageResult<Vec<Entity>> {
        self.inner.list(entity_type, filter, order)
    }

    fn commit(&self, entity: &Entity) -> StorageResult<EntityId> {
        if entity.entity_type == self.fail_type {
            return Err(StorageError::Rejected(format!("{} disabled", self.fail_type)));
        }
        self.inner.commit(entity)
    }

    fn delete(&self, entity_type: &str, id: &EntityId) -> StorageResult<()> {
        self.inner.delete(entity_type, id)
    }

    fn begin(&self) -> StorageResult<bool> {
        if self.transactional {
            self.inner.begin()
        } else {
            Ok(false)
        }
    }

    fn commit_transaction(&self) -> StorageResult<()> {
        self.inner.commit_transaction()
    }

    fn rollback(&self) -> StorageResult<()> {
        self.inner.rollback()
    }
}

fn clock() -> Arc<dyn Clock> {
    Arc::new(FixedClock(Utc.with_ymd_and_hms(2024, 4, 1, 12, 0, 0).unwrap()))
}

fn definition(name: &str) -> AggregateDefinition {
    catalog::build_registry().unwrap().get(name).unwrap().clone()
}

fn question_submission() -> Submission {
    Submission::new()
        .with_value("question_text", "Where do we eat?")
        .with_value("min_selection", "1")
        .with_value("max_selection", "1")
        .with_sub_value(question::MAX_VOTE_COUNT_CONTROL, "has_max_vote_count", "on")
        .with_sub_value(question::MAX_VOTE_COUNT_CONTROL, "max_vote_count", "50")
        .with_row_value(question::CHOICES, 0, "choice_text", "Pizza")
        .with_row_value(question::CHOICES, 1, "choice_text", "Sushi")
}

fn bind(store: Arc<dyn Storage>, definition: &AggregateDefinition, id: Option<&EntityId>, submission: &Submission) -> BoundAggregate {
    let initial = AggregateInitializer::new(store, clock()).initial(definition, id).unwrap();
    BindValidateService::new(clock()).bind(definition, &initial, submission)
}

fn save(store: Arc<dyn Storage>, name: &str, id: Option<&EntityId>, submission: &Submission) -> EntityId {
    let form = AggregateForm::load(definition(name), id, store, clock()).unwrap();
    match form.submit(submission).unwrap() {
        SubmitOutcome::Saved(committed) => committed.root_id().unwrap(),
        SubmitOutcome::Invalid(bound) => panic!("invalid: {:?}", bound.report),
    }
}

// ============================================================
// Successful commits
// ============================================================

#[test]
fn given_new_question_when_persisting_then_children_reference_root() {
    testing::init_test_setup();

    // Arrange
    let store = Arc::new(InMemoryStore::new());
    let def = definition(question::AGGREGATE);
    let aggregate = bind(store.clone(), &def, None, &question_submission());

    // Act
    let committed = PersistenceOrchestrator::new(store.clone())
        .persist(&def, aggregate)
        .unwrap();

    // Assert
    let root_id = committed.root_id().expect("root has identity");
    let choices = &committed.collections[question::CHOICES];
    assert_eq!(choices.len(), 2);
    for choice in choices {
        assert_eq!(choice.get("question"), Some(&Value::Ref(root_id)));
    }
    assert_eq!(store.count("choice").unwrap(), 2);
}

#[test]
fn given_shared_root_sub_when_persisting_then_fields_stored_on_root() {
    let store = Arc::new(InMemoryStore::new());

    let id = save(store.clone(), question::AGGREGATE, None, &question_submission());

    let root = store.get("question", &id).unwrap().unwrap();
    assert_eq!(root.get("has_max_vote_count"), Some(&Value::Bool(true)));
    assert_eq!(root.get("max_vote_count"), Some(&Value::Int(50)));
}

#[test]
fn given_stored_question_when_updating_rows_then_updates_inserts_and_deletes() {
    // Arrange
    let store = Arc::new(InMemoryStore::new());
    let id = save(store.clone(), question::AGGREGATE, None, &question_submission());
    let form = AggregateForm::load(definition(question::AGGREGATE), Some(&id), store.clone(), clock()).unwrap();
    let rows = pollcms::application::services::Listable::initial(&form).rows(question::CHOICES);
    let pizza = rows.iter().find(|r| r.values["choice_text"] == Value::Text("Pizza".into())).unwrap().id;
    let sushi = rows.iter().find(|r| r.values["choice_text"] == Value::Text("Sushi".into())).unwrap().id;

    let submission = question_submission()
        .with_row_value(question::CHOICES, 0, "id", pizza.to_string())
        .with_row_value(question::CHOICES, 0, "choice_text", "Pasta")
        .with_row_value(question::CHOICES, 1, "id", sushi.to_string())
        .with_deleted_row(question::CHOICES, 1)
        .with_row_value(question::CHOICES, 2, "choice_text", "Tacos");

    // Act
    let outcome = form.submit(&submission).unwrap();

    // Assert
    let SubmitOutcome::Saved(committed) = outcome else {
        panic!("expected save");
    };
    let mut texts: Vec<_> = committed.collections[question::CHOICES]
        .iter()
        .map(|c| c.get("choice_text").unwrap().to_raw())
        .collect();
    texts.sort();
    assert_eq!(texts, ["Pasta", "Tacos"]);
    assert!(store.get("choice", &sushi).unwrap().is_none());
    assert_eq!(store.get("choice", &pizza).unwrap().unwrap().get("choice_text"), Some(&Value::Text("Pasta".into())));
}

#[test]
fn given_user_create_when_persisting_then_account_points_at_user() {
    let store = Arc::new(InMemoryStore::new());
    let submission = Submission::new()
        .with_value("group", "SUBS")
        .with_sub_value(user::ACCOUNT, "username", "ada")
        .with_sub_value(user::ACCOUNT, "email", "ada@example.com");

    let id = save(store.clone(), user::CREATE_AGGREGATE, None, &submission);

    let accounts = store
        .list("account", &Filter::field_equals("user", Value::Ref(id)), &[])
        .unwrap();
    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0].get("username"), Some(&Value::Text("ada".into())));
}

#[test]
fn given_day_count_when_saving_user_update_then_expiry_derived_from_start() {
    // Arrange
    let store = Arc::new(InMemoryStore::new());
    let submission = Submission::new()
        .with_value("group", "SUBS")
        .with_value("subs_start", "2024-01-01")
        .with_value("subs_day_count", "30")
        .with_sub_value(user::ACCOUNT, "username", "ada")
        .with_sub_value(user::ACCOUNT, "email", "ada@example.com");

    // Act
    let id = save(store.clone(), user::UPDATE_AGGREGATE, None, &submission);

    // Assert
    let stored = store.get("user", &id).unwrap().unwrap();
    assert_eq!(
        stored.get("subs_expire"),
        Some(&Value::Date(NaiveDate::from_ymd_opt(2024, 1, 31).unwrap()))
    );
    assert_eq!(stored.get("subs_day_count"), None);
}

// ============================================================
// Refusals and failures
// ============================================================

#[test]
fn given_invalid_aggregate_when_persisting_then_refused_without_writes() {
    let store = Arc::new(InMemoryStore::new());
    let def = definition(question::AGGREGATE);
    let aggregate = bind(store.clone(), &def, None, &Submission::new());

    let err = PersistenceOrchestrator::new(store.clone()).persist(&def, aggregate).unwrap_err();

    assert!(matches!(err, ApplicationError::InvalidAggregate { .. }));
    assert_eq!(store.count("question").unwrap(), 0);
}

#[test]
fn given_child_commit_fails_without_transactions_when_persisting_then_root_left_in_place() {
    // Arrange
    let store = Arc::new(FailingStore::new("choice", false));
    let def = definition(question::AGGREGATE);
    let aggregate = bind(store.clone(), &def, None, &question_submission());

    // Act
    let err = PersistenceOrchestrator::new(store.clone()).persist(&def, aggregate).unwrap_err();

    // Assert
    match err {
        ApplicationError::FatalStorage { step, rolled_back, .. } => {
            assert_eq!(step, PersistStep::Collection(question::CHOICES.into()));
            assert!(!rolled_back);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(store.inner.count("question").unwrap(), 1);
}

#[test]
fn given_child_commit_fails_in_transaction_when_persisting_then_rolled_back() {
    // Arrange
    let store = Arc::new(FailingStore::new("choice", true));
    let def = definition(question::AGGREGATE);
    let aggregate = bind(store.clone(), &def, None, &question_submission());

    // Act
    let err = PersistenceOrchestrator::new(store.clone()).persist(&def, aggregate).unwrap_err();

    // Assert
    assert!(matches!(err, ApplicationError::FatalStorage { rolled_back: true, .. }));
    assert_eq!(store.inner.count("question").unwrap(), 0);
    assert!(!store.inner.in_transaction().unwrap());
}

#[test]
fn given_root_commit_fails_when_persisting_then_step_is_root_and_no_children() {
    let store = Arc::new(FailingStore::new("question", false));
    let def = definition(question::AGGREGATE);
    let aggregate = bind(store.clone(), &def, None, &question_submission());

    let err = PersistenceOrchestrator::new(store.clone()).persist(&def, aggregate).unwrap_err();

    assert!(matches!(err, ApplicationError::FatalStorage { step: PersistStep::Root, .. }));
    assert_eq!(store.inner.count("choice").unwrap(), 0);
}
