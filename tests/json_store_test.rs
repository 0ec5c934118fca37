//! File-backed store: flushes, reloads, transactions

use std::fs;

use tempfile::TempDir;

use pollcms::domain::{Entity, Filter, Value};
use pollcms::infrastructure::json_store::JsonFileStore;
use pollcms::infrastructure::traits::Storage;
use pollcms::infrastructure::StorageError;
use pollcms::util::testing;

fn question(text: &str) -> Entity {
    Entity::new("question").with_field("question_text", Value::Text(text.into()))
}

#[test]
fn given_missing_file_when_opening_then_empty_store() {
    testing::init_test_setup();
    let dir = TempDir::new().unwrap();

    let store = JsonFileStore::open(&dir.path().join("store.json")).unwrap();

    assert!(store.list("question", &Filter::all(), &[]).unwrap().is_empty());
    assert!(!store.path().exists());
}

#[test]
fn given_empty_file_when_opening_then_empty_store() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store.json");
    fs::write(&path, "  \n").unwrap();

    let store = JsonFileStore::open(&path).unwrap();

    assert!(store.list("question", &Filter::all(), &[]).unwrap().is_empty());
}

#[test]
fn given_commit_when_reopening_then_entity_reloaded() {
    // Arrange
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("store.json");
    let id = JsonFileStore::open(&path).unwrap().commit(&question("Lunch?")).unwrap();

    // Act
    let reopened = JsonFileStore::open(&path).unwrap();

    // Assert
    let stored = reopened.get("question", &id).unwrap().expect("persisted");
    assert_eq!(stored.get("question_text"), Some(&Value::Text("Lunch?".into())));
}

#[test]
fn given_delete_when_reopening_then_entity_gone() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store.json");
    let store = JsonFileStore::open(&path).unwrap();
    let id = store.commit(&question("Lunch?")).unwrap();

    store.delete("question", &id).unwrap();

    assert!(JsonFileStore::open(&path).unwrap().get("question", &id).unwrap().is_none());
}

#[test]
fn given_open_transaction_when_committing_entities_then_flushed_only_on_commit() {
    // Arrange
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store.json");
    let store = JsonFileStore::open(&path).unwrap();
    assert!(store.begin().unwrap());

    // Act
    let id = store.commit(&question("Dinner?")).unwrap();
    let before = JsonFileStore::open(&path).unwrap().get("question", &id).unwrap();
    store.commit_transaction().unwrap();
    let after = JsonFileStore::open(&path).unwrap().get("question", &id).unwrap();

    // Assert
    assert!(before.is_none());
    assert!(after.is_some());
}

#[test]
fn given_rolled_back_transaction_when_reopening_then_nothing_written() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store.json");
    let store = JsonFileStore::open(&path).unwrap();
    store.begin().unwrap();
    store.commit(&question("Dinner?")).unwrap();

    store.rollback().unwrap();

    assert!(store.list("question", &Filter::all(), &[]).unwrap().is_empty());
    assert!(!path.exists());
}

#[test]
fn given_corrupt_file_when_opening_then_serialization_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store.json");
    fs::write(&path, "{ not json").unwrap();

    let result = JsonFileStore::open(&path);

    assert!(matches!(result, Err(StorageError::Serialization { .. })));
}
