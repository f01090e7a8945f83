#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::fs;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use engage_contracts::view_state::{
    PageKey, SortDirection, SortPreference, ViewMode, ViewPreference, ViewPreferencePatch,
};
use engage_storage::local_storage::{FileLocalStorage, LocalStorage, MemoryLocalStorage};
use engage_storage::signals::SignalBus;
use engage_storage::view_state::ViewStateStore;

fn page(key: &str) -> PageKey {
    PageKey::new(key).unwrap()
}

#[test]
fn at_view_state_db_01_first_visit_reads_default() {
    let store = ViewStateStore::new(Arc::new(MemoryLocalStorage::new()), "alice", SignalBus::new());
    assert_eq!(store.get(&page("projects")), ViewPreference::default());
}

#[test]
fn at_view_state_db_02_set_merges_and_persists_across_instances() {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(1);
    let root = std::env::temp_dir().join(format!("engage-view-state-{suffix}"));
    let storage = Arc::new(FileLocalStorage::new(&root));

    let store = ViewStateStore::new(storage.clone(), "alice", SignalBus::new());
    store.set(
        &page("findings"),
        &ViewPreferencePatch {
            view_mode: Some(ViewMode::Card),
            ..ViewPreferencePatch::default()
        },
    );
    let merged = store.set(
        &page("findings"),
        &ViewPreferencePatch {
            sort: Some(SortPreference::v1("severity", SortDirection::Desc).unwrap()),
            filters: Some(BTreeMap::from([("status".to_string(), "open".to_string())])),
            ..ViewPreferencePatch::default()
        },
    );
    assert_eq!(merged.view_mode, ViewMode::Card);

    let reopened = ViewStateStore::new(storage, "alice", SignalBus::new());
    assert_eq!(reopened.get(&page("findings")), merged);
    fs::remove_dir_all(root).unwrap();
}

#[test]
fn at_view_state_db_03_pages_and_users_are_isolated() {
    let storage = Arc::new(MemoryLocalStorage::new());
    let alice = ViewStateStore::new(storage.clone(), "alice", SignalBus::new());
    let bob = ViewStateStore::new(storage, "bob", SignalBus::new());
    alice.set(
        &page("clients"),
        &ViewPreferencePatch {
            view_mode: Some(ViewMode::List),
            ..ViewPreferencePatch::default()
        },
    );
    assert_eq!(alice.get(&page("clients")).view_mode, ViewMode::List);
    assert_eq!(alice.get(&page("reports")).view_mode, ViewMode::Table);
    assert_eq!(bob.get(&page("clients")).view_mode, ViewMode::Table);
}

#[test]
fn at_view_state_db_04_corrupt_preference_is_replaced_with_default() {
    let storage = Arc::new(MemoryLocalStorage::new());
    let store = ViewStateStore::new(storage.clone(), "alice", SignalBus::new());
    let key = store.storage_key(&page("clients"));

    storage.set_item(&key, "[1,2,3").unwrap();
    assert_eq!(store.get(&page("clients")), ViewPreference::default());
    assert_eq!(storage.get_item(&key).unwrap(), None);

    storage
        .set_item(&key, r#"{"view_mode":"hologram"}"#)
        .unwrap();
    assert_eq!(store.get(&page("clients")), ViewPreference::default());

    storage
        .set_item(&key, r#"{"sort":{"column":"","direction":"asc"}}"#)
        .unwrap();
    assert_eq!(store.get(&page("clients")), ViewPreference::default());
}

#[test]
fn at_view_state_db_05_failed_write_still_returns_merged_value() {
    let storage = Arc::new(MemoryLocalStorage::with_quota(8));
    let store = ViewStateStore::new(storage, "alice", SignalBus::new());
    let merged = store.set(
        &page("clients"),
        &ViewPreferencePatch {
            view_mode: Some(ViewMode::Card),
            ..ViewPreferencePatch::default()
        },
    );
    assert_eq!(merged.view_mode, ViewMode::Card);
    assert_eq!(store.get(&page("clients")), ViewPreference::default());
}
