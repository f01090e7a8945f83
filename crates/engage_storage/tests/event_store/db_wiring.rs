#![forbid(unsafe_code)]

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use engage_contracts::activity::{
    ActivityEvent, EntityAction, EntityType, EventId, EventMetadata, EventTimestamp,
    FindingMetadata,
};
use engage_contracts::status::{FindingStatus, Severity, SeverityLabel};
use engage_storage::event_store::{
    AppendOutcome, EventStore, EventStoreConfig, DEFAULT_EVENT_LOG_KEY,
};
use engage_storage::local_storage::{FileLocalStorage, LocalStorage, MemoryLocalStorage};
use engage_storage::signals::{Signal, SignalBus};

fn finding(id: &str, ms: i64) -> ActivityEvent {
    ActivityEvent::v1(
        EventId::new(id).unwrap(),
        EntityType::Finding,
        Some(EntityAction::Created),
        format!("Finding {id}"),
        "High",
        EventTimestamp::from_unix_ms(ms),
        EventMetadata::Finding(FindingMetadata {
            severity: Some(SeverityLabel::Known(Severity::High)),
            status: FindingStatus::Open,
            project_id: Some("p1".to_string()),
        }),
    )
    .unwrap()
}

fn ids(events: &[ActivityEvent]) -> Vec<String> {
    events.iter().map(|e| e.id.as_str().to_string()).collect()
}

fn memory_store(capacity: usize) -> (EventStore, Arc<MemoryLocalStorage>) {
    let storage = Arc::new(MemoryLocalStorage::new());
    let store = EventStore::open(
        EventStoreConfig::with_capacity(capacity),
        storage.clone(),
        SignalBus::new(),
    );
    (store, storage)
}

fn temp_root(name: &str) -> PathBuf {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(1);
    std::env::temp_dir().join(format!("engage-event-store-{name}-{suffix}"))
}

#[test]
fn at_event_store_db_01_duplicate_append_is_noop() {
    let (store, _) = memory_store(10);
    assert_eq!(store.append(finding("f1", 10)), AppendOutcome::Appended);
    let before = store.list(None);

    let mut retry = finding("f1", 99);
    retry.title = "Different title".to_string();
    assert_eq!(store.append(retry), AppendOutcome::Duplicate);

    assert_eq!(store.list(None), before);
}

#[test]
fn at_event_store_db_02_capacity_keeps_most_recent_appends() {
    let (store, _) = memory_store(3);
    for (i, id) in ["e1", "e2", "e3", "e4", "e5"].iter().enumerate() {
        store.append(finding(id, i as i64));
    }
    let listed = store.list(None);
    assert_eq!(listed.len(), 3);
    assert_eq!(ids(&listed), vec!["e5", "e4", "e3"]);
}

#[test]
fn at_event_store_db_03_list_orders_by_timestamp_and_honors_limit() {
    let (store, _) = memory_store(10);
    store.append(finding("late", 300));
    store.append(finding("early", 100));
    store.append(finding("middle", 200));
    assert_eq!(ids(&store.list(None)), vec!["late", "middle", "early"]);
    assert_eq!(ids(&store.list(Some(2))), vec!["late", "middle"]);
}

#[test]
fn at_event_store_db_04_corrupt_storage_yields_empty_store() {
    let storage = Arc::new(MemoryLocalStorage::new());
    storage.set_item(DEFAULT_EVENT_LOG_KEY, "{not json").unwrap();
    let store = EventStore::open(EventStoreConfig::mvp_v1(), storage.clone(), SignalBus::new());
    assert!(store.is_empty());

    // The store stays usable and overwrites the corrupt payload.
    assert_eq!(store.append(finding("f1", 1)), AppendOutcome::Appended);
    let reopened = EventStore::open(EventStoreConfig::mvp_v1(), storage, SignalBus::new());
    assert_eq!(ids(&reopened.list(None)), vec!["f1"]);
}

#[test]
fn at_event_store_db_05_unreadable_entries_are_skipped_on_load() {
    let storage = Arc::new(MemoryLocalStorage::new());
    let good = serde_json::to_value(finding("f1", 1)).unwrap();
    let raw = serde_json::json!({
        "schema_version": 1,
        "events": [good.clone(), {"id": "", "type": "finding"}, good, 42]
    });
    storage
        .set_item(DEFAULT_EVENT_LOG_KEY, &raw.to_string())
        .unwrap();
    let store = EventStore::open(EventStoreConfig::mvp_v1(), storage, SignalBus::new());
    assert_eq!(ids(&store.list(None)), vec!["f1"]);
}

#[test]
fn at_event_store_db_06_reopen_restores_log_and_dedup_index() {
    let root = temp_root("reopen");
    let storage = Arc::new(FileLocalStorage::new(&root));
    {
        let store = EventStore::open(EventStoreConfig::mvp_v1(), storage.clone(), SignalBus::new());
        store.append(finding("f1", 1));
        store.append(finding("f2", 2));
        assert!(store.is_durable());
    }
    let store = EventStore::open(EventStoreConfig::mvp_v1(), storage, SignalBus::new());
    assert_eq!(ids(&store.list(None)), vec!["f2", "f1"]);
    assert_eq!(store.append(finding("f1", 1)), AppendOutcome::Duplicate);
    fs::remove_dir_all(root).unwrap();
}

#[test]
fn at_event_store_db_07_reopen_with_smaller_capacity_keeps_newest() {
    let storage = Arc::new(MemoryLocalStorage::new());
    {
        let store = EventStore::open(
            EventStoreConfig::with_capacity(5),
            storage.clone(),
            SignalBus::new(),
        );
        for (i, id) in ["a", "b", "c", "d"].iter().enumerate() {
            store.append(finding(id, i as i64));
        }
    }
    let store = EventStore::open(EventStoreConfig::with_capacity(2), storage, SignalBus::new());
    assert_eq!(ids(&store.list(None)), vec!["d", "c"]);
}

#[test]
fn at_event_store_db_08_quota_failure_degrades_to_memory() {
    let storage = Arc::new(MemoryLocalStorage::with_quota(900));
    let store = EventStore::open(EventStoreConfig::mvp_v1(), storage.clone(), SignalBus::new());

    assert_eq!(store.append(finding("f1", 1)), AppendOutcome::Appended);
    assert!(store.is_durable());

    let mut outcome = AppendOutcome::Appended;
    for i in 2..20 {
        outcome = store.append(finding(&format!("f{i}"), i));
    }
    assert_eq!(outcome, AppendOutcome::Appended);
    assert!(!store.is_durable());
    assert_eq!(store.len(), 19);
    assert_eq!(store.list(Some(1))[0].id.as_str(), "f19");

    // The last durable snapshot is still what a fresh tab would load.
    let reopened = EventStore::open(EventStoreConfig::mvp_v1(), storage, SignalBus::new());
    assert!(reopened.len() < 19);
}

#[test]
fn at_event_store_db_09_append_and_clear_are_published() {
    let bus = SignalBus::new();
    let storage = Arc::new(MemoryLocalStorage::new());
    let store = EventStore::open(EventStoreConfig::mvp_v1(), storage.clone(), bus);
    let sub = store.subscribe();

    let ev = finding("f1", 1);
    store.append(ev.clone());
    store.append(ev.clone());
    store.clear();

    assert_eq!(
        sub.drain(),
        vec![Signal::ActivityAppended(ev), Signal::ActivityCleared]
    );
    assert!(store.is_empty());
    assert_eq!(storage.get_item(DEFAULT_EVENT_LOG_KEY).unwrap(), None);
}

#[test]
fn at_event_store_db_10_shared_store_accepts_concurrent_writers() {
    let (store, _) = memory_store(50);
    let store = Arc::new(store);
    std::thread::scope(|scope| {
        for writer in 0..4 {
            let store = Arc::clone(&store);
            scope.spawn(move || {
                for i in 0..20 {
                    store.append(finding(&format!("w{writer}-{i}"), i));
                }
            });
        }
    });
    assert_eq!(store.len(), 50);
}
