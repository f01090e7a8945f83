#![forbid(unsafe_code)]

use std::collections::{BTreeSet, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use engage_contracts::activity::{ActivityEvent, EventKey, ACTIVITY_CONTRACT_VERSION};
use engage_contracts::Validate;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::local_storage::{LocalStorage, LocalStorageError};
use crate::signals::{Signal, SignalBus, SignalSubscription};

pub const EVENT_LOG_SCHEMA_VERSION: u32 = ACTIVITY_CONTRACT_VERSION.0;
pub const DEFAULT_EVENT_LOG_CAPACITY: usize = 200;
pub const DEFAULT_EVENT_LOG_KEY: &str = "engage.activity_log.v1";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventStoreConfig {
    pub capacity: usize,
    pub storage_key: String,
}

impl EventStoreConfig {
    pub fn mvp_v1() -> Self {
        Self {
            capacity: DEFAULT_EVENT_LOG_CAPACITY,
            storage_key: DEFAULT_EVENT_LOG_KEY.to_string(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::mvp_v1()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Appended,
    /// `(type, id)` already present; the log is unchanged.
    Duplicate,
    /// The event failed contract validation and was not stored.
    Rejected,
}

#[derive(Serialize)]
struct PersistedLogRef<'a> {
    schema_version: u32,
    events: &'a VecDeque<ActivityEvent>,
}

#[derive(Deserialize)]
struct PersistedLogRaw {
    schema_version: u32,
    #[serde(default)]
    events: Vec<serde_json::Value>,
}

#[derive(Debug, Default)]
struct EventStoreState {
    // Newest first.
    entries: VecDeque<ActivityEvent>,
    keys: BTreeSet<EventKey>,
    durable: bool,
}

/// Append-only, capacity-bounded log of user actions backed by local storage.
///
/// Constructed once per application context and shared as `Arc<EventStore>`.
/// Every mutation re-serializes the full log; a failed write leaves the store
/// operating from memory until the next successful write.
pub struct EventStore {
    config: EventStoreConfig,
    storage: Arc<dyn LocalStorage>,
    bus: SignalBus,
    state: Mutex<EventStoreState>,
    sequence: AtomicU64,
}

impl fmt::Debug for EventStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStore")
            .field("config", &self.config)
            .field("len", &self.len())
            .finish()
    }
}

impl EventStore {
    /// Never fails: missing or malformed storage yields an empty store.
    pub fn open(mut config: EventStoreConfig, storage: Arc<dyn LocalStorage>, bus: SignalBus) -> Self {
        config.capacity = config.capacity.max(1);
        let state = load_state(&config, storage.as_ref());
        Self {
            config,
            storage,
            bus,
            state: Mutex::new(state),
            sequence: AtomicU64::new(0),
        }
    }

    pub fn append(&self, event: ActivityEvent) -> AppendOutcome {
        if let Err(err) = event.validate() {
            warn!("activity event {} rejected: {err}", event.id);
            return AppendOutcome::Rejected;
        }

        {
            let mut state = self.lock_state();
            let key = event.key();
            if state.keys.contains(&key) {
                debug!(
                    "activity event {}:{} already recorded",
                    key.0.as_str(),
                    key.1
                );
                return AppendOutcome::Duplicate;
            }
            state.keys.insert(key);
            state.entries.push_front(event.clone());
            while state.entries.len() > self.config.capacity {
                if let Some(evicted) = state.entries.pop_back() {
                    state.keys.remove(&evicted.key());
                }
            }
            self.persist(&mut state);
        }

        self.bus.publish(Signal::ActivityAppended(event));
        AppendOutcome::Appended
    }

    /// Next value of a per-store counter, distinct on every call. Follow-up
    /// event ids carry it so two actions in one millisecond stay apart.
    pub fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed)
    }

    /// Snapshot ordered by timestamp, newest first. Equal timestamps keep the
    /// most recently appended first.
    pub fn list(&self, limit: Option<usize>) -> Vec<ActivityEvent> {
        let mut events: Vec<ActivityEvent> = self.lock_state().entries.iter().cloned().collect();
        events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        if let Some(limit) = limit {
            events.truncate(limit);
        }
        events
    }

    pub fn contains(&self, key: &EventKey) -> bool {
        self.lock_state().keys.contains(key)
    }

    pub fn clear(&self) {
        {
            let mut state = self.lock_state();
            state.entries.clear();
            state.keys.clear();
            state.durable = match self.storage.remove_item(&self.config.storage_key) {
                Ok(()) => true,
                Err(err) => {
                    warn!("activity log clear not persisted: {err}");
                    false
                }
            };
        }
        self.bus.publish(Signal::ActivityCleared);
    }

    pub fn subscribe(&self) -> SignalSubscription {
        self.bus.subscribe()
    }

    pub fn len(&self) -> usize {
        self.lock_state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    /// Whether the last mutation reached durable storage.
    pub fn is_durable(&self) -> bool {
        self.lock_state().durable
    }

    fn persist(&self, state: &mut EventStoreState) {
        let doc = PersistedLogRef {
            schema_version: EVENT_LOG_SCHEMA_VERSION,
            events: &state.entries,
        };
        let result = serde_json::to_string(&doc)
            .map_err(LocalStorageError::from)
            .and_then(|raw| self.storage.set_item(&self.config.storage_key, &raw));
        state.durable = match result {
            Ok(()) => true,
            Err(err) => {
                warn!("activity log not persisted, continuing in memory: {err}");
                false
            }
        };
    }

    fn lock_state(&self) -> MutexGuard<'_, EventStoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn load_state(config: &EventStoreConfig, storage: &dyn LocalStorage) -> EventStoreState {
    let mut state = EventStoreState {
        durable: true,
        ..EventStoreState::default()
    };
    let raw = match storage.get_item(&config.storage_key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return state,
        Err(err) => {
            warn!("activity log unreadable, starting empty: {err}");
            return state;
        }
    };
    let doc = match serde_json::from_str::<PersistedLogRaw>(&raw) {
        Ok(doc) => doc,
        Err(err) => {
            warn!("discarding corrupt activity log: {err}");
            return state;
        }
    };
    if doc.schema_version != EVENT_LOG_SCHEMA_VERSION {
        warn!(
            "discarding activity log with schema version {}",
            doc.schema_version
        );
        return state;
    }

    let mut skipped = 0usize;
    for value in doc.events {
        if state.entries.len() >= config.capacity {
            break;
        }
        let Ok(event) = serde_json::from_value::<ActivityEvent>(value) else {
            skipped += 1;
            continue;
        };
        if event.validate().is_err() || !state.keys.insert(event.key()) {
            skipped += 1;
            continue;
        }
        state.entries.push_back(event);
    }
    if skipped > 0 {
        warn!("skipped {skipped} unreadable activity log entries");
    }
    state
}
