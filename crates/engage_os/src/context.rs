#![forbid(unsafe_code)]

use std::sync::Arc;

use engage_contracts::activity::{
    ActivityEvent, EntityAction, EntityType, EventId, EventMetadata, EventTimestamp,
};
use engage_contracts::ContractViolation;
use engage_engines::adapters::SourceAdapters;
use engage_engines::http::{ApiTransport, UreqTransport};
use engage_engines::identity::TokenProvider;
use engage_storage::event_store::{AppendOutcome, EventStore};
use engage_storage::local_storage::{FileLocalStorage, LocalStorage};
use engage_storage::signals::{Signal, SignalBus, SignalSubscription};
use engage_storage::view_state::ViewStateStore;
use log::info;

use crate::activity_feed::{ActivityAggregator, AggregatedFeed, FeedScope};
use crate::config::EngagementConfig;
use crate::dashboard::{Dashboard, DashboardRuntime};

/// Everything a screen needs, built once per process and handed out by
/// reference.
#[derive(Debug, Clone)]
pub struct EngagementContext {
    config: EngagementConfig,
    bus: SignalBus,
    store: Arc<EventStore>,
    view_state: Arc<ViewStateStore>,
    adapters: Arc<SourceAdapters>,
}

impl EngagementContext {
    /// File-backed storage under `config.state_dir` and the HTTP transport.
    pub fn open(config: EngagementConfig, tokens: Arc<dyn TokenProvider>) -> Self {
        let storage = Arc::new(FileLocalStorage::new(config.state_dir.clone()));
        let transport = Arc::new(UreqTransport::new(config.http.clone()));
        info!(
            "engagement context open state_dir={} api={}",
            config.state_dir.display(),
            config.http.base_url
        );
        Self::with_parts(config, storage, transport, tokens)
    }

    pub fn with_parts(
        config: EngagementConfig,
        storage: Arc<dyn LocalStorage>,
        transport: Arc<dyn ApiTransport>,
        tokens: Arc<dyn TokenProvider>,
    ) -> Self {
        let bus = SignalBus::new();
        let store = Arc::new(EventStore::open(
            config.event_store.clone(),
            Arc::clone(&storage),
            bus.clone(),
        ));
        let view_state = Arc::new(ViewStateStore::new(
            storage,
            config.user_scope.clone(),
            bus.clone(),
        ));
        let adapters = Arc::new(SourceAdapters::new(
            transport,
            tokens,
            config.adapters.clone(),
        ));
        Self {
            config,
            bus,
            store,
            view_state,
            adapters,
        }
    }

    pub fn config(&self) -> &EngagementConfig {
        &self.config
    }

    pub fn event_store(&self) -> &Arc<EventStore> {
        &self.store
    }

    pub fn view_state(&self) -> &Arc<ViewStateStore> {
        &self.view_state
    }

    pub fn adapters(&self) -> &Arc<SourceAdapters> {
        &self.adapters
    }

    pub fn subscribe(&self) -> SignalSubscription {
        self.bus.subscribe()
    }

    /// Logs an action taken on an entity. A creation shares the entity's id so
    /// it shadows the snapshot record; every later action gets its own id.
    pub fn record_action(
        &self,
        entity_type: EntityType,
        action: EntityAction,
        entity_id: &str,
        title: &str,
        description: &str,
        metadata: EventMetadata,
    ) -> Result<AppendOutcome, ContractViolation> {
        let timestamp = EventTimestamp::now();
        let id = match action {
            EntityAction::Created => EventId::for_entity(entity_id)?,
            _ => {
                EventId::for_action(entity_id, action, timestamp, self.store.next_sequence())?
            }
        };
        let event = ActivityEvent::v1(
            id,
            entity_type,
            Some(action),
            title,
            description,
            timestamp,
            metadata,
        )?;
        Ok(self.store.append(event))
    }

    pub fn activity_feed(&self, scope: &FeedScope, limit: Option<usize>) -> AggregatedFeed {
        self.aggregator().collect(scope, limit)
    }

    pub fn dashboard(&self) -> Dashboard {
        self.dashboard_runtime().load()
    }

    pub fn dashboard_runtime(&self) -> DashboardRuntime {
        DashboardRuntime::new(self.aggregator(), self.config.feed)
    }

    pub fn notify_finding_templates_updated(&self) {
        self.bus.publish(Signal::FindingTemplatesUpdated);
    }

    fn aggregator(&self) -> ActivityAggregator {
        ActivityAggregator::new(Arc::clone(&self.store), Arc::clone(&self.adapters))
    }
}
