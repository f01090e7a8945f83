#![forbid(unsafe_code)]

use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread::{self, ScopedJoinHandle};

use engage_contracts::activity::{
    ActivityEvent, EventKey, EventMetadata, EventTimestamp, NormalizedRecord,
};
use engage_contracts::records::FindingStatsSnapshot;
use engage_engines::adapters::SourceAdapters;
use engage_engines::relative_time::format_relative;
use engage_storage::event_store::EventStore;
use log::{debug, warn};

pub const DEFAULT_DASHBOARD_FEED_LIMIT: usize = 10;
/// Upper bound on concurrent per-project finding fetches in a global snapshot.
pub const MAX_FINDING_FETCH_WORKERS: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedScope {
    /// Clients, projects, reports, and the findings of every fetched project.
    Global,
    /// One project's findings.
    Project(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityFeedConfig {
    pub dashboard_limit: usize,
}

impl ActivityFeedConfig {
    pub fn mvp_v1() -> Self {
        Self {
            dashboard_limit: DEFAULT_DASHBOARD_FEED_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedOrigin {
    Logged,
    Snapshot,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    pub event: ActivityEvent,
    pub origin: FeedOrigin,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatedFeed {
    pub items: Vec<FeedItem>,
    pub generated_at: EventTimestamp,
}

impl AggregatedFeed {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Relative labels, all measured against `generated_at`.
    pub fn relative_labels(&self) -> Vec<String> {
        self.items
            .iter()
            .map(|item| format_relative(item.event.timestamp, self.generated_at))
            .collect()
    }
}

/// Merge of logged events and snapshot-derived records.
///
/// Keys are unique in the output and a logged event shadows a snapshot record
/// with the same `(type, id)`. Ordering is newest first; on equal timestamps
/// logged events come before snapshot records and each side keeps its input
/// order.
pub fn merge_feed(
    logged: Vec<ActivityEvent>,
    derived: Vec<NormalizedRecord>,
    limit: Option<usize>,
) -> Vec<FeedItem> {
    let mut seen: BTreeSet<EventKey> = BTreeSet::new();
    let mut items = Vec::with_capacity(logged.len() + derived.len());
    for event in logged {
        if seen.insert(event.key()) {
            items.push(FeedItem {
                event,
                origin: FeedOrigin::Logged,
            });
        }
    }
    for record in derived {
        if seen.insert(record.key()) {
            items.push(FeedItem {
                event: record.event,
                origin: FeedOrigin::Snapshot,
            });
        }
    }
    items.sort_by(|a, b| b.event.timestamp.cmp(&a.event.timestamp));
    if let Some(limit) = limit {
        items.truncate(limit);
    }
    items
}

/// One fetch of every source a scope needs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceSnapshot {
    pub records: Vec<NormalizedRecord>,
    pub finding_stats: Option<FindingStatsSnapshot>,
}

#[derive(Debug, Clone)]
pub struct ActivityAggregator {
    store: Arc<EventStore>,
    adapters: Arc<SourceAdapters>,
}

impl ActivityAggregator {
    pub fn new(store: Arc<EventStore>, adapters: Arc<SourceAdapters>) -> Self {
        Self { store, adapters }
    }

    /// Fetches the scope's sources, each on its own scoped thread. A source
    /// that fails or panics contributes nothing.
    pub fn snapshot(&self, scope: &FeedScope, with_finding_stats: bool) -> SourceSnapshot {
        let adapters = self.adapters.as_ref();
        match scope {
            FeedScope::Project(project_id) => thread::scope(|s| {
                let findings = s.spawn(move || adapters.fetch_findings(project_id));
                let stats = with_finding_stats.then(|| s.spawn(move || adapters.fetch_finding_stats()));
                SourceSnapshot {
                    records: join_isolated("findings", findings),
                    finding_stats: stats.and_then(|h| join_isolated("finding_stats", h)),
                }
            }),
            FeedScope::Global => thread::scope(|s| {
                let clients = s.spawn(move || adapters.fetch_clients());
                let projects = s.spawn(move || adapters.fetch_projects());
                let reports = s.spawn(move || adapters.fetch_reports());
                let stats = with_finding_stats.then(|| s.spawn(move || adapters.fetch_finding_stats()));

                let projects = join_isolated("projects", projects);
                let project_ids: Vec<String> =
                    projects.iter().map(|p| p.source_id.clone()).collect();
                let finding_handles: Vec<_> = finding_chunks(project_ids)
                    .into_iter()
                    .map(|chunk| {
                        s.spawn(move || {
                            chunk
                                .iter()
                                .flat_map(|project_id| adapters.fetch_findings(project_id))
                                .collect::<Vec<_>>()
                        })
                    })
                    .collect();

                let mut records = join_isolated("clients", clients);
                records.extend(projects);
                records.extend(join_isolated("reports", reports));
                for handle in finding_handles {
                    records.extend(join_isolated("findings", handle));
                }
                SourceSnapshot {
                    records,
                    finding_stats: stats.and_then(|h| join_isolated("finding_stats", h)),
                }
            }),
        }
    }

    /// Logged events visible in `scope`, newest first.
    pub fn logged_for(&self, scope: &FeedScope) -> Vec<ActivityEvent> {
        let logged = self.store.list(None);
        match scope {
            FeedScope::Global => logged,
            FeedScope::Project(project_id) => logged
                .into_iter()
                .filter(|event| match &event.metadata {
                    EventMetadata::Finding(meta) => {
                        meta.project_id.as_deref() == Some(project_id.as_str())
                    }
                    _ => false,
                })
                .collect(),
        }
    }

    pub fn feed_from(
        &self,
        scope: &FeedScope,
        derived: Vec<NormalizedRecord>,
        limit: Option<usize>,
        now: EventTimestamp,
    ) -> AggregatedFeed {
        let items = merge_feed(self.logged_for(scope), derived, limit);
        debug!("activity feed built scope={scope:?} items={}", items.len());
        AggregatedFeed {
            items,
            generated_at: now,
        }
    }

    pub fn collect(&self, scope: &FeedScope, limit: Option<usize>) -> AggregatedFeed {
        let snapshot = self.snapshot(scope, false);
        self.feed_from(scope, snapshot.records, limit, EventTimestamp::now())
    }
}

/// Splits project ids into at most `MAX_FINDING_FETCH_WORKERS` contiguous
/// chunks, one per worker, preserving project order.
fn finding_chunks(project_ids: Vec<String>) -> Vec<Vec<String>> {
    let per_worker = project_ids.len().div_ceil(MAX_FINDING_FETCH_WORKERS).max(1);
    project_ids
        .chunks(per_worker)
        .map(<[String]>::to_vec)
        .collect()
}

fn join_isolated<T: Default>(source: &str, handle: ScopedJoinHandle<'_, T>) -> T {
    match handle.join() {
        Ok(value) => value,
        Err(_) => {
            warn!("source adapter panicked source={source}; contributing nothing");
            T::default()
        }
    }
}
