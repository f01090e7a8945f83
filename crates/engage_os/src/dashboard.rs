#![forbid(unsafe_code)]

use engage_contracts::activity::EventTimestamp;
use engage_contracts::stats::RollupStats;
use engage_engines::stats::StatsAggregator;
use log::info;
use serde::Serialize;

use crate::activity_feed::{ActivityAggregator, ActivityFeedConfig, AggregatedFeed, FeedScope};
use crate::mount::MountToken;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dashboard {
    pub stats: RollupStats,
    pub feed: AggregatedFeed,
}

/// Flat view of a dashboard for printing.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub stats: RollupStats,
    pub activity: Vec<DashboardActivityLine>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardActivityLine {
    #[serde(rename = "type")]
    pub entity_type: &'static str,
    pub id: String,
    pub action: Option<&'static str>,
    pub title: String,
    pub description: String,
    pub timestamp: String,
    pub when: String,
}

impl Dashboard {
    pub fn view(&self) -> DashboardView {
        let labels = self.feed.relative_labels();
        DashboardView {
            stats: self.stats,
            activity: self
                .feed
                .items
                .iter()
                .zip(labels)
                .map(|(item, when)| DashboardActivityLine {
                    entity_type: item.event.entity_type.as_str(),
                    id: item.event.id.as_str().to_string(),
                    action: item.event.action.map(|a| a.as_str()),
                    title: item.event.title.clone(),
                    description: item.event.description.clone(),
                    timestamp: item.event.timestamp.to_iso8601(),
                    when,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DashboardRuntime {
    aggregator: ActivityAggregator,
    stats: StatsAggregator,
    config: ActivityFeedConfig,
}

impl DashboardRuntime {
    pub fn new(aggregator: ActivityAggregator, config: ActivityFeedConfig) -> Self {
        Self {
            aggregator,
            stats: StatsAggregator::new(),
            config,
        }
    }

    /// Feed and stats from one fetch of every source.
    pub fn load(&self) -> Dashboard {
        let now = EventTimestamp::now();
        let snapshot = self.aggregator.snapshot(&FeedScope::Global, true);
        let stats = self
            .stats
            .aggregate(&snapshot.records, snapshot.finding_stats.as_ref());
        let feed = self.aggregator.feed_from(
            &FeedScope::Global,
            snapshot.records,
            Some(self.config.dashboard_limit),
            now,
        );
        info!(
            "dashboard loaded feed_items={} findings={} findings_source={:?}",
            feed.len(),
            stats.findings.total,
            stats.findings_source
        );
        Dashboard { stats, feed }
    }

    /// `load` for a mounted screen; `None` once the screen is gone.
    pub fn load_for(&self, token: &MountToken) -> Option<Dashboard> {
        if !token.is_mounted() {
            return None;
        }
        token.deliver(self.load())
    }
}
