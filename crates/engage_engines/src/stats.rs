#![forbid(unsafe_code)]

use engage_contracts::activity::{EventMetadata, NormalizedRecord};
use engage_contracts::records::FindingStatsSnapshot;
use engage_contracts::stats::{RollupStats, StatsSource};
use engage_contracts::status::{ClientStatus, FindingStatus, ProjectStatus, ReportStatus, SeverityLabel};
use log::warn;

/// Single-pass reduction over a snapshot. Same input, same output.
pub fn compute_stats(records: &[NormalizedRecord]) -> RollupStats {
    let mut stats = RollupStats {
        findings_source: StatsSource::ClientSide,
        ..RollupStats::default()
    };
    for record in records {
        match &record.event.metadata {
            EventMetadata::Client(meta) => {
                stats.total_clients = stats.total_clients.saturating_add(1);
                if meta.status == ClientStatus::Active {
                    stats.active_clients = stats.active_clients.saturating_add(1);
                }
            }
            EventMetadata::Project(meta) => {
                stats.total_projects = stats.total_projects.saturating_add(1);
                if meta.status == ProjectStatus::Completed {
                    stats.completed_projects = stats.completed_projects.saturating_add(1);
                }
            }
            EventMetadata::Report(meta) => {
                stats.total_reports = stats.total_reports.saturating_add(1);
                if meta.status == ReportStatus::Completed {
                    stats.completed_reports = stats.completed_reports.saturating_add(1);
                }
            }
            EventMetadata::Finding(meta) => {
                let severity = match &meta.severity {
                    Some(SeverityLabel::Known(severity)) => Some(*severity),
                    Some(SeverityLabel::Unrecognized(raw)) => {
                        warn!(
                            "unclassified finding severity finding_id={} severity={raw:?}",
                            record.source_id
                        );
                        stats.unclassified_findings = stats.unclassified_findings.saturating_add(1);
                        None
                    }
                    None => None,
                };
                stats.findings.tally(severity);
                if meta.status == FindingStatus::Open {
                    stats.open_findings.tally(severity);
                }
            }
        }
    }
    stats
}

/// Stats for the dashboard. Finding counters come from the backend
/// aggregation when it answered, otherwise from the snapshot itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatsAggregator;

impl StatsAggregator {
    pub fn new() -> Self {
        Self
    }

    pub fn compute_stats(&self, records: &[NormalizedRecord]) -> RollupStats {
        compute_stats(records)
    }

    pub fn aggregate(
        &self,
        records: &[NormalizedRecord],
        backend: Option<&FindingStatsSnapshot>,
    ) -> RollupStats {
        let stats = compute_stats(records);
        match backend {
            Some(snapshot) => stats.with_backend_findings(snapshot),
            None => stats,
        }
    }
}
