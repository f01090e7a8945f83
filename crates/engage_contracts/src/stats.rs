#![forbid(unsafe_code)]

use serde::Serialize;

use crate::records::FindingStatsSnapshot;
use crate::status::Severity;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeverityCounts {
    pub total: u32,
    pub critical: u32,
    pub high: u32,
    pub medium: u32,
    /// Low and Informational.
    pub low: u32,
}

impl SeverityCounts {
    pub fn tally(&mut self, severity: Option<Severity>) {
        self.total = self.total.saturating_add(1);
        let Some(severity) = severity else {
            return;
        };
        let bucket = match severity {
            Severity::Critical => &mut self.critical,
            Severity::High => &mut self.high,
            Severity::Medium => &mut self.medium,
            Severity::Low | Severity::Informational => &mut self.low,
        };
        *bucket = bucket.saturating_add(1);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatsSource {
    Backend,
    #[default]
    ClientSide,
}

/// Dashboard rollups. Always recomputed from a full snapshot; never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RollupStats {
    pub findings: SeverityCounts,
    pub open_findings: SeverityCounts,
    pub unclassified_findings: u32,
    pub active_clients: u32,
    pub total_clients: u32,
    pub completed_projects: u32,
    pub total_projects: u32,
    pub completed_reports: u32,
    pub total_reports: u32,
    pub findings_source: StatsSource,
}

impl RollupStats {
    /// Replaces the finding counters with the backend's authoritative ones.
    pub fn with_backend_findings(mut self, snapshot: &FindingStatsSnapshot) -> Self {
        self.findings = SeverityCounts {
            total: snapshot.total,
            critical: snapshot.critical,
            high: snapshot.high,
            medium: snapshot.medium,
            low: snapshot.low,
        };
        self.open_findings = SeverityCounts {
            total: snapshot.total_open,
            critical: snapshot.critical_open,
            high: snapshot.high_open,
            medium: snapshot.medium_open,
            low: snapshot.low_open,
        };
        self.unclassified_findings = 0;
        self.findings_source = StatsSource::Backend;
        self
    }
}
