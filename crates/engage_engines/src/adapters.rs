#![forbid(unsafe_code)]

use std::sync::Arc;

use engage_contracts::activity::NormalizedRecord;
use engage_contracts::records::{
    ClientRecord, FindingRecord, FindingStatsSnapshot, ProjectRecord, ReportRecord,
};
use engage_contracts::ContractViolation;
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::http::ApiTransport;
use crate::identity::{BearerToken, TokenProvider};
use crate::normalize::{normalize_client, normalize_finding, normalize_project, normalize_report};

pub const DEFAULT_PAGE_LIMIT: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceAdapterConfig {
    pub clients_path: String,
    pub projects_path: String,
    pub reports_path: String,
    pub findings_path: String,
    pub finding_stats_path: String,
    pub page_limit: u32,
}

impl SourceAdapterConfig {
    pub fn mvp_v1() -> Self {
        Self {
            clients_path: "/clients".to_string(),
            projects_path: "/v1/projects".to_string(),
            reports_path: "/v1/reports/".to_string(),
            findings_path: "/findings/".to_string(),
            finding_stats_path: "/findings/stats".to_string(),
            page_limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

/// Read-only snapshot fetchers, one per entity type. Every fetch degrades to
/// an empty result; no transport or payload error reaches the caller.
pub struct SourceAdapters {
    transport: Arc<dyn ApiTransport>,
    tokens: Arc<dyn TokenProvider>,
    config: SourceAdapterConfig,
}

impl std::fmt::Debug for SourceAdapters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceAdapters")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SourceAdapters {
    pub fn new(
        transport: Arc<dyn ApiTransport>,
        tokens: Arc<dyn TokenProvider>,
        config: SourceAdapterConfig,
    ) -> Self {
        Self {
            transport,
            tokens,
            config,
        }
    }

    pub fn config(&self) -> &SourceAdapterConfig {
        &self.config
    }

    pub fn fetch_clients(&self) -> Vec<NormalizedRecord> {
        self.fetch_list::<ClientRecord, _>(&self.config.clients_path, &[], normalize_client)
    }

    pub fn fetch_projects(&self) -> Vec<NormalizedRecord> {
        self.fetch_list::<ProjectRecord, _>(&self.config.projects_path, &[], normalize_project)
    }

    pub fn fetch_reports(&self) -> Vec<NormalizedRecord> {
        self.fetch_list::<ReportRecord, _>(&self.config.reports_path, &[], normalize_report)
    }

    pub fn fetch_findings(&self, project_id: &str) -> Vec<NormalizedRecord> {
        let project_id = project_id.trim();
        if project_id.is_empty() {
            debug!("fetch_findings skipped: empty project_id");
            return Vec::new();
        }
        self.fetch_list::<FindingRecord, _>(
            &self.config.findings_path,
            &[("project_id", project_id)],
            |raw| normalize_finding(raw, project_id),
        )
    }

    /// The backend's own finding counters, when the endpoint answers with a
    /// well-formed body.
    pub fn fetch_finding_stats(&self) -> Option<FindingStatsSnapshot> {
        let path = &self.config.finding_stats_path;
        let body = self.get(path, &[])?;
        match serde_json::from_value::<FindingStatsSnapshot>(body) {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                warn!("finding stats payload rejected endpoint={path} error={err}");
                None
            }
        }
    }

    fn token(&self, path: &str) -> Option<BearerToken> {
        let token = self.tokens.get_token();
        if token.is_none() {
            debug!("no bearer token; endpoint={path} contributes nothing");
        }
        token
    }

    fn get(&self, path: &str, query: &[(&str, &str)]) -> Option<Value> {
        let token = self.token(path)?;
        match self.transport.get_json(path, query, &token) {
            Ok(body) => Some(body),
            Err(err) => {
                warn!("source fetch failed {err}");
                None
            }
        }
    }

    fn fetch_list<R, F>(&self, path: &str, extra: &[(&str, &str)], normalize: F) -> Vec<NormalizedRecord>
    where
        R: DeserializeOwned,
        F: Fn(&R) -> Result<NormalizedRecord, ContractViolation>,
    {
        let limit = self.config.page_limit.to_string();
        let mut query: Vec<(&str, &str)> = extra.to_vec();
        query.push(("limit", limit.as_str()));
        let Some(body) = self.get(path, &query) else {
            return Vec::new();
        };
        let records = decode_array(path, body, normalize);
        debug!("source fetch ok endpoint={path} records={}", records.len());
        records
    }
}

fn decode_array<R, F>(path: &str, body: Value, normalize: F) -> Vec<NormalizedRecord>
where
    R: DeserializeOwned,
    F: Fn(&R) -> Result<NormalizedRecord, ContractViolation>,
{
    let Value::Array(items) = body else {
        warn!("source payload is not an array endpoint={path}");
        return Vec::new();
    };
    let mut out = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        let raw = match serde_json::from_value::<R>(item) {
            Ok(raw) => raw,
            Err(err) => {
                warn!("skipping malformed element endpoint={path} index={index} error={err}");
                continue;
            }
        };
        match normalize(&raw) {
            Ok(record) => out.push(record),
            Err(err) => warn!("skipping element endpoint={path} index={index} error={err}"),
        }
    }
    out
}
