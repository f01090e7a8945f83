#![forbid(unsafe_code)]

use std::sync::Arc;
use std::time::Duration;

use engage_contracts::activity::{
    ActivityEvent, EntityAction, EntityType, EventId, EventMetadata, EventTimestamp,
    FindingMetadata,
};
use engage_contracts::stats::StatsSource;
use engage_contracts::status::FindingStatus;
use engage_engines::http::{ApiTransport, FixtureTransport, TransportError, TransportErrorKind};
use engage_engines::identity::{BearerToken, StaticTokenProvider};
use engage_os::activity_feed::{FeedOrigin, FeedScope};
use engage_os::config::EngagementConfig;
use engage_os::context::EngagementContext;
use engage_os::mount::MountGuard;
use engage_storage::event_store::AppendOutcome;
use engage_storage::local_storage::MemoryLocalStorage;
use engage_storage::signals::Signal;
use serde_json::{json, Value};

const T: &str = "2024-01-01T10:00:00Z";

fn context(transport: Arc<dyn ApiTransport>) -> EngagementContext {
    EngagementContext::with_parts(
        EngagementConfig::mvp_v1(),
        Arc::new(MemoryLocalStorage::new()),
        transport,
        Arc::new(StaticTokenProvider::new(BearerToken::new("t0k"))),
    )
}

fn full_backend() -> FixtureTransport {
    FixtureTransport::new()
        .with_json(
            "/clients",
            json!([{"id": "c1", "name": "Acme", "status": "ACTIVE", "updated_at": "2024-01-03T00:00:00Z"}]),
        )
        .with_json(
            "/v1/projects",
            json!([{"id": "p1", "name": "Acme external", "status": "IN_PROGRESS", "updated_at": "2024-01-02T00:00:00Z"}]),
        )
        .with_json(
            "/v1/reports/",
            json!([{"id": "r1", "title": "Acme Q1", "status": "COMPLETED", "updated_at": "2024-01-04T00:00:00Z"}]),
        )
        .with_json(
            "/findings/",
            json!([
                {"id": "f1", "title": "SQLi", "severity": "Critical", "created_at": T},
                {"id": "f2", "title": "Verbose errors", "severity": "Info", "status": "RESOLVED", "created_at": "2023-12-30T00:00:00Z"}
            ]),
        )
}

fn logged_finding(id: &str, ts: &str) -> ActivityEvent {
    ActivityEvent::v1(
        EventId::new(id).unwrap(),
        EntityType::Finding,
        Some(EntityAction::Created),
        "SQLi",
        "Critical finding logged",
        EventTimestamp::parse_iso8601(ts).unwrap(),
        EventMetadata::Finding(FindingMetadata {
            severity: None,
            status: FindingStatus::Open,
            project_id: Some("p1".to_string()),
        }),
    )
    .unwrap()
}

/// Panics on one path and answers every other path from a fixture.
struct PanickingProjects {
    inner: FixtureTransport,
}

impl ApiTransport for PanickingProjects {
    fn get_json(
        &self,
        path: &str,
        query: &[(&str, &str)],
        token: &BearerToken,
    ) -> Result<Value, TransportError> {
        if path == "/v1/projects" {
            panic!("projects adapter exploded");
        }
        self.inner.get_json(path, query, token)
    }
}

#[test]
fn at_dashboard_db_01_logged_creation_shadows_snapshot_record() {
    let ctx = context(Arc::new(full_backend()));
    assert_eq!(
        ctx.event_store().append(logged_finding("f1", T)),
        AppendOutcome::Appended
    );

    let feed = ctx.activity_feed(&FeedScope::Project("p1".to_string()), None);
    let f1: Vec<_> = feed
        .items
        .iter()
        .filter(|i| i.event.id.as_str() == "f1")
        .collect();
    assert_eq!(f1.len(), 1);
    assert_eq!(f1[0].event.action, Some(EntityAction::Created));
    assert_eq!(f1[0].origin, FeedOrigin::Logged);
    assert_eq!(feed.len(), 2);
}

#[test]
fn at_dashboard_db_02_single_logged_and_single_snapshot_merge_to_one() {
    let transport = FixtureTransport::new().with_json(
        "/findings/",
        json!([{"id": "f1", "title": "SQLi", "created_at": T}]),
    );
    let ctx = context(Arc::new(transport));
    ctx.event_store().append(logged_finding("f1", T));

    let feed = ctx.activity_feed(&FeedScope::Project("p1".to_string()), None);
    assert_eq!(feed.len(), 1);
    assert_eq!(feed.items[0].event.action, Some(EntityAction::Created));
}

#[test]
fn at_dashboard_db_03_failing_projects_source_leaves_clients_and_reports() {
    let transport = FixtureTransport::new()
        .with_json("/clients", json!([{"id": "c1", "name": "Acme"}]))
        .with_error("/v1/projects", TransportErrorKind::HttpStatus(500))
        .with_json("/v1/reports/", json!([{"id": "r1", "title": "Acme Q1"}]));
    let ctx = context(Arc::new(transport));

    let feed = ctx.activity_feed(&FeedScope::Global, None);
    assert!(!feed.is_empty());
    assert!(feed.items.iter().all(|i| matches!(
        i.event.entity_type,
        EntityType::Client | EntityType::Report
    )));
}

#[test]
fn at_dashboard_db_04_panicking_source_is_isolated() {
    let inner = full_backend();
    let ctx = context(Arc::new(PanickingProjects { inner }));

    let dashboard = ctx.dashboard();
    let types: Vec<EntityType> = dashboard
        .feed
        .items
        .iter()
        .map(|i| i.event.entity_type)
        .collect();
    assert!(types.contains(&EntityType::Client));
    assert!(types.contains(&EntityType::Report));
    assert!(!types.contains(&EntityType::Project));
    assert_eq!(dashboard.stats.total_projects, 0);
}

#[test]
fn at_dashboard_db_05_stats_fall_back_to_snapshot_without_backend_endpoint() {
    let ctx = context(Arc::new(full_backend()));
    let dashboard = ctx.dashboard();
    let stats = dashboard.stats;
    assert_eq!(stats.findings_source, StatsSource::ClientSide);
    assert_eq!(stats.findings.total, 2);
    assert_eq!(stats.findings.critical, 1);
    assert_eq!(stats.findings.low, 1);
    assert_eq!(stats.open_findings.total, 1);
    assert_eq!(stats.active_clients, 1);
    assert_eq!(stats.completed_reports, 1);
    assert_eq!(stats.completed_projects, 0);
}

#[test]
fn at_dashboard_db_06_backend_stats_are_preferred() {
    let transport = full_backend().with_json(
        "/findings/stats",
        json!({
            "total": 12, "total_open": 7,
            "critical": 3, "critical_open": 2,
            "high": 4, "high_open": 3,
            "medium": 3, "medium_open": 1,
            "low": 2, "low_open": 1
        }),
    );
    let ctx = context(Arc::new(transport));
    let stats = ctx.dashboard().stats;
    assert_eq!(stats.findings_source, StatsSource::Backend);
    assert_eq!(stats.findings.total, 12);
    assert_eq!(stats.open_findings.high, 3);
    assert_eq!(stats.total_clients, 1);
}

#[test]
fn at_dashboard_db_07_feed_is_ordered_and_limited() {
    let mut config = EngagementConfig::mvp_v1();
    config.feed.dashboard_limit = 3;
    let ctx = EngagementContext::with_parts(
        config,
        Arc::new(MemoryLocalStorage::new()),
        Arc::new(full_backend()),
        Arc::new(StaticTokenProvider::new(BearerToken::new("t0k"))),
    );
    let feed = ctx.dashboard().feed;
    let ids: Vec<&str> = feed.items.iter().map(|i| i.event.id.as_str()).collect();
    assert_eq!(ids, vec!["r1", "c1", "p1"]);
}

#[test]
fn at_dashboard_db_08_signed_out_dashboard_is_empty_not_an_error() {
    let ctx = EngagementContext::with_parts(
        EngagementConfig::mvp_v1(),
        Arc::new(MemoryLocalStorage::new()),
        Arc::new(full_backend()),
        Arc::new(StaticTokenProvider::signed_out()),
    );
    let dashboard = ctx.dashboard();
    assert!(dashboard.feed.is_empty());
    assert_eq!(dashboard.stats.findings.total, 0);
}

#[test]
fn at_dashboard_db_09_record_action_publishes_and_follow_ups_get_own_id() {
    let ctx = context(Arc::new(FixtureTransport::new()));
    let sub = ctx.subscribe();
    let meta = EventMetadata::empty_for(EntityType::Project);

    assert_eq!(
        ctx.record_action(EntityType::Project, EntityAction::Created, "p9", "New project", "", meta.clone())
            .unwrap(),
        AppendOutcome::Appended
    );
    assert_eq!(
        ctx.record_action(EntityType::Project, EntityAction::Created, "p9", "New project", "", meta.clone())
            .unwrap(),
        AppendOutcome::Duplicate
    );
    ctx.record_action(EntityType::Project, EntityAction::Completed, "p9", "New project", "", meta)
        .unwrap();

    let logged = ctx.event_store().list(None);
    assert_eq!(logged.len(), 2);
    assert!(logged[0].id.as_str().starts_with("p9:completed:"));
    assert_eq!(logged[1].id.as_str(), "p9");

    let appended = sub
        .drain()
        .into_iter()
        .filter(|s| matches!(s, Signal::ActivityAppended(_)))
        .count();
    assert_eq!(appended, 2);

    assert!(ctx
        .record_action(
            EntityType::Client,
            EntityAction::Generated,
            "c1",
            "Acme",
            "",
            EventMetadata::empty_for(EntityType::Client)
        )
        .is_err());
}

#[test]
fn at_dashboard_db_10_finding_template_broadcast_reaches_subscribers() {
    let ctx = context(Arc::new(FixtureTransport::new()));
    let a = ctx.subscribe();
    let b = ctx.subscribe();
    ctx.notify_finding_templates_updated();
    assert_eq!(a.try_next(), Some(Signal::FindingTemplatesUpdated));
    assert_eq!(
        b.next_timeout(Duration::from_millis(50)).map(|s| s.name()),
        Some("custom-findings-updated")
    );
}

#[test]
fn at_dashboard_db_11_unmounted_screen_discards_result() {
    let ctx = context(Arc::new(full_backend()));
    let runtime = ctx.dashboard_runtime();
    let guard = MountGuard::mount("dashboard");
    let token = guard.token();
    assert!(runtime.load_for(&token).is_some());
    drop(guard);
    assert!(runtime.load_for(&token).is_none());
}

#[test]
fn at_dashboard_db_12_back_to_back_updates_are_all_kept() {
    let ctx = context(Arc::new(FixtureTransport::new()));
    let meta = EventMetadata::empty_for(EntityType::Finding);
    for _ in 0..50 {
        assert_eq!(
            ctx.record_action(EntityType::Finding, EntityAction::Updated, "f1", "SQLi", "", meta.clone())
                .unwrap(),
            AppendOutcome::Appended
        );
    }
    assert_eq!(ctx.event_store().len(), 50);
}

#[test]
fn at_dashboard_db_13_long_entity_ids_still_record_follow_ups() {
    let ctx = context(Arc::new(FixtureTransport::new()));
    let meta = EventMetadata::empty_for(EntityType::Finding);
    let long_id = "f".repeat(120);
    for action in [EntityAction::Created, EntityAction::Updated, EntityAction::StatusChanged] {
        assert_eq!(
            ctx.record_action(EntityType::Finding, action, &long_id, "SQLi", "", meta.clone())
                .unwrap(),
            AppendOutcome::Appended
        );
    }
    assert_eq!(ctx.event_store().len(), 3);
}

#[test]
fn at_dashboard_db_14_oversized_client_name_keeps_project_in_stats() {
    let transport = FixtureTransport::new().with_json(
        "/v1/projects",
        json!([
            {"id": "p1", "name": "Acme external", "status": "COMPLETED", "client_name": "Acme", "updated_at": T},
            {"id": "p2", "name": "Globex internal", "status": "COMPLETED", "client_name": "g".repeat(1100), "updated_at": T}
        ]),
    );
    let ctx = context(Arc::new(transport));
    let dashboard = ctx.dashboard();
    assert_eq!(dashboard.stats.total_projects, 2);
    assert_eq!(dashboard.stats.completed_projects, 2);
    assert_eq!(dashboard.feed.len(), 2);
}
