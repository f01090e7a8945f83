#![forbid(unsafe_code)]

//! Snapshot → event projection, one function per entity type. Each mapping is
//! deterministic: the same raw record always yields the same record, id and
//! timestamp included. Any record with a non-blank id normalizes; oversized
//! text is clipped to the event limits.

use engage_contracts::activity::{
    ActivityEvent, ClientMetadata, EntityAction, EntityType, EventId, EventMetadata,
    EventTimestamp, FindingMetadata, NormalizedRecord, ProjectMetadata, ReportMetadata,
    EVENT_DESCRIPTION_MAX_LEN, EVENT_TITLE_MAX_LEN,
};
use engage_contracts::records::{ClientRecord, FindingRecord, ProjectRecord, ReportRecord};
use engage_contracts::status::{
    ClientStatus, FindingStatus, ProjectStatus, ReportStatus, SeverityLabel,
};
use engage_contracts::ContractViolation;

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn clip(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}

fn record(
    entity_type: EntityType,
    source_id: Option<&str>,
    action: Option<EntityAction>,
    title: String,
    description: String,
    timestamp: EventTimestamp,
    metadata: EventMetadata,
) -> Result<NormalizedRecord, ContractViolation> {
    let source_id = non_blank(source_id).ok_or(ContractViolation::InvalidValue {
        field: "source_id",
        reason: "must not be empty",
    })?;
    let event = ActivityEvent::v1(
        EventId::for_entity(source_id)?,
        entity_type,
        action,
        clip(&title, EVENT_TITLE_MAX_LEN),
        clip(&description, EVENT_DESCRIPTION_MAX_LEN),
        timestamp,
        metadata,
    )?;
    Ok(NormalizedRecord {
        event,
        source_id: source_id.to_string(),
    })
}

pub fn normalize_client(raw: &ClientRecord) -> Result<NormalizedRecord, ContractViolation> {
    let status = ClientStatus::parse(raw.status.as_deref());
    record(
        EntityType::Client,
        raw.id.as_deref(),
        None,
        non_blank(raw.name.as_deref()).unwrap_or("Unnamed client").to_string(),
        status.as_str().to_string(),
        EventTimestamp::first_parseable([raw.updated_at.as_deref(), raw.created_at.as_deref()])
            .unwrap_or(EventTimestamp::EPOCH),
        EventMetadata::Client(ClientMetadata { status }),
    )
}

pub fn normalize_project(raw: &ProjectRecord) -> Result<NormalizedRecord, ContractViolation> {
    let status = ProjectStatus::parse(raw.status.as_deref());
    let action = (status == ProjectStatus::Completed).then_some(EntityAction::Completed);
    let client_name = non_blank(raw.client_name.as_deref()).map(str::to_string);
    record(
        EntityType::Project,
        raw.id.as_deref(),
        action,
        non_blank(raw.name.as_deref()).unwrap_or("Untitled project").to_string(),
        client_name
            .clone()
            .unwrap_or_else(|| "Unknown client".to_string()),
        EventTimestamp::first_parseable([
            raw.updated_at.as_deref(),
            raw.end_date.as_deref(),
            raw.created_at.as_deref(),
        ])
        .unwrap_or(EventTimestamp::EPOCH),
        EventMetadata::Project(ProjectMetadata {
            status,
            client_name,
        }),
    )
}

pub fn normalize_report(raw: &ReportRecord) -> Result<NormalizedRecord, ContractViolation> {
    let status = ReportStatus::parse(raw.status.as_deref());
    let action = (status == ReportStatus::Completed).then_some(EntityAction::Generated);
    let project_name = non_blank(raw.project_name.as_deref()).map(str::to_string);
    record(
        EntityType::Report,
        raw.id.as_deref(),
        action,
        non_blank(raw.title.as_deref()).unwrap_or("Untitled report").to_string(),
        project_name
            .clone()
            .unwrap_or_else(|| "Unknown project".to_string()),
        EventTimestamp::first_parseable([raw.updated_at.as_deref(), raw.created_at.as_deref()])
            .unwrap_or(EventTimestamp::EPOCH),
        EventMetadata::Report(ReportMetadata {
            status,
            project_name,
        }),
    )
}

/// `project_id` is the project the listing was fetched for; it wins over the
/// record's own field so scoped fetches always tag their project.
pub fn normalize_finding(
    raw: &FindingRecord,
    project_id: &str,
) -> Result<NormalizedRecord, ContractViolation> {
    let severity = SeverityLabel::parse(raw.severity.as_deref());
    let project_id = non_blank(Some(project_id))
        .or(non_blank(raw.project_id.as_deref()))
        .map(str::to_string);
    record(
        EntityType::Finding,
        raw.id.as_deref(),
        None,
        non_blank(raw.title.as_deref()).unwrap_or("Untitled finding").to_string(),
        severity
            .as_ref()
            .map(|s| s.as_str().to_string())
            .unwrap_or_else(|| "Unrated".to_string()),
        EventTimestamp::first_parseable([raw.created_at.as_deref(), raw.updated_at.as_deref()])
            .unwrap_or(EventTimestamp::EPOCH),
        EventMetadata::Finding(FindingMetadata {
            severity,
            status: FindingStatus::parse(raw.status.as_deref()),
            project_id,
        }),
    )
}
