#![forbid(unsafe_code)]

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime};

use crate::common::validate_text;
use crate::status::{ClientStatus, FindingStatus, ProjectStatus, ReportStatus, SeverityLabel};
use crate::{ContractViolation, SchemaVersion, Validate};

pub const ACTIVITY_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

pub const EVENT_ID_MAX_LEN: usize = 128;
pub const EVENT_TITLE_MAX_LEN: usize = 256;
pub const EVENT_DESCRIPTION_MAX_LEN: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Client,
    Project,
    Finding,
    Report,
}

impl EntityType {
    pub const ALL: [EntityType; 4] = [
        EntityType::Client,
        EntityType::Project,
        EntityType::Finding,
        EntityType::Report,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Project => "project",
            Self::Finding => "finding",
            Self::Report => "report",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(raw.trim()))
    }

    pub fn allows(self, action: EntityAction) -> bool {
        use EntityAction::*;
        match self {
            Self::Client => matches!(action, Created | Updated | Deleted | StatusChanged),
            Self::Project => {
                matches!(action, Created | Updated | Deleted | Completed | StatusChanged)
            }
            Self::Finding => matches!(action, Created | Updated | Deleted | StatusChanged),
            Self::Report => matches!(action, Created | Updated | Deleted | Generated),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityAction {
    Created,
    Updated,
    Deleted,
    Completed,
    Generated,
    StatusChanged,
}

impl EntityAction {
    pub const ALL: [EntityAction; 6] = [
        EntityAction::Created,
        EntityAction::Updated,
        EntityAction::Deleted,
        EntityAction::Completed,
        EntityAction::Generated,
        EntityAction::StatusChanged,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
            Self::Completed => "completed",
            Self::Generated => "generated",
            Self::StatusChanged => "status_changed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str().eq_ignore_ascii_case(raw.trim()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EventId(String);

impl EventId {
    pub fn new(id: impl Into<String>) -> Result<Self, ContractViolation> {
        let id = id.into();
        validate_text("event_id", &id, EVENT_ID_MAX_LEN)?;
        Ok(Self(id))
    }

    /// Id of a record derived from an entity snapshot. The entity type is the
    /// other half of the `(type, id)` key, so the raw source id is enough.
    /// Source ids longer than `EVENT_ID_MAX_LEN` map to a clipped prefix plus
    /// a digest of the full id.
    pub fn for_entity(source_id: &str) -> Result<Self, ContractViolation> {
        Self::new(bounded_id(source_id.trim(), EVENT_ID_MAX_LEN))
    }

    /// Id for a follow-up action on an entity that already has a creation event.
    /// `sequence` separates actions recorded within the same millisecond.
    pub fn for_action(
        source_id: &str,
        action: EntityAction,
        at: EventTimestamp,
        sequence: u64,
    ) -> Result<Self, ContractViolation> {
        let suffix = format!(":{}:{}-{}", action.as_str(), at.unix_ms(), sequence);
        let budget = EVENT_ID_MAX_LEN.saturating_sub(suffix.chars().count());
        Self::new(format!("{}{suffix}", bounded_id(source_id.trim(), budget)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

const ID_DIGEST_LEN: usize = 17;

fn fnv1a64(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in bytes {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

/// `raw` unchanged when it fits in `max_chars`, otherwise a prefix and
/// `~<fnv1a64 hex>` of the whole value, `max_chars` long in total.
fn bounded_id(raw: &str, max_chars: usize) -> String {
    if raw.chars().count() <= max_chars {
        return raw.to_string();
    }
    let prefix: String = raw
        .chars()
        .take(max_chars.saturating_sub(ID_DIGEST_LEN))
        .collect();
    format!("{prefix}~{:016x}", fnv1a64(raw.as_bytes()))
}

impl TryFrom<String> for EventId {
    type Error = ContractViolation;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<EventId> for String {
    fn from(value: EventId) -> Self {
        value.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An absolute instant. Ordering compares instants, so `12:00+02:00` and
/// `10:00Z` are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct EventTimestamp(OffsetDateTime);

impl EventTimestamp {
    pub const EPOCH: EventTimestamp = EventTimestamp(OffsetDateTime::UNIX_EPOCH);

    pub fn now() -> Self {
        Self(OffsetDateTime::now_utc())
    }

    pub fn from_datetime(dt: OffsetDateTime) -> Self {
        Self(dt)
    }

    pub fn from_unix_ms(ms: i64) -> Self {
        let nanos = i128::from(ms).saturating_mul(1_000_000);
        OffsetDateTime::from_unix_timestamp_nanos(nanos)
            .map(Self)
            .unwrap_or(Self::EPOCH)
    }

    /// Accepts RFC 3339, naive ISO-8601 date-times (read as UTC) and bare dates.
    pub fn parse_iso8601(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        if let Ok(dt) = OffsetDateTime::parse(raw, &Rfc3339) {
            return Some(Self(dt));
        }
        let naive_fractional =
            format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]");
        if let Ok(dt) = PrimitiveDateTime::parse(raw, naive_fractional) {
            return Some(Self(dt.assume_utc()));
        }
        let naive = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
        if let Ok(dt) = PrimitiveDateTime::parse(raw, naive) {
            return Some(Self(dt.assume_utc()));
        }
        let date_only = format_description!("[year]-[month]-[day]");
        if let Ok(date) = Date::parse(raw, date_only) {
            return Some(Self(date.midnight().assume_utc()));
        }
        None
    }

    /// First parseable candidate wins.
    pub fn first_parseable<'a>(candidates: impl IntoIterator<Item = Option<&'a str>>) -> Option<Self> {
        candidates
            .into_iter()
            .flatten()
            .find_map(Self::parse_iso8601)
    }

    pub fn to_iso8601(&self) -> String {
        self.0
            .format(&Rfc3339)
            .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
    }

    pub fn unix_ms(&self) -> i64 {
        (self.0.unix_timestamp_nanos() / 1_000_000) as i64
    }

    pub fn as_datetime(&self) -> OffsetDateTime {
        self.0
    }
}

impl Serialize for EventTimestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_iso8601())
    }
}

impl<'de> Deserialize<'de> for EventTimestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse_iso8601(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}")))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientMetadata {
    pub status: ClientStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectMetadata {
    pub status: ProjectStatus,
    #[serde(default)]
    pub client_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindingMetadata {
    #[serde(default)]
    pub severity: Option<SeverityLabel>,
    pub status: FindingStatus,
    #[serde(default)]
    pub project_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub status: ReportStatus,
    #[serde(default)]
    pub project_name: Option<String>,
}

/// Display-only detail attached to an event. The variant always matches the
/// event's `entity_type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EventMetadata {
    Client(ClientMetadata),
    Project(ProjectMetadata),
    Finding(FindingMetadata),
    Report(ReportMetadata),
}

impl EventMetadata {
    pub fn empty_for(entity_type: EntityType) -> Self {
        match entity_type {
            EntityType::Client => Self::Client(ClientMetadata::default()),
            EntityType::Project => Self::Project(ProjectMetadata::default()),
            EntityType::Finding => Self::Finding(FindingMetadata::default()),
            EntityType::Report => Self::Report(ReportMetadata::default()),
        }
    }

    pub fn entity_type(&self) -> EntityType {
        match self {
            Self::Client(_) => EntityType::Client,
            Self::Project(_) => EntityType::Project,
            Self::Finding(_) => EntityType::Finding,
            Self::Report(_) => EntityType::Report,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub id: EventId,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    #[serde(default)]
    pub action: Option<EntityAction>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub timestamp: EventTimestamp,
    pub metadata: EventMetadata,
}

impl ActivityEvent {
    pub fn v1(
        id: EventId,
        entity_type: EntityType,
        action: Option<EntityAction>,
        title: impl Into<String>,
        description: impl Into<String>,
        timestamp: EventTimestamp,
        metadata: EventMetadata,
    ) -> Result<Self, ContractViolation> {
        let ev = Self {
            id,
            entity_type,
            action,
            title: title.into(),
            description: description.into(),
            timestamp,
            metadata,
        };
        ev.validate()?;
        Ok(ev)
    }

    pub fn key(&self) -> EventKey {
        (self.entity_type, self.id.clone())
    }
}

/// Identity of an event: unique per entity type.
pub type EventKey = (EntityType, EventId);

impl Validate for ActivityEvent {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_text("activity_event.id", self.id.as_str(), EVENT_ID_MAX_LEN)?;
        validate_text("activity_event.title", &self.title, EVENT_TITLE_MAX_LEN)?;
        if self.description.chars().count() > EVENT_DESCRIPTION_MAX_LEN {
            return Err(ContractViolation::InvalidValue {
                field: "activity_event.description",
                reason: "exceeds max length",
            });
        }
        if let Some(action) = self.action {
            if !self.entity_type.allows(action) {
                return Err(ContractViolation::InvalidValue {
                    field: "activity_event.action",
                    reason: "action is not legal for entity type",
                });
            }
        }
        if self.metadata.entity_type() != self.entity_type {
            return Err(ContractViolation::InvalidValue {
                field: "activity_event.metadata",
                reason: "metadata variant must match entity type",
            });
        }
        Ok(())
    }
}

/// A snapshot-derived projection of an external entity into event shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedRecord {
    pub event: ActivityEvent,
    pub source_id: String,
}

impl NormalizedRecord {
    pub fn key(&self) -> EventKey {
        self.event.key()
    }

    pub fn entity_type(&self) -> EntityType {
        self.event.entity_type
    }
}
