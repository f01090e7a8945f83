#![forbid(unsafe_code)]

use engage_contracts::activity::{EntityAction, EntityType, EventMetadata, FindingMetadata};
use engage_contracts::status::SeverityLabel;
use engage_contracts::view_state::{
    PageKey, SortDirection, SortPreference, ViewMode, ViewPreferencePatch,
};
use engage_os::activity_feed::{AggregatedFeed, FeedScope};
use engage_os::context::EngagementContext;
use engage_storage::event_store::AppendOutcome;

pub const USAGE: &str = "usage: engage <command>
  dashboard
  activity [--project <id>] [--limit <n>]
  record <type> <action> <entity_id> <title> [description] [--project <id>] [--severity <label>]
  prefs get <page>
  prefs set <page> [view=<card|table|list>] [sort=<column>:<asc|desc>|sort=none] [filter.<name>=<value>...]
  clear-log";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Dashboard,
    Activity {
        project: Option<String>,
        limit: Option<usize>,
    },
    Record {
        entity_type: EntityType,
        action: EntityAction,
        entity_id: String,
        title: String,
        description: String,
        /// Finding records only; tags the event so `activity --project` shows it.
        project: Option<String>,
        severity: Option<String>,
    },
    PrefsGet {
        page: PageKey,
    },
    PrefsSet {
        page: PageKey,
        patch: ViewPreferencePatch,
        /// Merged into the stored filters rather than replacing them.
        filters: Vec<(String, String)>,
    },
    ClearLog,
}

impl Command {
    /// Commands that read the REST API and so want a token.
    pub fn needs_api(&self) -> bool {
        matches!(self, Self::Dashboard | Self::Activity { .. })
    }
}

pub fn parse_command(args: &[String]) -> Result<Command, String> {
    let (head, rest) = args.split_first().ok_or_else(|| USAGE.to_string())?;
    match head.as_str() {
        "dashboard" => {
            if !rest.is_empty() {
                return Err("usage: engage dashboard".to_string());
            }
            Ok(Command::Dashboard)
        }
        "activity" => parse_activity(rest),
        "record" => parse_record(rest),
        "prefs" => parse_prefs(rest),
        "clear-log" => Ok(Command::ClearLog),
        other => Err(format!("unknown command: {other}\n{USAGE}")),
    }
}

fn parse_activity(rest: &[String]) -> Result<Command, String> {
    let mut project = None;
    let mut limit = None;
    let mut iter = rest.iter();
    while let Some(flag) = iter.next() {
        let value = iter
            .next()
            .ok_or_else(|| format!("missing value for {flag}"))?;
        match flag.as_str() {
            "--project" => project = Some(value.trim().to_string()),
            "--limit" => {
                let n = value
                    .parse::<usize>()
                    .map_err(|_| format!("invalid --limit: {value}"))?;
                if n == 0 {
                    return Err("--limit must be at least 1".to_string());
                }
                limit = Some(n);
            }
            other => return Err(format!("unknown activity flag: {other}")),
        }
    }
    Ok(Command::Activity { project, limit })
}

fn parse_record(rest: &[String]) -> Result<Command, String> {
    const RECORD_USAGE: &str = "usage: engage record <type> <action> <entity_id> <title> [description] [--project <id>] [--severity <label>]";
    let mut positional: Vec<&String> = Vec::new();
    let mut project = None;
    let mut severity = None;
    let mut iter = rest.iter();
    while let Some(arg) = iter.next() {
        let slot = match arg.as_str() {
            "--project" => &mut project,
            "--severity" => &mut severity,
            flag if flag.starts_with("--") => return Err(format!("unknown record flag: {flag}")),
            _ => {
                positional.push(arg);
                continue;
            }
        };
        let value = iter
            .next()
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| format!("missing value for {arg}"))?;
        *slot = Some(value.to_string());
    }
    if positional.len() < 4 || positional.len() > 5 {
        return Err(RECORD_USAGE.to_string());
    }
    let entity_type = EntityType::parse(positional[0]).ok_or_else(|| {
        let allowed: Vec<&str> = EntityType::ALL.iter().map(|t| t.as_str()).collect();
        format!("unknown entity type '{}'. allowed: {}", positional[0], allowed.join(", "))
    })?;
    let action = EntityAction::parse(positional[1]).ok_or_else(|| {
        let allowed: Vec<&str> = EntityAction::ALL.iter().map(|a| a.as_str()).collect();
        format!("unknown action '{}'. allowed: {}", positional[1], allowed.join(", "))
    })?;
    if !entity_type.allows(action) {
        return Err(format!(
            "action '{}' does not apply to {}",
            action.as_str(),
            entity_type.as_str()
        ));
    }
    if entity_type != EntityType::Finding && (project.is_some() || severity.is_some()) {
        return Err("--project and --severity apply to finding records only".to_string());
    }
    Ok(Command::Record {
        entity_type,
        action,
        entity_id: positional[2].clone(),
        title: positional[3].clone(),
        description: positional.get(4).map(|d| d.to_string()).unwrap_or_default(),
        project,
        severity,
    })
}

fn record_metadata(
    entity_type: EntityType,
    project: Option<&str>,
    severity: Option<&str>,
) -> EventMetadata {
    match entity_type {
        EntityType::Finding => EventMetadata::Finding(FindingMetadata {
            severity: SeverityLabel::parse(severity),
            project_id: project.map(str::to_string),
            ..FindingMetadata::default()
        }),
        other => EventMetadata::empty_for(other),
    }
}

fn parse_page(raw: Option<&String>) -> Result<PageKey, String> {
    let raw = raw.ok_or_else(|| "missing page key".to_string())?;
    PageKey::new(raw.as_str()).map_err(|e| format!("invalid page key '{raw}': {e}"))
}

fn parse_prefs(rest: &[String]) -> Result<Command, String> {
    match rest.first().map(String::as_str) {
        Some("get") => {
            if rest.len() != 2 {
                return Err("usage: engage prefs get <page>".to_string());
            }
            Ok(Command::PrefsGet {
                page: parse_page(rest.get(1))?,
            })
        }
        Some("set") => {
            let page = parse_page(rest.get(1))?;
            let mut patch = ViewPreferencePatch::default();
            let mut filters = Vec::new();
            for assignment in rest.iter().skip(2) {
                let (name, value) = assignment
                    .split_once('=')
                    .ok_or_else(|| format!("expected name=value, got '{assignment}'"))?;
                match name {
                    "view" => {
                        patch.view_mode = Some(
                            ViewMode::parse(value)
                                .ok_or_else(|| format!("unknown view mode '{value}'"))?,
                        );
                    }
                    "sort" if value == "none" => {
                        patch.clear_sort = true;
                        patch.sort = None;
                    }
                    "sort" => patch.sort = Some(parse_sort(value)?),
                    _ => match name.strip_prefix("filter.") {
                        Some(filter) if !filter.trim().is_empty() => {
                            filters.push((filter.trim().to_string(), value.to_string()));
                        }
                        _ => return Err(format!("unknown preference '{name}'")),
                    },
                }
            }
            Ok(Command::PrefsSet {
                page,
                patch,
                filters,
            })
        }
        _ => Err("usage: engage prefs <get|set> <page> ...".to_string()),
    }
}

fn parse_sort(raw: &str) -> Result<SortPreference, String> {
    let (column, direction) = raw.rsplit_once(':').unwrap_or((raw, "asc"));
    let direction = SortDirection::parse(direction)
        .ok_or_else(|| format!("unknown sort direction '{direction}'"))?;
    SortPreference::v1(column.trim(), direction).map_err(|e| format!("invalid sort: {e}"))
}

pub fn execute_command(ctx: &EngagementContext, command: &Command) -> Result<String, String> {
    match command {
        Command::Dashboard => {
            let dashboard = ctx.dashboard();
            serde_json::to_string_pretty(&dashboard.view())
                .map_err(|e| format!("failed to render dashboard: {e}"))
        }
        Command::Activity { project, limit } => {
            let scope = match project {
                Some(id) if !id.is_empty() => FeedScope::Project(id.clone()),
                _ => FeedScope::Global,
            };
            let limit = limit.unwrap_or(ctx.config().feed.dashboard_limit);
            Ok(render_feed(&ctx.activity_feed(&scope, Some(limit))))
        }
        Command::Record {
            entity_type,
            action,
            entity_id,
            title,
            description,
            project,
            severity,
        } => {
            let outcome = ctx
                .record_action(
                    *entity_type,
                    *action,
                    entity_id,
                    title,
                    description,
                    record_metadata(*entity_type, project.as_deref(), severity.as_deref()),
                )
                .map_err(|e| format!("failed to record action: {e}"))?;
            Ok(match outcome {
                AppendOutcome::Appended if ctx.event_store().is_durable() => "OK",
                AppendOutcome::Appended => "OK (not persisted)",
                AppendOutcome::Duplicate => "DUPLICATE",
                AppendOutcome::Rejected => "REJECTED",
            }
            .to_string())
        }
        Command::PrefsGet { page } => {
            let preference = ctx.view_state().get(page);
            serde_json::to_string_pretty(&preference)
                .map_err(|e| format!("failed to render preference: {e}"))
        }
        Command::PrefsSet {
            page,
            patch,
            filters,
        } => {
            let mut patch = patch.clone();
            if !filters.is_empty() {
                let mut merged = ctx.view_state().get(page).filters;
                merged.extend(filters.iter().cloned());
                patch.filters = Some(merged);
            }
            let preference = ctx.view_state().set(page, &patch);
            serde_json::to_string_pretty(&preference)
                .map_err(|e| format!("failed to render preference: {e}"))
        }
        Command::ClearLog => {
            ctx.event_store().clear();
            Ok("OK".to_string())
        }
    }
}

fn render_feed(feed: &AggregatedFeed) -> String {
    feed.items
        .iter()
        .zip(feed.relative_labels())
        .map(|(item, when)| {
            let event = &item.event;
            let action = event.action.map(|a| a.as_str()).unwrap_or("-");
            format!(
                "{when}\t{}\t{action}\t{}\t{}",
                event.entity_type.as_str(),
                event.title,
                event.description
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
