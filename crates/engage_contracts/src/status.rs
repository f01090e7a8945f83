#![forbid(unsafe_code)]

//! Entity status and finding severity vocabularies.
//!
//! Every parser is total: an absent value maps to the type's canonical default
//! and an unrecognized value is preserved as `Other` so it can still be shown.

use serde::{Deserialize, Serialize};

use crate::common::canonical_token;

macro_rules! status_enum {
    (
        $(#[$meta:meta])*
        $name:ident, default = $default:ident, {
            $($variant:ident => $wire:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(from = "String", into = "String")]
        pub enum $name {
            $($variant,)+
            Other(String),
        }

        impl $name {
            /// Total mapping: `None` or blank input yields the canonical default.
            pub fn parse(raw: Option<&str>) -> Self {
                let Some(raw) = raw.filter(|v| !v.trim().is_empty()) else {
                    return Self::$default;
                };
                match canonical_token(raw).as_str() {
                    $($wire => Self::$variant,)+
                    _ => Self::Other(raw.trim().to_string()),
                }
            }

            pub fn as_str(&self) -> &str {
                match self {
                    $(Self::$variant => $wire,)+
                    Self::Other(raw) => raw.as_str(),
                }
            }

            pub fn is_recognized(&self) -> bool {
                !matches!(self, Self::Other(_))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::$default
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::parse(Some(&value))
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.as_str().to_string()
            }
        }
    };
}

status_enum!(
    /// Client lifecycle; new clients start as prospects.
    ClientStatus, default = Prospect, {
        Prospect => "PROSPECT",
        Active => "ACTIVE",
        Inactive => "INACTIVE",
        Archived => "ARCHIVED",
    }
);

status_enum!(
    ProjectStatus, default = Planning, {
        Planning => "PLANNING",
        InProgress => "IN_PROGRESS",
        Review => "REVIEW",
        Completed => "COMPLETED",
        OnHold => "ON_HOLD",
        Cancelled => "CANCELLED",
    }
);

status_enum!(
    ReportStatus, default = Draft, {
        Draft => "DRAFT",
        Generating => "GENERATING",
        Completed => "COMPLETED",
        Failed => "FAILED",
    }
);

status_enum!(
    FindingStatus, default = Open, {
        Open => "OPEN",
        InProgress => "IN_PROGRESS",
        Resolved => "RESOLVED",
        Closed => "CLOSED",
        AcceptedRisk => "ACCEPTED_RISK",
    }
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Informational,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "Critical",
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
            Self::Informational => "Informational",
        }
    }
}

/// A finding's severity as reported by the source, classified against the
/// fixed severity vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SeverityLabel {
    Known(Severity),
    Unrecognized(String),
}

impl SeverityLabel {
    /// Absent or blank severity is `None`; it is excluded from severity buckets.
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        let raw = raw?.trim();
        if raw.is_empty() {
            return None;
        }
        let known = match raw.to_ascii_lowercase().as_str() {
            "critical" => Some(Severity::Critical),
            "high" => Some(Severity::High),
            "medium" => Some(Severity::Medium),
            "low" => Some(Severity::Low),
            "informational" | "info" => Some(Severity::Informational),
            _ => None,
        };
        Some(match known {
            Some(severity) => Self::Known(severity),
            None => Self::Unrecognized(raw.to_string()),
        })
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Known(severity) => severity.as_str(),
            Self::Unrecognized(raw) => raw.as_str(),
        }
    }

    pub fn known(&self) -> Option<Severity> {
        match self {
            Self::Known(severity) => Some(*severity),
            Self::Unrecognized(_) => None,
        }
    }
}

impl From<String> for SeverityLabel {
    fn from(value: String) -> Self {
        Self::parse(Some(&value)).unwrap_or(Self::Unrecognized(value))
    }
}

impl From<SeverityLabel> for String {
    fn from(value: SeverityLabel) -> Self {
        value.as_str().to_string()
    }
}
