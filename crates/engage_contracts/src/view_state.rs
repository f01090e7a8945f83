#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::common::validate_text;
use crate::{ContractViolation, Validate};

pub const PAGE_KEY_MAX_LEN: usize = 64;
pub const SORT_COLUMN_MAX_LEN: usize = 64;
pub const MAX_FILTERS: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PageKey(String);

impl PageKey {
    pub fn new(key: impl Into<String>) -> Result<Self, ContractViolation> {
        let key = key.into();
        validate_text("page_key", &key, PAGE_KEY_MAX_LEN)?;
        if !key
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_' || b == b'-')
        {
            return Err(ContractViolation::InvalidValue {
                field: "page_key",
                reason: "must be lowercase [a-z0-9_-]",
            });
        }
        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PageKey {
    type Error = ContractViolation;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PageKey> for String {
    fn from(value: PageKey) -> Self {
        value.0
    }
}

impl fmt::Display for PageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    Card,
    #[default]
    Table,
    List,
}

impl ViewMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "card" | "cards" => Some(Self::Card),
            "table" => Some(Self::Table),
            "list" => Some(Self::List),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Card => "card",
            Self::Table => "table",
            Self::List => "list",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Some(Self::Asc),
            "desc" | "descending" => Some(Self::Desc),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortPreference {
    pub column: String,
    pub direction: SortDirection,
}

impl SortPreference {
    pub fn v1(column: impl Into<String>, direction: SortDirection) -> Result<Self, ContractViolation> {
        let sort = Self {
            column: column.into(),
            direction,
        };
        sort.validate()?;
        Ok(sort)
    }
}

impl Validate for SortPreference {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_text("sort.column", &self.column, SORT_COLUMN_MAX_LEN)
    }
}

/// Per-page UI choice. The default is what a first-time visitor sees.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewPreference {
    #[serde(default)]
    pub view_mode: ViewMode,
    #[serde(default)]
    pub sort: Option<SortPreference>,
    #[serde(default)]
    pub filters: BTreeMap<String, String>,
}

impl ViewPreference {
    pub fn merged(&self, patch: &ViewPreferencePatch) -> Self {
        let mut next = self.clone();
        if let Some(mode) = patch.view_mode {
            next.view_mode = mode;
        }
        if patch.clear_sort {
            next.sort = None;
        }
        if let Some(sort) = &patch.sort {
            next.sort = Some(sort.clone());
        }
        if let Some(filters) = &patch.filters {
            next.filters = filters.clone();
        }
        next
    }
}

impl Validate for ViewPreference {
    fn validate(&self) -> Result<(), ContractViolation> {
        if let Some(sort) = &self.sort {
            sort.validate()?;
        }
        if self.filters.len() > MAX_FILTERS {
            return Err(ContractViolation::InvalidValue {
                field: "view_preference.filters",
                reason: "too many filters",
            });
        }
        if self.filters.keys().any(|k| k.trim().is_empty()) {
            return Err(ContractViolation::InvalidValue {
                field: "view_preference.filters",
                reason: "filter name must not be empty",
            });
        }
        Ok(())
    }
}

/// Partial update applied by `ViewStateStore::set`. Absent fields keep their
/// stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewPreferencePatch {
    pub view_mode: Option<ViewMode>,
    pub sort: Option<SortPreference>,
    pub clear_sort: bool,
    pub filters: Option<BTreeMap<String, String>>,
}
