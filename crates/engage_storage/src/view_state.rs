#![forbid(unsafe_code)]

use std::fmt;
use std::sync::Arc;

use engage_contracts::view_state::{PageKey, ViewPreference, ViewPreferencePatch};
use engage_contracts::Validate;
use log::warn;

use crate::local_storage::LocalStorage;
use crate::signals::{Signal, SignalBus};

pub const VIEW_PREFS_KEY_PREFIX: &str = "engage.view_prefs.v1";
pub const DEFAULT_USER_SCOPE: &str = "default";

/// Per-page UI preferences for one user scope.
pub struct ViewStateStore {
    storage: Arc<dyn LocalStorage>,
    user_scope: String,
    bus: SignalBus,
}

impl fmt::Debug for ViewStateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewStateStore")
            .field("user_scope", &self.user_scope)
            .finish()
    }
}

impl ViewStateStore {
    pub fn new(storage: Arc<dyn LocalStorage>, user_scope: impl Into<String>, bus: SignalBus) -> Self {
        let user_scope = user_scope.into();
        let user_scope = if user_scope.trim().is_empty() {
            DEFAULT_USER_SCOPE.to_string()
        } else {
            user_scope.trim().to_string()
        };
        Self {
            storage,
            user_scope,
            bus,
        }
    }

    pub fn storage_key(&self, page: &PageKey) -> String {
        format!("{VIEW_PREFS_KEY_PREFIX}:{}:{}", self.user_scope, page)
    }

    /// Stored preference, or the default when absent or unreadable.
    pub fn get(&self, page: &PageKey) -> ViewPreference {
        let key = self.storage_key(page);
        let raw = match self.storage.get_item(&key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return ViewPreference::default(),
            Err(err) => {
                warn!("view preference {key} unreadable: {err}");
                return ViewPreference::default();
            }
        };
        match serde_json::from_str::<ViewPreference>(&raw) {
            Ok(pref) if pref.validate().is_ok() => pref,
            Ok(_) | Err(_) => {
                warn!("discarding malformed view preference {key}");
                if let Err(err) = self.storage.remove_item(&key) {
                    warn!("view preference {key} not removed: {err}");
                }
                ViewPreference::default()
            }
        }
    }

    /// Merges `patch` onto the current preference and persists the result.
    pub fn set(&self, page: &PageKey, patch: &ViewPreferencePatch) -> ViewPreference {
        let next = self.get(page).merged(patch);
        if let Err(err) = next.validate() {
            warn!("view preference patch for {page} rejected: {err}");
            return self.get(page);
        }
        let key = self.storage_key(page);
        match serde_json::to_string(&next) {
            Ok(raw) => {
                if let Err(err) = self.storage.set_item(&key, &raw) {
                    warn!("view preference {key} not persisted: {err}");
                }
            }
            Err(err) => warn!("view preference {key} not serialized: {err}"),
        }
        self.bus.publish(Signal::ViewPreferenceChanged(page.clone()));
        next
    }
}
