#![forbid(unsafe_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::debug;

/// Owned by a screen for as long as it is shown. Dropping it unmounts.
#[derive(Debug)]
pub struct MountGuard {
    screen: String,
    mounted: Arc<AtomicBool>,
}

/// Carried by work started on behalf of a screen.
#[derive(Debug, Clone)]
pub struct MountToken {
    screen: String,
    mounted: Arc<AtomicBool>,
}

impl MountGuard {
    pub fn mount(screen: impl Into<String>) -> Self {
        Self {
            screen: screen.into(),
            mounted: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn token(&self) -> MountToken {
        MountToken {
            screen: self.screen.clone(),
            mounted: Arc::clone(&self.mounted),
        }
    }

    pub fn unmount(&self) {
        self.mounted.store(false, Ordering::Release);
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::Acquire)
    }
}

impl Drop for MountGuard {
    fn drop(&mut self) {
        self.unmount();
    }
}

impl MountToken {
    pub fn screen(&self) -> &str {
        &self.screen
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::Acquire)
    }

    /// `Some(value)` while the screen is still mounted; the value is dropped
    /// otherwise.
    pub fn deliver<T>(&self, value: T) -> Option<T> {
        if self.is_mounted() {
            Some(value)
        } else {
            debug!("discarding result for unmounted screen={}", self.screen);
            None
        }
    }
}
