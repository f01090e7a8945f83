#![forbid(unsafe_code)]

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use engage_contracts::activity::ActivityEvent;
use engage_contracts::view_state::PageKey;

pub const FINDING_TEMPLATES_UPDATED: &str = "custom-findings-updated";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    ActivityAppended(ActivityEvent),
    ActivityCleared,
    /// Locally cached finding templates changed; screens re-read them from cache.
    FindingTemplatesUpdated,
    ViewPreferenceChanged(PageKey),
}

impl Signal {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ActivityAppended(_) => "activity-appended",
            Self::ActivityCleared => "activity-cleared",
            Self::FindingTemplatesUpdated => FINDING_TEMPLATES_UPDATED,
            Self::ViewPreferenceChanged(_) => "view-preference-changed",
        }
    }
}

/// In-process broadcast. Every live subscription receives every signal
/// published after it subscribed.
#[derive(Debug, Clone, Default)]
pub struct SignalBus {
    subscribers: Arc<Mutex<Vec<Sender<Signal>>>>,
}

impl SignalBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> SignalSubscription {
        let (tx, rx) = mpsc::channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        SignalSubscription { rx }
    }

    pub fn publish(&self, signal: Signal) {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| tx.send(signal.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[derive(Debug)]
pub struct SignalSubscription {
    rx: Receiver<Signal>,
}

impl SignalSubscription {
    pub fn try_next(&self) -> Option<Signal> {
        match self.rx.try_recv() {
            Ok(signal) => Some(signal),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    pub fn next_timeout(&self, timeout: Duration) -> Option<Signal> {
        match self.rx.recv_timeout(timeout) {
            Ok(signal) => Some(signal),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Everything queued so far, oldest first.
    pub fn drain(&self) -> Vec<Signal> {
        std::iter::from_fn(|| self.try_next()).collect()
    }
}
