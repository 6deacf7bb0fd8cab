//! ChangeNotifier - "views changed, re-resolve" signaling
//!
//! Two channels carry the same signal:
//!
//! - an in-process `tokio::sync::broadcast` channel for consumers in this context
//! - a durable stamp in `LocalStore` that other contexts (browser tabs) poll
//!
//! Stamps are ULIDs: unique and time-sortable. A change seen through both
//! channels carries the same stamp, so subscribers drop the second copy.
//! The stamp only says *that* something changed; consumers always re-fetch.
//!
//! # Example
//!
//! ```rust,ignore
//! let notifier = ChangeNotifier::new(storage.clone());
//! let _watcher = notifier.spawn_flag_watcher(Duration::from_secs(2));
//! let _handle = notifier.on_changed(|change| {
//!     tracing::info!(kind = %change.kind, "views changed");
//! });
//! notifier.publish(ChangeKind::Updated, Some(ViewId::Durable(4)));
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use view_types::ViewId;

use crate::storage::{LocalStore, VIEWS_CHANGED_KEY};

const CHANNEL_CAPACITY: usize = 256;

/// What happened
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
    /// A draft id was replaced by a durable id
    Promoted { from: ViewId },
    EditorClosed,
    /// Another context wrote the durable stamp
    External,
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeKind::Created => write!(f, "created"),
            ChangeKind::Updated => write!(f, "updated"),
            ChangeKind::Deleted => write!(f, "deleted"),
            ChangeKind::Promoted { from } => write!(f, "promoted:{from}"),
            ChangeKind::EditorClosed => write!(f, "editor_closed"),
            ChangeKind::External => write!(f, "external"),
        }
    }
}

/// A change notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewChange {
    /// Value written to the durable flag
    pub stamp: String,
    pub kind: ChangeKind,
    pub view_id: Option<ViewId>,
    pub timestamp: DateTime<Utc>,
}

impl ViewChange {
    pub fn is_external(&self) -> bool {
        self.kind == ChangeKind::External
    }
}

/// Publishes view changes in-process and to the durable flag
pub struct ChangeNotifier {
    sender: broadcast::Sender<ViewChange>,
    storage: Arc<dyn LocalStore>,
    /// Last flag value this context wrote or observed
    last_flag: Mutex<Option<String>>,
}

impl ChangeNotifier {
    pub fn new(storage: Arc<dyn LocalStore>) -> Arc<Self> {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        // whatever is already in storage predates this context
        let last_flag = storage.get_item(VIEWS_CHANGED_KEY);
        Arc::new(Self {
            sender,
            storage,
            last_flag: Mutex::new(last_flag),
        })
    }

    pub fn storage(&self) -> Arc<dyn LocalStore> {
        Arc::clone(&self.storage)
    }

    /// Record a change: write the durable stamp, then notify local subscribers
    pub fn publish(&self, kind: ChangeKind, view_id: Option<ViewId>) -> ViewChange {
        let change = ViewChange {
            stamp: ulid::Ulid::new().to_string(),
            kind,
            view_id,
            timestamp: Utc::now(),
        };
        let missed = {
            let mut last = self.last_flag.lock().unwrap_or_else(|p| p.into_inner());
            // another context may have written since our last poll
            let missed = self
                .storage
                .get_item(VIEWS_CHANGED_KEY)
                .filter(|flag| last.as_deref() != Some(flag.as_str()));
            self.storage.set_item(VIEWS_CHANGED_KEY, &change.stamp);
            *last = Some(change.stamp.clone());
            missed
        };
        if let Some(stamp) = missed {
            self.broadcast_external(stamp);
        }

        tracing::debug!(
            stamp = %change.stamp,
            kind = %change.kind,
            view_id = ?change.view_id.as_ref().map(ToString::to_string),
            "Publishing view change"
        );
        // no receivers is fine
        let _ = self.sender.send(change.clone());
        change
    }

    /// Check the durable flag for a change written by another context
    pub fn poll_external(&self) -> Option<ViewChange> {
        let flag = self.storage.get_item(VIEWS_CHANGED_KEY)?;
        {
            let mut last = self.last_flag.lock().unwrap_or_else(|p| p.into_inner());
            if last.as_deref() == Some(flag.as_str()) {
                return None;
            }
            *last = Some(flag.clone());
        }
        Some(self.broadcast_external(flag))
    }

    fn broadcast_external(&self, stamp: String) -> ViewChange {
        let change = ViewChange {
            stamp,
            kind: ChangeKind::External,
            view_id: None,
            timestamp: Utc::now(),
        };
        tracing::debug!(stamp = %change.stamp, "Observed external view change");
        let _ = self.sender.send(change.clone());
        change
    }

    pub fn subscribe(&self) -> ChangeSubscription {
        ChangeSubscription {
            receiver: self.sender.subscribe(),
            last_seen: None,
        }
    }

    /// Invoke `callback` once per distinct change until the notifier is dropped
    pub fn on_changed<F>(&self, mut callback: F) -> JoinHandle<()>
    where
        F: FnMut(ViewChange) + Send + 'static,
    {
        let mut subscription = self.subscribe();
        tokio::spawn(async move {
            while let Some(change) = subscription.recv().await {
                callback(change);
            }
        })
    }

    /// Poll the durable flag every `interval`
    pub fn spawn_flag_watcher(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let notifier = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let Some(notifier) = notifier.upgrade() else {
                    break;
                };
                notifier.poll_external();
            }
        })
    }
}

/// Receiving end of the notifier, deduplicated by stamp
pub struct ChangeSubscription {
    receiver: broadcast::Receiver<ViewChange>,
    last_seen: Option<String>,
}

impl ChangeSubscription {
    /// Wait for the next distinct change; `None` once the notifier is gone
    pub async fn recv(&mut self) -> Option<ViewChange> {
        loop {
            match self.receiver.recv().await {
                Ok(change) => {
                    if self.accept(&change) {
                        return Some(change);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Change subscriber lagged; continuing");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Next distinct change already queued, without waiting
    pub fn try_recv(&mut self) -> Option<ViewChange> {
        loop {
            match self.receiver.try_recv() {
                Ok(change) => {
                    if self.accept(&change) {
                        return Some(change);
                    }
                }
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Change subscriber lagged; continuing");
                }
                Err(_) => return None,
            }
        }
    }

    /// Every distinct change already queued
    pub fn drain(&mut self) -> Vec<ViewChange> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    pub fn last_seen(&self) -> Option<&str> {
        self.last_seen.as_deref()
    }

    fn accept(&mut self, change: &ViewChange) -> bool {
        if self.last_seen.as_deref() == Some(change.stamp.as_str()) {
            tracing::debug!(stamp = %change.stamp, "Skipping duplicate view change");
            return false;
        }
        self.last_seen = Some(change.stamp.clone());
        true
    }
}
