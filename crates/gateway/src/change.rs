//! Realtime change events and subscriptions.
//!
//! The gateway pushes row changes as JSON frames of the shape
//! `{"table": "...", "type": "UPDATE", "record": {...}, "old_record": {...}}`.
//! A [`Subscription`] is a filtered receiver over that feed: it is
//! released explicitly via [`Subscription::unsubscribe`] (idempotent)
//! and implicitly on drop, so teardown happens on every exit path.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Tables exposed on the change feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeTable {
    Houses,
    Profiles,
    PointRequests,
    AllowedEmails,
}

impl ChangeTable {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeTable::Houses => "houses",
            ChangeTable::Profiles => "profiles",
            ChangeTable::PointRequests => "point_requests",
            ChangeTable::AllowedEmails => "allowed_emails",
        }
    }
}

/// The kind of row change, in the gateway's uppercase wire form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// Which change kinds a subscription is interested in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeFilter {
    Any,
    Only(ChangeKind),
}

impl ChangeFilter {
    pub fn matches(&self, kind: ChangeKind) -> bool {
        match self {
            ChangeFilter::Any => true,
            ChangeFilter::Only(k) => *k == kind,
        }
    }
}

/// One row change delivered over the push channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: ChangeTable,
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    /// The row after the change (empty for deletes).
    #[serde(default)]
    pub record: serde_json::Value,
    /// The row before the change, when the gateway sends it.
    #[serde(default)]
    pub old_record: serde_json::Value,
}

/// Parse a raw change-feed frame.
pub fn parse_change(text: &str) -> Result<ChangeEvent, serde_json::Error> {
    serde_json::from_str(text)
}

/// A registered interest in one table's changes.
///
/// Receives every event on the feed and yields only those matching
/// its table and filter. After [`unsubscribe`](Self::unsubscribe) (or
/// drop) the subscription yields nothing; delivery after teardown is
/// a no-op, not a fault.
pub struct Subscription {
    table: ChangeTable,
    filter: ChangeFilter,
    receiver: Option<broadcast::Receiver<ChangeEvent>>,
}

impl Subscription {
    pub(crate) fn new(
        table: ChangeTable,
        filter: ChangeFilter,
        receiver: broadcast::Receiver<ChangeEvent>,
    ) -> Self {
        Self {
            table,
            filter,
            receiver: Some(receiver),
        }
    }

    /// Await the next matching change.
    ///
    /// Returns `None` once the subscription has been released or the
    /// feed has shut down. A lagged receiver skips the dropped events
    /// and keeps going; a burst of changes is tolerable for the scale
    /// this feed carries.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        let receiver = self.receiver.as_mut()?;
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    if event.table == self.table && self.filter.matches(event.kind) {
                        return Some(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        table = self.table.as_str(),
                        skipped,
                        "Realtime subscriber lagged; dropped change events",
                    );
                }
                Err(broadcast::error::RecvError::Closed) => {
                    self.receiver = None;
                    return None;
                }
            }
        }
    }

    /// Release the subscription. Idempotent; also runs on drop.
    pub fn unsubscribe(&mut self) {
        if self.receiver.take().is_some() {
            tracing::debug!(table = self.table.as_str(), "Unsubscribed from change feed");
        }
    }

    /// Whether the subscription is still attached to the feed.
    pub fn is_active(&self) -> bool {
        self.receiver.is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
