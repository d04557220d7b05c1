//! In-process change feed for the access-control relations.
//!
//! Every mutation of `user_roles` publishes a [`RoleChange`] after it has been
//! committed. Subscribers only use it as a "something changed" signal and
//! refetch wholesale; the payload is informational.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

const FEED_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleChange {
    pub id: Uuid,
    pub kind: ChangeKind,
    /// Affected principal, when the writer knows it. `None` means any
    /// principal may be affected.
    pub principal_id: Option<Uuid>,
    pub occurred_at: DateTime<Utc>,
}

impl RoleChange {
    pub fn new(kind: ChangeKind, principal_id: Option<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            principal_id,
            occurred_at: Utc::now(),
        }
    }

    /// Whether a subscriber watching `principal` must refetch.
    pub fn concerns(&self, principal: Option<Uuid>) -> bool {
        match (self.principal_id, principal) {
            (Some(changed), Some(watched)) => changed == watched,
            _ => true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<RoleChange>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(FEED_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RoleChange> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Fire and forget; having no subscribers is not an error.
    pub fn publish(&self, change: RoleChange) {
        tracing::debug!(
            kind = ?change.kind,
            principal_id = ?change.principal_id,
            subscribers = self.sender.receiver_count(),
            "user_roles changed"
        );
        let _ = self.sender.send(change);
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unscoped_change_concerns_everyone() {
        let change = RoleChange::new(ChangeKind::Update, None);
        assert!(change.concerns(Some(Uuid::new_v4())));
        assert!(change.concerns(None));
    }

    #[test]
    fn scoped_change_only_concerns_its_principal() {
        let user_id = Uuid::new_v4();
        let change = RoleChange::new(ChangeKind::Insert, Some(user_id));
        assert!(change.concerns(Some(user_id)));
        assert!(!change.concerns(Some(Uuid::new_v4())));
        // nobody resolved yet: refetch to find out
        assert!(change.concerns(None));
    }

    #[tokio::test]
    async fn subscribers_receive_published_changes() {
        let feed = ChangeFeed::new();
        let mut rx = feed.subscribe();
        let user_id = Uuid::new_v4();
        feed.publish(RoleChange::new(ChangeKind::Delete, Some(user_id)));

        let change = rx.recv().await.unwrap();
        assert_eq!(change.kind, ChangeKind::Delete);
        assert_eq!(change.principal_id, Some(user_id));
    }

    #[test]
    fn publish_without_subscribers_is_silent() {
        ChangeFeed::new().publish(RoleChange::new(ChangeKind::Insert, None));
    }
}
