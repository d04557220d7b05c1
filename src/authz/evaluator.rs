use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use uuid::Uuid;

use super::{AuthProvider, RoleRepository};

type MemoKey = (Uuid, String, String);

/// Answers "may the current principal perform `action` on `resource`?".
///
/// Each call goes back to the grant table, so policy edits are visible on the
/// next check. With a non-zero memo window, positive and negative answers are
/// reused for at most that long; failures are never memoized.
pub struct PermissionChecker {
    auth: Arc<dyn AuthProvider>,
    repo: Arc<dyn RoleRepository>,
    memo_window: Duration,
    memo: Mutex<HashMap<MemoKey, (Instant, bool)>>,
}

impl PermissionChecker {
    pub fn new(auth: Arc<dyn AuthProvider>, repo: Arc<dyn RoleRepository>) -> Self {
        Self {
            auth,
            repo,
            memo_window: Duration::ZERO,
            memo: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_memo_window(mut self, window: Duration) -> Self {
        self.memo_window = window;
        self
    }

    pub async fn has_permission(&self, resource: &str, action: &str) -> bool {
        let Some(user_id) = self.auth.current_principal().await else {
            tracing::debug!(resource, action, "no principal, permission denied");
            return false;
        };

        let key = (user_id, resource.to_string(), action.to_string());
        if let Some(allowed) = self.memoized(&key).await {
            return allowed;
        }

        match self.repo.has_grant(user_id, resource, action).await {
            Ok(allowed) => {
                tracing::debug!(user_id = %user_id, resource, action, allowed, "permission checked");
                if !self.memo_window.is_zero() {
                    let mut memo = self.memo.lock().await;
                    memo.retain(|_, (at, _)| at.elapsed() < self.memo_window);
                    memo.insert(key, (Instant::now(), allowed));
                }
                allowed
            }
            Err(err) => {
                tracing::error!(
                    user_id = %user_id,
                    resource,
                    action,
                    error = %err,
                    "permission check failed, denying"
                );
                false
            }
        }
    }

    async fn memoized(&self, key: &MemoKey) -> Option<bool> {
        if self.memo_window.is_zero() {
            return None;
        }

        let mut memo = self.memo.lock().await;
        match memo.get(key) {
            Some((at, allowed)) if at.elapsed() < self.memo_window => Some(*allowed),
            Some(_) => {
                memo.remove(key);
                None
            }
            None => None,
        }
    }
}
