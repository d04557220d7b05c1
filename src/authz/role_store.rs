use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{AuthProvider, Role, RoleRepository};
use crate::events::RoleChange;

/// Snapshot of the principal's roles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct RoleSet {
    pub roles: Vec<Role>,
    pub loading: bool,
}

impl RoleSet {
    pub fn loading() -> Self {
        Self {
            roles: Vec::new(),
            loading: true,
        }
    }

    pub fn loaded(roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            roles: roles.into_iter().collect(),
            loading: false,
        }
    }

    /// `false` while loading since the set is empty then.
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        roles.iter().any(|role| self.has_role(*role))
    }
}

struct Inner {
    auth: Arc<dyn AuthProvider>,
    repo: Arc<dyn RoleRepository>,
    state: watch::Sender<RoleSet>,
    principal: watch::Sender<Option<Uuid>>,
    fetch_seq: AtomicU64,
}

impl Inner {
    fn new(auth: Arc<dyn AuthProvider>, repo: Arc<dyn RoleRepository>) -> Self {
        let (state, _) = watch::channel(RoleSet::loading());
        let (principal, _) = watch::channel(None);
        Self {
            auth,
            repo,
            state,
            principal,
            fetch_seq: AtomicU64::new(0),
        }
    }

    /// Replaces the role set wholesale. Never fails: errors leave an empty,
    /// loaded set behind. A fetch overtaken by a newer one is not applied.
    async fn fetch_roles(&self) -> RoleSet {
        let seq = self.fetch_seq.fetch_add(1, Ordering::SeqCst) + 1;

        let principal = self.auth.current_principal().await;
        let roles = match principal {
            None => Vec::new(),
            Some(user_id) => match self.repo.fetch_roles(user_id).await {
                Ok(values) => parse_roles(user_id, values),
                Err(err) => {
                    tracing::error!(user_id = %user_id, error = %err, "failed to fetch roles");
                    Vec::new()
                }
            },
        };
        let next = RoleSet::loaded(roles);

        if self.fetch_seq.load(Ordering::SeqCst) == seq {
            self.principal.send_replace(principal);
            self.state.send_replace(next.clone());
        } else {
            tracing::debug!(principal = ?principal, "discarding superseded role fetch");
        }
        next
    }

    fn clear(&self) {
        self.fetch_seq.fetch_add(1, Ordering::SeqCst);
        self.principal.send_replace(None);
        self.state.send_replace(RoleSet::loaded([]));
    }
}

fn parse_roles(user_id: Uuid, values: Vec<String>) -> Vec<Role> {
    let mut roles = Vec::with_capacity(values.len());
    for value in values {
        match value.parse::<Role>() {
            Ok(role) if !roles.contains(&role) => roles.push(role),
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(user_id = %user_id, error = %err, "dropping role outside the known set");
            }
        }
    }
    roles
}

/// Role set of the current principal.
///
/// Built with [`RoleStore::spawn`], the store starts loading immediately and
/// refetches on every relevant `user_roles` change until it is dropped or
/// [`shut down`](RoleStore::shutdown). [`RoleStore::load`] fetches once and
/// never subscribes, which suits per-request use.
pub struct RoleStore {
    inner: Arc<Inner>,
    listener: Option<JoinHandle<()>>,
}

impl RoleStore {
    /// Must be called inside a tokio runtime.
    pub fn spawn(auth: Arc<dyn AuthProvider>, repo: Arc<dyn RoleRepository>) -> Self {
        let inner = Arc::new(Inner::new(auth, repo));
        // subscribe before the first fetch so no change is missed in between
        let rx = inner.repo.subscribe();
        let listener = tokio::spawn(listen(Arc::clone(&inner), rx));
        Self {
            inner,
            listener: Some(listener),
        }
    }

    pub async fn load(auth: Arc<dyn AuthProvider>, repo: Arc<dyn RoleRepository>) -> Self {
        let inner = Arc::new(Inner::new(auth, repo));
        inner.fetch_roles().await;
        Self { inner, listener: None }
    }

    pub async fn fetch_roles(&self) -> RoleSet {
        self.inner.fetch_roles().await
    }

    /// Re-resolve the principal and refetch, e.g. after a sign-in.
    pub async fn refresh(&self) -> RoleSet {
        self.fetch_roles().await
    }

    /// Drop all roles without asking the store.
    pub fn sign_out(&self) {
        tracing::debug!("role set cleared on sign-out");
        self.inner.clear();
    }

    /// Release the change subscription. The last snapshot stays readable.
    pub fn shutdown(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.listener.as_ref().map(|l| !l.is_finished()).unwrap_or(false)
    }

    pub fn snapshot(&self) -> RoleSet {
        self.inner.state.borrow().clone()
    }

    pub fn roles(&self) -> Vec<Role> {
        self.inner.state.borrow().roles.clone()
    }

    pub fn loading(&self) -> bool {
        self.inner.state.borrow().loading
    }

    pub fn principal(&self) -> Option<Uuid> {
        *self.inner.principal.borrow()
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.inner.state.borrow().has_role(role)
    }

    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        self.inner.state.borrow().has_any_role(roles)
    }

    /// Receiver that observes every replacement of the role set.
    pub fn watch(&self) -> watch::Receiver<RoleSet> {
        self.inner.state.subscribe()
    }

    /// Resolves once the initial fetch has completed.
    pub async fn wait_loaded(&self) {
        let mut rx = self.watch();
        // the sender lives in `inner`, which we hold, so this cannot close
        let _ = rx.wait_for(|set| !set.loading).await;
    }
}

impl Drop for RoleStore {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn listen(inner: Arc<Inner>, mut rx: broadcast::Receiver<RoleChange>) {
    inner.fetch_roles().await;

    loop {
        match rx.recv().await {
            Ok(change) => {
                // a principal switch since the last fetch always refetches
                let current = inner.auth.current_principal().await;
                let resolved = *inner.principal.borrow();
                if current == resolved && !change.concerns(current) {
                    tracing::trace!(principal_id = ?change.principal_id, "ignoring role change for another principal");
                    continue;
                }
                inner.fetch_roles().await;
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "role change feed lagged, refetching");
                inner.fetch_roles().await;
            }
            Err(RecvError::Closed) => {
                tracing::debug!("role change feed closed");
                break;
            }
        }
    }
}
