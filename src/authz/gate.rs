use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use utoipa::ToSchema;

use super::role::join_roles;
use super::{PermissionChecker, Role, RoleSet, RoleStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AccessDecision {
    Pending,
    Allowed,
    Denied,
}

/// What a gate hands back in place of its protected content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutput<T> {
    Empty,
    /// Neutral loading indicator.
    Loading,
    Children(T),
    Fallback(T),
    DenialNotice(String),
}

impl<T> GateOutput<T> {
    pub fn is_empty(&self) -> bool {
        matches!(self, GateOutput::Empty)
    }

    /// Protected content or fallback, if either was rendered.
    pub fn into_content(self) -> Option<T> {
        match self {
            GateOutput::Children(content) | GateOutput::Fallback(content) => Some(content),
            _ => None,
        }
    }
}

/// Role-based gate.
///
/// Shows a loading indicator until the role store has finished its initial
/// fetch, then re-evaluates `has_any_role(allowed_roles)` on every render.
#[derive(Debug, Clone)]
pub struct RoleGate<T> {
    allowed_roles: Vec<Role>,
    fallback: Option<T>,
    show_error: bool,
}

impl<T: Clone> RoleGate<T> {
    pub fn new(allowed_roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            allowed_roles: allowed_roles.into_iter().collect(),
            fallback: None,
            show_error: true,
        }
    }

    pub fn with_fallback(mut self, fallback: T) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn show_error(mut self, show_error: bool) -> Self {
        self.show_error = show_error;
        self
    }

    pub fn decide(&self, roles: &RoleSet) -> AccessDecision {
        if roles.loading {
            AccessDecision::Pending
        } else if roles.has_any_role(&self.allowed_roles) {
            AccessDecision::Allowed
        } else {
            AccessDecision::Denied
        }
    }

    pub fn render(&self, roles: &RoleSet, children: T) -> GateOutput<T> {
        match self.decide(roles) {
            AccessDecision::Pending => GateOutput::Loading,
            AccessDecision::Allowed => GateOutput::Children(children),
            AccessDecision::Denied => {
                if let Some(fallback) = &self.fallback {
                    GateOutput::Fallback(fallback.clone())
                } else if self.show_error {
                    GateOutput::DenialNotice(self.denial_notice(&roles.roles))
                } else {
                    GateOutput::Empty
                }
            }
        }
    }

    pub fn denial_notice(&self, held: &[Role]) -> String {
        let held = if held.is_empty() {
            "none".to_string()
        } else {
            join_roles(held)
        };
        format!(
            "Access denied. Required roles: {}. Your roles: {}.",
            join_roles(&self.allowed_roles),
            held
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CheckState {
    target: Option<(String, String)>,
    generation: u64,
    decision: AccessDecision,
}

/// Capability-based gate.
///
/// One permission check runs per `(resource, action)` target, after the role
/// store's initial load. Every check captures a generation number; when a
/// check resolves after a newer one was issued, its answer is dropped.
pub struct PermissionGate<T> {
    checker: Arc<PermissionChecker>,
    fallback: Option<T>,
    generation: AtomicU64,
    state: watch::Sender<CheckState>,
}

impl<T: Clone> PermissionGate<T> {
    pub fn new(checker: Arc<PermissionChecker>) -> Self {
        let (state, _) = watch::channel(CheckState {
            target: None,
            generation: 0,
            decision: AccessDecision::Pending,
        });
        Self {
            checker,
            fallback: None,
            generation: AtomicU64::new(0),
            state,
        }
    }

    pub fn with_fallback(mut self, fallback: T) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn decision(&self) -> AccessDecision {
        self.state.borrow().decision
    }

    pub fn target(&self) -> Option<(String, String)> {
        self.state.borrow().target.clone()
    }

    /// Check only if the target differs from the current one; otherwise
    /// return the current decision, which may still be pending.
    pub async fn ensure(&self, store: &RoleStore, resource: &str, action: &str) -> AccessDecision {
        {
            let state = self.state.borrow();
            if let Some((r, a)) = &state.target {
                if r == resource && a == action {
                    return state.decision;
                }
            }
        }
        self.check(store, resource, action).await
    }

    /// Start a check for `(resource, action)`, superseding any in flight.
    ///
    /// Returns the gate's decision once this check has finished; if a newer
    /// check was issued meanwhile, that is whatever the newer check left.
    pub async fn check(&self, store: &RoleStore, resource: &str, action: &str) -> AccessDecision {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.send_replace(CheckState {
            target: Some((resource.to_string(), action.to_string())),
            generation,
            decision: AccessDecision::Pending,
        });

        store.wait_loaded().await;
        if self.is_stale(generation) {
            return self.decision();
        }

        let allowed = self.checker.has_permission(resource, action).await;
        if self.is_stale(generation) {
            tracing::debug!(resource, action, generation, "discarding superseded permission check");
            return self.decision();
        }

        let decision = if allowed {
            AccessDecision::Allowed
        } else {
            AccessDecision::Denied
        };
        self.state.send_modify(|state| {
            if state.generation == generation {
                state.decision = decision;
            }
        });
        self.decision()
    }

    fn is_stale(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) != generation
    }

    /// Nothing while checking; children when allowed; fallback or nothing
    /// when denied.
    pub fn render(&self, children: T) -> GateOutput<T> {
        match self.decision() {
            AccessDecision::Pending => GateOutput::Empty,
            AccessDecision::Allowed => GateOutput::Children(children),
            AccessDecision::Denied => match &self.fallback {
                Some(fallback) => GateOutput::Fallback(fallback.clone()),
                None => GateOutput::Empty,
            },
        }
    }
}
