//! Route guards: the role and permission gates applied to axum route trees.
//!
//! Both guards authenticate the caller first (401 without a valid token),
//! then evaluate the gate. What happens on denial depends on [`AuthzMode`].

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use super::{AccessDecision, AuthzMode, Role, RoleGate};
use crate::app::AppState;
use crate::errors::AppError;
use crate::jwt::AuthUser;

#[derive(Clone)]
pub struct RoleGuard {
    state: AppState,
    gate: Arc<RoleGate<()>>,
}

impl RoleGuard {
    pub fn new(state: AppState, allowed_roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            state,
            gate: Arc::new(RoleGate::new(allowed_roles)),
        }
    }
}

#[derive(Clone)]
pub struct PermissionGuard {
    state: AppState,
    resource: &'static str,
    action: &'static str,
}

impl PermissionGuard {
    pub fn new(state: AppState, resource: &'static str, action: &'static str) -> Self {
        Self {
            state,
            resource,
            action,
        }
    }
}

pub async fn require_roles(
    State(guard): State<RoleGuard>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth = AuthUser::from_headers(request.headers(), &guard.state.jwt)?;
    let store = guard.state.role_store(&auth).await;
    let roles = store.snapshot();
    let decision = guard.gate.decide(&roles);

    enforce(guard.state.authz_mode, decision, &auth, request.uri().path(), || {
        guard.gate.denial_notice(&roles.roles)
    })?;

    Ok(next.run(request).await)
}

pub async fn require_permission(
    State(guard): State<PermissionGuard>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth = AuthUser::from_headers(request.headers(), &guard.state.jwt)?;
    let checker = guard.state.permission_checker(&auth);
    let decision = if checker.has_permission(guard.resource, guard.action).await {
        AccessDecision::Allowed
    } else {
        AccessDecision::Denied
    };

    enforce(guard.state.authz_mode, decision, &auth, request.uri().path(), || {
        format!("missing permission {}:{}", guard.resource, guard.action)
    })?;

    Ok(next.run(request).await)
}

fn enforce(
    mode: AuthzMode,
    decision: AccessDecision,
    auth: &AuthUser,
    path: &str,
    message: impl FnOnce() -> String,
) -> Result<(), AppError> {
    if decision == AccessDecision::Allowed {
        return Ok(());
    }

    match mode {
        AuthzMode::Off => Ok(()),
        AuthzMode::Advisory => {
            tracing::warn!(user_id = %auth.user_id, path, "access denied (advisory, request allowed)");
            Ok(())
        }
        AuthzMode::Strict => {
            tracing::info!(user_id = %auth.user_id, path, "access denied");
            Err(AppError::forbidden(message()))
        }
    }
}
