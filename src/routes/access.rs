//! Access checks for the calling principal.
//!
//! The gate endpoints evaluate a role or permission gate exactly as a client
//! would, so front ends can ask "what would this gate show me?" without
//! duplicating the rules.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;

use crate::app::AppState;
use crate::authz::{PermissionGate, RoleGate};
use crate::errors::AppResult;
use crate::jwt::AuthUser;
use crate::models::access::{
    GateResponse, PermissionCheckResponse, PermissionGateRequest, PermissionQuery, RoleGateRequest,
    RoleSetResponse,
};

#[utoipa::path(
    get,
    path = "/access/roles",
    tag = "Access",
    responses((status = 200, description = "Roles held by the caller", body = RoleSetResponse)),
    security(("bearerAuth" = []))
)]
pub async fn my_roles(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<RoleSetResponse>> {
    let store = state.role_store(&auth).await;
    let set = store.snapshot();

    Ok(Json(RoleSetResponse {
        user_id: auth.user_id,
        roles: set.roles,
        loading: set.loading,
    }))
}

#[utoipa::path(
    get,
    path = "/access/permissions/check",
    tag = "Access",
    params(PermissionQuery),
    responses((status = 200, description = "Whether the caller holds the permission", body = PermissionCheckResponse)),
    security(("bearerAuth" = []))
)]
pub async fn check_permission(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<PermissionQuery>,
) -> AppResult<Json<PermissionCheckResponse>> {
    let allowed = state
        .permission_checker(&auth)
        .has_permission(&query.resource, &query.action)
        .await;

    Ok(Json(PermissionCheckResponse {
        resource: query.resource,
        action: query.action,
        allowed,
    }))
}

#[utoipa::path(
    post,
    path = "/access/gates/role",
    tag = "Access",
    request_body = RoleGateRequest,
    responses((status = 200, description = "Role gate outcome for the caller", body = GateResponse)),
    security(("bearerAuth" = []))
)]
pub async fn evaluate_role_gate(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<RoleGateRequest>,
) -> AppResult<Json<GateResponse>> {
    let mut gate = RoleGate::new(req.allowed_roles).show_error(req.show_error.unwrap_or(true));
    if let Some(fallback) = req.fallback {
        gate = gate.with_fallback(fallback);
    }

    let store = state.role_store(&auth).await;
    let roles = store.snapshot();
    let decision = gate.decide(&roles);
    let output = gate.render(&roles, req.content.unwrap_or_default());

    Ok(Json(GateResponse::new(decision, output)))
}

#[utoipa::path(
    post,
    path = "/access/gates/permission",
    tag = "Access",
    request_body = PermissionGateRequest,
    responses((status = 200, description = "Permission gate outcome for the caller", body = GateResponse)),
    security(("bearerAuth" = []))
)]
pub async fn evaluate_permission_gate(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<PermissionGateRequest>,
) -> AppResult<Json<GateResponse>> {
    let mut gate = PermissionGate::new(Arc::new(state.permission_checker(&auth)));
    if let Some(fallback) = req.fallback {
        gate = gate.with_fallback(fallback);
    }

    let store = state.role_store(&auth).await;
    let decision = gate.check(&store, &req.resource, &req.action).await;
    let output = gate.render(req.content.unwrap_or_default());

    Ok(Json(GateResponse::new(decision, output)))
}
