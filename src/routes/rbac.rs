//! RBAC Admin API Routes
//!
//! Role assignments per user and the role → `(resource, action)` grant table.
//! Assignment changes are published on the role change feed by the repository.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{Role, RoleGrant, UserRole};
use crate::errors::{AppError, AppResult};
use crate::jwt::AuthUser;
use crate::models::rbac::{AssignRoleRequest, AssignmentResponse, GrantRequest};
use crate::routes::auth::fetch_user_by_id;

// =============================================================================
// USER ROLE ENDPOINTS
// =============================================================================

/// List roles assigned to a user
#[utoipa::path(
    get,
    path = "/rbac/users/{user_id}/roles",
    tag = "RBAC",
    params(("user_id" = Uuid, Path, description = "User ID")),
    responses((status = 200, description = "Assigned roles", body = Vec<UserRole>)),
    security(("bearerAuth" = []))
)]
pub async fn list_user_roles(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<Vec<UserRole>>> {
    Ok(Json(state.roles.list_user_roles(user_id).await?))
}

/// Assign a role to a user
#[utoipa::path(
    post,
    path = "/rbac/users/{user_id}/roles",
    tag = "RBAC",
    params(("user_id" = Uuid, Path, description = "User ID")),
    request_body = AssignRoleRequest,
    responses(
        (status = 201, description = "Role assigned", body = AssignmentResponse),
        (status = 200, description = "Role was already assigned", body = AssignmentResponse),
        (status = 404, description = "User not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn assign_role(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<Uuid>,
    Json(req): Json<AssignRoleRequest>,
) -> AppResult<(StatusCode, Json<AssignmentResponse>)> {
    fetch_user_by_id(&state.pool, user_id).await?;

    let created = state.roles.assign_role(user_id, req.role).await?;
    tracing::info!(actor_id = %auth.user_id, user_id = %user_id, role = %req.role, created, "assign role");

    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(AssignmentResponse { created })))
}

/// Revoke a role from a user
#[utoipa::path(
    delete,
    path = "/rbac/users/{user_id}/roles/{role}",
    tag = "RBAC",
    params(
        ("user_id" = Uuid, Path, description = "User ID"),
        ("role" = Role, Path, description = "Role name"),
    ),
    responses(
        (status = 204, description = "Role revoked"),
        (status = 404, description = "Role not assigned"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn revoke_role(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((user_id, role)): Path<(Uuid, String)>,
) -> AppResult<StatusCode> {
    let role: Role = role.parse()?;

    if !state.roles.revoke_role(user_id, role).await? {
        return Err(AppError::not_found("role not assigned"));
    }
    tracing::info!(actor_id = %auth.user_id, user_id = %user_id, role = %role, "revoke role");

    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// GRANT ENDPOINTS
// =============================================================================

/// List role permission grants
#[utoipa::path(
    get,
    path = "/rbac/grants",
    tag = "RBAC",
    responses((status = 200, description = "All grants", body = Vec<RoleGrant>)),
    security(("bearerAuth" = []))
)]
pub async fn list_grants(State(state): State<AppState>, _auth: AuthUser) -> AppResult<Json<Vec<RoleGrant>>> {
    Ok(Json(state.roles.list_grants().await?))
}

/// Grant `(resource, action)` to a role
#[utoipa::path(
    post,
    path = "/rbac/grants",
    tag = "RBAC",
    request_body = GrantRequest,
    responses(
        (status = 201, description = "Grant created", body = RoleGrant),
        (status = 409, description = "Grant already exists"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_grant(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<GrantRequest>,
) -> AppResult<(StatusCode, Json<RoleGrant>)> {
    let grant = RoleGrant {
        role: req.role,
        resource: non_empty("resource", req.resource)?,
        action: non_empty("action", req.action)?,
    };

    if !state.roles.grant_permission(&grant).await? {
        return Err(AppError::conflict("grant already exists"));
    }
    tracing::info!(
        actor_id = %auth.user_id,
        role = %grant.role,
        resource = %grant.resource,
        action = %grant.action,
        "permission granted"
    );

    Ok((StatusCode::CREATED, Json(grant)))
}

/// Remove a grant
#[utoipa::path(
    delete,
    path = "/rbac/grants/{role}/{resource}/{action}",
    tag = "RBAC",
    params(
        ("role" = Role, Path, description = "Role name"),
        ("resource" = String, Path, description = "Resource name"),
        ("action" = String, Path, description = "Action name"),
    ),
    responses(
        (status = 204, description = "Grant removed"),
        (status = 404, description = "No such grant"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_grant(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((role, resource, action)): Path<(String, String, String)>,
) -> AppResult<StatusCode> {
    let grant = RoleGrant {
        role: role.parse()?,
        resource,
        action,
    };

    if !state.roles.revoke_permission(&grant).await? {
        return Err(AppError::not_found("grant not found"));
    }
    tracing::info!(
        actor_id = %auth.user_id,
        role = %grant.role,
        resource = %grant.resource,
        action = %grant.action,
        "permission revoked"
    );

    Ok(StatusCode::NO_CONTENT)
}

fn non_empty(field: &str, value: String) -> AppResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::bad_request(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_string())
}
