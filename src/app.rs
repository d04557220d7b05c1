use std::sync::Arc;

use axum::http::Method;
use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::authz::guard::{require_permission, require_roles, PermissionGuard, RoleGuard};
use crate::authz::{permissions, AuthzMode, PermissionChecker, Role, RoleStore, SqliteRoleRepository};
use crate::config::AppConfig;
use crate::errors::AppError;
use crate::jwt::{AuthUser, JwtConfig};
use crate::routes::{access, auth, health, rbac};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub jwt: Arc<JwtConfig>,
    pub roles: Arc<SqliteRoleRepository>,
    pub authz_mode: AuthzMode,
}

impl AppState {
    pub fn new(pool: SqlitePool, config: &AppConfig) -> Self {
        Self {
            roles: Arc::new(SqliteRoleRepository::new(pool.clone())),
            pool,
            jwt: Arc::new(config.jwt.clone()),
            authz_mode: config.authz_mode,
        }
    }

    /// One-shot role store for the caller of the current request.
    pub async fn role_store(&self, auth: &AuthUser) -> RoleStore {
        RoleStore::load(Arc::new(auth.principal()), self.roles.clone()).await
    }

    pub fn permission_checker(&self, auth: &AuthUser) -> PermissionChecker {
        PermissionChecker::new(Arc::new(auth.principal()), self.roles.clone())
    }
}

pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let config = AppConfig::from_env()?;
    Ok(create_app_with_config(pool, &config))
}

pub fn create_app_with_config(pool: SqlitePool, config: &AppConfig) -> Router {
    let state = AppState::new(pool, config);
    build_router(state)
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/me", get(auth::me));

    let access_routes = Router::new()
        .route("/roles", get(access::my_roles))
        .route("/permissions/check", get(access::check_permission))
        .route("/gates/role", post(access::evaluate_role_gate))
        .route("/gates/permission", post(access::evaluate_permission_gate));

    // user role assignments: capability-gated
    let user_role_routes = Router::new()
        .route("/users/:user_id/roles", get(rbac::list_user_roles).post(rbac::assign_role))
        .route("/users/:user_id/roles/:role", delete(rbac::revoke_role))
        .route_layer(middleware::from_fn_with_state(
            PermissionGuard::new(state.clone(), permissions::USERS, permissions::MANAGE),
            require_permission,
        ));

    // grant table: admins only
    let grant_routes = Router::new()
        .route("/grants", get(rbac::list_grants).post(rbac::create_grant))
        .route("/grants/:role/:resource/:action", delete(rbac::delete_grant))
        .route_layer(middleware::from_fn_with_state(
            RoleGuard::new(state.clone(), [Role::Admin]),
            require_roles,
        ));

    Router::new()
        .route("/api/health", get(health::health))
        .nest("/auth", auth_routes)
        .nest("/access", access_routes)
        .nest("/rbac", user_role_routes.merge(grant_routes))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
