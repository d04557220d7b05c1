use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::{authz, models, routes};

#[derive(OpenApi)]
#[openapi(
	paths(
		routes::health::health,
		routes::auth::register,
		routes::auth::login,
		routes::auth::me,
		routes::access::my_roles,
		routes::access::check_permission,
		routes::access::evaluate_role_gate,
		routes::access::evaluate_permission_gate,
		routes::rbac::list_user_roles,
		routes::rbac::assign_role,
		routes::rbac::revoke_role,
		routes::rbac::list_grants,
		routes::rbac::create_grant,
		routes::rbac::delete_grant
	),
	components(
		schemas(
			routes::health::HealthResponse,
			models::user::User,
			models::user::AuthResponse,
			models::user::LoginRequest,
			models::user::RegisterRequest,
			models::access::RoleSetResponse,
			models::access::PermissionCheckResponse,
			models::access::RoleGateRequest,
			models::access::PermissionGateRequest,
			models::access::GateResponse,
			models::access::Rendered,
			models::rbac::AssignRoleRequest,
			models::rbac::AssignmentResponse,
			models::rbac::GrantRequest,
			authz::Role,
			authz::AccessDecision,
			authz::RoleGrant,
			authz::UserRole
		)
	),
	modifiers(&BearerAuth),
	tags(
		(name = "Health", description = "Service health"),
		(name = "Auth", description = "Authentication endpoints"),
		(name = "Access", description = "Role and permission checks for the caller"),
		(name = "RBAC", description = "Role assignments and permission grants")
	)
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
	fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
		if let Some(components) = openapi.components.as_mut() {
			components.add_security_scheme(
				"bearerAuth",
				SecurityScheme::Http(
					HttpBuilder::new()
						.scheme(HttpAuthScheme::Bearer)
						.bearer_format("JWT")
						.build(),
				),
			);
		}
	}
}

pub fn build_openapi(port: u16) -> anyhow::Result<utoipa::openapi::OpenApi> {
	let mut doc = serde_json::to_value(ApiDoc::openapi())?;
	ensure_servers(&mut doc, port);
	Ok(serde_json::from_value(doc)?)
}

pub fn swagger_routes(doc: utoipa::openapi::OpenApi) -> anyhow::Result<Router> {
	let swagger_config = utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"])
		.try_it_out_enabled(true)
		.with_credentials(true)
		.persist_authorization(true);

	let doc_json = Arc::new(serde_json::to_value(&doc)?);

	let json_route = {
		let doc_json = Arc::clone(&doc_json);
		get(move || {
			let doc_json = Arc::clone(&doc_json);
			async move { Json((*doc_json).clone()) }
		})
	};

	Ok(Router::new()
		.route("/api-docs/openapi.json", json_route)
		.merge(SwaggerUi::new("/docs").config(swagger_config)))
}

fn ensure_servers(doc: &mut Value, port: u16) {
	if doc.get("servers").is_none() {
		doc["servers"] = json!([{ "url": format!("http://localhost:{}", port) }]);
	}
}
