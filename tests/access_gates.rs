use anyhow::{Context, Result};
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tempfile::{tempdir, TempDir};
use tower::util::ServiceExt;
use uuid::Uuid;

use estate_gate::authz::{Role, SqliteRoleRepository};
use estate_gate::config::AppConfig;
use estate_gate::create_app_with_config;
use estate_gate::jwt::JwtConfig;

struct TestApp {
    _dir: TempDir,
    pool: SqlitePool,
    app: Router,
}

async fn setup() -> Result<TestApp> {
    let dir = tempdir()?;
    let url = format!("sqlite://{}", dir.path().join("access.db").display());
    let pool = estate_gate::db::connect(&url).await?;
    let app = create_app_with_config(pool.clone(), &AppConfig::new(JwtConfig::new("test-secret", 1)));
    Ok(TestApp { _dir: dir, pool, app })
}

async fn body_json(resp: Response) -> Result<Value> {
    let bytes = body::to_bytes(resp.into_body(), 1_048_576).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Registers a user, assigns `roles`, returns `(user_id, token)`.
async fn signed_in_user(t: &TestApp, email: &str, roles: &[Role]) -> Result<(Uuid, String)> {
    let payload = json!({ "name": email, "email": email, "password": "password123" });
    let req = Request::builder()
        .method("POST")
        .uri("/auth/register")
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))?;
    let resp = t.app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let v = body_json(resp).await?;

    let user_id: Uuid = v["user"]["id"].as_str().context("user id")?.parse()?;
    let token = v["token"].as_str().context("token")?.to_string();

    let repo = SqliteRoleRepository::new(t.pool.clone());
    for role in roles {
        repo.assign_role(user_id, *role).await?;
    }
    Ok((user_id, token))
}

async fn get(t: &TestApp, uri: &str, token: &str) -> Result<Response> {
    let req = Request::builder()
        .uri(uri)
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())?;
    Ok(t.app.clone().oneshot(req).await?)
}

async fn post(t: &TestApp, uri: &str, token: &str, payload: Value) -> Result<Response> {
    let req = Request::builder()
        .method("POST")
        .uri(uri)
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))?;
    Ok(t.app.clone().oneshot(req).await?)
}

#[tokio::test]
async fn roles_endpoint_lists_assigned_roles() -> Result<()> {
    let t = setup().await?;
    let (user_id, token) = signed_in_user(&t, "tech@example.com", &[Role::Technician, Role::Vendor]).await?;

    let resp = get(&t, "/access/roles", &token).await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let v = body_json(resp).await?;
    assert_eq!(v["user_id"], user_id.to_string());
    assert_eq!(v["roles"], json!(["technician", "vendor"]));
    assert_eq!(v["loading"], false);

    Ok(())
}

#[tokio::test]
async fn unrecognized_stored_role_is_ignored() -> Result<()> {
    let t = setup().await?;
    let (user_id, token) = signed_in_user(&t, "odd@example.com", &[Role::Staff]).await?;

    sqlx::query("INSERT INTO user_roles (user_id, role, created_at) VALUES (?, 'owner', datetime('now'))")
        .bind(user_id.to_string())
        .execute(&t.pool)
        .await?;

    let v = body_json(get(&t, "/access/roles", &token).await?).await?;
    assert_eq!(v["roles"], json!(["staff"]));

    Ok(())
}

#[tokio::test]
async fn permission_check_follows_role_grants() -> Result<()> {
    let t = setup().await?;
    let (_, customer) = signed_in_user(&t, "customer@example.com", &[Role::Customer]).await?;
    let (_, nobody) = signed_in_user(&t, "nobody@example.com", &[]).await?;

    let v = body_json(get(&t, "/access/permissions/check?resource=requests&action=create", &customer).await?).await?;
    assert_eq!(v["allowed"], true);

    let v = body_json(get(&t, "/access/permissions/check?resource=requests&action=delete", &customer).await?).await?;
    assert_eq!(v["allowed"], false);

    let v = body_json(get(&t, "/access/permissions/check?resource=requests&action=create", &nobody).await?).await?;
    assert_eq!(v["allowed"], false);

    Ok(())
}

#[tokio::test]
async fn role_gate_shows_denial_notice_with_required_and_held_roles() -> Result<()> {
    let t = setup().await?;
    let (_, token) = signed_in_user(&t, "staff@example.com", &[Role::Staff]).await?;

    let resp = post(
        &t,
        "/access/gates/role",
        &token,
        json!({ "allowed_roles": ["admin", "manager"], "content": "Admin Panel" }),
    )
    .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let v = body_json(resp).await?;
    assert_eq!(v["decision"], "denied");
    assert_eq!(v["rendered"], "denial_notice");
    assert_eq!(
        v["content"],
        "Access denied. Required roles: admin, manager. Your roles: staff."
    );

    Ok(())
}

#[tokio::test]
async fn role_gate_prefers_fallback_then_silence() -> Result<()> {
    let t = setup().await?;
    let (_, token) = signed_in_user(&t, "bare@example.com", &[]).await?;

    let v = body_json(
        post(
            &t,
            "/access/gates/role",
            &token,
            json!({ "allowed_roles": ["admin"], "fallback": "Ask an admin", "content": "secret" }),
        )
        .await?,
    )
    .await?;
    assert_eq!(v["rendered"], "fallback");
    assert_eq!(v["content"], "Ask an admin");

    let v = body_json(
        post(
            &t,
            "/access/gates/role",
            &token,
            json!({ "allowed_roles": ["admin"], "show_error": false, "content": "secret" }),
        )
        .await?,
    )
    .await?;
    assert_eq!(v["rendered"], "empty");
    assert!(v["content"].is_null());

    let v = body_json(
        post(&t, "/access/gates/role", &token, json!({ "allowed_roles": ["admin"] })).await?,
    )
    .await?;
    assert_eq!(v["content"], "Access denied. Required roles: admin. Your roles: none.");

    Ok(())
}

#[tokio::test]
async fn role_gate_allows_any_matching_role() -> Result<()> {
    let t = setup().await?;
    let (_, token) = signed_in_user(&t, "admin@example.com", &[Role::Admin]).await?;

    let v = body_json(
        post(
            &t,
            "/access/gates/role",
            &token,
            json!({ "allowed_roles": ["manager", "admin"], "content": "Admin Panel" }),
        )
        .await?,
    )
    .await?;
    assert_eq!(v["decision"], "allowed");
    assert_eq!(v["rendered"], "children");
    assert_eq!(v["content"], "Admin Panel");

    Ok(())
}

#[tokio::test]
async fn role_gate_rejects_unknown_role_names() -> Result<()> {
    let t = setup().await?;
    let (_, token) = signed_in_user(&t, "x@example.com", &[]).await?;

    let resp = post(&t, "/access/gates/role", &token, json!({ "allowed_roles": ["owner"] })).await?;
    assert!(resp.status().is_client_error(), "got {}", resp.status());

    Ok(())
}

#[tokio::test]
async fn permission_gate_renders_children_or_fallback() -> Result<()> {
    let t = setup().await?;
    let (_, finance) = signed_in_user(&t, "finance@example.com", &[Role::Finance]).await?;

    let v = body_json(
        post(
            &t,
            "/access/gates/permission",
            &finance,
            json!({ "resource": "invoices", "action": "approve", "content": "Approve" }),
        )
        .await?,
    )
    .await?;
    assert_eq!(v["decision"], "allowed");
    assert_eq!(v["rendered"], "children");
    assert_eq!(v["content"], "Approve");

    let v = body_json(
        post(
            &t,
            "/access/gates/permission",
            &finance,
            json!({ "resource": "properties", "action": "delete", "fallback": "Read only", "content": "Delete" }),
        )
        .await?,
    )
    .await?;
    assert_eq!(v["decision"], "denied");
    assert_eq!(v["rendered"], "fallback");
    assert_eq!(v["content"], "Read only");

    // no fallback: nothing at all, never a notice
    let v = body_json(
        post(
            &t,
            "/access/gates/permission",
            &finance,
            json!({ "resource": "properties", "action": "delete", "content": "Delete" }),
        )
        .await?,
    )
    .await?;
    assert_eq!(v["rendered"], "empty");
    assert!(v["content"].is_null());

    Ok(())
}

#[tokio::test]
async fn access_endpoints_require_a_token() -> Result<()> {
    let t = setup().await?;

    let req = Request::builder().uri("/access/roles").body(Body::empty())?;
    let resp = t.app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    Ok(())
}
