use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::app::AppState;
use crate::db::row_parsers;
use crate::errors::{AppError, AppResult};
use crate::jwt::AuthUser;
use crate::models::user::{AuthResponse, DbUser, LoginRequest, RegisterRequest, User};
use crate::utils::{hash_password, normalize_email, utc_now, verify_password};

const USER_COLUMNS: &str = "id, name, email, password_hash, created_at, updated_at";

#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = AuthResponse),
        (status = 409, description = "Email already in use")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let email = normalize_email(&payload.email)?;
    ensure_email_available(&state.pool, &email).await?;

    let password_hash = hash_password(&payload.password)?;
    let now = utc_now();
    let user_id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO users (id, name, email, password_hash, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(user_id.to_string())
    .bind(&payload.name)
    .bind(&email)
    .bind(password_hash)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?;

    tracing::info!(user_id = %user_id, "user registered");

    let user: User = fetch_user_by_id(&state.pool, user_id).await?.into();
    let token = state.jwt.encode(user.id)?;

    Ok((StatusCode::CREATED, Json(AuthResponse { token, user })))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let email = normalize_email(&payload.email).map_err(|_| AppError::unauthorized("invalid credentials"))?;

    let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?"))
        .bind(&email)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| AppError::unauthorized("invalid credentials"))?;
    let db_user = row_parsers::db_user_from_row(&row)?;

    if !verify_password(&payload.password, &db_user.password_hash)? {
        return Err(AppError::unauthorized("invalid credentials"));
    }

    let token = state.jwt.encode(db_user.id)?;
    Ok(Json(AuthResponse {
        token,
        user: db_user.into(),
    }))
}

#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "Auth",
    responses((status = 200, description = "Current user", body = User)),
    security(("bearerAuth" = []))
)]
pub async fn me(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<User>> {
    let user = fetch_user_by_id(&state.pool, auth.user_id).await?;
    Ok(Json(user.into()))
}

async fn ensure_email_available(pool: &SqlitePool, email: &str) -> AppResult<()> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM users WHERE email = ?")
        .bind(email)
        .fetch_one(pool)
        .await?;

    if count > 0 {
        return Err(AppError::conflict("email already in use"));
    }

    Ok(())
}

pub async fn fetch_user_by_id(pool: &SqlitePool, user_id: Uuid) -> AppResult<DbUser> {
    let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
        .bind(user_id.to_string())
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("user not found"))?;

    row_parsers::db_user_from_row(&row)
}

pub async fn fetch_user_by_email(pool: &SqlitePool, email: &str) -> AppResult<DbUser> {
    let email = normalize_email(email)?;
    let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?"))
        .bind(&email)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("user not found"))?;

    row_parsers::db_user_from_row(&row)
}
