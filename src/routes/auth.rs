use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;
use sqlx::SqlitePool;

use crate::app::AppState;
use crate::authz::landing_route;
use crate::errors::{AppError, AppResult};
use crate::events::{log_activity_with_context, RequestContext};
use crate::jwt::AuthUser;
use crate::models::user::{AuthResponse, DbUser, LoginRequest, User};
use crate::utils::verify_password;

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    message: String,
}

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Stored role not recognized")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let db_user = sqlx::query_as::<_, DbUser>(
        "SELECT id, name, email, password_hash, role, all_locations, location_id, department_id, created_at, updated_at, deleted_at \
         FROM users WHERE email = ? AND deleted_at IS NULL",
    )
    .bind(&payload.email)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::unauthorized("invalid credentials"))?;

    let password_ok = verify_password(&payload.password, &db_user.password_hash)?;
    if !password_ok {
        return Err(AppError::unauthorized("invalid credentials"));
    }

    // Fails closed when the stored role no longer normalizes
    let user: User = db_user.try_into()?;
    let token = state.jwt.encode(&user)?;
    let landing = landing_route(user.role);

    log_activity_with_context(
        &state.event_bus,
        "login",
        Some(user.id),
        &user,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(AuthResponse {
        token,
        user,
        landing_route: landing.to_string(),
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
    let db_user = fetch_user_by_id(&state.pool, auth.user_id).await?;
    let user: User = db_user.try_into()?;
    Ok(Json(user))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "Auth",
    responses((status = 200, description = "Logout acknowledged")),
    security(("bearerAuth" = []))
)]
pub async fn logout(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
) -> AppResult<Json<MessageResponse>> {
    if let Ok(db_user) = fetch_user_by_id(&state.pool, auth.user_id).await {
        if let Ok(user) = User::try_from(db_user) {
            log_activity_with_context(
                &state.event_bus,
                "logout",
                Some(auth.user_id),
                &user,
                None,
                Some(RequestContext::from_headers(&headers)),
            );
        }
    }

    Ok(Json(MessageResponse {
        message: "Logged out".to_string(),
    }))
}

async fn fetch_user_by_id(pool: &SqlitePool, user_id: uuid::Uuid) -> AppResult<DbUser> {
    sqlx::query_as::<_, DbUser>(
        "SELECT id, name, email, password_hash, role, all_locations, location_id, department_id, created_at, updated_at, deleted_at \
         FROM users WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(user_id.to_string())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("user not found"))
}
