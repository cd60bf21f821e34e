use anyhow::{Context, Result};
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::json;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::{tempdir, TempDir};
use tower::util::ServiceExt; // for `oneshot`
use uuid::Uuid;

use opsboard::create_app;
use opsboard::utils::{hash_password, utc_now};

async fn setup() -> Result<(SqlitePool, Router, TempDir)> {
    let dir = tempdir().context("failed to create tempdir")?;
    let db_path = dir.path().join("test.db");
    let opts = SqliteConnectOptions::new()
        .filename(db_path.as_path())
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await?;

    let migrator = sqlx::migrate::Migrator::new(
        std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations"),
    )
    .await?;
    migrator.run(&pool).await?;

    std::env::set_var("JWT_SECRET", "test-secret");
    let app = create_app(pool.clone()).await?;

    Ok((pool, app, dir))
}

async fn insert_location(pool: &SqlitePool, id: &str) -> Result<()> {
    sqlx::query("INSERT INTO locations (id, name, status, created_at) VALUES (?, ?, 'ACTIVE', ?)")
        .bind(id)
        .bind(id)
        .bind(utc_now())
        .execute(pool)
        .await?;
    Ok(())
}

async fn insert_user(
    pool: &SqlitePool,
    email: &str,
    role: &str,
    all_locations: bool,
    location_id: Option<&str>,
) -> Result<Uuid> {
    let id = Uuid::new_v4();
    let now = utc_now();
    sqlx::query(
        "INSERT INTO users (id, name, email, password_hash, role, all_locations, location_id, department_id, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, NULL, ?, ?)",
    )
    .bind(id.to_string())
    .bind(email)
    .bind(email)
    .bind(hash_password("password123").map_err(|e| anyhow::anyhow!(e.to_string()))?)
    .bind(role)
    .bind(all_locations)
    .bind(location_id)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(id)
}

async fn post_json(app: &Router, uri: &str, body: serde_json::Value) -> Result<(StatusCode, serde_json::Value)> {
    let req = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))?;
    let resp: Response = app.clone().oneshot(req).await?;
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), 10_485_760).await?;
    let value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    Ok((status, value))
}

async fn get_with_token(app: &Router, uri: &str, token: &str) -> Result<(StatusCode, serde_json::Value)> {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())?;
    let resp: Response = app.clone().oneshot(req).await?;
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), 10_485_760).await?;
    let value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    Ok((status, value))
}

#[tokio::test]
async fn login_issues_token_and_landing_route() -> Result<()> {
    let (pool, app, _dir) = setup().await?;
    insert_location(&pool, "loc_1").await?;
    insert_user(&pool, "fm@example.com", "FINANCE_MANAGER", false, Some("loc_1")).await?;

    let (status, body) = post_json(
        &app,
        "/auth/login",
        json!({"email": "fm@example.com", "password": "password123"}),
    )
    .await?;
    assert_eq!(status, StatusCode::OK, "login failed: {body}");

    let token = body.get("token").and_then(|v| v.as_str()).context("missing token")?;
    assert_eq!(
        body.pointer("/user/role").and_then(|v| v.as_str()),
        Some("FINANCE_MANAGER")
    );
    assert_eq!(
        body.get("landing_route").and_then(|v| v.as_str()),
        Some("/finance/dashboard")
    );

    let (status, me) = get_with_token(&app, "/auth/me", token).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me.get("email").and_then(|v| v.as_str()), Some("fm@example.com"));

    Ok(())
}

#[tokio::test]
async fn wrong_password_is_unauthorized() -> Result<()> {
    let (pool, app, _dir) = setup().await?;
    insert_location(&pool, "loc_1").await?;
    insert_user(&pool, "fm@example.com", "FINANCE_MANAGER", false, Some("loc_1")).await?;

    let (status, _) = post_json(
        &app,
        "/auth/login",
        json!({"email": "fm@example.com", "password": "nope-nope-nope"}),
    )
    .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = post_json(
        &app,
        "/auth/login",
        json!({"email": "ghost@example.com", "password": "password123"}),
    )
    .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn unknown_stored_role_fails_closed_at_login() -> Result<()> {
    let (pool, app, _dir) = setup().await?;
    insert_location(&pool, "loc_1").await?;
    insert_user(&pool, "odd@example.com", "MYSTERY_ROLE", false, Some("loc_1")).await?;

    let (status, body) = post_json(
        &app,
        "/auth/login",
        json!({"email": "odd@example.com", "password": "password123"}),
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let message = body.get("message").and_then(|v| v.as_str()).unwrap_or_default();
    assert!(message.contains("[RBAC]"), "unexpected message: {message}");

    Ok(())
}

#[tokio::test]
async fn missing_token_is_unauthorized() -> Result<()> {
    let (_pool, app, _dir) = setup().await?;

    let req = Request::builder().method("GET").uri("/auth/me").body(Body::empty())?;
    let resp: Response = app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    Ok(())
}
