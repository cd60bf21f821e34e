use anyhow::{Context, Result};
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::json;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::{tempdir, TempDir};
use tower::util::ServiceExt;
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

async fn login(app: &Router, email: &str) -> Result<String> {
    let req = Request::builder()
        .method("POST")
        .uri("/auth/login")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({"email": email, "password": "password123"}).to_string(),
        ))?;
    let resp: Response = app.clone().oneshot(req).await?;
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), 10_485_760).await?;
    if status != StatusCode::OK {
        panic!("login failed: {} - {}", status, String::from_utf8_lossy(&bytes));
    }
    let value: serde_json::Value = serde_json::from_slice(&bytes)?;
    Ok(value
        .get("token")
        .and_then(|v| v.as_str())
        .context("missing token")?
        .to_string())
}

async fn get(app: &Router, uri: &str, token: &str) -> Result<(StatusCode, serde_json::Value)> {
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
async fn denied_route_redirects_to_own_landing_page() -> Result<()> {
    let (pool, app, _dir) = setup().await?;
    insert_location(&pool, "loc_1").await?;
    insert_user(&pool, "gm@example.com", "GENERAL_MANAGER", false, Some("loc_1")).await?;

    let token = login(&app, "gm@example.com").await?;

    // audit trail requires a global scope; the GM is bounced home instead
    let (status, body) = get(&app, "/audit/activity", &token).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body.get("error").and_then(|v| v.as_str()), Some("forbidden"));
    assert_eq!(
        body.get("redirect_to").and_then(|v| v.as_str()),
        Some("/gm/dashboard")
    );

    Ok(())
}

#[tokio::test]
async fn global_scope_supersedes_location_requirement() -> Result<()> {
    let (pool, app, _dir) = setup().await?;
    insert_location(&pool, "loc_1").await?;
    insert_user(&pool, "auditor@example.com", "SYSTEM_AUDITOR", true, None).await?;
    insert_user(&pool, "gm@example.com", "GENERAL_MANAGER", false, Some("loc_1")).await?;

    let auditor = login(&app, "auditor@example.com").await?;
    let gm = login(&app, "gm@example.com").await?;

    // finance KPIs require a LOCATION scope; GLOBAL passes, LOCATION passes
    let (status, _) = get(&app, "/reports/finance/kpis", &auditor).await?;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = get(&app, "/reports/finance/kpis", &gm).await?;
    assert_eq!(status, StatusCode::OK);

    Ok(())
}

#[tokio::test]
async fn undetermined_scope_fails_location_requirement() -> Result<()> {
    let (pool, app, _dir) = setup().await?;
    // a finance manager with no location assigned has no usable scope
    insert_user(&pool, "fm@example.com", "FINANCE_MANAGER", false, None).await?;

    let token = login(&app, "fm@example.com").await?;
    let (status, body) = get(&app, "/reports/finance/kpis", &token).await?;
    assert_eq!(status, StatusCode::FORBIDDEN, "body: {body}");
    assert_eq!(
        body.get("redirect_to").and_then(|v| v.as_str()),
        Some("/finance/dashboard")
    );

    Ok(())
}

#[tokio::test]
async fn ceo_is_fenced_out_of_sku_detail_but_auditor_may_view() -> Result<()> {
    let (pool, app, _dir) = setup().await?;
    insert_user(&pool, "ceo@example.com", "CEO", true, None).await?;
    insert_user(&pool, "auditor@example.com", "SYSTEM_AUDITOR", true, None).await?;

    let ceo = login(&app, "ceo@example.com").await?;
    let auditor = login(&app, "auditor@example.com").await?;

    let (status, body) = get(&app, "/inventory/stock", &ceo).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        body.get("redirect_to").and_then(|v| v.as_str()),
        Some("/ceo/dashboard")
    );

    let (status, _) = get(&app, "/inventory/stock", &auditor).await?;
    assert_eq!(status, StatusCode::OK);

    Ok(())
}

#[tokio::test]
async fn audit_trail_records_logins() -> Result<()> {
    let (pool, app, _dir) = setup().await?;
    insert_location(&pool, "loc_1").await?;
    insert_user(&pool, "auditor@example.com", "SYSTEM_AUDITOR", true, None).await?;
    insert_user(&pool, "gm@example.com", "GENERAL_MANAGER", false, Some("loc_1")).await?;

    let _gm = login(&app, "gm@example.com").await?;
    let auditor = login(&app, "auditor@example.com").await?;

    // the activity listener projects events asynchronously
    tokio::time::sleep(std::time::Duration::from_millis(300)).await;

    let (status, body) = get(&app, "/audit/activity", &auditor).await?;
    assert_eq!(status, StatusCode::OK);
    let entries = body.as_array().context("expected an array")?;
    assert!(
        entries
            .iter()
            .any(|e| e.get("event_name").and_then(|v| v.as_str()) == Some("user.login")),
        "expected a user.login activity entry, got {body}"
    );

    Ok(())
}
