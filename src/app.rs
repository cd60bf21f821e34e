use std::sync::Arc;

use axum::http::Method;
use axum::routing::{get, post};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::errors::AppError;
use crate::events::{init_event_bus, start_activity_listener, EventBus};
use crate::jwt::JwtConfig;
use crate::rate_limit::{RateLimitConfig, RateLimiter};
use crate::routes::{audit, auth, health, insights, inventory, reports};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub jwt: Arc<JwtConfig>,
    pub event_bus: EventBus,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(pool: SqlitePool, jwt: JwtConfig, event_bus: EventBus) -> Self {
        Self {
            pool,
            jwt: Arc::new(jwt),
            event_bus,
            rate_limiter: Arc::new(RateLimiter::new(RateLimitConfig::default())),
        }
    }
}

pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let jwt_config = JwtConfig::from_env()?;

    let (event_bus, rx) = init_event_bus();
    tokio::spawn(start_activity_listener(rx, pool.clone()));

    let state = AppState::new(pool, jwt_config, event_bus);

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let auth_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/me", get(auth::me))
        .route("/logout", post(auth::logout));

    let report_routes = Router::new()
        .route("/revenue-trend", get(reports::revenue_trend))
        .route("/finance/kpis", get(reports::finance_kpis))
        .route("/expenses", get(reports::expenses));

    let inventory_routes = Router::new()
        .route("/stock", get(inventory::stock))
        .route("/kpis", get(inventory::kpis))
        .route("/adjustments", post(inventory::adjust))
        .route("/issues", post(inventory::issue));

    let router = Router::new()
        .route("/api/health", get(health::health))
        .nest("/auth", auth_routes)
        .nest("/reports", report_routes)
        .nest("/inventory", inventory_routes)
        .route("/insights", get(insights::get_insights))
        .route("/audit/activity", get(audit::activity))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    Ok(router)
}
