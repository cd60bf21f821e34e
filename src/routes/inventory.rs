use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use sqlx::Row;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{
    assert_department_access, assert_location_access, assert_route_access, assert_session_shape,
    GuardRequirements, Role, ScopeKind,
};
use crate::errors::{AppError, AppResult};
use crate::events::{log_activity_with_context, RequestContext};
use crate::jwt::AuthUser;
use crate::models::inventory::{
    AdjustStockRequest, InventoryKpis, IssueStockRequest, MovementType, StockLevelRow, StockMovement,
};
use crate::reports;
use crate::utils::utc_now;

/// Operational SKU detail is fenced off from the CEO; the auditor may view
/// it (read-only) across all locations.
const STOCK_GUARD: GuardRequirements = GuardRequirements {
    roles: &[
        Role::SystemAuditor,
        Role::GeneralManager,
        Role::StoreManager,
        Role::StoreController,
        Role::ProcurementOfficer,
        Role::DepartmentHead,
    ],
    require_scope: None,
    read_only_enforced: false,
};

const ADJUST_GUARD: GuardRequirements = GuardRequirements {
    roles: &[Role::StoreManager],
    require_scope: Some(ScopeKind::Location),
    read_only_enforced: true,
};

const ISSUE_GUARD: GuardRequirements = GuardRequirements {
    roles: &[Role::DepartmentHead],
    require_scope: Some(ScopeKind::Department),
    read_only_enforced: true,
};

#[utoipa::path(
    get,
    path = "/inventory/stock",
    tag = "Inventory",
    responses(
        (status = 200, description = "Stock levels for the caller's scope", body = Vec<StockLevelRow>),
        (status = 403, description = "Role not permitted")
    ),
    security(("bearerAuth" = []))
)]
pub async fn stock(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<Vec<StockLevelRow>>> {
    assert_route_access(&STOCK_GUARD, &auth)?;
    let scope = assert_session_shape(&auth)?;

    let rows = reports::stock_levels(&state.pool, scope.location_id()).await?;
    Ok(Json(rows))
}

#[utoipa::path(
    get,
    path = "/inventory/kpis",
    tag = "Inventory",
    responses(
        (status = 200, description = "Inventory KPIs for the caller's scope", body = InventoryKpis),
        (status = 403, description = "Role not permitted")
    ),
    security(("bearerAuth" = []))
)]
pub async fn kpis(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<InventoryKpis>> {
    assert_route_access(&STOCK_GUARD, &auth)?;
    let scope = assert_session_shape(&auth)?;

    let kpis = reports::inventory_kpis(&state.pool, scope.location_id(), utc_now()).await?;
    Ok(Json(kpis))
}

#[utoipa::path(
    post,
    path = "/inventory/adjustments",
    tag = "Inventory",
    request_body = AdjustStockRequest,
    responses(
        (status = 201, description = "Adjustment recorded", body = StockMovement),
        (status = 400, description = "Zero adjustment or negative resulting balance"),
        (status = 403, description = "Role, scope, or read-only violation"),
        (status = 429, description = "Too many adjustments")
    ),
    security(("bearerAuth" = []))
)]
pub async fn adjust(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Json(req): Json<AdjustStockRequest>,
) -> AppResult<(StatusCode, Json<StockMovement>)> {
    assert_route_access(&ADJUST_GUARD, &auth)?;
    assert_location_access(&auth, &req.location_id)?;

    if req.adjustment == 0.0 {
        return Err(AppError::bad_request("adjustment must be non-zero"));
    }

    state.rate_limiter.consume(
        &auth.user_id.to_string(),
        Some(req.location_id.as_str()),
        "inventory.adjust",
    )?;

    ensure_item_exists(&state, &req.item_id).await?;

    let on_hand = reports::on_hand(&state.pool, &req.location_id, &req.item_id).await?;
    if on_hand + req.adjustment < 0.0 {
        return Err(AppError::bad_request(format!(
            "adjustment would make stock negative (on hand: {})",
            on_hand
        )));
    }

    let movement = StockMovement {
        id: Uuid::new_v4(),
        location_id: req.location_id.clone(),
        department_id: None,
        item_id: req.item_id.clone(),
        movement_type: MovementType::Adjustment,
        quantity: req.adjustment,
        unit_cost: 0.0,
        created_by: auth.user_id,
        created_at: utc_now(),
    };
    insert_movement(&state, &movement, Some(&req.reason)).await?;

    log_activity_with_context(
        &state.event_bus,
        "created",
        Some(auth.user_id),
        &movement,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok((StatusCode::CREATED, Json(movement)))
}

#[utoipa::path(
    post,
    path = "/inventory/issues",
    tag = "Inventory",
    request_body = IssueStockRequest,
    responses(
        (status = 201, description = "Department issue recorded", body = StockMovement),
        (status = 400, description = "Invalid quantity or department"),
        (status = 403, description = "Role, scope, or read-only violation"),
        (status = 429, description = "Too many issues")
    ),
    security(("bearerAuth" = []))
)]
pub async fn issue(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Json(req): Json<IssueStockRequest>,
) -> AppResult<(StatusCode, Json<StockMovement>)> {
    assert_route_access(&ISSUE_GUARD, &auth)?;
    assert_department_access(&auth, &req.location_id, &req.department_id)?;

    if req.quantity <= 0.0 {
        return Err(AppError::bad_request("issue quantity must be greater than 0"));
    }

    state.rate_limiter.consume(
        &auth.user_id.to_string(),
        Some(req.location_id.as_str()),
        "inventory.issue",
    )?;

    ensure_item_exists(&state, &req.item_id).await?;

    let department_location: Option<String> =
        sqlx::query("SELECT location_id FROM departments WHERE id = ?")
            .bind(&req.department_id)
            .fetch_optional(&state.pool)
            .await?
            .map(|row| row.get("location_id"));
    match department_location {
        None => return Err(AppError::not_found("department not found")),
        Some(loc) if loc != req.location_id => {
            return Err(AppError::bad_request(
                "department must belong to the issuing location",
            ))
        }
        Some(_) => {}
    }

    let on_hand = reports::on_hand(&state.pool, &req.location_id, &req.item_id).await?;
    if on_hand < req.quantity {
        return Err(AppError::bad_request(format!(
            "insufficient stock to issue (on hand: {})",
            on_hand
        )));
    }

    let movement = StockMovement {
        id: Uuid::new_v4(),
        location_id: req.location_id.clone(),
        department_id: Some(req.department_id.clone()),
        item_id: req.item_id.clone(),
        movement_type: MovementType::DepartmentIssue,
        quantity: req.quantity,
        unit_cost: 0.0,
        created_by: auth.user_id,
        created_at: utc_now(),
    };
    insert_movement(&state, &movement, None).await?;

    log_activity_with_context(
        &state.event_bus,
        "created",
        Some(auth.user_id),
        &movement,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok((StatusCode::CREATED, Json(movement)))
}

async fn ensure_item_exists(state: &AppState, item_id: &str) -> AppResult<()> {
    let exists: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM inventory_items WHERE id = ?")
        .bind(item_id)
        .fetch_one(&state.pool)
        .await?;
    if exists == 0 {
        return Err(AppError::not_found("inventory item not found"));
    }
    Ok(())
}

async fn insert_movement(
    state: &AppState,
    movement: &StockMovement,
    reference: Option<&str>,
) -> AppResult<()> {
    sqlx::query(
        "INSERT INTO stock_movements (id, location_id, department_id, item_id, movement_type, quantity, unit_cost, reference, created_by, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(movement.id.to_string())
    .bind(&movement.location_id)
    .bind(&movement.department_id)
    .bind(&movement.item_id)
    .bind(movement.movement_type.as_str())
    .bind(movement.quantity)
    .bind(movement.unit_cost)
    .bind(reference)
    .bind(movement.created_by.to_string())
    .bind(movement.created_at)
    .execute(&state.pool)
    .await?;
    Ok(())
}
