use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::app::AppState;
use crate::authz::{assert_route_access, assert_session_shape, GuardRequirements, Role, ScopeKind};
use crate::errors::AppResult;
use crate::jwt::AuthUser;
use crate::models::reporting::{ExpenseRow, FinanceKpis, RevenueTrendPoint};
use crate::reports;
use crate::utils::utc_now;

const TREND_GUARD: GuardRequirements = GuardRequirements {
    roles: &[Role::Ceo, Role::SystemAuditor, Role::GeneralManager, Role::FinanceManager],
    require_scope: None,
    read_only_enforced: false,
};

const FINANCE_KPIS_GUARD: GuardRequirements = GuardRequirements {
    roles: &[Role::Ceo, Role::SystemAuditor, Role::GeneralManager, Role::FinanceManager],
    require_scope: Some(ScopeKind::Location),
    read_only_enforced: false,
};

const EXPENSES_GUARD: GuardRequirements = GuardRequirements {
    roles: &[
        Role::Ceo,
        Role::SystemAuditor,
        Role::GeneralManager,
        Role::FinanceManager,
        Role::DepartmentHead,
    ],
    require_scope: None,
    read_only_enforced: false,
};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ExpenseWindowQuery {
    /// Window start (RFC 3339)
    pub from: DateTime<Utc>,
    /// Window end (RFC 3339)
    pub to: DateTime<Utc>,
}

#[utoipa::path(
    get,
    path = "/reports/revenue-trend",
    tag = "Reports",
    responses(
        (status = 200, description = "Per-day revenue/expense trend", body = Vec<RevenueTrendPoint>),
        (status = 403, description = "Role not permitted")
    ),
    security(("bearerAuth" = []))
)]
pub async fn revenue_trend(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<Vec<RevenueTrendPoint>>> {
    assert_route_access(&TREND_GUARD, &auth)?;
    let trend = reports::revenue_trend(&state.pool).await?;
    Ok(Json(trend))
}

#[utoipa::path(
    get,
    path = "/reports/finance/kpis",
    tag = "Reports",
    responses(
        (status = 200, description = "Finance KPIs for the caller's scope", body = FinanceKpis),
        (status = 403, description = "Role or scope not permitted")
    ),
    security(("bearerAuth" = []))
)]
pub async fn finance_kpis(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<FinanceKpis>> {
    assert_route_access(&FINANCE_KPIS_GUARD, &auth)?;
    let scope = assert_session_shape(&auth)?;

    // global sessions aggregate across all locations
    let kpis = reports::finance_kpis(&state.pool, scope.location_id(), utc_now()).await?;
    Ok(Json(kpis))
}

#[utoipa::path(
    get,
    path = "/reports/expenses",
    tag = "Reports",
    params(ExpenseWindowQuery),
    responses(
        (status = 200, description = "Expenses inside the window, scope-fenced", body = Vec<ExpenseRow>),
        (status = 403, description = "Role or scope not permitted")
    ),
    security(("bearerAuth" = []))
)]
pub async fn expenses(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(window): Query<ExpenseWindowQuery>,
) -> AppResult<Json<Vec<ExpenseRow>>> {
    assert_route_access(&EXPENSES_GUARD, &auth)?;
    let scope = assert_session_shape(&auth)?;

    let rows = reports::expenses_in_window(&state.pool, scope, window.from, window.to).await?;
    Ok(Json(rows))
}
