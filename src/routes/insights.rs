use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::app::AppState;
use crate::authz::{assert_session_shape, Role};
use crate::errors::AppResult;
use crate::insights::{
    assert_insight_access, assert_insight_scope, derive_insights, window_days, Insight,
    InsightSources, InventoryDetail,
};
use crate::jwt::AuthUser;
use crate::reports;
use crate::utils::utc_now;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct InsightsQuery {
    /// Window start (RFC 3339)
    pub from: DateTime<Utc>,
    /// Window end (RFC 3339)
    pub to: DateTime<Utc>,
    /// Must be absent for global roles and, when present, must match the
    /// caller's own location.
    pub location_id: Option<String>,
}

#[utoipa::path(
    get,
    path = "/insights",
    tag = "Insights",
    params(InsightsQuery),
    responses(
        (status = 200, description = "Derived insights, one per kind in fixed order", body = Vec<Insight>),
        (status = 403, description = "Role, cross-scope, or cross-location violation")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_insights(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<InsightsQuery>,
) -> AppResult<Json<Vec<Insight>>> {
    // Re-validated here independently of any route guard.
    assert_insight_access(&auth)?;
    assert_insight_scope(&auth, query.location_id.as_deref())?;
    let scope = assert_session_shape(&auth)?;

    let days = window_days(query.from, query.to);
    let now = utc_now();

    let revenue_trend = reports::revenue_trend(&state.pool).await?;
    let expenses = reports::expenses_in_window(&state.pool, scope, query.from, query.to).await?;
    let finance = reports::finance_kpis(&state.pool, scope.location_id(), now).await?;

    // SKU-level inputs are never fetched for global audit roles
    let inventory = if matches!(auth.role, Role::Ceo | Role::SystemAuditor) {
        None
    } else {
        let stock = reports::stock_levels(&state.pool, scope.location_id()).await?;
        let kpis = reports::inventory_kpis(&state.pool, scope.location_id(), now).await?;
        Some(InventoryDetail { stock, kpis })
    };

    let sources = InsightSources {
        revenue_trend,
        expenses,
        finance,
        inventory,
    };

    Ok(Json(derive_insights(auth.role, days, &sources)))
}
