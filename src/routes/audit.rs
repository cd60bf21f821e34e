use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use utoipa::{IntoParams, ToSchema};

use crate::app::AppState;
use crate::authz::{assert_route_access, GuardRequirements, Role, ScopeKind};
use crate::errors::AppResult;
use crate::jwt::AuthUser;

const AUDIT_GUARD: GuardRequirements = GuardRequirements {
    roles: &[Role::Ceo, Role::SystemAuditor],
    require_scope: Some(ScopeKind::Global),
    read_only_enforced: false,
};

const DEFAULT_LIMIT: i64 = 100;
const MAX_LIMIT: i64 = 500;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ActivityQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ActivityEntry {
    pub id: String,
    pub event_name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<String>,
    pub occurred_at: DateTime<Utc>,
    pub severity: String,
}

#[utoipa::path(
    get,
    path = "/audit/activity",
    tag = "Audit",
    params(ActivityQuery),
    responses(
        (status = 200, description = "Recent activity, newest first", body = Vec<ActivityEntry>),
        (status = 403, description = "Role or scope not permitted")
    ),
    security(("bearerAuth" = []))
)]
pub async fn activity(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ActivityQuery>,
) -> AppResult<Json<Vec<ActivityEntry>>> {
    assert_route_access(&AUDIT_GUARD, &auth)?;

    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    let rows = sqlx::query(
        "SELECT id, event_name, description, actor_id, subject_id, occurred_at, severity \
         FROM activity_log ORDER BY occurred_at DESC LIMIT ?",
    )
    .bind(limit)
    .fetch_all(&state.pool)
    .await?;

    let entries = rows
        .iter()
        .map(|row| ActivityEntry {
            id: row.get("id"),
            event_name: row.get("event_name"),
            description: row.get("description"),
            actor_id: row.get("actor_id"),
            subject_id: row.get("subject_id"),
            occurred_at: row.get("occurred_at"),
            severity: row.get("severity"),
        })
        .collect();

    Ok(Json(entries))
}
