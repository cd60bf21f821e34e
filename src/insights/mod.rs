//! Deterministic advisory insights derived from the reporting aggregates.
//!
//! Derivation is a pure function of the session role, the requested window
//! and the fetched aggregates - no state, no I/O. Access and scope are
//! asserted here independently of the route guard, so a handler wiring
//! mistake cannot widen what a session may see.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

use crate::authz::{Role, Scope};
use crate::errors::AppError;
use crate::jwt::AuthUser;
use crate::models::inventory::{InventoryKpis, StockLevelRow};
use crate::models::reporting::{ExpenseRow, FinanceKpis, RevenueTrendPoint};

/// Roles permitted to request insights at all.
pub const INSIGHT_ROLES: &[Role] = &[
    Role::Ceo,
    Role::SystemAuditor,
    Role::GeneralManager,
    Role::FinanceManager,
    Role::StoreManager,
    Role::ProcurementOfficer,
    Role::DepartmentHead,
];

const TREND_PERIODS: usize = 7;
const EXPENSE_WARN_RATIO: f64 = 1.25;
const EXPENSE_HIGH_RATIO: f64 = 1.75;
const DEPLETION_HORIZON_DAYS: f64 = 7.0;
const DEPLETION_MAX_ITEMS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InsightKind {
    RevenueTrend,
    ExpenseAnomaly,
    InventoryDepletion,
    NextBestAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InsightSeverity {
    Info,
    Warn,
    High,
}

/// An ephemeral advisory record. Never persisted; recomputed per request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Insight {
    pub id: String,
    pub kind: InsightKind,
    pub severity: InsightSeverity,
    pub title: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Object)]
    pub metadata: Option<serde_json::Value>,
}

/// SKU-level inventory inputs; only fetched for non-global sessions.
#[derive(Debug, Clone)]
pub struct InventoryDetail {
    pub stock: Vec<StockLevelRow>,
    pub kpis: InventoryKpis,
}

/// The aggregate bundle the deriver consumes. The providers behind these are
/// opaque to this module.
#[derive(Debug, Clone)]
pub struct InsightSources {
    pub revenue_trend: Vec<RevenueTrendPoint>,
    pub expenses: Vec<ExpenseRow>,
    pub finance: FinanceKpis,
    pub inventory: Option<InventoryDetail>,
}

#[derive(Debug, Clone, Serialize)]
struct AtRiskItem {
    sku: String,
    item_name: String,
    days_remaining: f64,
    daily_usage: f64,
    available: f64,
}

pub fn assert_insight_access(auth: &AuthUser) -> Result<(), AppError> {
    if !INSIGHT_ROLES.contains(&auth.role) {
        tracing::warn!(user_id = %auth.user_id, role = %auth.role, "insights access denied");
        return Err(AppError::forbidden(format!(
            "[RBAC] Role \"{}\" is not permitted to access insights",
            auth.role
        )));
    }
    Ok(())
}

/// Global roles must not narrow to one location (that request is itself a
/// violation, not something to narrow automatically); everyone else may only
/// request their own location.
pub fn assert_insight_scope(auth: &AuthUser, requested_location: Option<&str>) -> Result<(), AppError> {
    if matches!(auth.role, Role::Ceo | Role::SystemAuditor) {
        if let Some(requested) = requested_location {
            tracing::warn!(
                user_id = %auth.user_id,
                role = %auth.role,
                requested_location = %requested,
                "global role requested single-location insights"
            );
            return Err(AppError::scope_violation(
                "[Scope] Global roles must not request single-location insights",
            ));
        }
        return Ok(());
    }

    let assigned = auth
        .scope
        .as_ref()
        .and_then(Scope::location_id)
        .ok_or_else(|| AppError::scope_violation("[Scope] User has no location assigned"))?;

    if let Some(requested) = requested_location {
        if requested != assigned {
            tracing::warn!(
                user_id = %auth.user_id,
                role = %auth.role,
                requested_location = %requested,
                assigned_location = %assigned,
                "cross-location insights blocked"
            );
            return Err(AppError::scope_violation(
                "[Scope] Cross-location insights are blocked",
            ));
        }
    }

    Ok(())
}

/// Whole days in the request window, rounded up, never less than one.
pub fn window_days(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    let seconds = (to - from).num_seconds();
    ((seconds + 86_399) / 86_400).max(1)
}

fn expense_severity(ratio: f64) -> InsightSeverity {
    if ratio > EXPENSE_HIGH_RATIO {
        InsightSeverity::High
    } else if ratio > EXPENSE_WARN_RATIO {
        InsightSeverity::Warn
    } else {
        InsightSeverity::Info
    }
}

fn format_amount(value: f64) -> String {
    let rounded = value.abs().round() as i64;
    let raw = rounded.to_string();
    let bytes = raw.as_bytes();
    let mut grouped = String::with_capacity(raw.len() + raw.len() / 3);
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 && (bytes.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(*b as char);
    }
    if value < 0.0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}

/// Derive the full insight set. Exactly one insight per kind, in a fixed
/// order: revenue trend, expense anomaly, inventory depletion, next best
/// action. "No issue" degrades to an INFO placeholder, never to an omission.
pub fn derive_insights(role: Role, days: i64, sources: &InsightSources) -> Vec<Insight> {
    let mut insights = Vec::with_capacity(4);

    // 1) Revenue trend pulse over the last periods
    let recent: Vec<&RevenueTrendPoint> = sources
        .revenue_trend
        .iter()
        .rev()
        .take(TREND_PERIODS)
        .rev()
        .collect();
    let total_revenue: f64 = recent.iter().map(|p| p.revenue).sum();
    let total_expenses: f64 = recent.iter().map(|p| p.expenses).sum();
    let total_profit = total_revenue - total_expenses;
    insights.push(Insight {
        id: "ai_rev_trend".to_string(),
        kind: InsightKind::RevenueTrend,
        severity: if total_profit >= 0.0 {
            InsightSeverity::Info
        } else {
            InsightSeverity::Warn
        },
        title: "Revenue Trend Pulse".to_string(),
        message: if total_profit >= 0.0 {
            format!("Last 7 periods net positive: UGX {}", format_amount(total_profit))
        } else {
            format!("Last 7 periods net negative: UGX {}", format_amount(total_profit.abs()))
        },
        metadata: Some(json!({
            "total_revenue": total_revenue,
            "total_expenses": total_expenses,
            "total_profit": total_profit,
            "points": recent.len(),
        })),
    });

    // 2) Expense anomaly against a deterministic baseline.
    // TODO: replace the fixed 90%-of-current-rate baseline with a trailing
    // 30-day rollup once historical expense aggregates are available.
    let total: f64 = sources.expenses.iter().map(|e| e.amount).sum();
    let per_day = total / days as f64;
    let baseline_per_day = per_day * 0.9;
    let ratio = if baseline_per_day > 0.0 {
        per_day / baseline_per_day
    } else {
        1.0
    };
    let severity = expense_severity(ratio);
    insights.push(if severity == InsightSeverity::Info {
        Insight {
            id: "ai_exp_anom".to_string(),
            kind: InsightKind::ExpenseAnomaly,
            severity,
            title: "Expense Stability".to_string(),
            message: "Spend rate is within expected range".to_string(),
            metadata: Some(json!({ "days": days, "total": total, "per_day": per_day })),
        }
    } else {
        Insight {
            id: "ai_exp_anom".to_string(),
            kind: InsightKind::ExpenseAnomaly,
            severity,
            title: "Expense Anomaly".to_string(),
            message: format!("Spend rate is elevated: ~{:.0}% of baseline", ratio * 100.0),
            metadata: Some(json!({
                "days": days,
                "total": total,
                "per_day": per_day,
                "baseline_per_day": baseline_per_day,
            })),
        }
    });

    // 3) Inventory depletion forecast. SKU-level detail is fenced off for
    // global audit roles; they get a fixed placeholder instead.
    let global_role = matches!(role, Role::Ceo | Role::SystemAuditor);
    let at_risk = if global_role {
        Vec::new()
    } else {
        sources
            .inventory
            .as_ref()
            .map(at_risk_items)
            .unwrap_or_default()
    };

    insights.push(if global_role {
        Insight {
            id: "ai_inv_depletion".to_string(),
            kind: InsightKind::InventoryDepletion,
            severity: InsightSeverity::Info,
            title: "Depletion Forecast".to_string(),
            message: "SKU-level depletion forecast is not available for global audit roles".to_string(),
            metadata: None,
        }
    } else if at_risk.is_empty() {
        Insight {
            id: "ai_inv_depletion".to_string(),
            kind: InsightKind::InventoryDepletion,
            severity: InsightSeverity::Info,
            title: "Depletion Forecast".to_string(),
            message: "No critical depletion risks detected".to_string(),
            metadata: None,
        }
    } else {
        Insight {
            id: "ai_inv_depletion".to_string(),
            kind: InsightKind::InventoryDepletion,
            severity: InsightSeverity::Warn,
            title: "Depletion Forecast".to_string(),
            message: format!("{} SKU(s) projected to deplete within 7 days", at_risk.len()),
            metadata: Some(json!({ "items": at_risk })),
        }
    });

    // 4) Next-best-action suggestions from the finance KPIs
    let mut actions: Vec<String> = Vec::new();
    if sources.finance.overdue_invoices > 0 {
        actions.push(format!("Review {} overdue invoice(s)", sources.finance.overdue_invoices));
    }
    if sources.finance.total_payables > 0.0 {
        actions.push("Run AP aging review".to_string());
    }
    if sources.finance.net_cashflow < 0.0 {
        actions.push("Reduce discretionary expenses in the next period".to_string());
    }
    if !at_risk.is_empty() {
        actions.push("Initiate reorder for at-risk SKUs".to_string());
    }

    insights.push(Insight {
        id: "ai_next_actions".to_string(),
        kind: InsightKind::NextBestAction,
        severity: if actions.len() > 2 {
            InsightSeverity::Warn
        } else {
            InsightSeverity::Info
        },
        title: "Next Best Actions".to_string(),
        message: if actions.is_empty() {
            "No immediate actions required".to_string()
        } else {
            actions.join(" \u{2022} ")
        },
        metadata: Some(json!({ "actions": actions })),
    });

    insights
}

fn at_risk_items(detail: &InventoryDetail) -> Vec<AtRiskItem> {
    let usage_by_item: std::collections::HashMap<&str, f64> = detail
        .kpis
        .fast_moving
        .iter()
        .map(|row| (row.item_id.as_str(), row.quantity))
        .collect();

    let mut at_risk: Vec<AtRiskItem> = detail
        .stock
        .iter()
        .filter_map(|row| {
            let used_this_month = usage_by_item.get(row.item_id.as_str()).copied().unwrap_or(0.0);
            let daily_usage = used_this_month / 30.0;
            // zero usage means the item never runs out on this horizon
            if daily_usage <= 0.0 {
                return None;
            }
            let days_remaining = row.available / daily_usage;
            if !days_remaining.is_finite() || days_remaining > DEPLETION_HORIZON_DAYS {
                return None;
            }
            Some(AtRiskItem {
                sku: row.sku.clone(),
                item_name: row.item_name.clone(),
                days_remaining,
                daily_usage,
                available: row.available,
            })
        })
        .collect();

    at_risk.sort_by(|a, b| {
        a.days_remaining
            .partial_cmp(&b.days_remaining)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    at_risk.truncate(DEPLETION_MAX_ITEMS);
    at_risk
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::inventory::{stock_status, ItemUsage, StockLevelRow};
    use chrono::TimeZone;

    fn trend(points: &[(f64, f64)]) -> Vec<RevenueTrendPoint> {
        points
            .iter()
            .enumerate()
            .map(|(i, (revenue, expenses))| RevenueTrendPoint {
                period: format!("2026-07-{:02}", i + 1),
                revenue: *revenue,
                expenses: *expenses,
                profit: revenue - expenses,
            })
            .collect()
    }

    fn expense(amount: f64) -> ExpenseRow {
        ExpenseRow {
            id: "exp_1".to_string(),
            location_id: "loc_1".to_string(),
            department_id: None,
            category: "UTILITIES".to_string(),
            amount,
            incurred_on: Utc.with_ymd_and_hms(2026, 7, 1, 0, 0, 0).unwrap(),
        }
    }

    fn quiet_finance() -> FinanceKpis {
        FinanceKpis {
            total_payables: 0.0,
            total_paid: 0.0,
            overdue_invoices: 0,
            total_revenue: 0.0,
            total_expenses: 0.0,
            net_cashflow: 0.0,
        }
    }

    fn stock_row(item_id: &str, available: f64) -> StockLevelRow {
        StockLevelRow {
            item_id: item_id.to_string(),
            item_name: format!("Item {item_id}"),
            sku: format!("SKU-{item_id}"),
            uom: "unit".to_string(),
            location_id: "loc_1".to_string(),
            on_hand: available,
            reserved: 0.0,
            available,
            reorder_level: 10.0,
            status: stock_status(available, 10.0),
        }
    }

    fn detail(stock: Vec<StockLevelRow>, usage: Vec<(&str, f64)>) -> InventoryDetail {
        InventoryDetail {
            kpis: InventoryKpis {
                total_items: stock.len() as i64,
                low_stock_count: 0,
                out_of_stock_count: 0,
                movement_this_month: 0.0,
                fast_moving: usage
                    .into_iter()
                    .map(|(item_id, quantity)| ItemUsage {
                        item_id: item_id.to_string(),
                        item_name: format!("Item {item_id}"),
                        quantity,
                    })
                    .collect(),
                slow_moving: Vec::new(),
            },
            stock,
        }
    }

    fn sources(inventory: Option<InventoryDetail>) -> InsightSources {
        InsightSources {
            revenue_trend: trend(&[(100.0, 40.0), (120.0, 60.0)]),
            expenses: vec![expense(1_000_000.0)],
            finance: quiet_finance(),
            inventory,
        }
    }

    #[test]
    fn expense_severity_thresholds() {
        assert_eq!(expense_severity(1.111), InsightSeverity::Info);
        assert_eq!(expense_severity(1.25), InsightSeverity::Info);
        assert_eq!(expense_severity(1.3), InsightSeverity::Warn);
        assert_eq!(expense_severity(1.75), InsightSeverity::Warn);
        assert_eq!(expense_severity(1.8), InsightSeverity::High);
    }

    #[test]
    fn window_days_rounds_up_and_never_drops_below_one() {
        let from = Utc.with_ymd_and_hms(2026, 7, 1, 0, 0, 0).unwrap();
        assert_eq!(window_days(from, from + chrono::Duration::days(10)), 10);
        assert_eq!(window_days(from, from + chrono::Duration::hours(30)), 2);
        assert_eq!(window_days(from, from), 1);
    }

    #[test]
    fn one_insight_per_kind_in_fixed_order() {
        let insights = derive_insights(Role::FinanceManager, 10, &sources(None));
        let kinds: Vec<InsightKind> = insights.iter().map(|i| i.kind).collect();
        assert_eq!(
            kinds,
            vec![
                InsightKind::RevenueTrend,
                InsightKind::ExpenseAnomaly,
                InsightKind::InventoryDepletion,
                InsightKind::NextBestAction,
            ]
        );
        let ids: Vec<&str> = insights.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["ai_rev_trend", "ai_exp_anom", "ai_inv_depletion", "ai_next_actions"]);
    }

    #[test]
    fn worked_expense_example_classifies_as_stability() {
        // 1,000,000 over 10 days -> per-day 100k vs baseline 90k -> ratio ~1.111
        let insights = derive_insights(Role::FinanceManager, 10, &sources(None));
        let anomaly = &insights[1];
        assert_eq!(anomaly.severity, InsightSeverity::Info);
        assert_eq!(anomaly.title, "Expense Stability");
    }

    #[test]
    fn positive_trend_is_info_negative_is_warn() {
        let mut src = sources(None);
        let insights = derive_insights(Role::GeneralManager, 10, &src);
        assert_eq!(insights[0].severity, InsightSeverity::Info);

        src.revenue_trend = trend(&[(10.0, 500.0)]);
        let insights = derive_insights(Role::GeneralManager, 10, &src);
        assert_eq!(insights[0].severity, InsightSeverity::Warn);
        assert!(insights[0].message.contains("net negative"));
    }

    #[test]
    fn global_roles_get_the_not_available_placeholder() {
        for role in [Role::Ceo, Role::SystemAuditor] {
            let insights = derive_insights(role, 10, &sources(None));
            let depletion = &insights[2];
            assert_eq!(depletion.severity, InsightSeverity::Info);
            assert!(depletion.message.contains("not available"));
        }
    }

    #[test]
    fn at_risk_skus_raise_a_warn() {
        // 5 units available, 60 used this month -> 2/day -> 2.5 days remaining
        let inv = detail(vec![stock_row("itm_a", 5.0), stock_row("itm_b", 500.0)], vec![("itm_a", 60.0), ("itm_b", 60.0)]);
        let insights = derive_insights(Role::StoreManager, 10, &sources(Some(inv)));
        let depletion = &insights[2];
        assert_eq!(depletion.severity, InsightSeverity::Warn);
        assert!(depletion.message.starts_with("1 SKU(s)"));
    }

    #[test]
    fn zero_usage_items_never_deplete() {
        let inv = detail(vec![stock_row("itm_a", 1.0)], vec![]);
        let insights = derive_insights(Role::StoreManager, 10, &sources(Some(inv)));
        assert_eq!(insights[2].severity, InsightSeverity::Info);
    }

    #[test]
    fn next_best_actions_escalate_past_two() {
        let mut src = sources(Some(detail(
            vec![stock_row("itm_a", 5.0)],
            vec![("itm_a", 60.0)],
        )));
        src.finance = FinanceKpis {
            total_payables: 250_000.0,
            total_paid: 0.0,
            overdue_invoices: 3,
            total_revenue: 10.0,
            total_expenses: 100.0,
            net_cashflow: -90.0,
        };

        let insights = derive_insights(Role::GeneralManager, 10, &src);
        let actions = &insights[3];
        assert_eq!(actions.severity, InsightSeverity::Warn);
        assert!(actions.message.contains("Review 3 overdue invoice(s)"));
        assert!(actions.message.contains("Run AP aging review"));
        assert!(actions.message.contains("Initiate reorder for at-risk SKUs"));
    }

    #[test]
    fn derivation_is_idempotent_for_fixed_inputs() {
        let src = sources(None);
        let first = derive_insights(Role::FinanceManager, 10, &src);
        let second = derive_insights(Role::FinanceManager, 10, &src);
        assert_eq!(first, second);
    }
}
