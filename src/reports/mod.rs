//! Read-only aggregation over the finance and stock ledgers.
//!
//! Scope filtering happens here, at the query layer - callers hand in the
//! session scope (or the effective location derived from it) and never see
//! rows outside their fence. The insight deriver consumes these aggregates
//! as opaque inputs.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Datelike, TimeZone, Utc};
use sqlx::{Row, SqlitePool};

use crate::authz::Scope;
use crate::errors::{AppError, AppResult};
use crate::models::inventory::{
    stock_status, InventoryKpis, ItemUsage, MovementType, StockLevelRow,
};
use crate::models::reporting::{ExpenseRow, FinanceKpis, RevenueTrendPoint};

/// Fold the financial ledger into a per-day revenue/expense trend.
/// REVENUE credits add to revenue; COGS and OPEX:* debits add to expenses.
pub async fn revenue_trend(pool: &SqlitePool) -> AppResult<Vec<RevenueTrendPoint>> {
    let rows = sqlx::query(
        "SELECT account_code, debit, credit, substr(entry_date, 1, 10) AS day FROM financial_entries",
    )
    .fetch_all(pool)
    .await?;

    let mut by_day: BTreeMap<String, (f64, f64)> = BTreeMap::new();
    for row in rows {
        let account: String = row.get("account_code");
        let debit: f64 = row.get("debit");
        let credit: f64 = row.get("credit");
        let day: String = row.get("day");

        let entry = by_day.entry(day).or_insert((0.0, 0.0));
        if account == "REVENUE" {
            entry.0 += credit - debit;
        } else if account == "COGS" || account.starts_with("OPEX:") {
            entry.1 += debit - credit;
        }
    }

    Ok(by_day
        .into_iter()
        .map(|(period, (revenue, expenses))| RevenueTrendPoint {
            period,
            revenue,
            expenses,
            profit: revenue - expenses,
        })
        .collect())
}

pub async fn finance_kpis(
    pool: &SqlitePool,
    location: Option<&str>,
    now: DateTime<Utc>,
) -> AppResult<FinanceKpis> {
    let (payables_sql, overdue_sql, paid_sql, ledger_sql) = if location.is_some() {
        (
            "SELECT COALESCE(SUM(amount), 0.0) FROM vendor_invoices WHERE status != 'PAID' AND location_id = ?",
            "SELECT COUNT(1) FROM vendor_invoices WHERE status != 'PAID' AND due_date < ? AND location_id = ?",
            "SELECT COALESCE(SUM(amount), 0.0) FROM payments WHERE location_id = ?",
            "SELECT COALESCE(SUM(CASE WHEN account_code = 'REVENUE' THEN credit - debit ELSE 0.0 END), 0.0) AS revenue, \
                    COALESCE(SUM(CASE WHEN account_code = 'COGS' OR account_code LIKE 'OPEX:%' THEN debit - credit ELSE 0.0 END), 0.0) AS expenses \
             FROM financial_entries WHERE location_id = ?",
        )
    } else {
        (
            "SELECT COALESCE(SUM(amount), 0.0) FROM vendor_invoices WHERE status != 'PAID'",
            "SELECT COUNT(1) FROM vendor_invoices WHERE status != 'PAID' AND due_date < ?",
            "SELECT COALESCE(SUM(amount), 0.0) FROM payments",
            "SELECT COALESCE(SUM(CASE WHEN account_code = 'REVENUE' THEN credit - debit ELSE 0.0 END), 0.0) AS revenue, \
                    COALESCE(SUM(CASE WHEN account_code = 'COGS' OR account_code LIKE 'OPEX:%' THEN debit - credit ELSE 0.0 END), 0.0) AS expenses \
             FROM financial_entries",
        )
    };

    let mut payables_query = sqlx::query_scalar::<_, f64>(payables_sql);
    let mut overdue_query = sqlx::query_scalar::<_, i64>(overdue_sql).bind(now);
    let mut paid_query = sqlx::query_scalar::<_, f64>(paid_sql);
    let mut ledger_query = sqlx::query(ledger_sql);
    if let Some(loc) = location {
        payables_query = payables_query.bind(loc);
        overdue_query = overdue_query.bind(loc);
        paid_query = paid_query.bind(loc);
        ledger_query = ledger_query.bind(loc);
    }

    let total_payables = payables_query.fetch_one(pool).await?;
    let overdue_invoices = overdue_query.fetch_one(pool).await?;
    let total_paid = paid_query.fetch_one(pool).await?;
    let ledger = ledger_query.fetch_one(pool).await?;
    let total_revenue: f64 = ledger.get("revenue");
    let total_expenses: f64 = ledger.get("expenses");

    Ok(FinanceKpis {
        total_payables,
        total_paid,
        overdue_invoices,
        total_revenue,
        total_expenses,
        net_cashflow: total_revenue - total_expenses - total_paid,
    })
}

/// Expense rows inside the window, fenced by the session scope: location
/// scopes see their location, department scopes additionally only their own
/// department, global scopes see everything.
pub async fn expenses_in_window(
    pool: &SqlitePool,
    scope: &Scope,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> AppResult<Vec<ExpenseRow>> {
    const BASE: &str =
        "SELECT id, location_id, department_id, category, amount, incurred_on FROM expenses \
         WHERE incurred_on >= ? AND incurred_on <= ?";

    let rows = match scope {
        Scope::Global => {
            sqlx::query(BASE).bind(from).bind(to).fetch_all(pool).await?
        }
        Scope::Location { location_id } => {
            let sql = format!("{BASE} AND location_id = ?");
            sqlx::query(&sql)
                .bind(from)
                .bind(to)
                .bind(location_id)
                .fetch_all(pool)
                .await?
        }
        Scope::Department {
            location_id,
            department_id,
        } => {
            let sql = format!("{BASE} AND location_id = ? AND department_id = ?");
            sqlx::query(&sql)
                .bind(from)
                .bind(to)
                .bind(location_id)
                .bind(department_id)
                .fetch_all(pool)
                .await?
        }
    };

    Ok(rows
        .iter()
        .map(|row| ExpenseRow {
            id: row.get("id"),
            location_id: row.get("location_id"),
            department_id: row.get("department_id"),
            category: row.get("category"),
            amount: row.get("amount"),
            incurred_on: row.get("incurred_on"),
        })
        .collect())
}

/// Current stock levels: on-hand folded from the movement ledger, joined
/// with the per-location stock metadata (reserved quantities and reorder
/// levels). `location = None` means all locations (global sessions).
pub async fn stock_levels(pool: &SqlitePool, location: Option<&str>) -> AppResult<Vec<StockLevelRow>> {
    let items = sqlx::query("SELECT id, sku, name, uom FROM inventory_items")
        .fetch_all(pool)
        .await?;
    let mut item_meta: HashMap<String, (String, String, String)> = HashMap::new();
    for row in &items {
        item_meta.insert(
            row.get("id"),
            (row.get("sku"), row.get("name"), row.get("uom")),
        );
    }

    let movements = match location {
        Some(loc) => {
            sqlx::query("SELECT location_id, item_id, movement_type, quantity FROM stock_movements WHERE location_id = ?")
                .bind(loc)
                .fetch_all(pool)
                .await?
        }
        None => {
            sqlx::query("SELECT location_id, item_id, movement_type, quantity FROM stock_movements")
                .fetch_all(pool)
                .await?
        }
    };

    let mut balances: HashMap<(String, String), f64> = HashMap::new();
    for row in &movements {
        let location_id: String = row.get("location_id");
        let item_id: String = row.get("item_id");
        let raw_type: String = row.get("movement_type");
        let quantity: f64 = row.get("quantity");

        let Some(movement_type) = MovementType::parse(&raw_type) else {
            tracing::warn!(movement_type = %raw_type, "skipping movement with unknown type");
            continue;
        };
        *balances.entry((location_id, item_id)).or_insert(0.0) += movement_type.delta(quantity);
    }

    let meta_rows = match location {
        Some(loc) => {
            sqlx::query("SELECT location_id, item_id, reserved, reorder_level FROM location_stock WHERE location_id = ?")
                .bind(loc)
                .fetch_all(pool)
                .await?
        }
        None => {
            sqlx::query("SELECT location_id, item_id, reserved, reorder_level FROM location_stock")
                .fetch_all(pool)
                .await?
        }
    };

    let mut stock_meta: HashMap<(String, String), (f64, f64)> = HashMap::new();
    for row in &meta_rows {
        let key = (row.get("location_id"), row.get("item_id"));
        stock_meta.insert(key.clone(), (row.get("reserved"), row.get("reorder_level")));
        // items tracked at a location show up even before their first movement
        balances.entry(key).or_insert(0.0);
    }

    let mut rows: Vec<StockLevelRow> = balances
        .into_iter()
        .map(|((location_id, item_id), on_hand)| {
            let (sku, item_name, uom) = item_meta
                .get(&item_id)
                .cloned()
                .unwrap_or_else(|| (String::new(), "Unknown".to_string(), String::new()));
            let (reserved, reorder_level) = stock_meta
                .get(&(location_id.clone(), item_id.clone()))
                .copied()
                .unwrap_or((0.0, 0.0));

            StockLevelRow {
                item_id,
                item_name,
                sku,
                uom,
                location_id,
                on_hand,
                reserved,
                available: on_hand - reserved,
                reorder_level,
                status: stock_status(on_hand, reorder_level),
            }
        })
        .collect();

    rows.sort_by(|a, b| a.sku.cmp(&b.sku).then_with(|| a.location_id.cmp(&b.location_id)));
    Ok(rows)
}

pub async fn inventory_kpis(
    pool: &SqlitePool,
    location: Option<&str>,
    now: DateTime<Utc>,
) -> AppResult<InventoryKpis> {
    let stock = stock_levels(pool, location).await?;
    let month_start = Utc
        .with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .ok_or_else(|| AppError::internal("failed to compute month start"))?;

    let movements = match location {
        Some(loc) => {
            sqlx::query("SELECT item_id, movement_type, quantity FROM stock_movements WHERE created_at >= ? AND location_id = ?")
                .bind(month_start)
                .bind(loc)
                .fetch_all(pool)
                .await?
        }
        None => {
            sqlx::query("SELECT item_id, movement_type, quantity FROM stock_movements WHERE created_at >= ?")
                .bind(month_start)
                .fetch_all(pool)
                .await?
        }
    };

    let mut movement_this_month = 0.0;
    let mut consumption: HashMap<String, f64> = HashMap::new();
    for row in &movements {
        let quantity: f64 = row.get("quantity");
        movement_this_month += quantity.abs();

        let raw_type: String = row.get("movement_type");
        if matches!(
            MovementType::parse(&raw_type),
            Some(MovementType::DepartmentIssue | MovementType::TransferOut)
        ) {
            let item_id: String = row.get("item_id");
            *consumption.entry(item_id).or_insert(0.0) += quantity.abs();
        }
    }

    let item_names: HashMap<&str, &str> = stock
        .iter()
        .map(|row| (row.item_id.as_str(), row.item_name.as_str()))
        .collect();
    let mut movers: Vec<ItemUsage> = consumption
        .into_iter()
        .map(|(item_id, quantity)| ItemUsage {
            item_name: item_names.get(item_id.as_str()).unwrap_or(&"Unknown").to_string(),
            item_id,
            quantity,
        })
        .collect();
    movers.sort_by(|a, b| {
        b.quantity
            .partial_cmp(&a.quantity)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.item_id.cmp(&b.item_id))
    });

    let fast_moving: Vec<ItemUsage> = movers.iter().take(5).cloned().collect();
    let mut slow_moving: Vec<ItemUsage> = movers.iter().rev().take(5).cloned().collect();
    slow_moving.sort_by(|a, b| {
        a.quantity
            .partial_cmp(&b.quantity)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.item_id.cmp(&b.item_id))
    });

    Ok(InventoryKpis {
        total_items: stock.len() as i64,
        low_stock_count: stock
            .iter()
            .filter(|row| matches!(row.status, crate::models::inventory::StockStatus::Low | crate::models::inventory::StockStatus::Critical))
            .count() as i64,
        out_of_stock_count: stock
            .iter()
            .filter(|row| matches!(row.status, crate::models::inventory::StockStatus::OutOfStock))
            .count() as i64,
        movement_this_month,
        fast_moving,
        slow_moving,
    })
}

/// Current on-hand balance for one item at one location, folded from the
/// ledger. Used by mutations to reject movements that would go negative.
pub async fn on_hand(pool: &SqlitePool, location_id: &str, item_id: &str) -> AppResult<f64> {
    let rows = sqlx::query(
        "SELECT movement_type, quantity FROM stock_movements WHERE location_id = ? AND item_id = ?",
    )
    .bind(location_id)
    .bind(item_id)
    .fetch_all(pool)
    .await?;

    let mut balance = 0.0;
    for row in &rows {
        let raw_type: String = row.get("movement_type");
        let quantity: f64 = row.get("quantity");
        if let Some(movement_type) = MovementType::parse(&raw_type) {
            balance += movement_type.delta(quantity);
        }
    }
    Ok(balance)
}
