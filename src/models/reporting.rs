use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One day of the revenue/expense trend, folded from the financial ledger.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RevenueTrendPoint {
    /// Day in `YYYY-MM-DD` form.
    pub period: String,
    pub revenue: f64,
    pub expenses: f64,
    pub profit: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FinanceKpis {
    pub total_payables: f64,
    pub total_paid: f64,
    pub overdue_invoices: i64,
    pub total_revenue: f64,
    pub total_expenses: f64,
    pub net_cashflow: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ExpenseRow {
    pub id: String,
    pub location_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department_id: Option<String>,
    pub category: String,
    pub amount: f64,
    pub incurred_on: DateTime<Utc>,
}
