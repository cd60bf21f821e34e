use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::events::{Loggable, Severity};

/// Typed entries of the stock ledger. On-hand balances are always folded
/// from movements, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementType {
    OpeningBalance,
    PurchaseReceipt,
    TransferIn,
    TransferOut,
    DepartmentIssue,
    Adjustment,
}

impl MovementType {
    pub fn parse(raw: &str) -> Option<MovementType> {
        match raw {
            "OPENING_BALANCE" => Some(MovementType::OpeningBalance),
            "PURCHASE_RECEIPT" => Some(MovementType::PurchaseReceipt),
            "TRANSFER_IN" => Some(MovementType::TransferIn),
            "TRANSFER_OUT" => Some(MovementType::TransferOut),
            "DEPARTMENT_ISSUE" => Some(MovementType::DepartmentIssue),
            "ADJUSTMENT" => Some(MovementType::Adjustment),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::OpeningBalance => "OPENING_BALANCE",
            MovementType::PurchaseReceipt => "PURCHASE_RECEIPT",
            MovementType::TransferIn => "TRANSFER_IN",
            MovementType::TransferOut => "TRANSFER_OUT",
            MovementType::DepartmentIssue => "DEPARTMENT_ISSUE",
            MovementType::Adjustment => "ADJUSTMENT",
        }
    }

    /// Signed effect of a movement on the on-hand balance. Adjustments carry
    /// their own sign in the quantity.
    pub fn delta(&self, quantity: f64) -> f64 {
        match self {
            MovementType::OpeningBalance
            | MovementType::PurchaseReceipt
            | MovementType::TransferIn => quantity,
            MovementType::TransferOut | MovementType::DepartmentIssue => -quantity,
            MovementType::Adjustment => quantity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StockStatus {
    Healthy,
    Low,
    Critical,
    OutOfStock,
}

pub fn stock_status(on_hand: f64, reorder_level: f64) -> StockStatus {
    if on_hand <= 0.0 {
        StockStatus::OutOfStock
    } else if on_hand <= reorder_level * 0.5 {
        StockStatus::Critical
    } else if on_hand <= reorder_level {
        StockStatus::Low
    } else {
        StockStatus::Healthy
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StockLevelRow {
    pub item_id: String,
    pub item_name: String,
    pub sku: String,
    pub uom: String,
    pub location_id: String,
    pub on_hand: f64,
    pub reserved: f64,
    pub available: f64,
    pub reorder_level: f64,
    pub status: StockStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ItemUsage {
    pub item_id: String,
    pub item_name: String,
    pub quantity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InventoryKpis {
    pub total_items: i64,
    pub low_stock_count: i64,
    pub out_of_stock_count: i64,
    pub movement_this_month: f64,
    /// Top consumers this month (department issues + transfers out).
    pub fast_moving: Vec<ItemUsage>,
    pub slow_moving: Vec<ItemUsage>,
}

/// A recorded stock ledger entry, as returned by the mutation endpoints and
/// projected into the activity log.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StockMovement {
    pub id: Uuid,
    pub location_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department_id: Option<String>,
    pub item_id: String,
    pub movement_type: MovementType,
    pub quantity: f64,
    pub unit_cost: f64,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Loggable for StockMovement {
    fn entity_type() -> &'static str { "stock_movement" }
    fn subject_id(&self) -> Uuid { self.id }
    fn severity(&self) -> Severity { Severity::Important }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AdjustStockRequest {
    #[schema(example = "loc_kampala")]
    pub location_id: String,
    #[schema(example = "itm_rice_25kg")]
    pub item_id: String,
    /// Signed quantity; the resulting balance must stay non-negative.
    pub adjustment: f64,
    #[schema(example = "cycle count variance")]
    pub reason: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct IssueStockRequest {
    #[schema(example = "loc_kampala")]
    pub location_id: String,
    #[schema(example = "dep_kitchen")]
    pub department_id: String,
    #[schema(example = "itm_rice_25kg")]
    pub item_id: String,
    pub quantity: f64,
}
