use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::scope::ScopeKind;

/// The closed set of back-office roles. Raw role strings from login responses
/// or stored sessions are normalized into this enum at the boundary and never
/// travel past it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Ceo,
    SystemAuditor,
    GeneralManager,
    DepartmentHead,
    ProcurementOfficer,
    StoreManager,
    FinanceManager,
    StoreController,
}

impl Role {
    pub const ALL: [Role; 8] = [
        Role::Ceo,
        Role::SystemAuditor,
        Role::GeneralManager,
        Role::DepartmentHead,
        Role::ProcurementOfficer,
        Role::StoreManager,
        Role::FinanceManager,
        Role::StoreController,
    ];

    /// Normalize a free-text role string into a `Role`.
    ///
    /// Accepts the canonical spellings plus the short aliases legacy auth
    /// responses used. Unknown strings yield `None` - never a default role.
    pub fn parse(raw: &str) -> Option<Role> {
        match raw.trim().to_uppercase().as_str() {
            "CEO" => Some(Role::Ceo),
            "SYSTEM_AUDITOR" | "AUDITOR" => Some(Role::SystemAuditor),
            "GENERAL_MANAGER" | "GM" => Some(Role::GeneralManager),
            "DEPARTMENT_HEAD" | "DEPT_HEAD" => Some(Role::DepartmentHead),
            "PROCUREMENT_OFFICER" | "PROCUREMENT" => Some(Role::ProcurementOfficer),
            "STORE_MANAGER" | "STORE" | "INVENTORY" => Some(Role::StoreManager),
            "FINANCE_MANAGER" | "FINANCE" => Some(Role::FinanceManager),
            "STORE_CONTROLLER" | "CONTROLLER" => Some(Role::StoreController),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Ceo => "CEO",
            Role::SystemAuditor => "SYSTEM_AUDITOR",
            Role::GeneralManager => "GENERAL_MANAGER",
            Role::DepartmentHead => "DEPARTMENT_HEAD",
            Role::ProcurementOfficer => "PROCUREMENT_OFFICER",
            Role::StoreManager => "STORE_MANAGER",
            Role::FinanceManager => "FINANCE_MANAGER",
            Role::StoreController => "STORE_CONTROLLER",
        }
    }

    /// Every role maps to exactly one scope kind; roles are not polymorphic
    /// across scope kinds.
    pub fn scope_kind(&self) -> ScopeKind {
        match self {
            Role::Ceo | Role::SystemAuditor => ScopeKind::Global,
            Role::DepartmentHead => ScopeKind::Department,
            Role::GeneralManager
            | Role::ProcurementOfficer
            | Role::StoreManager
            | Role::FinanceManager
            | Role::StoreController => ScopeKind::Location,
        }
    }

    /// Read-only roles may view anything inside their scope but are barred
    /// from every mutating entry point.
    pub fn is_read_only(&self) -> bool {
        matches!(self, Role::SystemAuditor)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
