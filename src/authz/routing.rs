use super::role::Role;

/// Priority order used when an auth response carries several role strings:
/// the first recognized role in this list wins.
const ROLE_PRIORITY: [Role; 8] = [
    Role::Ceo,
    Role::SystemAuditor,
    Role::GeneralManager,
    Role::FinanceManager,
    Role::ProcurementOfficer,
    Role::StoreManager,
    Role::StoreController,
    Role::DepartmentHead,
];

pub fn highest_priority_role(roles: &[String]) -> Option<Role> {
    let normalized: Vec<Role> = roles.iter().filter_map(|raw| Role::parse(raw)).collect();
    ROLE_PRIORITY.iter().copied().find(|candidate| normalized.contains(candidate))
}

/// Default landing route for a role, used for post-login redirection and for
/// bouncing a denied user back to their own dashboard. Must stay consistent
/// with the guard requirements of the page it points at.
pub fn landing_route(role: Role) -> &'static str {
    match role {
        Role::Ceo => "/ceo/dashboard",
        Role::SystemAuditor => "/auditor/dashboard",
        Role::GeneralManager => "/gm/dashboard",
        Role::FinanceManager => "/finance/dashboard",
        Role::ProcurementOfficer => "/procurement/dashboard",
        Role::StoreManager => "/store/dashboard",
        Role::StoreController => "/store/controls",
        Role::DepartmentHead => "/department/dashboard",
    }
}

pub fn landing_route_for_roles(roles: &[String]) -> &'static str {
    match highest_priority_role(roles) {
        Some(role) => landing_route(role),
        None => "/login",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::guard::{is_allowed, GuardRequirements};
    use crate::authz::scope::{Scope, ScopeKind};

    fn strings(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn first_recognized_role_wins() {
        assert_eq!(
            landing_route_for_roles(&strings(&["FINANCE_MANAGER", "CEO"])),
            "/ceo/dashboard"
        );
        assert_eq!(
            landing_route_for_roles(&strings(&["STORE_MANAGER"])),
            "/store/dashboard"
        );
    }

    #[test]
    fn unknown_roles_fall_back_to_login() {
        assert_eq!(landing_route_for_roles(&strings(&["SUPERUSER"])), "/login");
        assert_eq!(landing_route_for_roles(&[]), "/login");
    }

    /// Cross-invariant with the guard: every role's landing route must be a
    /// page that role can actually open with its canonical scope shape.
    #[test]
    fn landing_routes_are_reachable_by_their_role() {
        fn dashboard_requirements(role: Role) -> GuardRequirements {
            // each dashboard admits exactly its own role at its own scope kind
            let roles: &'static [Role] = match role {
                Role::Ceo => &[Role::Ceo],
                Role::SystemAuditor => &[Role::SystemAuditor],
                Role::GeneralManager => &[Role::GeneralManager],
                Role::FinanceManager => &[Role::FinanceManager],
                Role::ProcurementOfficer => &[Role::ProcurementOfficer],
                Role::StoreManager => &[Role::StoreManager],
                Role::StoreController => &[Role::StoreController],
                Role::DepartmentHead => &[Role::DepartmentHead],
            };
            GuardRequirements {
                roles,
                require_scope: Some(role.scope_kind()),
                read_only_enforced: false,
            }
        }

        for role in Role::ALL {
            let scope = match role.scope_kind() {
                ScopeKind::Global => Scope::Global,
                ScopeKind::Location => Scope::Location {
                    location_id: "loc_1".to_string(),
                },
                ScopeKind::Department => Scope::Department {
                    location_id: "loc_1".to_string(),
                    department_id: "dep_1".to_string(),
                },
            };

            let req = dashboard_requirements(role);
            assert!(
                is_allowed(&req, role, Some(&scope)),
                "landing route {} must admit {}",
                landing_route(role),
                role
            );
        }
    }
}
