use crate::errors::AppError;
use crate::jwt::AuthUser;

use super::role::Role;
use super::routing::landing_route;
use super::scope::{Scope, ScopeKind};

/// Static access requirements declared per route.
#[derive(Debug, Clone, Copy)]
pub struct GuardRequirements {
    pub roles: &'static [Role],
    pub require_scope: Option<ScopeKind>,
    /// Set on mutating routes: read-only roles are rejected even when the
    /// role and scope checks would pass.
    pub read_only_enforced: bool,
}

/// The guard predicate.
///
/// Evaluation order:
/// 1. role must be a member of the allowed set
/// 2. the session scope must satisfy the required kind; GLOBAL supersedes
///    LOCATION and DEPARTMENT requirements
/// 3. short-circuits on the first failure
///
/// An undetermined scope (`None`) fails every scope requirement.
pub fn is_allowed(req: &GuardRequirements, role: Role, scope: Option<&Scope>) -> bool {
    if !req.roles.contains(&role) {
        return false;
    }

    match req.require_scope {
        None => true,
        Some(ScopeKind::Global) => matches!(scope, Some(Scope::Global)),
        Some(ScopeKind::Location) => match scope {
            Some(Scope::Global) => true,
            Some(Scope::Location { location_id }) => !location_id.is_empty(),
            _ => false,
        },
        Some(ScopeKind::Department) => match scope {
            Some(Scope::Global) => true,
            Some(Scope::Department {
                location_id,
                department_id,
            }) => !location_id.is_empty() && !department_id.is_empty(),
            _ => false,
        },
    }
}

/// Evaluate the guard for a request and turn a denial into a 403 carrying the
/// denied user's own landing route, so the client can bounce them home
/// instead of showing a raw error page.
pub fn assert_route_access(req: &GuardRequirements, auth: &AuthUser) -> Result<(), AppError> {
    if req.read_only_enforced {
        assert_not_read_only(auth.role, "route mutation")?;
    }

    if is_allowed(req, auth.role, auth.scope.as_ref()) {
        return Ok(());
    }

    tracing::warn!(
        user_id = %auth.user_id,
        role = %auth.role,
        required_scope = ?req.require_scope,
        scope = ?auth.scope,
        "route access denied"
    );

    Err(AppError::forbidden_with_redirect(
        format!("[RBAC] Role \"{}\" is not permitted to access this resource", auth.role),
        landing_route(auth.role),
    ))
}

/// Hard override for mutations: read-only roles are blocked from every
/// mutating entry point regardless of any role/scope match. Every handler
/// that mutates state must call this before touching anything.
pub fn assert_not_read_only(role: Role, action: &str) -> Result<(), AppError> {
    if role.is_read_only() {
        tracing::warn!(role = %role, action = %action, "read-only role attempted a mutation");
        return Err(AppError::read_only(format!(
            "[RBAC] Role \"{}\" is read-only. Mutation denied.",
            role
        )));
    }
    Ok(())
}

/// Reject sessions whose derived scope disagrees with the role's canonical
/// scope kind (a CEO without `all_locations`, a department head without a
/// department, an undetermined scope).
pub fn assert_session_shape(auth: &AuthUser) -> Result<&Scope, AppError> {
    let scope = auth.scope.as_ref().ok_or_else(|| {
        AppError::scope_violation(format!(
            "[RBAC] Invalid scope: session for role \"{}\" is undetermined",
            auth.role
        ))
    })?;

    if scope.kind() != auth.role.scope_kind() {
        tracing::warn!(
            user_id = %auth.user_id,
            role = %auth.role,
            scope = ?scope.kind(),
            expected = ?auth.role.scope_kind(),
            "session scope does not match role"
        );
        return Err(AppError::scope_violation(format!(
            "[RBAC] Invalid scope: role \"{}\" requires a {:?} scope",
            auth.role,
            auth.role.scope_kind()
        )));
    }

    Ok(scope)
}

/// Location fence: global sessions pass, everyone else must match their
/// assigned location exactly.
pub fn assert_location_access(auth: &AuthUser, location_id: &str) -> Result<(), AppError> {
    let scope = assert_session_shape(auth)?;

    match scope.location_id() {
        None => Ok(()), // global
        Some(assigned) if assigned == location_id => Ok(()),
        Some(assigned) => {
            tracing::warn!(
                user_id = %auth.user_id,
                role = %auth.role,
                requested_location = %location_id,
                assigned_location = %assigned,
                "cross-location access blocked"
            );
            Err(AppError::scope_violation(format!(
                "[Scope] User cannot access location \"{}\". Assigned location: \"{}\".",
                location_id, assigned
            )))
        }
    }
}

/// Department fence: location access first, then department-scoped roles must
/// match their assigned department. Location- and global-scoped sessions may
/// reach every department inside their location fence.
pub fn assert_department_access(
    auth: &AuthUser,
    location_id: &str,
    department_id: &str,
) -> Result<(), AppError> {
    assert_location_access(auth, location_id)?;

    if let Some(assigned) = auth.scope.as_ref().and_then(Scope::department_id) {
        if assigned != department_id {
            tracing::warn!(
                user_id = %auth.user_id,
                role = %auth.role,
                requested_department = %department_id,
                assigned_department = %assigned,
                "cross-department access blocked"
            );
            return Err(AppError::scope_violation(format!(
                "[Scope] User cannot access department \"{}\". Assigned department: \"{}\".",
                department_id, assigned
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::derive_scope;

    const LOCATION_ROUTE: GuardRequirements = GuardRequirements {
        roles: &[Role::GeneralManager, Role::FinanceManager],
        require_scope: Some(ScopeKind::Location),
        read_only_enforced: false,
    };

    const GLOBAL_ROUTE: GuardRequirements = GuardRequirements {
        roles: &[Role::Ceo, Role::SystemAuditor, Role::GeneralManager],
        require_scope: Some(ScopeKind::Global),
        read_only_enforced: false,
    };

    fn location_scope(id: &str) -> Option<Scope> {
        derive_scope(false, Some(id), None)
    }

    #[test]
    fn role_outside_the_allowed_set_is_denied() {
        let scope = location_scope("loc_1");
        assert!(!is_allowed(&LOCATION_ROUTE, Role::StoreManager, scope.as_ref()));
    }

    #[test]
    fn location_requirement_passes_for_location_scope() {
        let scope = location_scope("loc_1");
        assert!(is_allowed(&LOCATION_ROUTE, Role::GeneralManager, scope.as_ref()));
    }

    #[test]
    fn global_supersedes_location_requirement() {
        assert!(is_allowed(&GLOBAL_ROUTE, Role::Ceo, Some(&Scope::Global)));

        let req = GuardRequirements {
            roles: &[Role::Ceo],
            require_scope: Some(ScopeKind::Location),
            read_only_enforced: false,
        };
        assert!(is_allowed(&req, Role::Ceo, Some(&Scope::Global)));

        let req = GuardRequirements {
            roles: &[Role::Ceo],
            require_scope: Some(ScopeKind::Department),
            read_only_enforced: false,
        };
        assert!(is_allowed(&req, Role::Ceo, Some(&Scope::Global)));
    }

    #[test]
    fn global_requirement_rejects_narrower_scopes() {
        let scope = location_scope("loc_1");
        assert!(!is_allowed(&GLOBAL_ROUTE, Role::GeneralManager, scope.as_ref()));
    }

    #[test]
    fn undetermined_scope_fails_every_requirement_but_none() {
        assert!(!is_allowed(&LOCATION_ROUTE, Role::GeneralManager, None));
        assert!(!is_allowed(&GLOBAL_ROUTE, Role::Ceo, None));

        let open = GuardRequirements {
            roles: &[Role::GeneralManager],
            require_scope: None,
            read_only_enforced: false,
        };
        assert!(is_allowed(&open, Role::GeneralManager, None));
    }

    #[test]
    fn department_requirement_needs_both_identifiers() {
        let req = GuardRequirements {
            roles: &[Role::DepartmentHead],
            require_scope: Some(ScopeKind::Department),
            read_only_enforced: false,
        };

        let full = derive_scope(false, Some("loc_1"), Some("dep_1"));
        assert!(is_allowed(&req, Role::DepartmentHead, full.as_ref()));

        // department id without a location derives to no scope at all
        let partial = derive_scope(false, None, Some("dep_1"));
        assert!(partial.is_none());
        assert!(!is_allowed(&req, Role::DepartmentHead, partial.as_ref()));
    }

    #[test]
    fn read_only_override_rejects_the_auditor() {
        assert!(assert_not_read_only(Role::SystemAuditor, "adjust stock").is_err());
        assert!(assert_not_read_only(Role::StoreManager, "adjust stock").is_ok());
    }
}
