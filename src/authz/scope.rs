use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Breadth of data a session may access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScopeKind {
    Global,
    Location,
    Department,
}

/// A session's data scope as a tagged union. A department scope always
/// carries its location; a global scope carries nothing. There is no
/// "undetermined" variant - `derive_scope` returns `None` for sessions whose
/// identifiers do not form a valid scope, and `None` fails every scope check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Scope {
    Global,
    Location { location_id: String },
    Department { location_id: String, department_id: String },
}

impl Scope {
    pub fn kind(&self) -> ScopeKind {
        match self {
            Scope::Global => ScopeKind::Global,
            Scope::Location { .. } => ScopeKind::Location,
            Scope::Department { .. } => ScopeKind::Department,
        }
    }

    pub fn location_id(&self) -> Option<&str> {
        match self {
            Scope::Global => None,
            Scope::Location { location_id } | Scope::Department { location_id, .. } => {
                Some(location_id.as_str())
            }
        }
    }

    pub fn department_id(&self) -> Option<&str> {
        match self {
            Scope::Department { department_id, .. } => Some(department_id.as_str()),
            _ => None,
        }
    }
}

/// Compute a session's scope from the raw identifiers carried by the auth
/// response. Pure and total; performs no I/O.
///
/// - `all_locations` wins outright: the scope is global and any stray
///   location/department identifiers are ignored.
/// - A department id is only meaningful together with a location id.
/// - Anything else is undetermined (`None`) and fails every scope check.
pub fn derive_scope(
    all_locations: bool,
    location_id: Option<&str>,
    department_id: Option<&str>,
) -> Option<Scope> {
    let location_id = location_id.map(str::trim).filter(|id| !id.is_empty());
    let department_id = department_id.map(str::trim).filter(|id| !id.is_empty());

    if all_locations {
        return Some(Scope::Global);
    }

    match (location_id, department_id) {
        (Some(loc), Some(dept)) => Some(Scope::Department {
            location_id: loc.to_string(),
            department_id: dept.to_string(),
        }),
        (Some(loc), None) => Some(Scope::Location {
            location_id: loc.to_string(),
        }),
        (None, _) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_locations_is_always_global() {
        assert_eq!(derive_scope(true, None, None), Some(Scope::Global));
        // stray identifiers are ignored
        assert_eq!(derive_scope(true, Some("loc_1"), Some("dep_1")), Some(Scope::Global));
    }

    #[test]
    fn location_and_department_make_a_department_scope() {
        let scope = derive_scope(false, Some("loc_1"), Some("dep_kitchen"));
        assert_eq!(
            scope,
            Some(Scope::Department {
                location_id: "loc_1".to_string(),
                department_id: "dep_kitchen".to_string(),
            })
        );
    }

    #[test]
    fn location_alone_makes_a_location_scope() {
        let scope = derive_scope(false, Some("loc_1"), None);
        assert_eq!(scope.as_ref().and_then(Scope::location_id), Some("loc_1"));
        assert_eq!(scope.map(|s| s.kind()), Some(ScopeKind::Location));
    }

    #[test]
    fn department_without_location_is_undetermined() {
        assert_eq!(derive_scope(false, None, Some("dep_kitchen")), None);
    }

    #[test]
    fn empty_identifiers_count_as_absent() {
        assert_eq!(derive_scope(false, Some(""), None), None);
        assert_eq!(derive_scope(false, Some("  "), Some("dep_1")), None);
        assert_eq!(
            derive_scope(false, Some("loc_1"), Some("")).map(|s| s.kind()),
            Some(ScopeKind::Location)
        );
    }
}
