//! Authorization module - roles, scopes, and guard predicates
//!
//! This module implements the role/scope access model:
//! - A closed role registry with fail-closed normalization of raw role strings
//! - A scope tagged union (global / location / department) derived per session
//! - Guard predicates evaluated on every request from the token snapshot
//! - The landing-route mapping used to bounce denied users to their own page

mod guard;
mod role;
mod routing;
mod scope;

pub use guard::{
    assert_department_access, assert_location_access, assert_not_read_only, assert_route_access,
    assert_session_shape, is_allowed, GuardRequirements,
};
pub use role::Role;
pub use routing::{highest_priority_role, landing_route, landing_route_for_roles};
pub use scope::{derive_scope, Scope, ScopeKind};
