//! Authorization resolution.
//!
//! - [`RoleStore`]: the current principal's role set, refreshed from the
//!   role change feed
//! - [`PermissionChecker`]: `(resource, action)` checks against the grant table
//! - [`RoleGate`] / [`PermissionGate`]: hold back protected content until a
//!   decision exists
//! - [`guard`]: axum middleware applying the gates to route subtrees,
//!   honouring [`AuthzMode`]
//!
//! Every failure below this boundary collapses to "no access"; callers never
//! see a store error, only a denial.

mod evaluator;
mod gate;
pub mod guard;
mod principal;
mod repository;
mod role;
mod role_store;

pub use evaluator::PermissionChecker;
pub use gate::{AccessDecision, GateOutput, PermissionGate, RoleGate};
pub use principal::{AuthProvider, SessionAuth, StaticPrincipal};
pub use repository::{RoleGrant, RoleRepository, SqliteRoleRepository, UserRole};
pub use role::{join_roles, Role};
pub use role_store::{RoleSet, RoleStore};

/// Errors raised at the store boundary. They are logged and converted to a
/// denial before reaching any gate.
#[derive(thiserror::Error, Debug)]
pub enum AccessError {
    #[error("role store query failed: {0}")]
    StoreQueryFailed(String),
    #[error("unrecognized role: {0}")]
    UnrecognizedRole(String),
}

impl From<sqlx::Error> for AccessError {
    fn from(value: sqlx::Error) -> Self {
        Self::StoreQueryFailed(value.to_string())
    }
}

/// Authorization enforcement mode for the route guards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthzMode {
    /// No permission checks (development mode)
    Off,
    /// Log denials but allow requests (testing mode)
    Advisory,
    /// Enforce 403 on denied requests (production mode)
    #[default]
    Strict,
}

impl AuthzMode {
    /// Unknown values fall back to `Strict`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "off" => AuthzMode::Off,
            "advisory" => AuthzMode::Advisory,
            _ => AuthzMode::Strict,
        }
    }
}

/// Well-known `(resource, action)` pairs used by the service's own routes.
pub mod permissions {
    pub const USERS: &str = "users";
    pub const MANAGE: &str = "manage";
}

#[cfg(test)]
pub(crate) mod testing;
