use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::AccessError;

/// Closed set of roles a principal can hold. Roles are flat: holding one
/// never implies holding another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    Staff,
    Technician,
    Vendor,
    Customer,
    Dispatcher,
    Finance,
}

impl Role {
    pub const ALL: [Role; 8] = [
        Role::Admin,
        Role::Manager,
        Role::Staff,
        Role::Technician,
        Role::Vendor,
        Role::Customer,
        Role::Dispatcher,
        Role::Finance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Staff => "staff",
            Role::Technician => "technician",
            Role::Vendor => "vendor",
            Role::Customer => "customer",
            Role::Dispatcher => "dispatcher",
            Role::Finance => "finance",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AccessError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "admin" => Ok(Role::Admin),
            "manager" => Ok(Role::Manager),
            "staff" => Ok(Role::Staff),
            "technician" => Ok(Role::Technician),
            "vendor" => Ok(Role::Vendor),
            "customer" => Ok(Role::Customer),
            "dispatcher" => Ok(Role::Dispatcher),
            "finance" => Ok(Role::Finance),
            other => Err(AccessError::UnrecognizedRole(other.to_string())),
        }
    }
}

/// Join roles with `", "` for human-readable messages.
pub fn join_roles(roles: &[Role]) -> String {
    roles.iter().map(Role::as_str).collect::<Vec<_>>().join(", ")
}
