use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::authz::Role;

// =============================================================================
// USER-ROLE ASSIGNMENT
// =============================================================================

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignRoleRequest {
    pub role: Role,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AssignmentResponse {
    /// `false` when the assignment already existed
    pub created: bool,
}

// =============================================================================
// ROLE-PERMISSION GRANTS
// =============================================================================

#[derive(Debug, Deserialize, ToSchema)]
pub struct GrantRequest {
    pub role: Role,
    #[schema(example = "requests")]
    pub resource: String,
    #[schema(example = "assign")]
    pub action: String,
}
