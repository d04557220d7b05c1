use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::authz::{AccessDecision, GateOutput, Role};

#[derive(Debug, Serialize, ToSchema)]
pub struct RoleSetResponse {
    pub user_id: Uuid,
    pub roles: Vec<Role>,
    pub loading: bool,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PermissionQuery {
    /// Resource name, e.g. `requests`
    pub resource: String,
    /// Action name, e.g. `create`
    pub action: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PermissionCheckResponse {
    pub resource: String,
    pub action: String,
    pub allowed: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RoleGateRequest {
    pub allowed_roles: Vec<Role>,
    /// Defaults to `true`
    #[serde(default)]
    pub show_error: Option<bool>,
    #[serde(default)]
    pub fallback: Option<String>,
    /// Content returned when access is allowed
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PermissionGateRequest {
    #[schema(example = "requests")]
    pub resource: String,
    #[schema(example = "create")]
    pub action: String,
    #[serde(default)]
    pub fallback: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Rendered {
    Empty,
    Loading,
    Children,
    Fallback,
    DenialNotice,
}

/// Gate evaluation as seen by an HTTP client.
#[derive(Debug, Serialize, ToSchema)]
pub struct GateResponse {
    pub decision: AccessDecision,
    pub rendered: Rendered,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl GateResponse {
    pub fn new(decision: AccessDecision, output: GateOutput<String>) -> Self {
        let (rendered, content) = match output {
            GateOutput::Empty => (Rendered::Empty, None),
            GateOutput::Loading => (Rendered::Loading, None),
            GateOutput::Children(content) => (Rendered::Children, Some(content)),
            GateOutput::Fallback(content) => (Rendered::Fallback, Some(content)),
            GateOutput::DenialNotice(notice) => (Rendered::DenialNotice, Some(notice)),
        };
        Self {
            decision,
            rendered,
            content,
        }
    }
}
