use serde_json::Value;

#[test]
fn openapi_has_gate_request_fields() -> anyhow::Result<()> {
    // Build the OpenAPI document the same way the server does
    let doc = estate_gate::docs::build_openapi(8000)?;
    let v = serde_json::to_value(&doc)?;

    let schemas = v
        .get("components")
        .and_then(Value::as_object)
        .and_then(|c| c.get("schemas"))
        .and_then(Value::as_object)
        .expect("components.schemas must exist");

    let role_gate = schemas
        .get("RoleGateRequest")
        .and_then(|s| s.get("properties"))
        .and_then(Value::as_object)
        .expect("RoleGateRequest.properties must exist");
    for k in ["allowed_roles", "show_error", "fallback", "content"] {
        assert!(role_gate.contains_key(k), "RoleGateRequest schema missing '{}'", k);
    }

    let gate_response = schemas
        .get("GateResponse")
        .and_then(|s| s.get("properties"))
        .and_then(Value::as_object)
        .expect("GateResponse.properties must exist");
    for k in ["decision", "rendered", "content"] {
        assert!(gate_response.contains_key(k), "GateResponse schema missing '{}'", k);
    }

    let decisions: Vec<&str> = schemas
        .get("AccessDecision")
        .and_then(|s| s.get("enum"))
        .and_then(Value::as_array)
        .expect("AccessDecision must be an enum")
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert_eq!(decisions, ["pending", "allowed", "denied"]);

    Ok(())
}

#[test]
fn rbac_paths_require_bearer_auth() -> anyhow::Result<()> {
    let doc = estate_gate::docs::build_openapi(8000)?;
    let v = serde_json::to_value(&doc)?;

    let security = &v["paths"]["/rbac/users/{user_id}/roles"]["post"]["security"];
    assert!(
        security.as_array().map(|s| !s.is_empty()).unwrap_or(false),
        "assign role must declare bearer security, got {}",
        security
    );

    Ok(())
}
