use serde_json::Value;

use crate::auth;
use crate::gateway::Gateway;
use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};
use crate::model::{AuthSlot, Identity, Role};

/// Handlers either get the gateway or an error response to return as-is.
pub fn require_gateway<'a>(state: &'a AppState, req: &Request) -> Result<&'a Gateway, Value> {
    state.gateway.as_ref().ok_or_else(|| {
        err(
            &req.id,
            "no_workspace",
            "select a workspace first",
            None,
        )
    })
}

pub fn str_param(req: &Request, field: &str) -> Option<String> {
    req.params
        .get(field)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

pub fn require_str_param(req: &Request, field: &str) -> Result<String, Value> {
    str_param(req, field)
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", field), None))
}

/// Which bearer slot the request used, and the token it carried. Exactly
/// one of the three slot params must be present; the slot is decided here,
/// once, and travels as a value from then on.
pub fn auth_slot(req: &Request) -> Result<(AuthSlot, String), Value> {
    let slots = [AuthSlot::Admin, AuthSlot::Faculty, AuthSlot::Student];
    let mut found: Option<(AuthSlot, String)> = None;
    for slot in slots {
        if let Some(token) = str_param(req, slot.param_name()) {
            if found.is_some() {
                return Err(err(
                    &req.id,
                    "bad_params",
                    "pass exactly one of adminToken, facultyToken, studentToken",
                    None,
                ));
            }
            found = Some((slot, token));
        }
    }
    found.ok_or_else(|| err(&req.id, "invalid_token", "missing bearer token", None))
}

/// Resolve the caller once per request.
pub fn authenticate(state: &AppState, req: &Request) -> Result<Identity, Value> {
    let gateway = require_gateway(state, req)?;
    let (slot, token) = auth_slot(req)?;
    auth::resolve(gateway, &state.config, &token, slot)
        .map_err(|e| err(&req.id, e.code(), e.to_string(), None))
}

/// Resolve the caller and require one of the allowed roles.
pub fn authenticate_as(
    state: &AppState,
    req: &Request,
    allowed: &[Role],
) -> Result<Identity, Value> {
    let identity = authenticate(state, req)?;
    if !allowed.contains(&identity.role) {
        return Err(err(
            &req.id,
            "forbidden",
            format!("{} may not call {}", identity.role.as_str(), req.method),
            None,
        ));
    }
    Ok(identity)
}

/// Strip session and credential fields before an account record goes back
/// over the wire.
pub fn sanitize_account(mut record: Value) -> Value {
    if let Some(obj) = record.as_object_mut() {
        obj.remove("password");
        obj.remove("token");
    }
    record
}
