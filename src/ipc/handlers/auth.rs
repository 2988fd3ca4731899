use serde_json::json;

use crate::auth;
use crate::ipc::error::{err, ok, store_err};
use crate::ipc::helpers::{auth_slot, require_gateway, require_str_param};
use crate::ipc::types::{AppState, Request};
use crate::model::{AuthSlot, Role};
use crate::store::StoreError;

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "auth.login" => Some(login(state, req)),
        "auth.logout" => Some(logout(state, req)),
        "auth.me" => Some(me(state, req)),
        _ => None,
    }
}

fn slot_from_role_param(req: &Request) -> Result<AuthSlot, serde_json::Value> {
    let role = require_str_param(req, "role")?;
    match Role::from_str(&role) {
        Some(Role::Admin) => Ok(AuthSlot::Admin),
        Some(Role::Faculty) => Ok(AuthSlot::Faculty),
        Some(Role::Student) => Ok(AuthSlot::Student),
        None => Err(err(
            &req.id,
            "bad_params",
            format!("unknown role: {}", role),
            None,
        )),
    }
}

fn login(state: &AppState, req: &Request) -> serde_json::Value {
    let gateway = match require_gateway(state, req) {
        Ok(gw) => gw,
        Err(resp) => return resp,
    };
    let slot = match slot_from_role_param(req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let login_id = match require_str_param(req, "loginId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let password = match require_str_param(req, "password") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match auth::login(gateway, &state.config, slot, &login_id, &password) {
        Ok(login) => ok(
            &req.id,
            json!({
                "token": login.token,
                "identity": login.identity,
            }),
        ),
        Err(StoreError::InvalidToken) => err(
            &req.id,
            "invalid_credentials",
            "invalid login id or password",
            None,
        ),
        Err(e) => store_err(&req.id, &e),
    }
}

fn logout(state: &AppState, req: &Request) -> serde_json::Value {
    let gateway = match require_gateway(state, req) {
        Ok(gw) => gw,
        Err(resp) => return resp,
    };
    let (slot, token) = match auth_slot(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match auth::logout(gateway, &state.config, &token, slot) {
        Ok(()) => ok(&req.id, json!({ "loggedOut": true })),
        Err(e) => store_err(&req.id, &e),
    }
}

fn me(state: &AppState, req: &Request) -> serde_json::Value {
    let gateway = match require_gateway(state, req) {
        Ok(gw) => gw,
        Err(resp) => return resp,
    };
    let (slot, token) = match auth_slot(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match auth::resolve(gateway, &state.config, &token, slot) {
        Ok(identity) => ok(&req.id, json!({ "identity": identity })),
        Err(e) => store_err(&req.id, &e),
    }
}
