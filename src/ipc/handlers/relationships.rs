use serde_json::{json, Map};

use crate::ipc::error::{err, ok, store_err};
use crate::ipc::helpers::{authenticate, authenticate_as, require_gateway, require_str_param, str_param};
use crate::ipc::types::{AppState, Request};
use crate::model::{str_field, Collection, Role};
use crate::store::matches_filter;

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "relationships.list" => Some(list(state, req)),
        "relationships.get" => Some(get(state, req)),
        "relationships.create" => Some(create(state, req)),
        "relationships.delete" => Some(delete(state, req)),
        _ => None,
    }
}

fn list(state: &AppState, req: &Request) -> serde_json::Value {
    if let Err(resp) = authenticate(state, req) {
        return resp;
    }
    let gateway = match require_gateway(state, req) {
        Ok(gw) => gw,
        Err(resp) => return resp,
    };

    let mut constraints: Vec<(String, String)> = Vec::new();
    for field in ["studentId", "facultyId"] {
        if let Some(v) = str_param(req, field) {
            constraints.push((field.to_string(), v));
        }
    }

    match gateway.read(Collection::Relationships) {
        Ok(records) => {
            let relationships: Vec<_> = records
                .into_iter()
                .filter(|r| matches_filter(r, &constraints))
                .collect();
            ok(&req.id, json!({ "relationships": relationships }))
        }
        Err(e) => store_err(&req.id, &e),
    }
}

fn get(state: &AppState, req: &Request) -> serde_json::Value {
    if let Err(resp) = authenticate(state, req) {
        return resp;
    }
    let gateway = match require_gateway(state, req) {
        Ok(gw) => gw,
        Err(resp) => return resp,
    };
    let id = match require_str_param(req, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match gateway.get(Collection::Relationships, &id) {
        Ok(relationship) => ok(&req.id, json!({ "relationship": relationship })),
        Err(e) => store_err(&req.id, &e),
    }
}

fn create(state: &AppState, req: &Request) -> serde_json::Value {
    if let Err(resp) = authenticate_as(state, req, &[Role::Admin, Role::Faculty]) {
        return resp;
    }
    let gateway = match require_gateway(state, req) {
        Ok(gw) => gw,
        Err(resp) => return resp,
    };

    let mut fields = Map::new();
    for required in ["studentId", "facultyId"] {
        match require_str_param(req, required) {
            Ok(v) => {
                fields.insert(required.to_string(), json!(v));
            }
            Err(resp) => return resp,
        }
    }

    // The (studentId, facultyId) pair is the unique key; a duplicate link
    // in either store fails with duplicate_key.
    match gateway.create(Collection::Relationships, fields) {
        Ok(relationship) => ok(&req.id, json!({ "relationship": relationship })),
        Err(e) => store_err(&req.id, &e),
    }
}

fn delete(state: &AppState, req: &Request) -> serde_json::Value {
    let identity = match authenticate_as(state, req, &[Role::Admin, Role::Faculty]) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let gateway = match require_gateway(state, req) {
        Ok(gw) => gw,
        Err(resp) => return resp,
    };
    let id = match require_str_param(req, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    if identity.role == Role::Faculty {
        let relationship = match gateway.get(Collection::Relationships, &id) {
            Ok(r) => r,
            Err(e) => return store_err(&req.id, &e),
        };
        if str_field(&relationship, "facultyId") != Some(identity.id.as_str()) {
            return err(
                &req.id,
                "forbidden",
                "faculty may only remove their own links",
                None,
            );
        }
    }

    match gateway.delete(Collection::Relationships, &id) {
        Ok(true) => ok(&req.id, json!({ "deleted": true })),
        Ok(false) => err(&req.id, "not_found", "no such link in either store", None),
        Err(e) => store_err(&req.id, &e),
    }
}
