use serde_json::{json, Map};

use crate::filter::{list_merged, ListQuery};
use crate::ipc::error::{err, ok, store_err};
use crate::ipc::helpers::{authenticate, authenticate_as, require_gateway, require_str_param, str_param};
use crate::ipc::types::{AppState, Request};
use crate::model::{Collection, Role};

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "courses.list" => Some(list(state, req)),
        "courses.get" => Some(get(state, req)),
        "courses.create" => Some(create(state, req)),
        "courses.update" => Some(update(state, req)),
        "courses.delete" => Some(delete(state, req)),
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
    let query = ListQuery::from_params(&req.params);
    match list_merged(gateway, Collection::Courses, &query) {
        Ok(courses) => ok(&req.id, json!({ "courses": courses })),
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
    match gateway.get(Collection::Courses, &id) {
        Ok(course) => ok(&req.id, json!({ "course": course })),
        Err(e) => store_err(&req.id, &e),
    }
}

fn create(state: &AppState, req: &Request) -> serde_json::Value {
    if let Err(resp) = authenticate_as(state, req, &[Role::Admin]) {
        return resp;
    }
    let gateway = match require_gateway(state, req) {
        Ok(gw) => gw,
        Err(resp) => return resp,
    };

    let mut fields = Map::new();
    for required in ["code", "name"] {
        match require_str_param(req, required) {
            Ok(v) => {
                fields.insert(required.to_string(), json!(v));
            }
            Err(resp) => return resp,
        }
    }
    for optional in ["branch", "year", "semester", "description"] {
        if let Some(v) = str_param(req, optional) {
            fields.insert(optional.to_string(), json!(v));
        }
    }
    if let Some(credits) = req.params.get("credits") {
        if !credits.is_number() {
            return err(&req.id, "bad_params", "credits must be a number", None);
        }
        fields.insert("credits".to_string(), credits.clone());
    }
    if let Some(sections) = req.params.get("sections") {
        if !sections.is_array() {
            return err(&req.id, "bad_params", "sections must be an array", None);
        }
        fields.insert("sections".to_string(), sections.clone());
    }

    match gateway.create(Collection::Courses, fields) {
        Ok(course) => ok(&req.id, json!({ "course": course })),
        Err(e) => store_err(&req.id, &e),
    }
}

fn update(state: &AppState, req: &Request) -> serde_json::Value {
    if let Err(resp) = authenticate_as(state, req, &[Role::Admin]) {
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
    let Some(patch_src) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "missing/invalid patch", None);
    };

    // `code` stays immutable; it is the cross-store business key.
    let mut patch = Map::new();
    for field in ["name", "branch", "year", "semester", "description"] {
        if let Some(v) = patch_src.get(field) {
            match v.as_str() {
                Some(s) if !s.trim().is_empty() => {
                    patch.insert(field.to_string(), json!(s.trim()));
                }
                _ => {
                    return err(
                        &req.id,
                        "bad_params",
                        format!("patch.{} must be a non-empty string", field),
                        None,
                    );
                }
            }
        }
    }
    if let Some(credits) = patch_src.get("credits") {
        if !credits.is_number() {
            return err(&req.id, "bad_params", "patch.credits must be a number", None);
        }
        patch.insert("credits".to_string(), credits.clone());
    }
    if let Some(sections) = patch_src.get("sections") {
        if !sections.is_array() {
            return err(&req.id, "bad_params", "patch.sections must be an array", None);
        }
        patch.insert("sections".to_string(), sections.clone());
    }
    if patch.is_empty() {
        return err(
            &req.id,
            "bad_params",
            "patch must include at least one field",
            None,
        );
    }

    match gateway.update(Collection::Courses, &id, &patch) {
        Ok(course) => ok(&req.id, json!({ "course": course })),
        Err(e) => store_err(&req.id, &e),
    }
}

fn delete(state: &AppState, req: &Request) -> serde_json::Value {
    if let Err(resp) = authenticate_as(state, req, &[Role::Admin]) {
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
    match gateway.delete(Collection::Courses, &id) {
        Ok(true) => ok(&req.id, json!({ "deleted": true })),
        Ok(false) => err(&req.id, "not_found", "no such course in either store", None),
        Err(e) => store_err(&req.id, &e),
    }
}
