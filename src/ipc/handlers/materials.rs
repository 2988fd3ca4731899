use serde_json::{json, Map, Value};

use crate::filter::{list_merged, ListQuery};
use crate::ipc::error::{err, ok, store_err};
use crate::ipc::helpers::{authenticate, authenticate_as, require_gateway, require_str_param, str_param};
use crate::ipc::types::{AppState, Request};
use crate::model::{str_field, Collection, Identity, Role, BROADCAST};

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "materials.list" => Some(list(state, req)),
        "materials.get" => Some(get(state, req)),
        "materials.create" => Some(create(state, req)),
        "materials.update" => Some(update(state, req)),
        "materials.delete" => Some(delete(state, req)),
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
    match list_merged(gateway, Collection::Materials, &query) {
        Ok(materials) => ok(&req.id, json!({ "materials": materials })),
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
    match gateway.get(Collection::Materials, &id) {
        Ok(material) => ok(&req.id, json!({ "material": material })),
        Err(e) => store_err(&req.id, &e),
    }
}

fn create(state: &AppState, req: &Request) -> serde_json::Value {
    let identity = match authenticate_as(state, req, &[Role::Admin, Role::Faculty]) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let gateway = match require_gateway(state, req) {
        Ok(gw) => gw,
        Err(resp) => return resp,
    };

    let mut fields = Map::new();
    match require_str_param(req, "title") {
        Ok(v) => {
            fields.insert("title".to_string(), json!(v));
        }
        Err(resp) => return resp,
    }
    // The material type vocabulary is the document store's schema
    // concern; an off-vocabulary type takes the continue-to-fallback
    // path.
    match require_str_param(req, "type") {
        Ok(v) => {
            fields.insert("type".to_string(), json!(v));
        }
        Err(resp) => return resp,
    }
    for optional in [
        "description",
        "url",
        "subject",
        "module",
        "unit",
        "topic",
        "course",
    ] {
        if let Some(v) = str_param(req, optional) {
            fields.insert(optional.to_string(), json!(v));
        }
    }
    // Targeting fields default to broadcast: an upload with no audience
    // narrowing reaches everyone.
    for targeted in ["year", "section", "branch"] {
        let value = str_param(req, targeted).unwrap_or_else(|| BROADCAST.to_string());
        fields.insert(targeted.to_string(), json!(value));
    }
    fields.insert("uploaderId".to_string(), json!(identity.id));
    fields.insert("uploaderRole".to_string(), json!(identity.role.as_str()));

    match gateway.create(Collection::Materials, fields) {
        Ok(material) => ok(&req.id, json!({ "material": material })),
        Err(e) => store_err(&req.id, &e),
    }
}

/// Uploader or admin only.
fn may_modify(identity: &Identity, material: &Value) -> bool {
    identity.role == Role::Admin || str_field(material, "uploaderId") == Some(identity.id.as_str())
}

fn update(state: &AppState, req: &Request) -> serde_json::Value {
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

    let material = match gateway.get(Collection::Materials, &id) {
        Ok(m) => m,
        Err(e) => return store_err(&req.id, &e),
    };
    if !may_modify(&identity, &material) {
        return err(
            &req.id,
            "forbidden",
            "only the uploader or an admin may edit a material",
            None,
        );
    }

    let Some(patch_src) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "missing/invalid patch", None);
    };
    let mut patch = Map::new();
    for field in [
        "title",
        "description",
        "url",
        "type",
        "subject",
        "year",
        "section",
        "branch",
        "module",
        "unit",
        "topic",
        "course",
    ] {
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
    if patch.is_empty() {
        return err(
            &req.id,
            "bad_params",
            "patch must include at least one field",
            None,
        );
    }

    match gateway.update(Collection::Materials, &id, &patch) {
        Ok(material) => ok(&req.id, json!({ "material": material })),
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

    let material = match gateway.get(Collection::Materials, &id) {
        Ok(m) => m,
        Err(e) => return store_err(&req.id, &e),
    };
    if !may_modify(&identity, &material) {
        return err(
            &req.id,
            "forbidden",
            "only the uploader or an admin may delete a material",
            None,
        );
    }

    match gateway.delete(Collection::Materials, &id) {
        Ok(true) => {
            remove_underlying_file(state, &material);
            ok(&req.id, json!({ "deleted": true }))
        }
        Ok(false) => err(&req.id, "not_found", "no such material in either store", None),
        Err(e) => store_err(&req.id, &e),
    }
}

/// Best-effort cleanup of the uploaded file a material points at. Only
/// paths inside the workspace uploads directory are touched; anything
/// else (external URLs, absolute paths) is left alone, and failures are
/// ignored.
fn remove_underlying_file(state: &AppState, material: &Value) {
    let Some(workspace) = &state.workspace else {
        return;
    };
    let Some(url) = str_field(material, "url") else {
        return;
    };
    let relative = url.trim_start_matches('/');
    if !relative.starts_with("uploads/") || relative.contains("..") {
        return;
    }
    let candidate = workspace.join(relative);
    if candidate.is_file() {
        let _ = std::fs::remove_file(candidate);
    }
}
