use serde_json::{json, Map, Value};

use crate::ipc::error::{err, ok, store_err};
use crate::ipc::helpers::{
    authenticate, authenticate_as, require_gateway, require_str_param, sanitize_account, str_param,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{record_id, Collection, Role};

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(list_students(state, req)),
        "students.get" => Some(get_account(state, req, Collection::Students)),
        "students.create" => Some(create_student(state, req)),
        "students.update" => Some(update_account(state, req, Collection::Students)),
        "students.delete" => Some(delete_account(state, req, Collection::Students)),
        "faculty.list" => Some(list_faculty(state, req)),
        "faculty.get" => Some(get_account(state, req, Collection::Faculty)),
        "faculty.create" => Some(create_faculty(state, req)),
        "faculty.update" => Some(update_account(state, req, Collection::Faculty)),
        "faculty.delete" => Some(delete_account(state, req, Collection::Faculty)),
        "admin.get" => Some(get_admin(state, req)),
        "admin.create" => Some(create_admin(state, req)),
        "admin.update" => Some(update_admin(state, req)),
        _ => None,
    }
}

fn list_students(state: &AppState, req: &Request) -> serde_json::Value {
    if let Err(resp) = authenticate_as(state, req, &[Role::Admin, Role::Faculty]) {
        return resp;
    }
    let gateway = match require_gateway(state, req) {
        Ok(gw) => gw,
        Err(resp) => return resp,
    };
    match gateway.read(Collection::Students) {
        Ok(records) => {
            let students: Vec<Value> = records.into_iter().map(sanitize_account).collect();
            ok(&req.id, json!({ "students": students }))
        }
        Err(e) => store_err(&req.id, &e),
    }
}

fn list_faculty(state: &AppState, req: &Request) -> serde_json::Value {
    if let Err(resp) = authenticate(state, req) {
        return resp;
    }
    let gateway = match require_gateway(state, req) {
        Ok(gw) => gw,
        Err(resp) => return resp,
    };
    match gateway.read(Collection::Faculty) {
        Ok(records) => {
            let faculty: Vec<Value> = records.into_iter().map(sanitize_account).collect();
            ok(&req.id, json!({ "faculty": faculty }))
        }
        Err(e) => store_err(&req.id, &e),
    }
}

fn get_account(state: &AppState, req: &Request, collection: Collection) -> serde_json::Value {
    let allowed: &[Role] = if collection == Collection::Students {
        &[Role::Admin, Role::Faculty]
    } else {
        &[Role::Admin, Role::Faculty, Role::Student]
    };
    if let Err(resp) = authenticate_as(state, req, allowed) {
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
    match gateway.get(collection, &id) {
        Ok(record) => ok(&req.id, json!({ "account": sanitize_account(record) })),
        Err(e) => store_err(&req.id, &e),
    }
}

fn create_student(state: &AppState, req: &Request) -> serde_json::Value {
    if let Err(resp) = authenticate_as(state, req, &[Role::Admin]) {
        return resp;
    }
    let gateway = match require_gateway(state, req) {
        Ok(gw) => gw,
        Err(resp) => return resp,
    };

    let mut fields = Map::new();
    for required in ["sid", "name", "password"] {
        match require_str_param(req, required) {
            Ok(v) => {
                fields.insert(required.to_string(), json!(v));
            }
            Err(resp) => return resp,
        }
    }
    for optional in ["email", "year", "section", "branch"] {
        if let Some(v) = str_param(req, optional) {
            fields.insert(optional.to_string(), json!(v));
        }
    }
    fields.insert("role".to_string(), json!("student"));
    fields.insert("token".to_string(), Value::Null);

    match gateway.create(Collection::Students, fields) {
        Ok(record) => ok(&req.id, json!({ "student": sanitize_account(record) })),
        Err(e) => store_err(&req.id, &e),
    }
}

fn create_faculty(state: &AppState, req: &Request) -> serde_json::Value {
    if let Err(resp) = authenticate_as(state, req, &[Role::Admin]) {
        return resp;
    }
    let gateway = match require_gateway(state, req) {
        Ok(gw) => gw,
        Err(resp) => return resp,
    };

    let mut fields = Map::new();
    for required in ["facultyId", "name", "password"] {
        match require_str_param(req, required) {
            Ok(v) => {
                fields.insert(required.to_string(), json!(v));
            }
            Err(resp) => return resp,
        }
    }
    for optional in ["email", "department"] {
        if let Some(v) = str_param(req, optional) {
            fields.insert(optional.to_string(), json!(v));
        }
    }
    fields.insert("role".to_string(), json!("faculty"));
    fields.insert("token".to_string(), Value::Null);

    match gateway.create(Collection::Faculty, fields) {
        Ok(record) => ok(&req.id, json!({ "faculty": sanitize_account(record) })),
        Err(e) => store_err(&req.id, &e),
    }
}

/// Business keys (sid, facultyId) are not patchable; identity-bearing
/// fields only change through delete and re-create.
fn patchable_fields(collection: Collection) -> &'static [&'static str] {
    match collection {
        Collection::Students => &["name", "email", "year", "section", "branch", "password"],
        Collection::Faculty => &["name", "email", "department", "password"],
        _ => &["name", "password"],
    }
}

fn collect_patch(
    req: &Request,
    allowed: &'static [&'static str],
) -> Result<Map<String, Value>, serde_json::Value> {
    let Some(patch_src) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return Err(err(&req.id, "bad_params", "missing/invalid patch", None));
    };

    let mut patch = Map::new();
    for field in allowed {
        if let Some(v) = patch_src.get(*field) {
            match v.as_str() {
                Some(s) if !s.trim().is_empty() => {
                    patch.insert(field.to_string(), json!(s.trim()));
                }
                _ => {
                    return Err(err(
                        &req.id,
                        "bad_params",
                        format!("patch.{} must be a non-empty string", field),
                        None,
                    ));
                }
            }
        }
    }
    if patch.is_empty() {
        return Err(err(
            &req.id,
            "bad_params",
            "patch must include at least one field",
            None,
        ));
    }
    Ok(patch)
}

fn update_account(state: &AppState, req: &Request, collection: Collection) -> serde_json::Value {
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
    let patch = match collect_patch(req, patchable_fields(collection)) {
        Ok(p) => p,
        Err(resp) => return resp,
    };

    match gateway.update(collection, &id, &patch) {
        Ok(record) => ok(&req.id, json!({ "account": sanitize_account(record) })),
        Err(e) => store_err(&req.id, &e),
    }
}

fn delete_account(state: &AppState, req: &Request, collection: Collection) -> serde_json::Value {
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

    match gateway.delete(collection, &id) {
        Ok(true) => ok(&req.id, json!({ "deleted": true })),
        Ok(false) => err(&req.id, "not_found", "no such record in either store", None),
        Err(e) => store_err(&req.id, &e),
    }
}

fn get_admin(state: &AppState, req: &Request) -> serde_json::Value {
    if let Err(resp) = authenticate_as(state, req, &[Role::Admin]) {
        return resp;
    }
    let gateway = match require_gateway(state, req) {
        Ok(gw) => gw,
        Err(resp) => return resp,
    };
    match gateway.read(Collection::Admin) {
        Ok(records) => match records.into_iter().next() {
            Some(record) => ok(&req.id, json!({ "admin": sanitize_account(record) })),
            None => err(&req.id, "not_found", "no admin account on record", None),
        },
        Err(e) => store_err(&req.id, &e),
    }
}

/// Seeds the admin singleton. Reachable through the break-glass identity
/// on a fresh workspace, which is how the first real admin account comes
/// to exist.
fn create_admin(state: &AppState, req: &Request) -> serde_json::Value {
    if let Err(resp) = authenticate_as(state, req, &[Role::Admin]) {
        return resp;
    }
    let gateway = match require_gateway(state, req) {
        Ok(gw) => gw,
        Err(resp) => return resp,
    };

    let mut fields = Map::new();
    for required in ["adminId", "name", "password"] {
        match require_str_param(req, required) {
            Ok(v) => {
                fields.insert(required.to_string(), json!(v));
            }
            Err(resp) => return resp,
        }
    }
    fields.insert("role".to_string(), json!("admin"));
    fields.insert("token".to_string(), Value::Null);

    match gateway.create(Collection::Admin, fields) {
        Ok(record) => ok(&req.id, json!({ "admin": sanitize_account(record) })),
        Err(e) => store_err(&req.id, &e),
    }
}

fn update_admin(state: &AppState, req: &Request) -> serde_json::Value {
    if let Err(resp) = authenticate_as(state, req, &[Role::Admin]) {
        return resp;
    }
    let gateway = match require_gateway(state, req) {
        Ok(gw) => gw,
        Err(resp) => return resp,
    };
    let patch = match collect_patch(req, patchable_fields(Collection::Admin)) {
        Ok(p) => p,
        Err(resp) => return resp,
    };

    let admin_id = match gateway.read(Collection::Admin) {
        Ok(records) => records
            .into_iter()
            .next()
            .and_then(|r| record_id(&r).map(str::to_string)),
        Err(e) => return store_err(&req.id, &e),
    };
    let Some(admin_id) = admin_id else {
        return err(&req.id, "not_found", "no admin account on record", None);
    };

    match gateway.update(Collection::Admin, &admin_id, &patch) {
        Ok(record) => ok(&req.id, json!({ "admin": sanitize_account(record) })),
        Err(e) => store_err(&req.id, &e),
    }
}
