use serde_json::{json, Map, Value};

use crate::filter::sort_newest_first;
use crate::ipc::error::{err, ok, store_err};
use crate::ipc::helpers::{authenticate, authenticate_as, require_gateway, require_str_param, str_param};
use crate::ipc::types::{AppState, Request};
use crate::model::{str_field, Collection, Role, BROADCAST};

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "messages.list" => Some(list(state, req)),
        "messages.get" => Some(get(state, req)),
        "messages.create" => Some(create(state, req)),
        "messages.delete" => Some(delete(state, req)),
        _ => None,
    }
}

/// Whether a message reaches a caller. Admin sees the whole board;
/// faculty and students see their own target groups, with
/// `students-specific` narrowing by year and section under the same
/// broadcast rules the material filter uses.
fn visible_to(message: &Value, role: Role, year: &str, section: &str) -> bool {
    let target = str_field(message, "target").unwrap_or("");
    match role {
        Role::Admin => true,
        Role::Faculty => matches!(target, "all" | "faculty"),
        Role::Student => match target {
            "all" | "students" => true,
            "students-specific" => {
                let target_year = str_field(message, "targetYear").unwrap_or("");
                let year_ok =
                    target_year.is_empty() || target_year == BROADCAST || target_year == year;
                let sections = message
                    .get("targetSections")
                    .and_then(|v| v.as_array())
                    .cloned()
                    .unwrap_or_default();
                let section_ok = sections.is_empty()
                    || sections
                        .iter()
                        .filter_map(|v| v.as_str())
                        .any(|s| s == BROADCAST || s == section);
                year_ok && section_ok
            }
            _ => false,
        },
    }
}

fn list(state: &AppState, req: &Request) -> serde_json::Value {
    let identity = match authenticate(state, req) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let gateway = match require_gateway(state, req) {
        Ok(gw) => gw,
        Err(resp) => return resp,
    };

    // Year/section for student narrowing come from a fresh account
    // lookup, never from anything cached on the identity.
    let (year, section) = if identity.role == Role::Student {
        match gateway.get(Collection::Students, &identity.id) {
            Ok(account) => (
                str_field(&account, "year").unwrap_or("").to_string(),
                str_field(&account, "section").unwrap_or("").to_string(),
            ),
            Err(_) => (String::new(), String::new()),
        }
    } else {
        (String::new(), String::new())
    };

    match gateway.read(Collection::Messages) {
        Ok(records) => {
            let mut messages: Vec<Value> = records
                .into_iter()
                .filter(|m| visible_to(m, identity.role, &year, &section))
                .collect();
            sort_newest_first(&mut messages);
            ok(&req.id, json!({ "messages": messages }))
        }
        Err(e) => store_err(&req.id, &e),
    }
}

fn get(state: &AppState, req: &Request) -> serde_json::Value {
    let identity = match authenticate(state, req) {
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

    let message = match gateway.get(Collection::Messages, &id) {
        Ok(m) => m,
        Err(e) => return store_err(&req.id, &e),
    };
    if identity.role == Role::Student {
        let (year, section) = match gateway.get(Collection::Students, &identity.id) {
            Ok(account) => (
                str_field(&account, "year").unwrap_or("").to_string(),
                str_field(&account, "section").unwrap_or("").to_string(),
            ),
            Err(_) => (String::new(), String::new()),
        };
        if !visible_to(&message, identity.role, &year, &section) {
            return err(&req.id, "not_found", "no such message", None);
        }
    } else if !visible_to(&message, identity.role, "", "") {
        return err(&req.id, "not_found", "no such message", None);
    }
    ok(&req.id, json!({ "message": message }))
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
    match require_str_param(req, "text") {
        Ok(v) => {
            fields.insert("text".to_string(), json!(v));
        }
        Err(resp) => return resp,
    }
    // Target vocabulary is the document store's schema concern, same as
    // the material type.
    match require_str_param(req, "target") {
        Ok(v) => {
            fields.insert("target".to_string(), json!(v));
        }
        Err(resp) => return resp,
    }
    if let Some(v) = str_param(req, "targetYear") {
        fields.insert("targetYear".to_string(), json!(v));
    }
    if let Some(sections) = req.params.get("targetSections") {
        if !sections.is_array() {
            return err(&req.id, "bad_params", "targetSections must be an array", None);
        }
        fields.insert("targetSections".to_string(), sections.clone());
    }
    fields.insert("sender".to_string(), json!(identity.name));
    fields.insert("senderId".to_string(), json!(identity.id));

    match gateway.create(Collection::Messages, fields) {
        Ok(message) => ok(&req.id, json!({ "message": message })),
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
    match gateway.delete(Collection::Messages, &id) {
        Ok(true) => ok(&req.id, json!({ "deleted": true })),
        Ok(false) => err(&req.id, "not_found", "no such message in either store", None),
        Err(e) => store_err(&req.id, &e),
    }
}
