use std::path::PathBuf;

use serde_json::json;

use crate::gateway::Gateway;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(health(state, req)),
        "workspace.select" => Some(workspace_select(state, req)),
        _ => None,
    }
}

fn health(state: &AppState, req: &Request) -> serde_json::Value {
    let document_store = match &state.gateway {
        Some(gw) if gw.document().is_some() => "online",
        Some(_) => "fallback-only",
        None => "unbound",
    };
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "documentStore": document_store,
        }),
    )
}

fn workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    match Gateway::open(&path) {
        Ok(gateway) => {
            let document_store = if gateway.document().is_some() {
                "online"
            } else {
                "fallback-only"
            };
            state.workspace = Some(path.clone());
            state.gateway = Some(gateway);
            ok(
                &req.id,
                json!({
                    "workspacePath": path.to_string_lossy(),
                    "documentStore": document_store,
                }),
            )
        }
        Err(e) => err(&req.id, "workspace_open_failed", format!("{e:?}"), None),
    }
}
