use std::path::PathBuf;

use serde_json::json;

use crate::backup;
use crate::gateway::Gateway;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{authenticate_as, require_str_param};
use crate::ipc::types::{AppState, Request};
use crate::model::Role;

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "backup.exportStoreBundle" => Some(export(state, req)),
        "backup.importStoreBundle" => Some(import(state, req)),
        _ => None,
    }
}

fn export(state: &AppState, req: &Request) -> serde_json::Value {
    if let Err(resp) = authenticate_as(state, req, &[Role::Admin]) {
        return resp;
    }
    let Some(workspace) = state.workspace.clone() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let out_path = match require_str_param(req, "outPath") {
        Ok(v) => PathBuf::from(v),
        Err(resp) => return resp,
    };

    match backup::export_store_bundle(&workspace, &out_path) {
        Ok(summary) => ok(
            &req.id,
            json!({
                "bundleFormat": summary.bundle_format,
                "entryCount": summary.entry_count,
                "outPath": out_path.to_string_lossy(),
            }),
        ),
        Err(e) => err(&req.id, "backup_export_failed", format!("{e:#}"), None),
    }
}

fn import(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(resp) = authenticate_as(state, req, &[Role::Admin]) {
        return resp;
    }
    let Some(workspace) = state.workspace.clone() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let in_path = match require_str_param(req, "inPath") {
        Ok(v) => PathBuf::from(v),
        Err(resp) => return resp,
    };

    let summary = match backup::import_store_bundle(&in_path, &workspace) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "backup_import_failed", format!("{e:#}"), None),
    };

    // The database file was just swapped out from under the open
    // connection; rebind the gateway so reads see the imported store.
    match Gateway::open(&workspace) {
        Ok(gateway) => {
            state.gateway = Some(gateway);
            ok(
                &req.id,
                json!({
                    "bundleFormatDetected": summary.bundle_format_detected,
                    "entryCount": summary.entry_count,
                }),
            )
        }
        Err(e) => err(&req.id, "workspace_open_failed", format!("{e:?}"), None),
    }
}
