use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{finish, respond};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::info;

fn handle_health(state: &mut AppState, req: &Request) -> Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "backend": state.store.status().backend,
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    match state.open_workspace(&path) {
        Ok(()) => ok(&req.id, json!({ "workspacePath": path.to_string_lossy() })),
        Err(e) => err(&req.id, "db_open_failed", format!("{e:?}"), None),
    }
}

fn handle_workspace_memory(state: &mut AppState, req: &Request) -> Value {
    state.close_workspace();
    ok(&req.id, json!({ "backend": state.store.status().backend }))
}

fn handle_store_status(state: &mut AppState, req: &Request) -> Value {
    respond(req, state.store.status())
}

fn handle_store_get(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let Some(key) = req.params.get("key").and_then(|v| v.as_str()) else {
        return Err(err(&req.id, "bad_params", "missing params.key", None));
    };
    Ok(ok(
        &req.id,
        json!({ "key": key, "value": state.store.peek(key) }),
    ))
}

/// Drops one key, or every key when `params.key` is omitted.
fn handle_store_reset(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    match req.params.get("key").and_then(|v| v.as_str()) {
        Some(key) => {
            state.store.remove(key);
            info!(key, "store key reset");
            Ok(ok(&req.id, json!({ "reset": [key] })))
        }
        None => {
            let keys = state.store.status().keys;
            state
                .store
                .restore(&BTreeMap::new())
                .map_err(|e| err(&req.id, "io_failed", e.to_string(), None))?;
            Ok(ok(&req.id, json!({ "reset": keys })))
        }
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        "workspace.memory" => Some(handle_workspace_memory(state, req)),
        "store.status" => Some(handle_store_status(state, req)),
        "store.get" => Some(finish(handle_store_get(state, req))),
        "store.reset" => Some(finish(handle_store_reset(state, req))),
        _ => None,
    }
}
