use crate::backup;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing::info;

fn path_param(req: &Request, key: &str) -> Result<String, Value> {
    match req.params.get(key).and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(err(&req.id, "bad_params", format!("missing {}", key), None)),
    }
}

fn handle_backup_export(state: &mut AppState, req: &Request) -> Value {
    let out_path = match path_param(req, "outPath") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let out = PathBuf::from(&out_path);
    match backup::export_store_bundle(&state.store, &out) {
        Ok(export) => {
            info!(path = %out_path, keys = export.key_count, "store exported");
            ok(
                &req.id,
                json!({
                    "path": out_path,
                    "bundleFormat": backup::BUNDLE_FORMAT,
                    "bundleId": export.bundle_id,
                    "keyCount": export.key_count,
                    "sha256": export.sha256,
                }),
            )
        }
        Err(e) => err(
            &req.id,
            "io_failed",
            format!("{e:#}"),
            Some(json!({ "path": out_path })),
        ),
    }
}

fn handle_backup_import(state: &mut AppState, req: &Request) -> Value {
    let in_path = match path_param(req, "inPath") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let src = PathBuf::from(&in_path);
    if !src.is_file() {
        return err(
            &req.id,
            "not_found",
            "bundle file not found",
            Some(json!({ "path": in_path })),
        );
    }
    match backup::import_store_bundle(&mut state.store, &src) {
        Ok(import) => ok(
            &req.id,
            json!({
                "bundleFormatDetected": backup::BUNDLE_FORMAT,
                "bundleId": import.bundle_id,
                "keyCount": import.key_count,
            }),
        ),
        Err(e) => err(
            &req.id,
            "bad_bundle",
            format!("{e:#}"),
            Some(json!({ "path": in_path })),
        ),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "backup.export" => Some(handle_backup_export(state, req)),
        "backup.import" => Some(handle_backup_import(state, req)),
        _ => None,
    }
}
