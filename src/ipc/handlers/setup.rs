use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::stores::setup::{self, SetupSection};
use serde_json::{json, Value};

fn handle_setup_get(state: &mut AppState, req: &Request) -> Value {
    match req.params.get("section").and_then(|v| v.as_str()) {
        None => ok(&req.id, setup::load_all(&state.store)),
        Some(raw) => match SetupSection::parse(raw) {
            Some(section) => ok(&req.id, setup::load_section(&state.store, section)),
            None => err(&req.id, "bad_params", "unknown section", None),
        },
    }
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> Value {
    let Some(section_raw) = req.params.get("section").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing section", None);
    };
    let Some(section) = SetupSection::parse(section_raw) else {
        return err(&req.id, "bad_params", "unknown section", None);
    };
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    match setup::update_section(&mut state.store, section, patch_obj) {
        Ok(current) => ok(&req.id, json!({ "section": section.name(), "value": current })),
        Err(msg) => err(&req.id, "bad_params", msg, None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "setup.get" => Some(handle_setup_get(state, req)),
        "setup.update" => Some(handle_setup_update(state, req)),
        _ => None,
    }
}
