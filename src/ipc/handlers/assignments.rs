use crate::ipc::helpers::{finish, i64_param, param, params, reply, respond};
use crate::ipc::types::{AppState, Request};
use crate::stores::assignments::{self, AssignmentFilter, AssignmentPatch, NewAssignment};
use serde_json::Value;

fn handle_assignments_list(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let filter: AssignmentFilter = params(req)?;
    Ok(respond(req, assignments::list(&mut state.store, &filter)))
}

fn handle_assignments_create(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let input: NewAssignment = params(req)?;
    Ok(reply(req, assignments::create(&mut state.store, input)))
}

fn handle_assignments_update(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let id = i64_param(req, "id")?;
    let patch: AssignmentPatch = param(req, "patch")?;
    Ok(reply(req, assignments::update(&mut state.store, id, patch)))
}

fn handle_assignments_toggle_status(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let id = i64_param(req, "id")?;
    Ok(reply(req, assignments::toggle_status(&mut state.store, id)))
}

fn handle_assignments_add_submission(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let id = i64_param(req, "id")?;
    Ok(reply(req, assignments::add_submission(&mut state.store, id)))
}

fn handle_assignments_delete(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let id = i64_param(req, "id")?;
    Ok(reply(req, assignments::delete(&mut state.store, id)))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let outcome = match req.method.as_str() {
        "assignments.list" => handle_assignments_list(state, req),
        "assignments.create" => handle_assignments_create(state, req),
        "assignments.update" => handle_assignments_update(state, req),
        "assignments.toggleStatus" => handle_assignments_toggle_status(state, req),
        "assignments.addSubmission" => handle_assignments_add_submission(state, req),
        "assignments.delete" => handle_assignments_delete(state, req),
        _ => return None,
    };
    Some(finish(outcome))
}
