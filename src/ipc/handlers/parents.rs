use crate::ipc::helpers::{finish, i64_param, param, params, reply, respond};
use crate::ipc::types::{AppState, Request};
use crate::stores::parents::{self, ParentPatch, ParentRegistration};
use serde_json::{json, Value};

fn handle_parents_list(state: &mut AppState, req: &Request) -> Value {
    let school_id = req
        .params
        .get("schoolId")
        .and_then(|v| v.as_str())
        .map(str::to_string);
    respond(req, parents::list(&mut state.store, school_id.as_deref()))
}

fn handle_parents_register(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let input: ParentRegistration = params(req)?;
    Ok(reply(req, parents::register(&mut state.store, input)))
}

fn handle_parents_update(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let id = i64_param(req, "id")?;
    let patch: ParentPatch = param(req, "patch")?;
    Ok(reply(req, parents::update(&mut state.store, id, patch)))
}

fn handle_parents_delete(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let id = i64_param(req, "id")?;
    Ok(reply(req, parents::delete(&mut state.store, id)))
}

fn handle_parents_link(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let parent_id = i64_param(req, "parentId")?;
    let identifiers: Vec<String> = param(req, "studentIds")?;
    Ok(reply(req, parents::link(&mut state.store, parent_id, &identifiers)))
}

fn handle_parents_unlink(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let parent_id = i64_param(req, "parentId")?;
    let student_id = i64_param(req, "studentId")?;
    Ok(reply(req, parents::unlink(&mut state.store, parent_id, student_id)))
}

fn handle_parents_children(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let parent_id = i64_param(req, "parentId")?;
    let resolution = parents::children(&mut state.store, parent_id).map(|r| {
        json!({
            "students": r.students,
            "linkedStudentIds": r.linked_ids,
            "dropped": r.dropped,
        })
    });
    Ok(reply(req, resolution))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "parents.list" => Some(handle_parents_list(state, req)),
        "parents.register" => Some(finish(handle_parents_register(state, req))),
        "parents.update" => Some(finish(handle_parents_update(state, req))),
        "parents.delete" => Some(finish(handle_parents_delete(state, req))),
        "parents.link" => Some(finish(handle_parents_link(state, req))),
        "parents.unlink" => Some(finish(handle_parents_unlink(state, req))),
        "parents.children" => Some(finish(handle_parents_children(state, req))),
        _ => None,
    }
}
