use crate::ipc::helpers::{finish, i64_param, params, reply, respond};
use crate::ipc::types::{AppState, Request};
use crate::stores::classes::{self, NewClass};
use serde_json::{json, Value};

fn handle_classes_list(state: &mut AppState, req: &Request) -> Value {
    respond(req, classes::list(&mut state.store))
}

fn handle_classes_create(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let input: NewClass = params(req)?;
    Ok(reply(req, classes::create(&mut state.store, input)))
}

fn handle_classes_delete(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let id = i64_param(req, "id")?;
    Ok(reply(req, classes::delete(&mut state.store, id)))
}

fn handle_classes_roster(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let class_id = i64_param(req, "classId")?;
    let roster = classes::roster(&mut state.store, class_id).map(|(class, students)| {
        json!({
            "class": class,
            "rosterCount": students.len(),
            "students": students,
        })
    });
    Ok(reply(req, roster))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "classes.list" => Some(handle_classes_list(state, req)),
        "classes.create" => Some(finish(handle_classes_create(state, req))),
        "classes.delete" => Some(finish(handle_classes_delete(state, req))),
        "classes.roster" => Some(finish(handle_classes_roster(state, req))),
        _ => None,
    }
}
