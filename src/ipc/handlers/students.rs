use crate::ipc::helpers::{finish, i64_param, param, params, reply, respond};
use crate::ipc::types::{AppState, Request};
use crate::stores::students::{self, StudentPatch, StudentRegistration};
use crate::stores::teachers::{self, TeacherPatch, TeacherRegistration};
use serde_json::Value;

fn school_id_param(req: &Request) -> Option<String> {
    req.params
        .get("schoolId")
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

fn handle_students_list(state: &mut AppState, req: &Request) -> Value {
    let school_id = school_id_param(req);
    respond(req, students::list(&mut state.store, school_id.as_deref()))
}

fn handle_students_register(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let input: StudentRegistration = params(req)?;
    Ok(reply(req, students::register(&mut state.store, input)))
}

fn handle_students_update(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let id = i64_param(req, "id")?;
    let patch: StudentPatch = param(req, "patch")?;
    Ok(reply(req, students::update(&mut state.store, id, patch)))
}

fn handle_students_delete(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let id = i64_param(req, "id")?;
    Ok(reply(req, students::delete(&mut state.store, id)))
}

fn handle_teachers_list(state: &mut AppState, req: &Request) -> Value {
    let school_id = school_id_param(req);
    respond(req, teachers::list(&mut state.store, school_id.as_deref()))
}

fn handle_teachers_register(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let input: TeacherRegistration = params(req)?;
    Ok(reply(req, teachers::register(&mut state.store, input)))
}

fn handle_teachers_update(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let id = i64_param(req, "id")?;
    let patch: TeacherPatch = param(req, "patch")?;
    Ok(reply(req, teachers::update(&mut state.store, id, patch)))
}

fn handle_teachers_delete(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let id = i64_param(req, "id")?;
    Ok(reply(req, teachers::delete(&mut state.store, id)))
}

fn handle_teachers_toggle_status(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let id = i64_param(req, "id")?;
    Ok(reply(req, teachers::toggle_status(&mut state.store, id)))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "students.list" => Some(handle_students_list(state, req)),
        "students.register" => Some(finish(handle_students_register(state, req))),
        "students.update" => Some(finish(handle_students_update(state, req))),
        "students.delete" => Some(finish(handle_students_delete(state, req))),
        "teachers.list" => Some(handle_teachers_list(state, req)),
        "teachers.register" => Some(finish(handle_teachers_register(state, req))),
        "teachers.update" => Some(finish(handle_teachers_update(state, req))),
        "teachers.delete" => Some(finish(handle_teachers_delete(state, req))),
        "teachers.toggleStatus" => Some(finish(handle_teachers_toggle_status(state, req))),
        _ => None,
    }
}
