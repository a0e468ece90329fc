use crate::ipc::helpers::{as_of, finish, i64_param, reply, respond};
use crate::ipc::types::{AppState, Request};
use crate::stores::dashboard;
use serde_json::Value;

fn handle_dashboard_admin(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let as_of = as_of(req)?;
    Ok(respond(req, dashboard::admin(&mut state.store, as_of)))
}

fn handle_dashboard_teacher(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let as_of = as_of(req)?;
    Ok(respond(req, dashboard::teacher(&mut state.store, as_of)))
}

fn handle_dashboard_parent(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let parent_id = i64_param(req, "parentId")?;
    let as_of = as_of(req)?;
    Ok(reply(req, dashboard::parent(&mut state.store, parent_id, as_of)))
}

fn handle_dashboard_student(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let student_id = i64_param(req, "studentId")?;
    let as_of = as_of(req)?;
    Ok(reply(req, dashboard::student(&mut state.store, student_id, as_of)))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let outcome = match req.method.as_str() {
        "dashboard.admin" => handle_dashboard_admin(state, req),
        "dashboard.teacher" => handle_dashboard_teacher(state, req),
        "dashboard.parent" => handle_dashboard_parent(state, req),
        "dashboard.student" => handle_dashboard_student(state, req),
        _ => return None,
    };
    Some(finish(outcome))
}
