use crate::ipc::helpers::{as_of, finish, params, reply, respond};
use crate::ipc::types::{AppState, Request};
use crate::stores::attendance::{self, AttendanceQuery, RateQuery, RollCall};
use serde_json::Value;

fn handle_attendance_record(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let input: RollCall = params(req)?;
    Ok(reply(req, attendance::record(&mut state.store, input)))
}

fn handle_attendance_list(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let query: AttendanceQuery = params(req)?;
    Ok(respond(req, attendance::list(&mut state.store, &query)))
}

fn handle_attendance_rate(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let query: RateQuery = params(req)?;
    let as_of = as_of(req)?;
    Ok(reply(req, attendance::rate(&mut state.store, &query, as_of)))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let outcome = match req.method.as_str() {
        "attendance.record" => handle_attendance_record(state, req),
        "attendance.list" => handle_attendance_list(state, req),
        "attendance.rate" => handle_attendance_rate(state, req),
        _ => return None,
    };
    Some(finish(outcome))
}
