use crate::ipc::helpers::{as_of, finish, i64_param, param, params, reply, respond};
use crate::ipc::types::{AppState, Request};
use crate::stores::events::{self, EventInput};
use serde_json::Value;

const DEFAULT_UPCOMING: usize = 5;

fn handle_events_list(state: &mut AppState, req: &Request) -> Value {
    respond(req, events::list(&mut state.store))
}

fn handle_events_create(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let input: EventInput = params(req)?;
    Ok(reply(req, events::create(&mut state.store, input)))
}

fn handle_events_update(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let id = i64_param(req, "id")?;
    let patch: EventInput = param(req, "patch")?;
    Ok(reply(req, events::update(&mut state.store, id, patch)))
}

fn handle_events_delete(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let id = i64_param(req, "id")?;
    Ok(reply(req, events::delete(&mut state.store, id)))
}

fn handle_events_upcoming(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let as_of = as_of(req)?;
    let limit = req
        .params
        .get("limit")
        .and_then(|v| v.as_u64())
        .map(|n| n as usize)
        .unwrap_or(DEFAULT_UPCOMING);
    Ok(respond(req, events::upcoming(&mut state.store, as_of, limit)))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "events.list" => Some(handle_events_list(state, req)),
        "events.create" => Some(finish(handle_events_create(state, req))),
        "events.update" => Some(finish(handle_events_update(state, req))),
        "events.delete" => Some(finish(handle_events_delete(state, req))),
        "events.upcoming" => Some(finish(handle_events_upcoming(state, req))),
        _ => None,
    }
}
