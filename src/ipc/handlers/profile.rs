use crate::ipc::helpers::{finish, params, respond};
use crate::ipc::types::{AppState, Request};
use crate::model::Session;
use crate::stores::profile::{self, ProfilePatch};
use serde::Deserialize;
use serde_json::Value;

#[derive(Deserialize)]
struct SessionParams {
    session: Option<Session>,
}

/// `params.session: null` signs out.
fn handle_session_set(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let p: SessionParams = params(req)?;
    profile::set_session(&mut state.store, p.session);
    Ok(respond(req, profile::session(&mut state.store)))
}

fn handle_session_get(state: &mut AppState, req: &Request) -> Value {
    respond(req, profile::session(&mut state.store))
}

fn handle_profile_get(state: &mut AppState, req: &Request) -> Value {
    respond(req, profile::get(&mut state.store))
}

fn handle_profile_update(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let patch: ProfilePatch = params(req)?;
    Ok(respond(req, profile::update(&mut state.store, patch)))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "session.set" => Some(finish(handle_session_set(state, req))),
        "session.get" => Some(handle_session_get(state, req)),
        "profile.get" => Some(handle_profile_get(state, req)),
        "profile.update" => Some(finish(handle_profile_update(state, req))),
        _ => None,
    }
}
