use crate::ipc::helpers::{finish, i64_param, params, reply, respond};
use crate::ipc::types::{AppState, Request};
use crate::stores::results::{self, ResultFilter, ResultInput};
use serde_json::Value;

fn handle_results_list(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let filter: ResultFilter = params(req)?;
    Ok(respond(req, results::list(&mut state.store, &filter)))
}

fn handle_results_save(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let input: ResultInput = params(req)?;
    Ok(reply(req, results::save(&mut state.store, input)))
}

fn handle_results_delete(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let id = i64_param(req, "id")?;
    Ok(reply(req, results::delete(&mut state.store, id)))
}

fn handle_results_summary(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let filter: ResultFilter = params(req)?;
    Ok(respond(req, results::summary(&mut state.store, &filter)))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let outcome = match req.method.as_str() {
        "results.list" => handle_results_list(state, req),
        "results.save" => handle_results_save(state, req),
        "results.delete" => handle_results_delete(state, req),
        "results.summary" => handle_results_summary(state, req),
        _ => return None,
    };
    Some(finish(outcome))
}
