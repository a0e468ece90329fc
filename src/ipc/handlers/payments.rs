use crate::ipc::helpers::{as_of, finish, i64_param, param, params, reply, respond};
use crate::ipc::types::{AppState, Request};
use crate::stores::payments::{self, NewPayment, PaymentFilter, PaymentPatch};
use serde_json::Value;

fn handle_payments_list(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let filter: PaymentFilter = params(req)?;
    Ok(respond(req, payments::list(&mut state.store, &filter)))
}

fn handle_payments_create(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let input: NewPayment = params(req)?;
    let as_of = as_of(req)?;
    Ok(reply(req, payments::create(&mut state.store, input, as_of)))
}

fn handle_payments_update(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let id = i64_param(req, "id")?;
    let patch: PaymentPatch = param(req, "patch")?;
    Ok(reply(req, payments::update(&mut state.store, id, patch)))
}

fn handle_payments_cycle_status(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let id = i64_param(req, "id")?;
    Ok(reply(req, payments::cycle_status(&mut state.store, id)))
}

fn handle_payments_record(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let id = i64_param(req, "id")?;
    let as_of = as_of(req)?;
    Ok(reply(req, payments::record(&mut state.store, id, as_of)))
}

fn handle_payments_delete(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let id = i64_param(req, "id")?;
    Ok(reply(req, payments::delete(&mut state.store, id)))
}

fn handle_payments_summary(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let filter: PaymentFilter = params(req)?;
    let as_of = as_of(req)?;
    Ok(respond(req, payments::summary(&mut state.store, &filter, as_of)))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let outcome = match req.method.as_str() {
        "payments.list" => handle_payments_list(state, req),
        "payments.create" => handle_payments_create(state, req),
        "payments.update" => handle_payments_update(state, req),
        "payments.cycleStatus" => handle_payments_cycle_status(state, req),
        "payments.record" => handle_payments_record(state, req),
        "payments.delete" => handle_payments_delete(state, req),
        "payments.summary" => handle_payments_summary(state, req),
        _ => return None,
    };
    Some(finish(outcome))
}
