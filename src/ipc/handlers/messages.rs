use crate::ipc::error::err;
use crate::ipc::helpers::{finish, i64_param, params, reply, respond, role};
use crate::ipc::types::{AppState, Request};
use crate::stores::messages::{self, NewThread};
use crate::stores::notifications::{self, NewNotification, NotificationFilter};
use serde_json::{json, Value};

fn handle_threads_list(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let role = role(state, req)?;
    Ok(respond(req, messages::list(&mut state.store, role)))
}

fn handle_threads_create(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let input: NewThread = params(req)?;
    Ok(reply(req, messages::create(&mut state.store, input)))
}

fn handle_threads_send(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let thread_id = i64_param(req, "threadId")?;
    let Some(text) = req.params.get("message").and_then(|v| v.as_str()) else {
        return Err(err(&req.id, "bad_params", "missing params.message", None));
    };
    Ok(reply(req, messages::send(&mut state.store, thread_id, text)))
}

fn handle_threads_mark_read(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let thread_id = i64_param(req, "threadId")?;
    let role = role(state, req)?;
    Ok(reply(req, messages::mark_read(&mut state.store, thread_id, role)))
}

fn handle_threads_messages(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let thread_id = i64_param(req, "threadId")?;
    Ok(reply(req, messages::messages(&mut state.store, thread_id)))
}

fn handle_threads_stats(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let role = role(state, req)?;
    Ok(respond(req, messages::stats(&mut state.store, role)))
}

fn handle_notifications_list(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let filter: NotificationFilter = params(req)?;
    Ok(respond(req, notifications::list(&mut state.store, &filter)))
}

fn handle_notifications_push(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let input: NewNotification = params(req)?;
    Ok(reply(req, notifications::push(&mut state.store, input)))
}

fn handle_notifications_mark_read(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let id = i64_param(req, "id")?;
    Ok(reply(req, notifications::mark_read(&mut state.store, id)))
}

fn handle_notifications_mark_all_read(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let changed = notifications::mark_all_read(&mut state.store);
    Ok(respond(req, json!({ "changed": changed })))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let outcome = match req.method.as_str() {
        "threads.list" => handle_threads_list(state, req),
        "threads.create" => handle_threads_create(state, req),
        "threads.send" => handle_threads_send(state, req),
        "threads.markRead" => handle_threads_mark_read(state, req),
        "threads.messages" => handle_threads_messages(state, req),
        "threads.stats" => handle_threads_stats(state, req),
        "notifications.list" => handle_notifications_list(state, req),
        "notifications.push" => handle_notifications_push(state, req),
        "notifications.markRead" => handle_notifications_mark_read(state, req),
        "notifications.markAllRead" => handle_notifications_mark_all_read(state, req),
        _ => return None,
    };
    Some(finish(outcome))
}
