use super::handlers;
use super::types::{AppState, Request};
use crate::ipc::error::err;
use serde_json::Value;
use tracing::debug;

type Handler = fn(&mut AppState, &Request) -> Option<Value>;

const HANDLERS: &[Handler] = &[
    handlers::core::try_handle,
    handlers::profile::try_handle,
    handlers::setup::try_handle,
    handlers::students::try_handle,
    handlers::classes::try_handle,
    handlers::assignments::try_handle,
    handlers::parents::try_handle,
    handlers::payments::try_handle,
    handlers::results::try_handle,
    handlers::attendance::try_handle,
    handlers::events::try_handle,
    handlers::documents::try_handle,
    handlers::messages::try_handle,
    handlers::dashboard::try_handle,
    handlers::backup::try_handle,
];

pub fn handle_request(state: &mut AppState, req: Request) -> Value {
    debug!(id = %req.id, method = %req.method, "request");
    for handler in HANDLERS {
        if let Some(resp) = handler(state, &req) {
            return resp;
        }
    }

    err(
        &req.id,
        "not_implemented",
        format!("unknown method: {}", req.method),
        None,
    )
}
