use super::{now_millis, profile, required};
use crate::error::{SchoolError, SchoolResult};
use crate::ids;
use crate::metrics::{self, ResponseStats, UnreadCounts};
use crate::model::{MessageEntry, MessageThread, Role, Session, ThreadParticipant};
use crate::resolve;
use crate::store::{PersistedCell, Store};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

pub const THREADS: PersistedCell<Vec<MessageThread>> =
    PersistedCell::new("school.threads", Vec::new);
/// Thread id to its messages, oldest first.
pub const MESSAGES: PersistedCell<BTreeMap<i64, Vec<MessageEntry>>> =
    PersistedCell::new("school.messages", BTreeMap::new);

const JUST_NOW: &str = "Just now";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadView {
    #[serde(flatten)]
    pub thread: MessageThread,
    pub counterpart: Option<ThreadParticipant>,
    pub unread: u32,
}

pub fn list(store: &mut Store, role: Role) -> Vec<ThreadView> {
    let threads = THREADS.get(store);
    resolve::threads_for_role(&threads, role)
        .into_iter()
        .map(|t| ThreadView {
            counterpart: resolve::counterpart(t, role).cloned(),
            unread: t.unread_for(role),
            thread: t.clone(),
        })
        .collect()
}

fn participant_for(session: &Session) -> ThreadParticipant {
    ThreadParticipant {
        role: session.role,
        name: session.name.clone(),
        title: session.role.title().to_string(),
        email: Some(session.email.clone()).filter(|e| !e.is_empty()),
        user_id: Some(session.id.clone()),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewThread {
    pub recipient: ThreadParticipant,
    #[serde(default)]
    pub message: Option<String>,
}

/// Opens a thread between the session user and `recipient`. An initial
/// message, when given, is sent straight away.
pub fn create(store: &mut Store, input: NewThread) -> SchoolResult<MessageThread> {
    let session = profile::require_session(store)?;
    let recipient_name = required(&input.recipient.name, "recipient name")?;
    let recipient = ThreadParticipant {
        name: recipient_name,
        ..input.recipient
    };
    let sender = participant_for(&session);

    let thread = THREADS.update(store, |threads| {
        let thread = MessageThread {
            id: ids::next_id(threads.iter().map(|t| t.id)),
            participants: vec![sender, recipient],
            last_message: String::new(),
            time: JUST_NOW.to_string(),
            status: "Online".to_string(),
            unread_by: Role::ALL.iter().map(|r| (*r, 0)).collect(),
        };
        threads.push(thread.clone());
        thread
    });
    info!(id = thread.id, "thread opened");

    match input.message.as_deref().map(str::trim).filter(|m| !m.is_empty()) {
        Some(text) => send(store, thread.id, text),
        None => Ok(thread),
    }
}

/// Appends a message from the session user. The sender's unread count is
/// cleared and every other participant role gains one.
pub fn send(store: &mut Store, thread_id: i64, text: &str) -> SchoolResult<MessageThread> {
    let session = profile::require_session(store)?;
    let text = required(text, "message")?;
    let entry = MessageEntry {
        sender_role: session.role,
        sender_name: session.name.clone(),
        message: text.clone(),
        time: JUST_NOW.to_string(),
        timestamp: Some(now_millis()),
    };

    let thread = THREADS.try_update(store, |threads| {
        let t = threads
            .iter_mut()
            .find(|t| t.id == thread_id)
            .ok_or_else(|| SchoolError::not_found("thread", thread_id))?;
        let others: Vec<Role> = t
            .participants
            .iter()
            .map(|p| p.role)
            .filter(|r| *r != session.role)
            .collect();
        for role in others {
            *t.unread_by.entry(role).or_insert(0) += 1;
        }
        t.unread_by.insert(session.role, 0);
        t.last_message = text;
        t.time = JUST_NOW.to_string();
        Ok::<_, SchoolError>(t.clone())
    })?;
    MESSAGES.update(store, |all| all.entry(thread_id).or_default().push(entry));
    info!(id = thread_id, role = ?session.role, "message sent");
    Ok(thread)
}

pub fn mark_read(store: &mut Store, thread_id: i64, role: Role) -> SchoolResult<MessageThread> {
    THREADS.try_update(store, |threads| {
        let t = threads
            .iter_mut()
            .find(|t| t.id == thread_id)
            .ok_or_else(|| SchoolError::not_found("thread", thread_id))?;
        t.unread_by.insert(role, 0);
        Ok(t.clone())
    })
}

pub fn messages(store: &mut Store, thread_id: i64) -> SchoolResult<Vec<MessageEntry>> {
    if !THREADS.get(store).iter().any(|t| t.id == thread_id) {
        return Err(SchoolError::not_found("thread", thread_id));
    }
    Ok(MESSAGES.get(store).remove(&thread_id).unwrap_or_default())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadStats {
    pub response: ResponseStats,
    pub unread: UnreadCounts,
}

pub fn stats(store: &mut Store, role: Role) -> ThreadStats {
    let threads = THREADS.get(store);
    let visible = resolve::threads_for_role(&threads, role);
    let all = MESSAGES.get(store);
    let conversations = visible
        .iter()
        .filter_map(|t| all.get(&t.id))
        .map(Vec::as_slice);
    ThreadStats {
        response: metrics::response_stats(conversations, role),
        unread: metrics::unread_counts(visible.iter().copied(), role),
    }
}
