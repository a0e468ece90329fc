use super::required;
use crate::error::{SchoolError, SchoolResult};
use crate::ids;
use crate::model::{Notification, NotificationStatus, NotificationType};
use crate::store::{PersistedCell, Store};
use serde::Deserialize;
use tracing::info;

/// Newest first.
pub const NOTIFICATIONS: PersistedCell<Vec<Notification>> =
    PersistedCell::new("school.notifications", Vec::new);

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationFilter {
    #[serde(rename = "type")]
    pub kind: Option<NotificationType>,
    pub status: Option<NotificationStatus>,
}

pub fn list(store: &mut Store, filter: &NotificationFilter) -> Vec<Notification> {
    NOTIFICATIONS
        .get(store)
        .into_iter()
        .filter(|n| filter.kind.map(|k| k == n.kind).unwrap_or(true))
        .filter(|n| filter.status.map(|s| s == n.status).unwrap_or(true))
        .collect()
}

pub fn unread_count(store: &mut Store) -> usize {
    NOTIFICATIONS
        .get(store)
        .iter()
        .filter(|n| n.status == NotificationStatus::Unread)
        .count()
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNotification {
    pub title: String,
    pub message: String,
    pub channel: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<NotificationType>,
    pub status: Option<NotificationStatus>,
    pub icon_key: Option<String>,
    pub time: Option<String>,
}

fn stamp() -> String {
    chrono::Local::now().format("%b %d, %-I:%M %p").to_string()
}

fn non_blank(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

pub fn push(store: &mut Store, input: NewNotification) -> SchoolResult<Notification> {
    let title = required(&input.title, "title")?;
    let message = required(&input.message, "message")?;
    let kind = input.kind.unwrap_or_default();
    let item = NOTIFICATIONS.update(store, |items| {
        let item = Notification {
            id: ids::next_id(items.iter().map(|n| n.id)),
            title,
            message,
            time: non_blank(input.time).unwrap_or_else(stamp),
            channel: non_blank(input.channel).unwrap_or_else(|| "System".to_string()),
            kind,
            status: input.status.unwrap_or_default(),
            icon_key: non_blank(input.icon_key).unwrap_or_else(|| kind.icon_key().to_string()),
        };
        items.insert(0, item.clone());
        item
    });
    info!(id = item.id, kind = ?item.kind, "notification pushed");
    Ok(item)
}

/// Urgent notifications stay urgent until handled elsewhere.
pub fn mark_read(store: &mut Store, id: i64) -> SchoolResult<Notification> {
    NOTIFICATIONS.try_update(store, |items| {
        let n = items
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| SchoolError::not_found("notification", id))?;
        if n.status != NotificationStatus::Urgent {
            n.status = NotificationStatus::Read;
        }
        Ok(n.clone())
    })
}

/// Returns how many notifications changed.
pub fn mark_all_read(store: &mut Store) -> usize {
    NOTIFICATIONS.update(store, |items| {
        let mut changed = 0;
        for n in items.iter_mut().filter(|n| n.status == NotificationStatus::Unread) {
            n.status = NotificationStatus::Read;
            changed += 1;
        }
        changed
    })
}
