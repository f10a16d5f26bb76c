//! Real-time channels and the `notification.created` wire event.

use serde::{Deserialize, Serialize};

use stockline_core::{NotificationId, UserId};

use crate::notification::{Notification, NotificationScope, NotificationType};

/// Event name carried on every notification channel.
pub const NOTIFICATION_CREATED: &str = "notification.created";

/// A real-time broadcast channel.
///
/// - `notifications.global`: any authenticated subscriber
/// - `notifications.<user id>`: only that user
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Channel {
    Global,
    User(UserId),
}

impl Channel {
    pub fn name(&self) -> String {
        match self {
            Channel::Global => "notifications.global".to_string(),
            Channel::User(id) => format!("notifications.{id}"),
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.strip_prefix("notifications.")? {
            "global" => Some(Channel::Global),
            id => id.parse().ok().map(Channel::User),
        }
    }

    /// Channel a persisted row is published on.
    pub fn for_notification(notification: &Notification) -> Self {
        match notification.user_id {
            Some(id) => Channel::User(id),
            None => Channel::Global,
        }
    }

    /// Whether `user` may subscribe to this channel.
    pub fn authorizes(&self, user: UserId) -> bool {
        match self {
            Channel::Global => true,
            Channel::User(owner) => *owner == user,
        }
    }
}

impl core::fmt::Display for Channel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.name())
    }
}

/// Body of a `notification.created` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationCreated {
    pub id: NotificationId,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub scope: NotificationScope,
    pub related_table: Option<String>,
    pub related_id: Option<String>,
    pub user_id: Option<UserId>,
}

impl From<&Notification> for NotificationCreated {
    fn from(n: &Notification) -> Self {
        Self {
            id: n.id,
            title: n.title.clone(),
            message: n.message.clone(),
            kind: n.kind,
            scope: n.scope,
            related_table: n.related.as_ref().map(|r| r.table.clone()),
            related_id: n.related.as_ref().map(|r| r.id.clone()),
            user_id: n.user_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NotificationPayload, RelatedEntity};
    use chrono::Utc;

    #[test]
    fn channel_names_round_trip() {
        let user = UserId::new();
        assert_eq!(Channel::Global.name(), "notifications.global");
        assert_eq!(Channel::parse(&Channel::User(user).name()), Some(Channel::User(user)));
        assert_eq!(Channel::parse("notifications.global"), Some(Channel::Global));
        assert_eq!(Channel::parse("orders.global"), None);
        assert_eq!(Channel::parse("notifications.not-a-uuid"), None);
    }

    #[test]
    fn user_channel_only_authorizes_its_owner() {
        let me = UserId::new();
        assert!(Channel::Global.authorizes(me));
        assert!(Channel::User(me).authorizes(me));
        assert!(!Channel::User(UserId::new()).authorizes(me));
    }

    #[test]
    fn wire_event_has_flat_fields() {
        let user = UserId::new();
        let payload = NotificationPayload::new("t", "m", NotificationType::Info)
            .related_to(RelatedEntity::new("users", user));
        let n = Notification::individual(&payload, user, Utc::now());

        let json = serde_json::to_value(NotificationCreated::from(&n)).unwrap();
        assert_eq!(json["type"], "info");
        assert_eq!(json["scope"], "individual");
        assert_eq!(json["related_table"], "users");
        assert_eq!(json["related_id"], user.to_string());
        assert_eq!(json["user_id"], user.to_string());
        assert_eq!(Channel::for_notification(&n), Channel::User(user));
    }
}
