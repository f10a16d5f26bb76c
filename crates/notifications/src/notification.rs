use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockline_core::{DomainError, DomainResult, Entity, NotificationId, UserId};

/// Severity shown to the recipient.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    Info,
    Warning,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::Info => "info",
            NotificationType::Warning => "warning",
        }
    }

    pub fn parse(s: &str) -> DomainResult<Self> {
        match s {
            "info" => Ok(NotificationType::Info),
            "warning" => Ok(NotificationType::Warning),
            other => Err(DomainError::validation(format!("unknown notification type '{other}'"))),
        }
    }
}

/// Who a single row is addressed to.
///
/// `Individual` rows carry a `user_id`; `Group` rows carry none and are visible
/// to every user.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationScope {
    Individual,
    Group,
}

impl NotificationScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationScope::Individual => "individual",
            NotificationScope::Group => "group",
        }
    }

    pub fn parse(s: &str) -> DomainResult<Self> {
        match s {
            "individual" => Ok(NotificationScope::Individual),
            "group" | "global" => Ok(NotificationScope::Group),
            other => Err(DomainError::validation(format!("unknown notification scope '{other}'"))),
        }
    }
}

/// Reference to the record a notification is about (table name + id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelatedEntity {
    pub table: String,
    pub id: String,
}

impl RelatedEntity {
    pub fn new(table: impl Into<String>, id: impl ToString) -> Self {
        Self {
            table: table.into(),
            id: id.to_string(),
        }
    }
}

/// One logical notification, before it is addressed to anyone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    #[serde(default)]
    pub related: Option<RelatedEntity>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl NotificationPayload {
    pub fn new(title: impl Into<String>, message: impl Into<String>, kind: NotificationType) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            kind,
            related: None,
            expires_at: None,
        }
    }

    pub fn related_to(mut self, related: RelatedEntity) -> Self {
        self.related = Some(related);
        self
    }

    pub fn expiring_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn validate(&self, now: DateTime<Utc>) -> DomainResult<()> {
        if self.title.trim().is_empty() {
            return Err(DomainError::validation("title cannot be empty"));
        }
        if self.message.trim().is_empty() {
            return Err(DomainError::validation("message cannot be empty"));
        }
        if let Some(related) = &self.related {
            if related.table.trim().is_empty() || related.id.trim().is_empty() {
                return Err(DomainError::validation("related entity needs a table and an id"));
            }
        }
        if matches!(self.expires_at, Some(at) if at <= now) {
            return Err(DomainError::validation("expires_at must be in the future"));
        }
        Ok(())
    }
}

/// A persisted notification row.
///
/// # Invariants
/// - `user_id.is_none()` exactly when `scope == Group`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: Option<UserId>,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub scope: NotificationScope,
    pub read: bool,
    pub related: Option<RelatedEntity>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Row addressed to a single user.
    pub fn individual(payload: &NotificationPayload, user_id: UserId, now: DateTime<Utc>) -> Self {
        Self::from_payload(payload, Some(user_id), NotificationScope::Individual, now)
    }

    /// Row addressed to nobody in particular (everyone sees it).
    pub fn broadcast(payload: &NotificationPayload, now: DateTime<Utc>) -> Self {
        Self::from_payload(payload, None, NotificationScope::Group, now)
    }

    fn from_payload(
        payload: &NotificationPayload,
        user_id: Option<UserId>,
        scope: NotificationScope,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: NotificationId::new(),
            user_id,
            title: payload.title.trim().to_string(),
            message: payload.message.trim().to_string(),
            kind: payload.kind,
            scope,
            read: false,
            related: payload.related.clone(),
            expires_at: payload.expires_at,
            created_at: now,
        }
    }

    /// Check the scope/user invariant (used when loading rows from storage).
    pub fn check_invariant(&self) -> DomainResult<()> {
        match (self.scope, self.user_id) {
            (NotificationScope::Individual, Some(_)) | (NotificationScope::Group, None) => Ok(()),
            (NotificationScope::Individual, None) => Err(DomainError::invariant(
                "individual notification without a user_id",
            )),
            (NotificationScope::Group, Some(_)) => Err(DomainError::invariant(
                "group notification with a user_id",
            )),
        }
    }

    pub fn is_visible_to(&self, user_id: UserId) -> bool {
        self.user_id.is_none_or(|u| u == user_id)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(at) if at <= now)
    }

    /// Same type and same related record: the basis for duplicate suppression.
    pub fn is_equivalent(&self, kind: NotificationType, related: &RelatedEntity) -> bool {
        self.kind == kind && self.related.as_ref() == Some(related)
    }

    pub fn mark_read(&mut self) {
        self.read = true;
    }
}

impl Entity for Notification {
    type Id = NotificationId;

    fn id(&self) -> Self::Id {
        self.id
    }
}
