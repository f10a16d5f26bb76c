//! Notification dispatcher: resolves an audience, persists one row per
//! recipient (or one group row) and pushes each row to the realtime hub.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument, warn};

use stockline_core::{DomainError, NotificationId, UserId};
use stockline_notifications::{Audience, Notification, NotificationPayload, Recipients, plan_delivery};

use super::error::{ServiceError, ServiceResult};
use crate::realtime::{RealtimeHub, RealtimeMessage};
use crate::repository::{NotificationRepository, UserDirectory};

/// What a dispatch actually did.
///
/// Fan-out stops at the first row that fails to persist; `failed` counts that
/// row and every row after it.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DispatchOutcome {
    pub planned: usize,
    pub delivered: usize,
    pub failed: usize,
    /// Realtime deliveries across all rows (0 when nobody is subscribed).
    pub pushed: usize,
}

impl DispatchOutcome {
    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }
}

pub struct NotificationDispatcher {
    repo: Arc<dyn NotificationRepository>,
    users: Arc<dyn UserDirectory>,
    realtime: RealtimeHub,
}

impl NotificationDispatcher {
    pub fn new(repo: Arc<dyn NotificationRepository>, users: Arc<dyn UserDirectory>, realtime: RealtimeHub) -> Self {
        Self { repo, users, realtime }
    }

    pub fn realtime(&self) -> &RealtimeHub {
        &self.realtime
    }

    /// Deliver `payload` to `audience`.
    ///
    /// Invalid payloads and role-resolution failures are errors. A role
    /// audience nobody holds is a logged no-op. Row persistence failures are
    /// reported in the outcome, not raised.
    #[instrument(skip(self, payload), fields(title = %payload.title, kind = payload.kind.as_str()))]
    pub async fn notify(
        &self,
        payload: NotificationPayload,
        audience: Audience,
        now: DateTime<Utc>,
    ) -> ServiceResult<DispatchOutcome> {
        payload.validate(now)?;

        let recipients = match audience.normalized() {
            Audience::Global => Recipients::Global,
            Audience::Users(ids) => Recipients::users(ids),
            Audience::Roles(roles) => {
                let ids = self.users.active_users_with_roles(&roles).await?;
                if ids.is_empty() {
                    info!(roles = ?roles, "no active users hold the target roles; nothing sent");
                    return Ok(DispatchOutcome::default());
                }
                Recipients::users(ids)
            }
        };

        let rows = plan_delivery(&payload, &recipients, now);
        let mut outcome = DispatchOutcome {
            planned: rows.len(),
            ..DispatchOutcome::default()
        };

        for row in &rows {
            if let Err(e) = self.repo.insert(row).await {
                outcome.failed = outcome.planned - outcome.delivered;
                warn!(
                    notification_id = %row.id,
                    delivered = outcome.delivered,
                    failed = outcome.failed,
                    error = %e,
                    "notification fan-out stopped"
                );
                return Ok(outcome);
            }
            outcome.delivered += 1;
            outcome.pushed += self.realtime.publish(RealtimeMessage::notification_created(row));
        }

        info!(delivered = outcome.delivered, pushed = outcome.pushed, "notification dispatched");
        Ok(outcome)
    }

    /// Own and group rows visible to `user_id`, newest first.
    pub async fn list_for(
        &self,
        user_id: UserId,
        unread_only: bool,
        now: DateTime<Utc>,
    ) -> ServiceResult<Vec<Notification>> {
        Ok(self.repo.list_for_user(user_id, unread_only, now).await?)
    }

    /// Mark a row read on behalf of `user_id`.
    ///
    /// Individual rows may only be marked by their recipient. Group rows carry a
    /// single shared flag.
    pub async fn mark_read(&self, user_id: UserId, id: NotificationId) -> ServiceResult<Notification> {
        let mut notification = self.visible(user_id, id).await?;
        if !notification.read {
            self.repo.mark_read(id).await?;
            notification.mark_read();
        }
        Ok(notification)
    }

    /// Delete a row. Recipients may delete their own rows; group rows and other
    /// users' rows need `manage_all`.
    pub async fn delete(&self, user_id: UserId, id: NotificationId, manage_all: bool) -> ServiceResult<()> {
        let notification = self
            .repo
            .get(id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("notification {id}")))?;

        let own = notification.user_id == Some(user_id);
        if !own && !manage_all {
            return Err(if notification.is_visible_to(user_id) {
                DomainError::Unauthorized.into()
            } else {
                ServiceError::not_found(format!("notification {id}"))
            });
        }

        if !self.repo.delete(id).await? {
            return Err(ServiceError::not_found(format!("notification {id}")));
        }
        Ok(())
    }

    /// Remove expired rows. Returns how many were removed.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> ServiceResult<u64> {
        let removed = self.repo.delete_expired(now).await?;
        if removed > 0 {
            info!(removed, "expired notifications purged");
        }
        Ok(removed)
    }

    async fn visible(&self, user_id: UserId, id: NotificationId) -> ServiceResult<Notification> {
        match self.repo.get(id).await? {
            Some(n) if n.is_visible_to(user_id) => Ok(n),
            // Someone else's row looks the same as a missing one.
            _ => Err(ServiceError::not_found(format!("notification {id}"))),
        }
    }
}
