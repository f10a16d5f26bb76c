//! Turning one payload + resolved recipients into notification rows.

use chrono::{DateTime, Utc};

use crate::audience::Recipients;
use crate::notification::{Notification, NotificationPayload};

/// Rows to persist for a dispatch, in recipient order.
///
/// - `Recipients::Global` → exactly one group row
/// - `Recipients::Users(ids)` → one individual row per id (none for an empty list)
pub fn plan_delivery(
    payload: &NotificationPayload,
    recipients: &Recipients,
    now: DateTime<Utc>,
) -> Vec<Notification> {
    match recipients {
        Recipients::Global => vec![Notification::broadcast(payload, now)],
        Recipients::Users(ids) => ids
            .iter()
            .map(|id| Notification::individual(payload, *id, now))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NotificationScope, NotificationType};
    use stockline_core::UserId;

    fn payload() -> NotificationPayload {
        NotificationPayload::new("Absent", "No clock-in recorded", NotificationType::Warning)
    }

    #[test]
    fn global_plans_one_group_row() {
        let rows = plan_delivery(&payload(), &Recipients::Global, Utc::now());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].scope, NotificationScope::Group);
        assert_eq!(rows[0].user_id, None);
    }

    #[test]
    fn users_plan_one_individual_row_each() {
        let (u1, u2) = (UserId::new(), UserId::new());
        let rows = plan_delivery(&payload(), &Recipients::users(vec![u1, u2, u1]), Utc::now());
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.scope == NotificationScope::Individual));
        assert_eq!(rows[0].user_id, Some(u1));
        assert_eq!(rows[1].user_id, Some(u2));
        assert_ne!(rows[0].id, rows[1].id);
    }

    #[test]
    fn empty_users_plan_nothing() {
        assert!(plan_delivery(&payload(), &Recipients::Users(vec![]), Utc::now()).is_empty());
    }
}
