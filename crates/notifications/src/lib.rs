//! Notification domain module.
//!
//! Models notification rows, who they are for (audiences), where they are
//! broadcast (channels) and how one logical notification becomes rows
//! (delivery planning). Persistence and fan-out IO live in `stockline-infra`.

pub mod audience;
pub mod channel;
pub mod delivery;
pub mod notification;

pub use audience::{Audience, Recipients};
pub use channel::{Channel, NOTIFICATION_CREATED, NotificationCreated};
pub use delivery::plan_delivery;
pub use notification::{
    Notification, NotificationPayload, NotificationScope, NotificationType, RelatedEntity,
};
