//! Real-time fan-out of `notification.created` events.
//!
//! Lossy broadcast: slow subscribers lag and skip messages, publishers never
//! block. Channel authorization is enforced by the subscriber side (the SSE
//! handler filters on [`Channel::authorizes`]).

use serde::Serialize;
use tokio::sync::broadcast;

use stockline_notifications::{Channel, NOTIFICATION_CREATED, Notification, NotificationCreated};

#[derive(Debug, Clone, Serialize)]
pub struct RealtimeMessage {
    #[serde(serialize_with = "channel_name")]
    pub channel: Channel,
    pub event: &'static str,
    pub payload: NotificationCreated,
}

impl RealtimeMessage {
    pub fn notification_created(notification: &Notification) -> Self {
        Self {
            channel: Channel::for_notification(notification),
            event: NOTIFICATION_CREATED,
            payload: NotificationCreated::from(notification),
        }
    }
}

fn channel_name<S: serde::Serializer>(channel: &Channel, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&channel.name())
}

#[derive(Debug, Clone)]
pub struct RealtimeHub {
    tx: broadcast::Sender<RealtimeMessage>,
}

impl Default for RealtimeHub {
    fn default() -> Self {
        Self::new(256)
    }
}

impl RealtimeHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Returns how many subscribers received the message (0 when nobody listens).
    pub fn publish(&self, message: RealtimeMessage) -> usize {
        self.tx.send(message).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RealtimeMessage> {
        self.tx.subscribe()
    }
}
