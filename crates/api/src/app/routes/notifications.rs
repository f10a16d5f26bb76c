use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::{
        IntoResponse, Response,
        sse::{Event as SseEvent, KeepAlive, Sse},
    },
    routing::{delete, get, post},
};
use chrono::Utc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::warn;

use stockline_auth::Permission;
use stockline_core::{NotificationId, UserId};
use stockline_infra::{RealtimeMessage, Services};
use stockline_notifications::Channel;

use crate::app::{dto, errors};
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_notifications).post(broadcast))
        .route("/stream", get(stream))
        .route("/:id/read", post(mark_read))
        .route("/:id", delete(delete_notification))
}

/// GET /notifications?unread=true
///
/// The caller's own rows plus group rows, newest first, expired rows hidden.
pub async fn list_notifications(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::NotificationQuery>,
) -> Response {
    match services
        .dispatcher
        .list_for(principal.user_id(), query.unread, Utc::now())
        .await
    {
        Ok(rows) => Json(rows).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// POST /notifications
///
/// Manual notification to a global, user or role audience.
pub async fn broadcast(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::BroadcastRequest>,
) -> Response {
    if let Err(resp) = authz::require(&principal, Permission::NOTIFICATIONS_BROADCAST) {
        return resp;
    }

    match services
        .dispatcher
        .notify(body.payload, body.audience, Utc::now())
        .await
    {
        Ok(outcome) => (StatusCode::CREATED, Json(outcome)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn mark_read(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    let id: NotificationId = match dto::parse_id(&id, "notification") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.dispatcher.mark_read(principal.user_id(), id).await {
        Ok(row) => Json(row).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn delete_notification(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    let id: NotificationId = match dto::parse_id(&id, "notification") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let manage_all = authz::holds(&principal, &Permission::NOTIFICATIONS_BROADCAST);

    match services
        .dispatcher
        .delete(principal.user_id(), id, manage_all)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// GET /notifications/stream?channels=notifications.global,notifications.<id>
///
/// Server-sent `notification.created` events. Subscribing to another user's
/// channel is refused.
pub async fn stream(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::StreamQuery>,
) -> Response {
    let channels = match subscribed_channels(query.channels.as_deref(), principal.user_id()) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    let user_id = principal.user_id();
    let events = BroadcastStream::new(services.realtime.subscribe()).filter_map(move |msg| match msg {
        Ok(msg) if channels.contains(&msg.channel) => to_sse(&msg).map(Ok::<_, Infallible>),
        Ok(_) => None,
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            warn!(user_id = %user_id, skipped, "realtime subscriber lagged");
            None
        }
    });

    Sse::new(events).keep_alive(KeepAlive::default()).into_response()
}

fn to_sse(msg: &RealtimeMessage) -> Option<SseEvent> {
    match SseEvent::default().event(msg.event).json_data(msg) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!(error = %e, "failed to encode realtime message");
            None
        }
    }
}

fn subscribed_channels(raw: Option<&str>, user_id: UserId) -> Result<Vec<Channel>, Response> {
    let Some(raw) = raw else {
        return Ok(vec![Channel::Global, Channel::User(user_id)]);
    };

    let mut channels = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        let channel = Channel::parse(name).ok_or_else(|| {
            errors::json_error(StatusCode::BAD_REQUEST, "unknown_channel", format!("unknown channel '{name}'"))
        })?;
        if !channel.authorizes(user_id) {
            return Err(errors::json_error(
                StatusCode::FORBIDDEN,
                "forbidden",
                format!("not allowed to subscribe to '{name}'"),
            ));
        }
        if !channels.contains(&channel) {
            channels.push(channel);
        }
    }
    if channels.is_empty() {
        return Err(errors::json_error(StatusCode::BAD_REQUEST, "unknown_channel", "no channel requested"));
    }
    Ok(channels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_subscription_is_global_plus_own_channel() {
        let me = UserId::new();
        assert_eq!(subscribed_channels(None, me).unwrap(), vec![Channel::Global, Channel::User(me)]);
    }

    #[test]
    fn other_users_channels_are_refused() {
        let me = UserId::new();
        let other = UserId::new();

        let own = format!("notifications.global, notifications.{me}");
        assert_eq!(
            subscribed_channels(Some(&own), me).unwrap(),
            vec![Channel::Global, Channel::User(me)]
        );

        let theirs = format!("notifications.{other}");
        let resp = subscribed_channels(Some(&theirs), me).unwrap_err();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let resp = subscribed_channels(Some("orders.global"), me).unwrap_err();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
