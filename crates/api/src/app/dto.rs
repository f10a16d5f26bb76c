use std::str::FromStr;

use axum::http::StatusCode;
use axum::response::Response;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer};

use stockline_auth::Role;
use stockline_core::{BatchId, UserId};
use stockline_inventory::{ItemUpdate, MovementKind};
use stockline_notifications::{Audience, NotificationPayload};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

/// `min_stock: null` clears the threshold; omitting it leaves it alone.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateItemRequest {
    pub name: Option<String>,
    pub unit: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub min_stock: Option<Option<i64>>,
}

impl From<UpdateItemRequest> for ItemUpdate {
    fn from(r: UpdateItemRequest) -> Self {
        ItemUpdate {
            name: r.name,
            unit: r.unit,
            min_stock: r.min_stock,
        }
    }
}

fn present<'de, D, T>(d: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(d).map(Some)
}

#[derive(Debug, Deserialize)]
pub struct PostMovementRequest {
    pub kind: MovementKind,
    pub quantity: i64,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CompleteBatchRequest {
    pub produced_quantity: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct ClockInRequest {
    pub at: Option<NaiveDateTime>,
    pub batch_id: Option<BatchId>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ClockOutRequest {
    pub at: Option<NaiveDateTime>,
}

#[derive(Debug, Deserialize)]
pub struct WorkLogQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub user_id: Option<UserId>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct StreamQuery {
    /// Comma-separated channel names; defaults to the global channel plus the
    /// caller's own.
    pub channels: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BroadcastRequest {
    #[serde(flatten)]
    pub payload: NotificationPayload,
    #[serde(default = "global")]
    pub audience: Audience,
}

fn global() -> Audience {
    Audience::Global
}

#[derive(Debug, Deserialize)]
pub struct CreateRoleRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct SetRolesRequest {
    pub roles: Vec<Role>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AbsenceSweepRequest {
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OvertimeSweepRequest {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

// -------------------------
// Helpers
// -------------------------

/// Parse a path identifier, answering 400 on failure.
pub fn parse_id<T: FromStr>(raw: &str, what: &'static str) -> Result<T, Response> {
    raw.parse().map_err(|_| {
        errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("invalid {what} id"))
    })
}
