use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Local;

use stockline_auth::Permission;
use stockline_infra::Services;

use crate::app::{dto, errors};
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_worklogs))
        .route("/clock-in", post(clock_in))
        .route("/clock-out", post(clock_out))
}

/// POST /worklogs/clock-in
///
/// Always for the caller. `at` is local business time and defaults to now.
pub async fn clock_in(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Option<Json<dto::ClockInRequest>>,
) -> Response {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let at = body.at.unwrap_or_else(|| Local::now().naive_local());

    match services
        .workforce
        .clock_in(principal.user_id(), at, body.batch_id)
        .await
    {
        Ok(log) => (StatusCode::CREATED, Json(log)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn clock_out(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Option<Json<dto::ClockOutRequest>>,
) -> Response {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let at = body.at.unwrap_or_else(|| Local::now().naive_local());

    match services.workforce.clock_out(principal.user_id(), at).await {
        Ok(log) => Json(log).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// GET /worklogs?from&to&user_id
///
/// Without `worklogs.read_all` callers only see their own logs.
pub async fn list_worklogs(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::WorkLogQuery>,
) -> Response {
    let user_id = match query.user_id {
        Some(user_id) => {
            if let Err(resp) = authz::require_owner_or(&principal, user_id, Permission::WORKLOGS_READ_ALL) {
                return resp;
            }
            Some(user_id)
        }
        None if authz::holds(&principal, &Permission::WORKLOGS_READ_ALL) => None,
        None => Some(principal.user_id()),
    };

    match services.workforce.list(query.from, query.to, user_id).await {
        Ok(logs) => Json(logs).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
