//! Admin routes: on-demand runs of the scheduled sweeps.
//!
//! Same code paths as the scheduler; handy after downtime or for backfills.
//! Sweeps are not deduplicated, so running one twice notifies twice.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    response::{IntoResponse, Response},
    routing::post,
};
use chrono::Utc;

use stockline_auth::Permission;
use stockline_infra::{ServiceResult, Services};
use stockline_infra::jobs::{OVERTIME_SWEEP_DAYS, previous_day};
use stockline_workforce::Period;

use crate::app::{dto, errors};
use crate::authz;
use crate::context::PrincipalContext;

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

pub fn router() -> Router {
    Router::new()
        .route("/sweeps/absences", post(sweep_absences))
        .route("/sweeps/overtime", post(sweep_overtime))
        .route("/sweeps/low-stock", post(scan_low_stock))
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// POST /admin/sweeps/absences
///
/// `date` defaults to yesterday.
pub async fn sweep_absences(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Option<Json<dto::AbsenceSweepRequest>>,
) -> Response {
    if let Err(resp) = authz::require(&principal, Permission::SWEEPS_RUN) {
        return resp;
    }
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let now = Utc::now();

    let date = match body.date {
        Some(date) => date,
        None => match previous_day(now) {
            Ok(date) => date,
            Err(e) => return errors::service_error_to_response(e),
        },
    };

    match services.workforce.sweep_absences(date, now).await {
        Ok(sweep) => Json(sweep).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// POST /admin/sweeps/overtime
///
/// Without a range, covers the seven days ending yesterday.
pub async fn sweep_overtime(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Option<Json<dto::OvertimeSweepRequest>>,
) -> Response {
    if let Err(resp) = authz::require(&principal, Permission::SWEEPS_RUN) {
        return resp;
    }
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let now = Utc::now();

    let period: ServiceResult<Period> = match (body.from, body.to) {
        (Some(from), Some(to)) => Period::new(from, to).map_err(Into::into),
        (None, None) => previous_day(now).and_then(|last| Ok(Period::ending_on(last, OVERTIME_SWEEP_DAYS)?)),
        _ => {
            return errors::json_error(
                axum::http::StatusCode::BAD_REQUEST,
                "validation_error",
                "give both 'from' and 'to', or neither",
            );
        }
    };
    let period = match period {
        Ok(p) => p,
        Err(e) => return errors::service_error_to_response(e),
    };

    match services.workforce.sweep_overtime(period, now).await {
        Ok(sweep) => Json(sweep).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn scan_low_stock(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Response {
    if let Err(resp) = authz::require(&principal, Permission::SWEEPS_RUN) {
        return resp;
    }
    match services.low_stock_scan.run(Utc::now()).await {
        Ok(published) => Json(serde_json::json!({ "published": published })).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
