use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;

use stockline_auth::Permission;
use stockline_core::BatchId;
use stockline_infra::Services;
use stockline_infra::services::NewBatch;

use crate::app::{dto, errors};
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_batches).post(plan_batch))
        .route("/:id", get(get_batch))
        .route("/:id/start", post(start_batch))
        .route("/:id/complete", post(complete_batch))
        .route("/:id/cancel", post(cancel_batch))
}

pub async fn list_batches(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Response {
    if let Err(resp) = authz::require(&principal, Permission::BATCHES_READ) {
        return resp;
    }
    match services.inventory.list_batches().await {
        Ok(batches) => Json(batches).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn plan_batch(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<NewBatch>,
) -> Response {
    if let Err(resp) = authz::require(&principal, Permission::BATCHES_WRITE) {
        return resp;
    }
    match services.inventory.plan_batch(body, Utc::now()).await {
        Ok(batch) => (StatusCode::CREATED, Json(batch)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_batch(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    if let Err(resp) = authz::require(&principal, Permission::BATCHES_READ) {
        return resp;
    }
    let id: BatchId = match dto::parse_id(&id, "batch") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.inventory.get_batch(id).await {
        Ok(batch) => Json(batch).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn start_batch(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    if let Err(resp) = authz::require(&principal, Permission::BATCHES_WRITE) {
        return resp;
    }
    let id: BatchId = match dto::parse_id(&id, "batch") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.inventory.start_batch(id, Utc::now()).await {
        Ok(batch) => Json(batch).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// POST /batches/:id/complete
///
/// Consumption and the product receipt commit together; the response carries
/// the batch and every touched item.
pub async fn complete_batch(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::CompleteBatchRequest>,
) -> Response {
    if let Err(resp) = authz::require(&principal, Permission::BATCHES_WRITE) {
        return resp;
    }
    let id: BatchId = match dto::parse_id(&id, "batch") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services
        .inventory
        .complete_batch(id, body.produced_quantity, Utc::now())
        .await
    {
        Ok((batch, items)) => Json(serde_json::json!({
            "batch": batch,
            "items": items,
        }))
        .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn cancel_batch(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    if let Err(resp) = authz::require(&principal, Permission::BATCHES_WRITE) {
        return resp;
    }
    let id: BatchId = match dto::parse_id(&id, "batch") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.inventory.cancel_batch(id, Utc::now()).await {
        Ok(batch) => Json(batch).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
