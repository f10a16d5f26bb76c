use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::Utc;

use stockline_auth::Permission;
use stockline_core::ItemId;
use stockline_infra::Services;
use stockline_infra::services::NewItem;
use stockline_inventory::StockMovement;

use crate::app::{dto, errors};
use crate::authz::{self, Guarded};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/items", get(list_items).post(create_item))
        .route("/items/:id", get(get_item).patch(update_item))
        .route("/items/:id/movements", get(list_movements).post(post_movement))
        .route("/low-stock", get(low_stock))
}

pub async fn list_items(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Response {
    if let Err(resp) = authz::require(&principal, Permission::INVENTORY_READ) {
        return resp;
    }
    match services.inventory.list_items().await {
        Ok(items) => Json(items).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn create_item(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<NewItem>,
) -> Response {
    let request = Guarded::new(body, [Permission::INVENTORY_WRITE]);
    if let Err(e) = authz::authorize_request(&principal, &request) {
        return authz::forbidden(e);
    }

    match services.inventory.create_item(request.inner, Utc::now()).await {
        Ok(item) => (StatusCode::CREATED, Json(item)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_item(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    if let Err(resp) = authz::require(&principal, Permission::INVENTORY_READ) {
        return resp;
    }
    let id: ItemId = match dto::parse_id(&id, "item") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.inventory.get_item(id).await {
        Ok(item) => Json(item).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn update_item(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateItemRequest>,
) -> Response {
    if let Err(resp) = authz::require(&principal, Permission::INVENTORY_WRITE) {
        return resp;
    }
    let id: ItemId = match dto::parse_id(&id, "item") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.inventory.update_item(id, &body.into(), Utc::now()).await {
        Ok(item) => Json(item).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list_movements(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    if let Err(resp) = authz::require(&principal, Permission::INVENTORY_READ) {
        return resp;
    }
    let id: ItemId = match dto::parse_id(&id, "item") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.inventory.movements(id).await {
        Ok(movements) => Json(movements).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// POST /inventory/items/:id/movements
///
/// Responds with the item as committed. A low-stock warning, if any, is
/// delivered asynchronously.
pub async fn post_movement(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::PostMovementRequest>,
) -> Response {
    if let Err(resp) = authz::require(&principal, Permission::INVENTORY_WRITE) {
        return resp;
    }
    let id: ItemId = match dto::parse_id(&id, "item") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let movement = match StockMovement::new(id, body.kind, body.quantity, Utc::now()) {
        Ok(m) => m,
        Err(e) => return errors::domain_error_to_response(e),
    };
    let movement = match body.reason {
        Some(reason) => movement.with_reason(reason),
        None => movement,
    };

    match services.inventory.post_movement(movement).await {
        Ok(item) => (StatusCode::CREATED, Json(item)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn low_stock(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Response {
    if let Err(resp) = authz::require(&principal, Permission::INVENTORY_READ) {
        return resp;
    }
    match services.inventory.low_stock_items().await {
        Ok(items) => Json(items).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
