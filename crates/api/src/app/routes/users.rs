use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use chrono::Utc;

use stockline_auth::Permission;
use stockline_core::UserId;
use stockline_infra::Services;
use stockline_infra::services::NewUser;

use crate::app::{dto, errors};
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/roles", get(list_roles).post(create_role))
        .route("/users", get(list_users).post(create_user))
        .route("/users/:id", get(get_user))
        .route("/users/:id/roles", put(set_roles))
        .route("/users/:id/suspend", post(suspend_user))
        .route("/users/:id/activate", post(activate_user))
}

pub async fn list_roles(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Response {
    if let Err(resp) = authz::require(&principal, Permission::USERS_READ) {
        return resp;
    }
    match services.users.list_roles().await {
        Ok(roles) => Json(roles).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn create_role(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::CreateRoleRequest>,
) -> Response {
    if let Err(resp) = authz::require(&principal, Permission::USERS_WRITE) {
        return resp;
    }
    match services.users.create_role(&body.name, &body.description).await {
        Ok(role) => (StatusCode::CREATED, Json(role)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list_users(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Response {
    if let Err(resp) = authz::require(&principal, Permission::USERS_READ) {
        return resp;
    }
    match services.users.list_users().await {
        Ok(users) => Json(users).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn create_user(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<NewUser>,
) -> Response {
    if let Err(resp) = authz::require(&principal, Permission::USERS_WRITE) {
        return resp;
    }
    match services.users.create_user(body, Utc::now()).await {
        Ok(user) => (StatusCode::CREATED, Json(user)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// Users may always read their own record.
pub async fn get_user(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    let id: UserId = match dto::parse_id(&id, "user") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    if let Err(resp) = authz::require_owner_or(&principal, id, Permission::USERS_READ) {
        return resp;
    }

    match services.users.get_user(id).await {
        Ok(user) => Json(user).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn set_roles(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::SetRolesRequest>,
) -> Response {
    if let Err(resp) = authz::require(&principal, Permission::USERS_WRITE) {
        return resp;
    }
    let id: UserId = match dto::parse_id(&id, "user") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.users.set_roles(id, body.roles).await {
        Ok(user) => Json(user).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn suspend_user(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    if let Err(resp) = authz::require(&principal, Permission::USERS_WRITE) {
        return resp;
    }
    let id: UserId = match dto::parse_id(&id, "user") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.users.suspend(id).await {
        Ok(user) => Json(user).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn activate_user(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    if let Err(resp) = authz::require(&principal, Permission::USERS_WRITE) {
        return resp;
    }
    let id: UserId = match dto::parse_id(&id, "user") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.users.activate(id).await {
        Ok(user) => Json(user).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
