//! API-side authorization guard.
//!
//! Checks run in handlers before any service call, keeping services and the
//! domain auth-agnostic.

use axum::http::StatusCode;
use axum::response::Response;

use stockline_auth::{AuthzError, Permission, RequiredPermissions, authorize, authorize_owner_or};
use stockline_core::UserId;

use crate::app::errors;
use crate::context::PrincipalContext;

/// Request wrapper that carries the permissions it needs.
pub struct Guarded<T> {
    pub inner: T,
    pub required: Vec<Permission>,
}

impl<T> Guarded<T> {
    pub fn new(inner: T, required: impl IntoIterator<Item = Permission>) -> Self {
        Self {
            inner,
            required: required.into_iter().collect(),
        }
    }
}

impl<T> RequiredPermissions for Guarded<T> {
    fn required_permissions(&self) -> &[Permission] {
        &self.required
    }
}

/// Check every permission `request` requires.
pub fn authorize_request<R: RequiredPermissions>(
    principal: &PrincipalContext,
    request: &R,
) -> Result<(), AuthzError> {
    for perm in request.required_permissions() {
        authorize(principal.principal(), perm)?;
    }
    Ok(())
}

/// Single-permission check mapped to a 403 response.
pub fn require(principal: &PrincipalContext, permission: Permission) -> Result<(), Response> {
    authorize(principal.principal(), &permission).map_err(forbidden)
}

/// Owners pass; everyone else needs `elevated`.
pub fn require_owner_or(
    principal: &PrincipalContext,
    owner: UserId,
    elevated: Permission,
) -> Result<(), Response> {
    authorize_owner_or(principal.principal(), owner, &elevated).map_err(forbidden)
}

/// Whether the caller holds `permission`, without failing the request.
pub fn holds(principal: &PrincipalContext, permission: &Permission) -> bool {
    authorize(principal.principal(), permission).is_ok()
}

pub fn forbidden(err: AuthzError) -> Response {
    errors::json_error(StatusCode::FORBIDDEN, "forbidden", err.to_string())
}
