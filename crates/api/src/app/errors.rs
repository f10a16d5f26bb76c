use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;

use stockline_core::DomainError;
use stockline_infra::{RepositoryError, ServiceError};

pub fn service_error_to_response(err: ServiceError) -> Response {
    match err {
        ServiceError::Domain(e) => domain_error_to_response(e),
        ServiceError::NotFound(what) => json_error(StatusCode::NOT_FOUND, "not_found", format!("{what} not found")),
        ServiceError::Repository(e) => match e {
            RepositoryError::NotFound(what) => json_error(StatusCode::NOT_FOUND, "not_found", format!("{what} not found")),
            RepositoryError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
            RepositoryError::Domain(e) => domain_error_to_response(e),
            RepositoryError::Storage(msg) => {
                error!(error = %msg, "storage failure");
                json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", "storage failure")
            }
        },
    }
}

pub fn domain_error_to_response(err: DomainError) -> Response {
    match err {
        DomainError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
        DomainError::InvariantViolation(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg)
        }
        DomainError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        DomainError::Unauthorized => json_error(StatusCode::FORBIDDEN, "unauthorized", "unauthorized"),
    }
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_error_kind() {
        let cases = [
            (ServiceError::from(DomainError::validation("x")), StatusCode::BAD_REQUEST),
            (ServiceError::from(DomainError::invalid_id("x")), StatusCode::BAD_REQUEST),
            (ServiceError::from(DomainError::Unauthorized), StatusCode::FORBIDDEN),
            (ServiceError::not_found("item"), StatusCode::NOT_FOUND),
            (ServiceError::from(DomainError::conflict("x")), StatusCode::CONFLICT),
            (ServiceError::from(DomainError::invariant("x")), StatusCode::UNPROCESSABLE_ENTITY),
            (
                ServiceError::from(RepositoryError::Conflict("email taken".into())),
                StatusCode::CONFLICT,
            ),
            (
                ServiceError::from(RepositoryError::storage("pool timed out")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(service_error_to_response(err).status(), status);
        }
    }
}
